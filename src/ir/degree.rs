//! Static degree calculus bounding the polynomial degree of expressions.
//!
//! Degrees are shape-shaped: a scalar expression has one bound, vectors and
//! matrices carry one bound per cell. The calculus runs bottom-up as a pure
//! analysis; function bodies are analyzed per call site by substituting the
//! actual argument degrees for the parameters. Trace loads count one degree
//! unit per cell, and so does every static register (both are trace-domain
//! polynomials). `div` and `inv` are over-approximated as documented in the
//! operation rules below.

use super::{
    AirFunction, BinaryOp, CompileError, Dimensions, Expression, ExpressionKind, LoadSource,
    Procedure, Value,
};

/// Degree bound of an expression, one integer per cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionDegree {
    /// Bound of a scalar expression.
    Scalar(u64),
    /// Per-element bounds of a vector expression.
    Vector(Vec<u64>),
    /// Per-cell bounds of a matrix expression.
    Matrix(Vec<Vec<u64>>),
}

impl ExpressionDegree {
    /// Returns the zero degree of the given shape.
    pub fn zero(dims: Dimensions) -> Self {
        Self::uniform(dims, 0)
    }

    /// Returns a degree with every cell set to `value`.
    pub fn uniform(dims: Dimensions, value: u64) -> Self {
        match dims {
            Dimensions::Scalar => ExpressionDegree::Scalar(value),
            Dimensions::Vector(length) => ExpressionDegree::Vector(vec![value; length]),
            Dimensions::Matrix(rows, cols) => {
                ExpressionDegree::Matrix(vec![vec![value; cols]; rows])
            }
        }
    }

    /// Flattens the bounds into row-major cell order.
    pub fn cells(&self) -> Vec<u64> {
        match self {
            ExpressionDegree::Scalar(degree) => vec![*degree],
            ExpressionDegree::Vector(degrees) => degrees.clone(),
            ExpressionDegree::Matrix(rows) => rows.iter().flatten().copied().collect(),
        }
    }

    /// Returns the largest cell bound.
    pub fn max_cell(&self) -> u64 {
        self.cells().into_iter().max().unwrap_or(0)
    }

    fn map(&self, f: impl Fn(u64) -> u64 + Copy) -> Self {
        match self {
            ExpressionDegree::Scalar(degree) => ExpressionDegree::Scalar(f(*degree)),
            ExpressionDegree::Vector(degrees) => {
                ExpressionDegree::Vector(degrees.iter().copied().map(f).collect())
            }
            ExpressionDegree::Matrix(rows) => ExpressionDegree::Matrix(
                rows.iter()
                    .map(|row| row.iter().copied().map(f).collect())
                    .collect(),
            ),
        }
    }

    /// Element-wise combination with scalar broadcast on either side.
    fn zip(&self, other: &Self, f: impl Fn(u64, u64) -> u64 + Copy) -> Self {
        match (self, other) {
            (ExpressionDegree::Scalar(a), other) => other.map(|b| f(*a, b)),
            (lhs, ExpressionDegree::Scalar(b)) => lhs.map(|a| f(a, *b)),
            (ExpressionDegree::Vector(a), ExpressionDegree::Vector(b)) => {
                ExpressionDegree::Vector(a.iter().zip(b).map(|(a, b)| f(*a, *b)).collect())
            }
            (ExpressionDegree::Matrix(a), ExpressionDegree::Matrix(b)) => ExpressionDegree::Matrix(
                a.iter()
                    .zip(b)
                    .map(|(row_a, row_b)| {
                        row_a.iter().zip(row_b).map(|(a, b)| f(*a, *b)).collect()
                    })
                    .collect(),
            ),
            _ => unreachable!("operand shapes are checked at construction"),
        }
    }
}

/// Inputs of the calculus that live on the schema.
#[derive(Debug, Clone, Copy)]
pub struct DegreeContext<'a> {
    /// Schema constants; consulted for `exp` exponents.
    pub constants: &'a [Value],
    /// Schema functions, analyzed per call site.
    pub functions: &'a [AirFunction],
}

/// Computes the degree bound of a procedure's result vector.
pub fn procedure_degree(
    procedure: &Procedure,
    ctx: &DegreeContext<'_>,
) -> Result<ExpressionDegree, CompileError> {
    let mut locals: Vec<ExpressionDegree> = procedure
        .locals()
        .iter()
        .map(|slot| ExpressionDegree::zero(slot.dims))
        .collect();
    for store in procedure.stores() {
        let degree = expression_degree(&store.value, ctx, &locals, &[])?;
        locals[store.target] = degree;
    }
    expression_degree(procedure.result(), ctx, &locals, &[])
}

fn function_degree(
    function: &AirFunction,
    ctx: &DegreeContext<'_>,
    params: &[ExpressionDegree],
) -> Result<ExpressionDegree, CompileError> {
    let mut locals: Vec<ExpressionDegree> = function
        .locals()
        .iter()
        .map(|slot| ExpressionDegree::zero(slot.dims))
        .collect();
    for store in function.stores() {
        let degree = expression_degree(&store.value, ctx, &locals, params)?;
        locals[store.target] = degree;
    }
    expression_degree(function.result(), ctx, &locals, params)
}

/// Computes the degree bound of a single expression.
pub fn expression_degree(
    expr: &Expression,
    ctx: &DegreeContext<'_>,
    locals: &[ExpressionDegree],
    params: &[ExpressionDegree],
) -> Result<ExpressionDegree, CompileError> {
    match expr.kind() {
        ExpressionKind::Literal(value) => Ok(ExpressionDegree::zero(value.dims())),
        ExpressionKind::Binary { op, lhs, rhs } => {
            let lhs_degree = expression_degree(lhs, ctx, locals, params)?;
            match op {
                BinaryOp::Add | BinaryOp::Sub => {
                    let rhs_degree = expression_degree(rhs, ctx, locals, params)?;
                    Ok(lhs_degree.zip(&rhs_degree, u64::max))
                }
                // Division is over-approximated as a multiplication.
                BinaryOp::Mul | BinaryOp::Div => {
                    let rhs_degree = expression_degree(rhs, ctx, locals, params)?;
                    Ok(lhs_degree.zip(&rhs_degree, u64::saturating_add))
                }
                BinaryOp::Exp => {
                    let exponent = exponent_value(rhs, ctx)?;
                    Ok(lhs_degree.map(|degree| degree.saturating_mul(exponent)))
                }
                BinaryOp::Prod => {
                    let rhs_degree = expression_degree(rhs, ctx, locals, params)?;
                    product_degree(&lhs_degree, &rhs_degree)
                }
            }
        }
        // Inversion keeps the operand degree; an over-approximation shared
        // with the source analysis.
        ExpressionKind::Unary { operand, .. } => expression_degree(operand, ctx, locals, params),
        ExpressionKind::MakeVector(elements) => {
            let mut cells = Vec::new();
            for element in elements {
                cells.extend(expression_degree(element, ctx, locals, params)?.cells());
            }
            Ok(ExpressionDegree::Vector(cells))
        }
        ExpressionKind::MakeMatrix(rows) => {
            let mut degrees = Vec::with_capacity(rows.len());
            for row in rows {
                let mut cells = Vec::with_capacity(row.len());
                for cell in row {
                    cells.extend(expression_degree(cell, ctx, locals, params)?.cells());
                }
                degrees.push(cells);
            }
            Ok(ExpressionDegree::Matrix(degrees))
        }
        ExpressionKind::GetElement { source, index } => {
            let degrees = expression_degree(source, ctx, locals, params)?.cells();
            Ok(ExpressionDegree::Scalar(degrees[*index]))
        }
        ExpressionKind::Slice { source, start, end } => {
            let degrees = expression_degree(source, ctx, locals, params)?.cells();
            Ok(ExpressionDegree::Vector(degrees[*start..*end].to_vec()))
        }
        ExpressionKind::Load { source, index } => match source {
            LoadSource::Const => Ok(ExpressionDegree::zero(expr.dims())),
            LoadSource::Local => Ok(locals[*index].clone()),
            LoadSource::Param => Ok(params[*index].clone()),
            LoadSource::Trace | LoadSource::Static => {
                Ok(ExpressionDegree::uniform(expr.dims(), 1))
            }
        },
        ExpressionKind::Call { function, args } => {
            let arg_degrees = args
                .iter()
                .map(|arg| expression_degree(arg, ctx, locals, params))
                .collect::<Result<Vec<_>, _>>()?;
            function_degree(&ctx.functions[*function], ctx, &arg_degrees)
        }
    }
}

fn exponent_value(expr: &Expression, ctx: &DegreeContext<'_>) -> Result<u64, CompileError> {
    let value = match expr.kind() {
        ExpressionKind::Literal(value) => value.as_scalar(),
        ExpressionKind::Load {
            source: LoadSource::Const,
            index,
        } => ctx.constants[*index].as_scalar(),
        _ => None,
    };
    value
        .map(|felt| felt.as_u64())
        .ok_or(CompileError::NonConstantExponent)
}

fn vector_product_degree(lhs: &[u64], rhs: &[u64]) -> u64 {
    lhs.iter()
        .zip(rhs)
        .map(|(a, b)| a.saturating_add(*b))
        .max()
        .unwrap_or(0)
}

/// Product degrees: the maximum over lanes of the summed operand degrees,
/// extended row- and column-wise for matrix operands.
fn product_degree(
    lhs: &ExpressionDegree,
    rhs: &ExpressionDegree,
) -> Result<ExpressionDegree, CompileError> {
    match (lhs, rhs) {
        (ExpressionDegree::Vector(a), ExpressionDegree::Vector(b)) => {
            Ok(ExpressionDegree::Scalar(vector_product_degree(a, b)))
        }
        (ExpressionDegree::Matrix(rows), ExpressionDegree::Vector(b)) => Ok(
            ExpressionDegree::Vector(rows.iter().map(|row| vector_product_degree(row, b)).collect()),
        ),
        (ExpressionDegree::Matrix(a), ExpressionDegree::Matrix(b)) => {
            let cols = b[0].len();
            let degrees = a
                .iter()
                .map(|row| {
                    (0..cols)
                        .map(|col| {
                            let column: Vec<u64> = b.iter().map(|b_row| b_row[col]).collect();
                            vector_product_degree(row, &column)
                        })
                        .collect()
                })
                .collect();
            Ok(ExpressionDegree::Matrix(degrees))
        }
        _ => unreachable!("product shapes are checked at construction"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Felt;

    fn ctx<'a>(constants: &'a [Value], functions: &'a [AirFunction]) -> DegreeContext<'a> {
        DegreeContext {
            constants,
            functions,
        }
    }

    fn trace_load(width: usize) -> Expression {
        Expression::load(LoadSource::Trace, 0, Dimensions::Vector(width))
    }

    #[test]
    fn add_takes_the_maximum_and_mul_the_sum() {
        let env = ctx(&[], &[]);
        let cubed = Expression::binary(
            BinaryOp::Exp,
            trace_load(1),
            Expression::literal(Value::Scalar(Felt(3))),
        )
        .unwrap();
        let sum = Expression::binary(BinaryOp::Add, cubed.clone(), trace_load(1)).unwrap();
        assert_eq!(
            expression_degree(&sum, &env, &[], &[]).unwrap(),
            ExpressionDegree::Vector(vec![3])
        );

        let product = Expression::binary(BinaryOp::Mul, cubed, trace_load(1)).unwrap();
        assert_eq!(
            expression_degree(&product, &env, &[], &[]).unwrap(),
            ExpressionDegree::Vector(vec![4])
        );
    }

    #[test]
    fn exponent_reads_schema_constants() {
        let constants = [Value::Scalar(Felt(5))];
        let env = ctx(&constants, &[]);
        let power = Expression::binary(
            BinaryOp::Exp,
            trace_load(2),
            Expression::load(LoadSource::Const, 0, Dimensions::Scalar),
        )
        .unwrap();
        assert_eq!(
            expression_degree(&power, &env, &[], &[]).unwrap(),
            ExpressionDegree::Vector(vec![5, 5])
        );
    }

    #[test]
    fn dot_product_maximizes_summed_lane_degrees() {
        let lhs = ExpressionDegree::Vector(vec![1, 3]);
        let rhs = ExpressionDegree::Vector(vec![2, 1]);
        assert_eq!(
            product_degree(&lhs, &rhs).unwrap(),
            ExpressionDegree::Scalar(4)
        );
    }

    #[test]
    fn static_loads_count_one_degree_unit() {
        let env = ctx(&[], &[]);
        let static_load = Expression::load(LoadSource::Static, 2, Dimensions::Scalar);
        assert_eq!(
            expression_degree(&static_load, &env, &[], &[]).unwrap(),
            ExpressionDegree::Scalar(1)
        );
    }

    #[test]
    fn call_substitutes_argument_degrees() {
        // f(x) = x^2
        let param = crate::ir::Parameter {
            dims: Dimensions::Scalar,
            handle: None,
        };
        let body = Expression::binary(
            BinaryOp::Exp,
            Expression::load(LoadSource::Param, 0, Dimensions::Scalar),
            Expression::literal(Value::Scalar(Felt(2))),
        )
        .unwrap();
        let function = AirFunction::new(None, vec![param], Vec::new(), Vec::new(), body);
        let functions = [function];
        let env = ctx(&[], &functions);

        // f applied to a degree-3 argument yields degree 6.
        let argument = Expression::binary(
            BinaryOp::Exp,
            Expression::load(LoadSource::Trace, 0, Dimensions::Scalar),
            Expression::literal(Value::Scalar(Felt(3))),
        )
        .unwrap();
        let call = Expression::call(0, vec![argument], Dimensions::Scalar);
        assert_eq!(
            expression_degree(&call, &env, &[], &[]).unwrap(),
            ExpressionDegree::Scalar(6)
        );
    }
}
