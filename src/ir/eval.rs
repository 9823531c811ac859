//! Expression and procedure evaluation against a concrete environment.
//!
//! Shapes are fixed at construction time, so evaluation only fails on field
//! arithmetic (inverting or dividing by zero). Loads resolve against the
//! supplied [`EvaluationContext`]; locals and parameters live in a private
//! frame per procedure or function activation.

use crate::field::{Felt, FieldError, PrimeField};

use super::{
    AirFunction, BinaryOp, Expression, ExpressionKind, LoadSource, Procedure, UnaryOp, Value,
};

/// Read-only environment resolving loads during evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Field the arithmetic runs in.
    pub field: &'a PrimeField,
    /// Schema constants in declaration order.
    pub constants: &'a [Value],
    /// Schema functions in declaration order.
    pub functions: &'a [AirFunction],
    /// Visible trace rows; `trace_rows[k]` backs `load.trace k`.
    pub trace_rows: &'a [Vec<Felt>],
    /// Static register values at the current step.
    pub static_row: &'a [Felt],
}

struct Frame {
    params: Vec<Value>,
    locals: Vec<Value>,
}

/// Runs a procedure: stores execute in declared order, then the result
/// expression is evaluated and returned as a flat vector.
pub fn evaluate_procedure(
    procedure: &Procedure,
    ctx: &EvaluationContext<'_>,
) -> Result<Vec<Felt>, FieldError> {
    let mut frame = Frame {
        params: Vec::new(),
        locals: procedure
            .locals()
            .iter()
            .map(|slot| Value::zero(slot.dims))
            .collect(),
    };
    for store in procedure.stores() {
        let value = evaluate(&store.value, ctx, &frame)?;
        frame.locals[store.target] = value;
    }
    let result = evaluate(procedure.result(), ctx, &frame)?;
    Ok(result.cells())
}

fn call_function(
    function: &AirFunction,
    args: Vec<Value>,
    ctx: &EvaluationContext<'_>,
) -> Result<Value, FieldError> {
    let mut frame = Frame {
        params: args,
        locals: function
            .locals()
            .iter()
            .map(|slot| Value::zero(slot.dims))
            .collect(),
    };
    for store in function.stores() {
        let value = evaluate(&store.value, ctx, &frame)?;
        frame.locals[store.target] = value;
    }
    evaluate(function.result(), ctx, &frame)
}

fn evaluate(
    expr: &Expression,
    ctx: &EvaluationContext<'_>,
    frame: &Frame,
) -> Result<Value, FieldError> {
    match expr.kind() {
        ExpressionKind::Literal(value) => Ok(value.clone()),
        ExpressionKind::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, ctx, frame)?;
            let rhs = evaluate(rhs, ctx, frame)?;
            apply_binary(ctx.field, *op, lhs, rhs)
        }
        ExpressionKind::Unary { op, operand } => {
            let operand = evaluate(operand, ctx, frame)?;
            match op {
                UnaryOp::Neg => map_cells(operand, |felt| Ok(ctx.field.neg(felt))),
                UnaryOp::Inv => map_cells(operand, |felt| ctx.field.inv(felt)),
            }
        }
        ExpressionKind::MakeVector(elements) => {
            let mut cells = Vec::new();
            for element in elements {
                cells.extend(evaluate(element, ctx, frame)?.cells());
            }
            Ok(Value::Vector(cells))
        }
        ExpressionKind::MakeMatrix(rows) => {
            let mut matrix = Vec::with_capacity(rows.len());
            for row in rows {
                let mut cells = Vec::with_capacity(row.len());
                for cell in row {
                    cells.extend(evaluate(cell, ctx, frame)?.cells());
                }
                matrix.push(cells);
            }
            Ok(Value::Matrix(matrix))
        }
        ExpressionKind::GetElement { source, index } => {
            match evaluate(source, ctx, frame)? {
                Value::Vector(elements) => Ok(Value::Scalar(elements[*index])),
                _ => unreachable!("element access source is shape-checked to a vector"),
            }
        }
        ExpressionKind::Slice { source, start, end } => match evaluate(source, ctx, frame)? {
            Value::Vector(elements) => Ok(Value::Vector(elements[*start..*end].to_vec())),
            _ => unreachable!("slice source is shape-checked to a vector"),
        },
        ExpressionKind::Load { source, index } => match source {
            LoadSource::Const => Ok(ctx.constants[*index].clone()),
            LoadSource::Local => Ok(frame.locals[*index].clone()),
            LoadSource::Param => Ok(frame.params[*index].clone()),
            LoadSource::Trace => Ok(Value::Vector(ctx.trace_rows[*index].clone())),
            LoadSource::Static => Ok(Value::Scalar(ctx.static_row[*index])),
        },
        ExpressionKind::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, ctx, frame))
                .collect::<Result<Vec<_>, _>>()?;
            call_function(&ctx.functions[*function], args, ctx)
        }
    }
}

fn apply_binary(
    field: &PrimeField,
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
) -> Result<Value, FieldError> {
    match op {
        BinaryOp::Add => zip_cells(field, lhs, rhs, |f, a, b| Ok(f.add(a, b))),
        BinaryOp::Sub => zip_cells(field, lhs, rhs, |f, a, b| Ok(f.sub(a, b))),
        BinaryOp::Mul => zip_cells(field, lhs, rhs, |f, a, b| Ok(f.mul(a, b))),
        BinaryOp::Div => zip_cells(field, lhs, rhs, |f, a, b| f.div(a, b)),
        BinaryOp::Exp => {
            let exponent = rhs
                .as_scalar()
                .map(Felt::as_u64)
                .unwrap_or_else(|| unreachable!("exponent is shape-checked to a scalar"));
            map_cells(lhs, |felt| Ok(field.exp(felt, exponent)))
        }
        BinaryOp::Prod => product(field, lhs, rhs),
    }
}

fn map_cells(value: Value, f: impl Fn(Felt) -> Result<Felt, FieldError>) -> Result<Value, FieldError> {
    match value {
        Value::Scalar(cell) => Ok(Value::Scalar(f(cell)?)),
        Value::Vector(cells) => Ok(Value::Vector(
            cells.into_iter().map(&f).collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Matrix(rows) => Ok(Value::Matrix(
            rows.into_iter()
                .map(|row| row.into_iter().map(&f).collect::<Result<Vec<_>, _>>())
                .collect::<Result<Vec<_>, _>>()?,
        )),
    }
}

/// Element-wise combination with scalar broadcast on either side.
fn zip_cells(
    field: &PrimeField,
    lhs: Value,
    rhs: Value,
    f: impl Fn(&PrimeField, Felt, Felt) -> Result<Felt, FieldError> + Copy,
) -> Result<Value, FieldError> {
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(field, a, b)?)),
        (Value::Scalar(a), rhs) => map_cells(rhs, |b| f(field, a, b)),
        (lhs, Value::Scalar(b)) => map_cells(lhs, |a| f(field, a, b)),
        (Value::Vector(a), Value::Vector(b)) => Ok(Value::Vector(
            a.into_iter()
                .zip(b)
                .map(|(a, b)| f(field, a, b))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        (Value::Matrix(a), Value::Matrix(b)) => Ok(Value::Matrix(
            a.into_iter()
                .zip(b)
                .map(|(row_a, row_b)| {
                    row_a
                        .into_iter()
                        .zip(row_b)
                        .map(|(a, b)| f(field, a, b))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?,
        )),
        _ => unreachable!("operand shapes are checked at construction"),
    }
}

fn dot(field: &PrimeField, lhs: &[Felt], rhs: &[Felt]) -> Felt {
    lhs.iter()
        .zip(rhs)
        .fold(Felt::ZERO, |acc, (a, b)| field.add(acc, field.mul(*a, *b)))
}

fn product(field: &PrimeField, lhs: Value, rhs: Value) -> Result<Value, FieldError> {
    match (lhs, rhs) {
        (Value::Vector(a), Value::Vector(b)) => Ok(Value::Scalar(dot(field, &a, &b))),
        (Value::Matrix(rows), Value::Vector(b)) => Ok(Value::Vector(
            rows.iter().map(|row| dot(field, row, &b)).collect(),
        )),
        (Value::Matrix(a), Value::Matrix(b)) => {
            let cols = b[0].len();
            let mut result = Vec::with_capacity(a.len());
            for row in &a {
                let mut out = Vec::with_capacity(cols);
                for col in 0..cols {
                    let column: Vec<Felt> = b.iter().map(|b_row| b_row[col]).collect();
                    out.push(dot(field, row, &column));
                }
                result.push(out);
            }
            Ok(Value::Matrix(result))
        }
        _ => unreachable!("product shapes are checked at construction"),
    }
}
