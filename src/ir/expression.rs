//! Tagged expression variants with shape-inferring constructors.
//!
//! Every constructor validates operand shapes and records the inferred
//! [`Dimensions`] on the node, so downstream passes never re-derive shapes.
//! Load and call expressions are built by the execution contexts, which
//! resolve handles to indices and supply the referenced shape.

use super::{CompileError, Dimensions, Value};

/// Binary operation keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Element-wise addition.
    Add,
    /// Element-wise subtraction.
    Sub,
    /// Element-wise multiplication.
    Mul,
    /// Element-wise division by the inverse.
    Div,
    /// Exponentiation by a scalar constant.
    Exp,
    /// Linear-algebraic product (dot, matrix-vector, matrix-matrix).
    Prod,
}

impl BinaryOp {
    /// Returns the source-language keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Exp => "exp",
            BinaryOp::Prod => "prod",
        }
    }
}

/// Unary operation keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Element-wise additive inverse.
    Neg,
    /// Element-wise multiplicative inverse.
    Inv,
}

impl UnaryOp {
    /// Returns the source-language keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Inv => "inv",
        }
    }
}

/// Source addressed by a load expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Schema constant.
    Const,
    /// Procedure or function local slot.
    Local,
    /// Function parameter.
    Param,
    /// Trace row at the given offset within the procedure span.
    Trace,
    /// Static register value at the current step.
    Static,
}

impl LoadSource {
    /// Returns the source-language keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            LoadSource::Const => "load.const",
            LoadSource::Local => "load.local",
            LoadSource::Param => "load.param",
            LoadSource::Trace => "load.trace",
            LoadSource::Static => "load.static",
        }
    }
}

/// Expression node carrying its inferred shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    kind: ExpressionKind,
    dims: Dimensions,
}

/// Closed set of expression variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionKind {
    /// Literal scalar, vector or matrix value.
    Literal(Value),
    /// Binary operation.
    Binary {
        /// Operation keyword.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// Unary operation.
    Unary {
        /// Operation keyword.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expression>,
    },
    /// Vector composition; scalar and vector elements are concatenated.
    MakeVector(Vec<Expression>),
    /// Matrix composition from scalar cells.
    MakeMatrix(Vec<Vec<Expression>>),
    /// Single element of a vector source.
    GetElement {
        /// Vector-shaped source.
        source: Box<Expression>,
        /// Zero-based element index.
        index: usize,
    },
    /// Contiguous sub-vector of a vector source.
    Slice {
        /// Vector-shaped source.
        source: Box<Expression>,
        /// Inclusive start index.
        start: usize,
        /// Exclusive end index.
        end: usize,
    },
    /// Load from a symbol table or execution row.
    Load {
        /// Addressed source.
        source: LoadSource,
        /// Resolved numeric index.
        index: usize,
    },
    /// Call of a schema function.
    Call {
        /// Resolved function index.
        function: usize,
        /// Argument expressions in parameter order.
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Returns the expression variant.
    pub fn kind(&self) -> &ExpressionKind {
        &self.kind
    }

    /// Returns the inferred shape.
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Creates a literal expression.
    pub fn literal(value: Value) -> Self {
        let dims = value.dims();
        Self {
            kind: ExpressionKind::Literal(value),
            dims,
        }
    }

    /// Creates a binary operation, inferring the result shape.
    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Result<Self, CompileError> {
        let dims = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                broadcast(op, lhs.dims(), rhs.dims())?
            }
            BinaryOp::Exp => {
                if !rhs.dims().is_scalar() {
                    return Err(CompileError::UnexpectedShape {
                        context: "exponent",
                        expected: Dimensions::Scalar,
                        actual: rhs.dims(),
                    });
                }
                if !is_constant(&rhs) {
                    return Err(CompileError::NonConstantExponent);
                }
                lhs.dims()
            }
            BinaryOp::Prod => product_dims(lhs.dims(), rhs.dims())?,
        };
        Ok(Self {
            kind: ExpressionKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            dims,
        })
    }

    /// Creates a unary operation; the shape passes through unchanged.
    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        let dims = operand.dims();
        Self {
            kind: ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
            dims,
        }
    }

    /// Creates a vector composition from scalar and vector elements.
    pub fn make_vector(elements: Vec<Expression>) -> Result<Self, CompileError> {
        if elements.is_empty() {
            return Err(CompileError::Structure(
                "vector composition requires at least one element",
            ));
        }
        let mut length = 0;
        for element in &elements {
            length += match element.dims() {
                Dimensions::Scalar => 1,
                Dimensions::Vector(n) => n,
                actual @ Dimensions::Matrix(..) => {
                    return Err(CompileError::UnexpectedShape {
                        context: "vector composition element",
                        expected: Dimensions::Scalar,
                        actual,
                    })
                }
            };
        }
        Ok(Self {
            kind: ExpressionKind::MakeVector(elements),
            dims: Dimensions::Vector(length),
        })
    }

    /// Creates a matrix composition from rows of scalar cells.
    pub fn make_matrix(rows: Vec<Vec<Expression>>) -> Result<Self, CompileError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(CompileError::Structure(
                "matrix composition requires at least one cell",
            ));
        }
        for row in &rows {
            if row.len() != cols {
                return Err(CompileError::Arity {
                    context: "matrix composition row width",
                    expected: cols,
                    actual: row.len(),
                });
            }
            for cell in row {
                if !cell.dims().is_scalar() {
                    return Err(CompileError::UnexpectedShape {
                        context: "matrix composition cell",
                        expected: Dimensions::Scalar,
                        actual: cell.dims(),
                    });
                }
            }
        }
        let dims = Dimensions::Matrix(rows.len(), cols);
        Ok(Self {
            kind: ExpressionKind::MakeMatrix(rows),
            dims,
        })
    }

    /// Creates an element access into a vector source.
    pub fn get_element(source: Expression, index: usize) -> Result<Self, CompileError> {
        let length = expect_vector(&source, "element access source")?;
        if index >= length {
            return Err(CompileError::IndexOutOfRange {
                what: "vector element",
                index,
                limit: length,
            });
        }
        Ok(Self {
            kind: ExpressionKind::GetElement {
                source: Box::new(source),
                index,
            },
            dims: Dimensions::Scalar,
        })
    }

    /// Creates a slice of a vector source; `end` is exclusive.
    pub fn slice(source: Expression, start: usize, end: usize) -> Result<Self, CompileError> {
        let length = expect_vector(&source, "slice source")?;
        if start >= end || end > length {
            return Err(CompileError::IndexOutOfRange {
                what: "vector slice bound",
                index: end,
                limit: length,
            });
        }
        let dims = Dimensions::Vector(end - start);
        Ok(Self {
            kind: ExpressionKind::Slice {
                source: Box::new(source),
                start,
                end,
            },
            dims,
        })
    }

    /// Creates a resolved load expression; used by the execution contexts,
    /// which validate the index and supply the referenced shape.
    pub(crate) fn load(source: LoadSource, index: usize, dims: Dimensions) -> Self {
        Self {
            kind: ExpressionKind::Load { source, index },
            dims,
        }
    }

    /// Creates a resolved call expression; used by the execution contexts.
    pub(crate) fn call(function: usize, args: Vec<Expression>, dims: Dimensions) -> Self {
        Self {
            kind: ExpressionKind::Call { function, args },
            dims,
        }
    }
}

fn expect_vector(source: &Expression, context: &'static str) -> Result<usize, CompileError> {
    match source.dims() {
        Dimensions::Vector(length) => Ok(length),
        actual => Err(CompileError::UnexpectedShape {
            context,
            expected: Dimensions::Vector(0),
            actual,
        }),
    }
}

/// Element-wise shape combination with scalar broadcast.
fn broadcast(op: BinaryOp, lhs: Dimensions, rhs: Dimensions) -> Result<Dimensions, CompileError> {
    match (lhs, rhs) {
        (Dimensions::Scalar, other) | (other, Dimensions::Scalar) => Ok(other),
        (lhs, rhs) if lhs == rhs => Ok(lhs),
        (lhs, rhs) => Err(CompileError::ShapeMismatch {
            operation: op.keyword(),
            lhs,
            rhs,
        }),
    }
}

/// Linear-algebraic product shapes: dot, matrix-vector and matrix-matrix.
fn product_dims(lhs: Dimensions, rhs: Dimensions) -> Result<Dimensions, CompileError> {
    match (lhs, rhs) {
        (Dimensions::Vector(n), Dimensions::Vector(m)) if n == m => Ok(Dimensions::Scalar),
        (Dimensions::Matrix(rows, inner), Dimensions::Vector(m)) if inner == m => {
            Ok(Dimensions::Vector(rows))
        }
        (Dimensions::Matrix(rows, inner), Dimensions::Matrix(m, cols)) if inner == m => {
            Ok(Dimensions::Matrix(rows, cols))
        }
        (lhs, rhs) => Err(CompileError::ShapeMismatch {
            operation: BinaryOp::Prod.keyword(),
            lhs,
            rhs,
        }),
    }
}

/// An exponent is constant when it is a literal or a schema constant.
fn is_constant(expr: &Expression) -> bool {
    matches!(
        expr.kind(),
        ExpressionKind::Literal(_)
            | ExpressionKind::Load {
                source: LoadSource::Const,
                ..
            }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Felt;

    fn scalar(value: u64) -> Expression {
        Expression::literal(Value::Scalar(Felt(value)))
    }

    fn vector(len: usize) -> Expression {
        Expression::literal(Value::Vector(vec![Felt::ZERO; len]))
    }

    fn matrix(rows: usize, cols: usize) -> Expression {
        Expression::literal(Value::Matrix(vec![vec![Felt::ZERO; cols]; rows]))
    }

    #[test]
    fn scalars_broadcast_into_any_shape() {
        let sum = Expression::binary(BinaryOp::Add, scalar(1), vector(4)).unwrap();
        assert_eq!(sum.dims(), Dimensions::Vector(4));
        let scaled = Expression::binary(BinaryOp::Mul, matrix(2, 3), scalar(5)).unwrap();
        assert_eq!(scaled.dims(), Dimensions::Matrix(2, 3));
    }

    #[test]
    fn mismatched_elementwise_shapes_are_rejected() {
        let err = Expression::binary(BinaryOp::Sub, vector(4), vector(3)).unwrap_err();
        assert!(matches!(err, CompileError::ShapeMismatch { .. }));
    }

    #[test]
    fn product_shapes() {
        let dot = Expression::binary(BinaryOp::Prod, vector(3), vector(3)).unwrap();
        assert_eq!(dot.dims(), Dimensions::Scalar);
        let matvec = Expression::binary(BinaryOp::Prod, matrix(2, 3), vector(3)).unwrap();
        assert_eq!(matvec.dims(), Dimensions::Vector(2));
        let matmat = Expression::binary(BinaryOp::Prod, matrix(2, 3), matrix(3, 4)).unwrap();
        assert_eq!(matmat.dims(), Dimensions::Matrix(2, 4));
        let err = Expression::binary(BinaryOp::Prod, matrix(2, 3), vector(2)).unwrap_err();
        assert!(matches!(err, CompileError::ShapeMismatch { .. }));
    }

    #[test]
    fn exponent_must_be_a_scalar_constant() {
        let power = Expression::binary(BinaryOp::Exp, vector(2), scalar(3)).unwrap();
        assert_eq!(power.dims(), Dimensions::Vector(2));

        let err = Expression::binary(BinaryOp::Exp, scalar(2), vector(2)).unwrap_err();
        assert!(matches!(err, CompileError::UnexpectedShape { .. }));

        let computed = Expression::binary(BinaryOp::Add, scalar(1), scalar(2)).unwrap();
        let err = Expression::binary(BinaryOp::Exp, scalar(2), computed).unwrap_err();
        assert_eq!(err, CompileError::NonConstantExponent);
    }

    #[test]
    fn vector_composition_concatenates_lengths() {
        let composed = Expression::make_vector(vec![scalar(1), vector(3), scalar(2)]).unwrap();
        assert_eq!(composed.dims(), Dimensions::Vector(5));
        let err = Expression::make_vector(vec![matrix(1, 1)]).unwrap_err();
        assert!(matches!(err, CompileError::UnexpectedShape { .. }));
    }

    #[test]
    fn get_and_slice_stay_in_bounds() {
        let element = Expression::get_element(vector(4), 3).unwrap();
        assert_eq!(element.dims(), Dimensions::Scalar);
        let err = Expression::get_element(vector(4), 4).unwrap_err();
        assert!(matches!(err, CompileError::IndexOutOfRange { .. }));

        let sliced = Expression::slice(vector(6), 1, 4).unwrap();
        assert_eq!(sliced.dims(), Dimensions::Vector(3));
        let err = Expression::slice(vector(6), 4, 4).unwrap_err();
        assert!(matches!(err, CompileError::IndexOutOfRange { .. }));
    }
}
