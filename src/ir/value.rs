//! Concrete scalar, vector and matrix values of field elements.

use crate::field::Felt;

use super::{CompileError, Dimensions};

/// A literal or computed value: one field element, a vector, or a matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Single field element.
    Scalar(Felt),
    /// Vector of field elements.
    Vector(Vec<Felt>),
    /// Rectangular matrix of field elements stored row by row.
    Matrix(Vec<Vec<Felt>>),
}

impl Value {
    /// Creates a vector value, rejecting the empty vector.
    pub fn vector(elements: Vec<Felt>) -> Result<Self, CompileError> {
        if elements.is_empty() {
            return Err(CompileError::Structure("vector values must not be empty"));
        }
        Ok(Value::Vector(elements))
    }

    /// Creates a matrix value, enforcing a rectangular non-empty layout.
    pub fn matrix(rows: Vec<Vec<Felt>>) -> Result<Self, CompileError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(CompileError::Structure("matrix values must not be empty"));
        }
        for row in &rows {
            if row.len() != cols {
                return Err(CompileError::Arity {
                    context: "matrix row width",
                    expected: cols,
                    actual: row.len(),
                });
            }
        }
        Ok(Value::Matrix(rows))
    }

    /// Returns the shape of the value.
    pub fn dims(&self) -> Dimensions {
        match self {
            Value::Scalar(_) => Dimensions::Scalar,
            Value::Vector(elements) => Dimensions::Vector(elements.len()),
            Value::Matrix(rows) => Dimensions::Matrix(rows.len(), rows[0].len()),
        }
    }

    /// Returns the zero value of the given shape.
    pub fn zero(dims: Dimensions) -> Self {
        match dims {
            Dimensions::Scalar => Value::Scalar(Felt::ZERO),
            Dimensions::Vector(length) => Value::Vector(vec![Felt::ZERO; length]),
            Dimensions::Matrix(rows, cols) => Value::Matrix(vec![vec![Felt::ZERO; cols]; rows]),
        }
    }

    /// Returns the scalar payload, if the value is a scalar.
    pub fn as_scalar(&self) -> Option<Felt> {
        match self {
            Value::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// Flattens the value into its cells in row-major order.
    pub fn cells(&self) -> Vec<Felt> {
        match self {
            Value::Scalar(value) => vec![*value],
            Value::Vector(elements) => elements.clone(),
            Value::Matrix(rows) => rows.iter().flatten().copied().collect(),
        }
    }
}
