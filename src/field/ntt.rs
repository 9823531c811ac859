//! Radix-2 number-theoretic transforms over power-of-two root domains.
//!
//! Polynomials and domain evaluations are kept in packed column-major
//! matrices: every column stores one polynomial lane contiguously so the
//! transforms run independently per lane. Inputs and outputs use natural
//! ordering; the bit-reversal permutation is applied internally before the
//! Cooley-Tukey stages.

use super::{Felt, FieldError, PrimeField};

/// Packed column-major matrix of field elements.
///
/// Every column has the same length (`num_rows`); the trace matrix stores
/// one register timeline per column, polynomial banks store one coefficient
/// vector per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    columns: Vec<Vec<Felt>>,
    rows: usize,
}

impl Matrix {
    /// Creates a matrix from equally sized columns.
    pub fn new(columns: Vec<Vec<Felt>>) -> Result<Self, FieldError> {
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        for column in &columns {
            if column.len() != rows {
                return Err(FieldError::DimensionMismatch {
                    expected: rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Creates a zero-filled matrix.
    pub fn zeroed(num_columns: usize, num_rows: usize) -> Self {
        Self {
            columns: vec![vec![Felt::ZERO; num_rows]; num_columns],
            rows: num_rows,
        }
    }

    /// Returns the number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column length.
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Returns a view over the requested column.
    pub fn column(&self, ix: usize) -> &[Felt] {
        &self.columns[ix]
    }

    /// Returns a mutable view over the requested column.
    pub fn column_mut(&mut self, ix: usize) -> &mut [Felt] {
        &mut self.columns[ix]
    }

    /// Gathers the requested row across all columns.
    pub fn row(&self, ix: usize) -> Vec<Felt> {
        self.columns.iter().map(|column| column[ix]).collect()
    }

    /// Returns an iterator over the columns.
    pub fn iter_columns(&self) -> impl Iterator<Item = &[Felt]> {
        self.columns.iter().map(Vec::as_slice)
    }

    /// Consumes the matrix and returns its columns.
    pub fn into_columns(self) -> Vec<Vec<Felt>> {
        self.columns
    }
}

/// Applies the bit-reversal permutation for the radix-2 stages.
fn bit_reverse_permute(values: &mut [Felt]) {
    let n = values.len();
    if n <= 1 {
        return;
    }
    let shift = n.leading_zeros() + 1;
    for i in 0..n {
        let j = i.reverse_bits() >> shift;
        if j > i {
            values.swap(i, j);
        }
    }
}

/// Executes the iterative Cooley-Tukey stages for the supplied root.
///
/// `root` must be a primitive root of unity whose order equals the input
/// length. Input and output are in natural order.
fn transform(field: &PrimeField, values: &mut [Felt], root: Felt) {
    let n = values.len();
    bit_reverse_permute(values);
    let mut len = 2;
    while len <= n {
        let stride_root = field.exp(root, (n / len) as u64);
        for start in (0..n).step_by(len) {
            let mut twiddle = Felt::ONE;
            for ix in start..start + len / 2 {
                let even = values[ix];
                let odd = field.mul(values[ix + len / 2], twiddle);
                values[ix] = field.add(even, odd);
                values[ix + len / 2] = field.sub(even, odd);
                twiddle = field.mul(twiddle, stride_root);
            }
        }
        len <<= 1;
    }
}

/// Evaluates polynomial coefficients over the root domain of the same order.
pub fn eval_poly_at_roots(field: &PrimeField, coefficients: &[Felt]) -> Result<Vec<Felt>, FieldError> {
    if !coefficients.len().is_power_of_two() {
        return Err(FieldError::NonPowerOfTwo {
            size: coefficients.len(),
        });
    }
    let root = field.root_of_unity(coefficients.len() as u64)?;
    let mut values = coefficients.to_vec();
    transform(field, &mut values, root);
    Ok(values)
}

/// Recovers polynomial coefficients from evaluations over the root domain.
pub fn interpolate_roots(field: &PrimeField, values: &[Felt]) -> Result<Vec<Felt>, FieldError> {
    if !values.len().is_power_of_two() {
        return Err(FieldError::NonPowerOfTwo { size: values.len() });
    }
    let root = field.root_of_unity(values.len() as u64)?;
    let inverse_root = field.inv(root)?;
    let mut coefficients = values.to_vec();
    transform(field, &mut coefficients, inverse_root);
    let size_inv = field.inv(field.element(values.len() as u64))?;
    for coefficient in coefficients.iter_mut() {
        *coefficient = field.mul(*coefficient, size_inv);
    }
    Ok(coefficients)
}

/// Interpolates every column of a value matrix into coefficient form.
pub fn interpolate_columns(field: &PrimeField, values: &Matrix) -> Result<Matrix, FieldError> {
    let columns = values
        .iter_columns()
        .map(|column| interpolate_roots(field, column))
        .collect::<Result<Vec<_>, _>>()?;
    Matrix::new(columns)
}

/// Evaluates every coefficient column over a (possibly larger) root domain.
///
/// Columns shorter than `order` are zero-padded; this is the low-degree
/// extension used to move trace polynomials onto the evaluation domain.
pub fn eval_polys_at_roots(
    field: &PrimeField,
    polys: &Matrix,
    order: usize,
) -> Result<Matrix, FieldError> {
    if order < polys.num_rows() {
        return Err(FieldError::DimensionMismatch {
            expected: polys.num_rows(),
            actual: order,
        });
    }
    let columns = polys
        .iter_columns()
        .map(|column| {
            let mut padded = vec![Felt::ZERO; order];
            padded[..column.len()].copy_from_slice(column);
            let values = eval_poly_at_roots(field, &padded)?;
            Ok(values)
        })
        .collect::<Result<Vec<_>, FieldError>>()?;
    Matrix::new(columns)
}

/// Evaluates a coefficient vector at an arbitrary point via Horner's method.
pub fn eval_poly_at(field: &PrimeField, coefficients: &[Felt], point: Felt) -> Felt {
    let mut acc = Felt::ZERO;
    for coefficient in coefficients.iter().rev() {
        acc = field.add(field.mul(acc, point), *coefficient);
    }
    acc
}
