//! Proof-side executor: trace generation, interpolation and constraint
//! evaluation over root-of-unity domains.
//!
//! An [`AirInstance`] binds a frozen schema to proof options and sizes the
//! three domains. [`AirInstance::init_proof`] validates concrete inputs,
//! materializes the static registers and yields a [`ProofContext`] owning
//! the per-proof buffers; the context is not shareable across threads,
//! unlike the schema itself.

use core::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::field::ntt::{eval_polys_at_roots, interpolate_columns};
use crate::field::{Felt, FieldError, Matrix, PrimeField};
use crate::ir::eval::{evaluate_procedure, EvaluationContext};
use crate::ir::{CompileError, Procedure};
use crate::schema::{AirSchema, InputDescriptor, InputValue, Initializer, RegisterTraces, MAIN_EXPORT};

pub mod verifier;

pub use verifier::VerificationContext;

/// Behavior of the evaluation procedure's next-row access on the last row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapPolicy {
    /// Row `T-1` reads row 0 as its successor; the zero-set invariant is
    /// checked on every row.
    Wrap,
    /// The wrap row is exempt from the zero-set check; consumers attach
    /// boundary constraints instead.
    Exclude,
}

/// Options sizing the evaluation domain and fixing the wrap behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOptions {
    extension_factor: usize,
    wrap_policy: WrapPolicy,
}

impl ProofOptions {
    /// Creates options with the given extension factor (a power of two).
    pub fn new(extension_factor: usize, wrap_policy: WrapPolicy) -> Result<Self, ProofError> {
        if extension_factor < 2 || !extension_factor.is_power_of_two() {
            return Err(ProofError::InvalidOptions(
                "extension factor must be a power of two of at least 2",
            ));
        }
        Ok(Self {
            extension_factor,
            wrap_policy,
        })
    }

    /// Ratio between the evaluation and the execution domain orders.
    pub fn extension_factor(&self) -> usize {
        self.extension_factor
    }

    /// Wrap behavior of the evaluation procedure.
    pub fn wrap_policy(&self) -> WrapPolicy {
        self.wrap_policy
    }
}

impl Default for ProofOptions {
    fn default() -> Self {
        Self {
            extension_factor: 8,
            wrap_policy: WrapPolicy::Wrap,
        }
    }
}

/// Error enumeration for the proof executor and verification surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// The schema has not been frozen by `set_exports`.
    SchemaNotFrozen,
    /// The schema does not declare the requested export.
    MissingExport {
        /// Export name looked up.
        name: String,
    },
    /// Rejected proof options.
    InvalidOptions(&'static str),
    /// Concrete inputs failed shape or arity validation.
    Input(CompileError),
    /// The supplied seed row does not match the trace width.
    SeedWidth {
        /// Required row width.
        expected: usize,
        /// Observed row width.
        actual: usize,
    },
    /// The evaluation domain cannot hold the composition domain.
    DomainTooSmall {
        /// Evaluation domain order.
        evaluation: usize,
        /// Required composition domain order.
        composition: usize,
    },
    /// A trace or polynomial matrix has unexpected dimensions.
    MatrixShape {
        /// Description of the checked matrix.
        what: &'static str,
        /// Required size.
        expected: usize,
        /// Observed size.
        actual: usize,
    },
    /// The zero-set check found a non-zero constraint value.
    ConstraintViolated {
        /// Trace step of the violation.
        step: usize,
        /// Constraint cell index.
        cell: usize,
    },
    /// Wrong number of secret register values at an evaluation point.
    SecretArity {
        /// Required count.
        expected: usize,
        /// Observed count.
        actual: usize,
    },
    /// Field-level failure.
    Field(FieldError),
}

impl fmt::Display for ProofError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofError::SchemaNotFrozen => f.write_str("schema must be frozen before proving"),
            ProofError::MissingExport { name } => {
                write!(f, "schema does not export '{name}'")
            }
            ProofError::InvalidOptions(detail) => write!(f, "invalid proof options: {detail}"),
            ProofError::Input(error) => write!(f, "input validation failed: {error}"),
            ProofError::SeedWidth { expected, actual } => {
                write!(f, "seed row must have width {expected}, got {actual}")
            }
            ProofError::DomainTooSmall {
                evaluation,
                composition,
            } => write!(
                f,
                "evaluation domain of order {evaluation} cannot hold the composition domain of order {composition}"
            ),
            ProofError::MatrixShape {
                what,
                expected,
                actual,
            } => write!(f, "{what}: expected {expected}, got {actual}"),
            ProofError::ConstraintViolated { step, cell } => {
                write!(f, "constraint cell {cell} is non-zero at step {step}")
            }
            ProofError::SecretArity { expected, actual } => {
                write!(f, "expected {expected} secret register values, got {actual}")
            }
            ProofError::Field(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for ProofError {}

impl From<FieldError> for ProofError {
    fn from(error: FieldError) -> Self {
        ProofError::Field(error)
    }
}

impl From<CompileError> for ProofError {
    fn from(error: CompileError) -> Self {
        ProofError::Input(error)
    }
}

/// A frozen schema bound to proof options, with the domains sized.
#[derive(Debug, Clone)]
pub struct AirInstance {
    schema: Arc<AirSchema>,
    options: ProofOptions,
    trace_length: usize,
    composition_order: usize,
    evaluation_order: usize,
}

impl AirInstance {
    /// Sizes the domains for the schema's `main` export.
    pub fn new(schema: Arc<AirSchema>, options: ProofOptions) -> Result<Self, ProofError> {
        if !schema.is_frozen() {
            return Err(ProofError::SchemaNotFrozen);
        }
        let export = schema
            .export(MAIN_EXPORT)
            .ok_or_else(|| ProofError::MissingExport {
                name: MAIN_EXPORT.to_string(),
            })?;
        let trace_length = export
            .cycle_length()
            .max(schema.static_registers().min_trace_length())
            .next_power_of_two();
        let required = (trace_length as u128 * schema.max_constraint_degree() as u128)
            .next_power_of_two();
        if required > 1u128 << schema.field().two_adicity() {
            return Err(ProofError::Field(FieldError::NoRootOfUnity {
                order: u64::try_from(required).unwrap_or(u64::MAX),
            }));
        }
        let composition_order = required as usize;
        let evaluation_order = trace_length * options.extension_factor();
        if evaluation_order < composition_order {
            return Err(ProofError::DomainTooSmall {
                evaluation: evaluation_order,
                composition: composition_order,
            });
        }
        // The field must carry a subgroup of the largest domain order.
        schema.field().root_of_unity(evaluation_order as u64)?;

        debug!(
            trace_length,
            composition_order, evaluation_order, "sized proof domains"
        );
        Ok(Self {
            schema,
            options,
            trace_length,
            composition_order,
            evaluation_order,
        })
    }

    /// Returns the underlying schema.
    pub fn schema(&self) -> &Arc<AirSchema> {
        &self.schema
    }

    /// Returns the schema field.
    pub fn field(&self) -> &PrimeField {
        self.schema.field()
    }

    /// Returns the proof options.
    pub fn options(&self) -> ProofOptions {
        self.options
    }

    /// Execution trace length `T`.
    pub fn trace_length(&self) -> usize {
        self.trace_length
    }

    /// Composition domain order required by the degree calculus.
    pub fn composition_order(&self) -> usize {
        self.composition_order
    }

    /// Evaluation domain order.
    pub fn evaluation_order(&self) -> usize {
        self.evaluation_order
    }

    /// Validates the inputs, materializes the static registers and enters
    /// the proof-ready state.
    pub fn init_proof(&self, inputs: &[InputValue]) -> Result<ProofContext, ProofError> {
        let field = self.field();
        let static_traces =
            self.schema
                .static_registers()
                .materialize(field, inputs, self.trace_length)?;

        let execution_domain = field.domain(self.trace_length)?;
        let composition_domain = field.domain(self.composition_order)?;
        let evaluation_domain = field.domain(self.evaluation_order)?;

        let static_evaluations = if static_traces.columns.is_empty() {
            Matrix::new(Vec::new())?
        } else {
            let columns = Matrix::new(static_traces.columns.clone())?;
            let polys = interpolate_columns(field, &columns)?;
            eval_polys_at_roots(field, &polys, self.evaluation_order)?
        };

        debug!(
            registers = static_traces.columns.len(),
            secret = static_traces.secret_indices.len(),
            "materialized static registers"
        );
        Ok(ProofContext {
            instance: self.clone(),
            execution_domain,
            composition_domain,
            evaluation_domain,
            static_traces,
            static_evaluations,
        })
    }

    /// Builds the verification surface for the given input arities and
    /// public input values.
    pub fn init_verification(
        &self,
        descriptor: &InputDescriptor,
        public_inputs: &[InputValue],
    ) -> Result<VerificationContext, ProofError> {
        VerificationContext::new(self, descriptor, public_inputs)
    }
}

/// Which materialization backs the static row of a procedure run.
#[derive(Debug, Clone, Copy)]
enum StaticRows {
    /// Columns over the execution domain.
    Execution,
    /// Column evaluations over the evaluation domain.
    Evaluation,
}

/// Proof-ready state: domains and static register traces for one proof.
#[derive(Debug, Clone)]
pub struct ProofContext {
    instance: AirInstance,
    execution_domain: Vec<Felt>,
    composition_domain: Vec<Felt>,
    evaluation_domain: Vec<Felt>,
    static_traces: RegisterTraces,
    static_evaluations: Matrix,
}

impl ProofContext {
    fn schema(&self) -> &AirSchema {
        &self.instance.schema
    }

    fn field(&self) -> &PrimeField {
        self.instance.field()
    }

    /// Execution trace length `T`.
    pub fn trace_length(&self) -> usize {
        self.instance.trace_length
    }

    /// Trace-domain points in order.
    pub fn execution_domain(&self) -> &[Felt] {
        &self.execution_domain
    }

    /// Composition-domain points in order.
    pub fn composition_domain(&self) -> &[Felt] {
        &self.composition_domain
    }

    /// Evaluation-domain points in order.
    pub fn evaluation_domain(&self) -> &[Felt] {
        &self.evaluation_domain
    }

    /// Input arities observed at `init_proof`.
    pub fn input_descriptor(&self) -> &InputDescriptor {
        &self.static_traces.descriptor
    }

    /// All static register columns over the execution domain.
    pub fn static_register_traces(&self) -> &[Vec<Felt>] {
        &self.static_traces.columns
    }

    /// Secret input register columns over the execution domain.
    pub fn secret_register_traces(&self) -> Vec<&[Felt]> {
        self.static_traces.secret_columns()
    }

    /// Indices of the secret input registers.
    pub fn secret_register_indices(&self) -> &[usize] {
        &self.static_traces.secret_indices
    }

    /// All static register columns evaluated over the evaluation domain.
    pub fn static_register_evaluations(&self) -> &Matrix {
        &self.static_evaluations
    }

    /// Simulates the transition function for `T` steps from the export's
    /// initial row.
    ///
    /// Row 0 holds the initializer; row `i+1` holds the transition result
    /// for row `i`. The wrap step (row `T-1` back into row 0) is not
    /// written: a consistent schema reproduces the initial row there, which
    /// the zero-set check of [`ProofContext::verify_trace`] confirms.
    pub fn generate_execution_trace(&self, seed: &[Felt]) -> Result<Matrix, ProofError> {
        let schema = self.schema();
        let transition = schema
            .transition()
            .ok_or(ProofError::SchemaNotFrozen)?;
        let width = transition.width();
        let export = schema
            .export(MAIN_EXPORT)
            .ok_or_else(|| ProofError::MissingExport {
                name: MAIN_EXPORT.to_string(),
            })?;

        let initial: Vec<Felt> = match export.initializer() {
            Some(Initializer::Literal(row)) => row.clone(),
            Some(Initializer::Seed) | None => {
                if seed.len() != width {
                    return Err(ProofError::SeedWidth {
                        expected: width,
                        actual: seed.len(),
                    });
                }
                if seed
                    .iter()
                    .any(|cell| cell.as_u64() >= self.field().modulus())
                {
                    return Err(ProofError::Input(CompileError::Structure(
                        "seed value exceeds the field modulus",
                    )));
                }
                seed.to_vec()
            }
        };

        let length = self.trace_length();
        let mut columns = vec![vec![Felt::ZERO; length]; width];
        let mut current = initial;
        for (register, cell) in columns.iter_mut().zip(&current) {
            register[0] = *cell;
        }
        for step in 0..length - 1 {
            let next =
                self.run_procedure(transition, &[current], StaticRows::Execution, step)?;
            for (register, cell) in columns.iter_mut().zip(&next) {
                register[step + 1] = *cell;
            }
            current = next;
        }
        debug!(length, width, "generated execution trace");
        Ok(Matrix::new(columns)?)
    }

    /// Interpolates trace columns over the execution domain into
    /// coefficient form.
    pub fn interpolate_trace(&self, trace: &Matrix) -> Result<Matrix, ProofError> {
        self.check_matrix(trace, "trace matrix")?;
        Ok(interpolate_columns(self.field(), trace)?)
    }

    /// Evaluates trace polynomials over the evaluation domain.
    pub fn extend_trace(&self, trace_polys: &Matrix) -> Result<Matrix, ProofError> {
        self.check_matrix(trace_polys, "trace polynomial matrix")?;
        Ok(eval_polys_at_roots(
            self.field(),
            trace_polys,
            self.instance.evaluation_order,
        )?)
    }

    /// Evaluates the constraint evaluator across the evaluation domain.
    ///
    /// For the point at index `j`, the current row comes from index `j` and
    /// the next row from index `j + extension_factor` (wrapping): the trace
    /// domain sits at that stride inside the evaluation domain.
    pub fn evaluate_transition_constraints(
        &self,
        trace_polys: &Matrix,
    ) -> Result<Matrix, ProofError> {
        let schema = self.schema();
        let evaluation = schema
            .evaluation()
            .ok_or(ProofError::SchemaNotFrozen)?;
        let trace_evaluations = self.extend_trace(trace_polys)?;

        let order = self.instance.evaluation_order;
        let stride = self.instance.options.extension_factor();
        let width = evaluation.width();
        let mut columns = vec![vec![Felt::ZERO; order]; width];
        for point in 0..order {
            let row = trace_evaluations.row(point);
            let next_row = trace_evaluations.row((point + stride) % order);
            let values =
                self.run_procedure(evaluation, &[row, next_row], StaticRows::Evaluation, point)?;
            for (column, value) in columns.iter_mut().zip(&values) {
                column[point] = *value;
            }
        }
        debug!(order, constraints = width, "evaluated transition constraints");
        Ok(Matrix::new(columns)?)
    }

    /// Checks the zero-set invariant: the evaluation procedure vanishes on
    /// every trace row (the wrap row only under [`WrapPolicy::Wrap`]).
    pub fn verify_trace(&self, trace: &Matrix) -> Result<(), ProofError> {
        let schema = self.schema();
        let evaluation = schema
            .evaluation()
            .ok_or(ProofError::SchemaNotFrozen)?;
        self.check_matrix(trace, "trace matrix")?;

        let length = self.trace_length();
        let last_checked = match self.instance.options.wrap_policy() {
            WrapPolicy::Wrap => length,
            WrapPolicy::Exclude => length - 1,
        };
        for step in 0..last_checked {
            let row = trace.row(step);
            let next_row = trace.row((step + 1) % length);
            let values =
                self.run_procedure(evaluation, &[row, next_row], StaticRows::Execution, step)?;
            if let Some(cell) = values.iter().position(|value| !value.is_zero()) {
                return Err(ProofError::ConstraintViolated { step, cell });
            }
        }
        Ok(())
    }

    /// Runs a procedure at one step or evaluation point; the static row is
    /// read from the materialization matching the indexed domain.
    fn run_procedure(
        &self,
        procedure: &Procedure,
        trace_rows: &[Vec<Felt>],
        static_rows: StaticRows,
        static_step: usize,
    ) -> Result<Vec<Felt>, ProofError> {
        let schema = self.schema();
        let static_row: Vec<Felt> = match static_rows {
            StaticRows::Execution => self
                .static_traces
                .columns
                .iter()
                .map(|column| column[static_step])
                .collect(),
            StaticRows::Evaluation => self.static_evaluations.row(static_step),
        };
        let ctx = EvaluationContext {
            field: self.field(),
            constants: schema.constants(),
            functions: schema.functions(),
            trace_rows,
            static_row: &static_row,
        };
        Ok(evaluate_procedure(procedure, &ctx)?)
    }

    fn check_matrix(&self, matrix: &Matrix, what: &'static str) -> Result<(), ProofError> {
        let width = self.schema().trace_width();
        if matrix.num_columns() != width {
            return Err(ProofError::MatrixShape {
                what,
                expected: width,
                actual: matrix.num_columns(),
            });
        }
        if matrix.num_rows() != self.trace_length() {
            return Err(ProofError::MatrixShape {
                what,
                expected: self.trace_length(),
                actual: matrix.num_rows(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests_support::mimc_schema;
    use crate::schema::InputValue;

    fn instance() -> AirInstance {
        AirInstance::new(Arc::new(mimc_schema()), ProofOptions::default()).unwrap()
    }

    fn mimc_inputs() -> Vec<InputValue> {
        vec![InputValue::Flat(vec![Felt(3), Felt(4), Felt(5), Felt(6)])]
    }

    #[test]
    fn domains_are_sized_from_the_degree_calculus() {
        let air = instance();
        assert_eq!(air.trace_length(), 16);
        // max constraint degree 4: composition 64, evaluation 16 * 8 = 128.
        assert_eq!(air.composition_order(), 64);
        assert_eq!(air.evaluation_order(), 128);
    }

    #[test]
    fn small_extension_factors_are_rejected() {
        let schema = Arc::new(mimc_schema());
        let options = ProofOptions::new(2, WrapPolicy::Wrap).unwrap();
        let err = AirInstance::new(schema, options).unwrap_err();
        assert!(matches!(err, ProofError::DomainTooSmall { .. }));
    }

    #[test]
    fn trace_starts_at_the_seed_and_verifies() {
        let air = instance();
        let proof = air.init_proof(&mimc_inputs()).unwrap();
        let trace = proof.generate_execution_trace(&[Felt(3)]).unwrap();
        assert_eq!(trace.column(0)[0], Felt(3));
        proof.verify_trace(&trace).unwrap();
    }

    #[test]
    fn tampered_traces_fail_the_zero_set_check() {
        let air = instance();
        let proof = air.init_proof(&mimc_inputs()).unwrap();
        let trace = proof.generate_execution_trace(&[Felt(3)]).unwrap();
        let mut columns = trace.into_columns();
        columns[0][5] = Felt(12345);
        let tampered = Matrix::new(columns).unwrap();
        let err = proof.verify_trace(&tampered).unwrap_err();
        assert!(matches!(err, ProofError::ConstraintViolated { .. }));
    }

    #[test]
    fn seed_width_is_validated() {
        let air = instance();
        let proof = air.init_proof(&mimc_inputs()).unwrap();
        let err = proof
            .generate_execution_trace(&[Felt(3), Felt(4)])
            .unwrap_err();
        assert_eq!(
            err,
            ProofError::SeedWidth {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn wrong_input_arity_is_rejected() {
        let air = instance();
        let err = air.init_proof(&[]).unwrap_err();
        assert!(matches!(err, ProofError::Input(_)));
    }
}
