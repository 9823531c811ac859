//! Point-wise verification surface.
//!
//! A [`VerificationContext`] precomputes trace-domain polynomials for every
//! register a verifier can derive on its own: public input columns from the
//! public values, mask columns from the recorded input arities, cyclic
//! columns from their periodic formula. Secret register values are supplied
//! per evaluation point. Constraint evaluation at a point then agrees with
//! the prover's domain-wide [`super::ProofContext::evaluate_transition_constraints`].

use std::sync::Arc;

use crate::field::ntt::{eval_poly_at, interpolate_roots};
use crate::field::{Felt, PrimeField};
use crate::ir::eval::{evaluate_procedure, EvaluationContext};
use crate::schema::{AirSchema, InputDescriptor, InputValue, StaticRegister};

use super::{AirInstance, ProofError};

/// Per-register resolver for static values at an evaluation point.
#[derive(Debug, Clone)]
enum StaticResolver {
    /// Trace-domain polynomial, evaluated at `x`.
    Poly(Vec<Felt>),
    /// Periodic column: a period-length polynomial evaluated at
    /// `x^(T / period)`.
    Periodic {
        /// Coefficients over the period-order domain.
        coeffs: Vec<Felt>,
        /// Exponent mapping the trace domain onto the period domain.
        stride: u64,
    },
    /// Secret input register: the caller supplies the value.
    Secret {
        /// Position within the secret value list.
        position: usize,
    },
}

/// Single-point constraint evaluator for verifiers.
#[derive(Debug, Clone)]
pub struct VerificationContext {
    schema: Arc<AirSchema>,
    trace_root: Felt,
    resolvers: Vec<StaticResolver>,
    num_secret: usize,
}

impl VerificationContext {
    pub(super) fn new(
        instance: &AirInstance,
        descriptor: &InputDescriptor,
        public_inputs: &[InputValue],
    ) -> Result<Self, ProofError> {
        let schema = Arc::clone(instance.schema());
        let field = schema.field();
        let trace_length = instance.trace_length();
        let registers = schema.static_registers();
        let columns =
            registers.materialize_public(field, descriptor, public_inputs, trace_length)?;

        let mut resolvers = Vec::with_capacity(columns.len());
        let mut num_secret = 0;
        for (register, column) in registers.registers().iter().zip(columns) {
            let resolver = match (register, column) {
                (_, None) => {
                    let position = num_secret;
                    num_secret += 1;
                    StaticResolver::Secret { position }
                }
                (StaticRegister::Input(_), Some(column)) => {
                    StaticResolver::Poly(interpolate_roots(field, &column)?)
                }
                (StaticRegister::Mask(mask), Some(column)) => {
                    let count = descriptor.counts()[mask.source];
                    periodic_resolver(field, &column, trace_length / count, trace_length)?
                }
                (StaticRegister::Cyclic(cyclic), Some(column)) => {
                    let period = match &cyclic.source {
                        crate::schema::CyclicSource::Literal(values) => values.len(),
                        crate::schema::CyclicSource::Prng(sequence) => sequence.count,
                    };
                    periodic_resolver(field, &column, period, trace_length)?
                }
            };
            resolvers.push(resolver);
        }

        let trace_root = field.root_of_unity(trace_length as u64)?;
        Ok(Self {
            schema,
            trace_root,
            resolvers,
            num_secret,
        })
    }

    /// Generator of the trace domain.
    pub fn root_of_unity(&self) -> Felt {
        self.trace_root
    }

    /// Number of secret register values expected per evaluation point.
    pub fn num_secret_registers(&self) -> usize {
        self.num_secret
    }

    /// Evaluates the constraint evaluator at a single point `x`, given the
    /// trace row values at `x` and `x * g`, and the secret register values
    /// at `x`.
    pub fn evaluate_constraints_at(
        &self,
        x: Felt,
        row: &[Felt],
        next_row: &[Felt],
        secret_values: &[Felt],
    ) -> Result<Vec<Felt>, ProofError> {
        let evaluation = self
            .schema
            .evaluation()
            .ok_or(ProofError::SchemaNotFrozen)?;
        let width = evaluation.width();
        for values in [row, next_row] {
            if values.len() != width {
                return Err(ProofError::MatrixShape {
                    what: "trace row values",
                    expected: width,
                    actual: values.len(),
                });
            }
        }
        if secret_values.len() != self.num_secret {
            return Err(ProofError::SecretArity {
                expected: self.num_secret,
                actual: secret_values.len(),
            });
        }

        let field = self.schema.field();
        let static_row: Vec<Felt> = self
            .resolvers
            .iter()
            .map(|resolver| match resolver {
                StaticResolver::Poly(coeffs) => eval_poly_at(field, coeffs, x),
                StaticResolver::Periodic { coeffs, stride } => {
                    eval_poly_at(field, coeffs, field.exp(x, *stride))
                }
                StaticResolver::Secret { position } => secret_values[*position],
            })
            .collect();

        let trace_rows = [row.to_vec(), next_row.to_vec()];
        let ctx = EvaluationContext {
            field,
            constants: self.schema.constants(),
            functions: self.schema.functions(),
            trace_rows: &trace_rows,
            static_row: &static_row,
        };
        Ok(evaluate_procedure(evaluation, &ctx)?)
    }
}

fn periodic_resolver(
    field: &PrimeField,
    column: &[Felt],
    period: usize,
    trace_length: usize,
) -> Result<StaticResolver, ProofError> {
    let coeffs = interpolate_roots(field, &column[..period])?;
    Ok(StaticResolver::Periodic {
        coeffs,
        stride: (trace_length / period) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover::ProofOptions;
    use crate::schema::tests_support::mimc_schema;

    fn setup() -> (AirInstance, crate::prover::ProofContext) {
        let air = AirInstance::new(Arc::new(mimc_schema()), ProofOptions::default()).unwrap();
        let proof = air
            .init_proof(&[InputValue::Flat(vec![Felt(3), Felt(4), Felt(5), Felt(6)])])
            .unwrap();
        (air, proof)
    }

    #[test]
    fn root_of_unity_generates_the_trace_domain() {
        let (air, proof) = setup();
        let verifier = air
            .init_verification(proof.input_descriptor(), &[])
            .unwrap();
        let field = air.field();
        let root = verifier.root_of_unity();
        assert_eq!(field.exp(root, 16), Felt::ONE);
        assert_ne!(field.exp(root, 8), Felt::ONE);
        assert_eq!(verifier.num_secret_registers(), 1);
    }

    #[test]
    fn derived_registers_match_the_prover_columns() {
        let (air, proof) = setup();
        let verifier = air
            .init_verification(proof.input_descriptor(), &[])
            .unwrap();
        let field = air.field();

        // Resolve the mask and cyclic registers on every trace-domain point
        // and compare against the materialized columns.
        for (step, point) in proof.execution_domain().iter().enumerate() {
            for register in [1usize, 2] {
                let value = match &verifier.resolvers[register] {
                    StaticResolver::Periodic { coeffs, stride } => {
                        eval_poly_at(field, coeffs, field.exp(*point, *stride))
                    }
                    _ => panic!("expected periodic resolvers"),
                };
                assert_eq!(
                    value,
                    proof.static_register_traces()[register][step],
                    "register {register} step {step}"
                );
            }
        }
    }

    #[test]
    fn secret_value_arity_is_checked() {
        let (air, proof) = setup();
        let verifier = air
            .init_verification(proof.input_descriptor(), &[])
            .unwrap();
        let err = verifier
            .evaluate_constraints_at(Felt(1), &[Felt(0)], &[Felt(0)], &[])
            .unwrap_err();
        assert!(matches!(err, ProofError::SecretArity { .. }));
    }
}
