#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

//! Core library for the `airschema` AIR assembly engine.
//!
//! The crate compiles an S-expression assembly language describing an
//! Algebraic Intermediate Representation (AIR) and executes it on the proof
//! side: [`compile`] turns source text into a frozen [`AirSchema`],
//! [`analyze`] reports constraint degrees and domain sizes, and
//! [`instantiate`] binds a schema to proof options for trace generation and
//! constraint evaluation. The verification surface re-evaluates the
//! constraints at single points and agrees with the domain-wide executor.

pub mod analysis;
pub mod field;
pub mod hash;
pub mod ir;
pub mod parser;
pub mod prover;
pub mod schema;

use std::sync::Arc;

pub use analysis::{analyze, AnalysisReport};
pub use field::{Felt, FieldError, Matrix, PrimeField};
pub use ir::{CompileError, Dimensions, ExpressionDegree, Value};
pub use parser::compile;
pub use prover::{
    AirInstance, ProofContext, ProofError, ProofOptions, VerificationContext, WrapPolicy,
};
pub use schema::{AirSchema, InputDescriptor, InputValue};

/// Binds a frozen schema to proof options, sizing the execution,
/// composition and evaluation domains for the `main` export.
pub fn instantiate(schema: Arc<AirSchema>, options: ProofOptions) -> Result<AirInstance, ProofError> {
    AirInstance::new(schema, options)
}
