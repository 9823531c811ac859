//! Type-checked AIR schema: the frozen program produced by the frontend.
//!
//! A schema is built incrementally (constants, static registers, functions,
//! the two procedures, exports) and frozen by [`AirSchema::set_exports`],
//! which validates the whole program and records the constraint degree
//! bounds. After the freeze the schema is immutable and freely shareable.

use crate::field::{Felt, PrimeField};
use crate::hash;
use crate::ir::degree::{procedure_degree, DegreeContext};
use crate::ir::{AirFunction, CompileError, Procedure, ProcedureKind, Value};

pub mod contexts;
pub mod exports;
pub mod printer;
pub mod registers;

pub use contexts::{FunctionContext, ProcedureContext, Reference};
pub use exports::{ExportDeclaration, Initializer};
pub use registers::{
    CyclicRegister, CyclicSource, InputDescriptor, InputKind, InputRegister, InputScope,
    InputValue, MaskRegister, PrngSequence, RegisterTraces, StaticRegister, StaticRegisterSet,
};

/// The canonical export every schema must declare.
pub const MAIN_EXPORT: &str = "main";

/// Type-checked AIR program over a single prime field.
#[derive(Debug, Clone, PartialEq)]
pub struct AirSchema {
    field: PrimeField,
    constants: Vec<Value>,
    constant_handles: Vec<Option<String>>,
    static_registers: StaticRegisterSet,
    functions: Vec<AirFunction>,
    transition: Option<Procedure>,
    evaluation: Option<Procedure>,
    exports: Vec<ExportDeclaration>,
    transition_degrees: Vec<u64>,
    constraint_degrees: Vec<u64>,
    frozen: bool,
}

impl AirSchema {
    /// Creates an empty schema over the prime `modulus`.
    pub fn new(modulus: u64) -> Result<Self, CompileError> {
        Ok(Self {
            field: PrimeField::new(modulus)?,
            constants: Vec::new(),
            constant_handles: Vec::new(),
            static_registers: StaticRegisterSet::default(),
            functions: Vec::new(),
            transition: None,
            evaluation: None,
            exports: Vec::new(),
            transition_degrees: Vec::new(),
            constraint_degrees: Vec::new(),
            frozen: false,
        })
    }

    /// Returns the schema field.
    pub fn field(&self) -> &PrimeField {
        &self.field
    }

    /// Returns the declared constants in order.
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Returns the handle of the constant at `ix`, if any.
    pub fn constant_handle(&self, ix: usize) -> Option<&str> {
        self.constant_handles.get(ix).and_then(Option::as_deref)
    }

    /// Returns the static register bank.
    pub fn static_registers(&self) -> &StaticRegisterSet {
        &self.static_registers
    }

    /// Returns the declared functions in order.
    pub fn functions(&self) -> &[AirFunction] {
        &self.functions
    }

    /// Returns the transition function; present once the builder set it.
    pub fn transition(&self) -> Option<&Procedure> {
        self.transition.as_ref()
    }

    /// Returns the constraint evaluator; present once the builder set it.
    pub fn evaluation(&self) -> Option<&Procedure> {
        self.evaluation.as_ref()
    }

    /// Returns the export declarations.
    pub fn exports(&self) -> &[ExportDeclaration] {
        &self.exports
    }

    /// Looks up an export by name.
    pub fn export(&self, name: &str) -> Option<&ExportDeclaration> {
        self.exports.iter().find(|export| export.name() == name)
    }

    /// Returns the execution trace width.
    pub fn trace_width(&self) -> usize {
        self.transition.as_ref().map(Procedure::width).unwrap_or(0)
    }

    /// Per-cell degree bounds of the transition result; filled at freeze.
    pub fn transition_degrees(&self) -> &[u64] {
        &self.transition_degrees
    }

    /// Per-cell degree bounds of the constraint evaluator; filled at freeze.
    pub fn constraint_degrees(&self) -> &[u64] {
        &self.constraint_degrees
    }

    /// Largest constraint cell degree; drives the composition domain size.
    pub fn max_constraint_degree(&self) -> u64 {
        self.constraint_degrees.iter().copied().max().unwrap_or(1)
    }

    /// Returns `true` once the schema has been frozen by `set_exports`.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// BLAKE3 digest of the canonical source rendering.
    pub fn digest(&self) -> [u8; 32] {
        hash::source_digest(&self.to_string())
    }

    fn ensure_mutable(&self) -> Result<(), CompileError> {
        if self.frozen {
            return Err(CompileError::Structure("schema is frozen"));
        }
        Ok(())
    }

    fn ensure_canonical(&self, cells: &[Felt], what: &'static str) -> Result<(), CompileError> {
        if cells.iter().any(|cell| cell.as_u64() >= self.field.modulus()) {
            return Err(CompileError::Structure(what));
        }
        Ok(())
    }

    /// Declares a constant and returns its index.
    pub fn add_constant(
        &mut self,
        value: Value,
        handle: Option<String>,
    ) -> Result<usize, CompileError> {
        self.ensure_mutable()?;
        self.ensure_canonical(&value.cells(), "constant value exceeds the field modulus")?;
        if let Some(handle) = &handle {
            if self
                .constant_handles
                .iter()
                .flatten()
                .any(|existing| existing == handle)
            {
                return Err(CompileError::DuplicateHandle {
                    handle: handle.clone(),
                });
            }
        }
        self.constants.push(value);
        self.constant_handles.push(handle);
        Ok(self.constants.len() - 1)
    }

    /// Installs the static register bank.
    pub fn set_static_registers(&mut self, set: StaticRegisterSet) -> Result<(), CompileError> {
        self.ensure_mutable()?;
        for register in set.registers() {
            if let StaticRegister::Cyclic(cyclic) = register {
                if let CyclicSource::Literal(values) = &cyclic.source {
                    self.ensure_canonical(values, "cyclic value exceeds the field modulus")?;
                }
            }
        }
        self.static_registers = set;
        Ok(())
    }

    /// Adds a function and returns its index.
    pub fn add_function(&mut self, function: AirFunction) -> Result<usize, CompileError> {
        self.ensure_mutable()?;
        if let Some(handle) = function.handle() {
            if self
                .functions
                .iter()
                .filter_map(AirFunction::handle)
                .any(|existing| existing == handle)
            {
                return Err(CompileError::DuplicateHandle {
                    handle: handle.to_string(),
                });
            }
        }
        self.functions.push(function);
        Ok(self.functions.len() - 1)
    }

    /// Installs the transition function.
    pub fn set_transition_function(&mut self, procedure: Procedure) -> Result<(), CompileError> {
        self.ensure_mutable()?;
        if procedure.kind() != ProcedureKind::Transition {
            return Err(CompileError::Structure(
                "transition slot requires a transition procedure",
            ));
        }
        self.transition = Some(procedure);
        Ok(())
    }

    /// Installs the constraint evaluator.
    pub fn set_constraint_evaluator(&mut self, procedure: Procedure) -> Result<(), CompileError> {
        self.ensure_mutable()?;
        if procedure.kind() != ProcedureKind::Evaluation {
            return Err(CompileError::Structure(
                "evaluation slot requires an evaluation procedure",
            ));
        }
        self.evaluation = Some(procedure);
        Ok(())
    }

    /// Installs the exports and freezes the schema, running the whole-program
    /// validation and the degree analysis.
    pub fn set_exports(&mut self, exports: Vec<ExportDeclaration>) -> Result<(), CompileError> {
        self.ensure_mutable()?;
        let transition = self
            .transition
            .as_ref()
            .ok_or(CompileError::Structure("schema has no transition function"))?;
        let evaluation = self
            .evaluation
            .as_ref()
            .ok_or(CompileError::Structure("schema has no constraint evaluator"))?;
        if transition.width() != evaluation.width() {
            return Err(CompileError::Arity {
                context: "procedure widths",
                expected: transition.width(),
                actual: evaluation.width(),
            });
        }

        if exports.is_empty() {
            return Err(CompileError::Structure(
                "schema must declare at least one export",
            ));
        }
        let min_cycle = self.static_registers.min_trace_length();
        for (ix, export) in exports.iter().enumerate() {
            if exports[..ix].iter().any(|other| other.name() == export.name()) {
                return Err(CompileError::DuplicateHandle {
                    handle: export.name().to_string(),
                });
            }
            if export.cycle_length() < min_cycle {
                return Err(CompileError::Structure(
                    "export cycle length undercuts a static register cycle",
                ));
            }
            if let Some(Initializer::Literal(row)) = export.initializer() {
                if row.len() != transition.width() {
                    return Err(CompileError::Arity {
                        context: "export initializer width",
                        expected: transition.width(),
                        actual: row.len(),
                    });
                }
                self.ensure_canonical(row, "export initializer exceeds the field modulus")?;
            }
        }
        let main = exports
            .iter()
            .find(|export| export.name() == MAIN_EXPORT)
            .ok_or(CompileError::Structure("schema must export 'main'"))?;
        if main.initializer().is_none() {
            return Err(CompileError::Structure(
                "the 'main' export requires an initializer",
            ));
        }

        let degree_ctx = DegreeContext {
            constants: &self.constants,
            functions: &self.functions,
        };
        self.transition_degrees = procedure_degree(transition, &degree_ctx)?.cells();
        self.constraint_degrees = procedure_degree(evaluation, &degree_ctx)?.cells();

        self.exports = exports;
        self.frozen = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Expression, LoadSource};

    fn mimc_schema() -> AirSchema {
        crate::schema::tests_support::mimc_schema()
    }

    #[test]
    fn freeze_requires_both_procedures_and_main() {
        let mut schema = AirSchema::new(96769).unwrap();
        let err = schema
            .set_exports(vec![
                ExportDeclaration::new(MAIN_EXPORT, 16, Some(Initializer::Seed)).unwrap()
            ])
            .unwrap_err();
        assert!(matches!(err, CompileError::Structure(_)));
    }

    #[test]
    fn frozen_schemas_reject_mutation() {
        let mut schema = mimc_schema();
        assert!(schema.is_frozen());
        let err = schema
            .add_constant(Value::Scalar(Felt(1)), None)
            .unwrap_err();
        assert!(matches!(err, CompileError::Structure("schema is frozen")));
    }

    #[test]
    fn freeze_records_constraint_degrees() {
        let schema = mimc_schema();
        // trace^3 * mask + input, subtracted from the next row: degree 4.
        assert_eq!(schema.constraint_degrees(), &[4]);
        assert_eq!(schema.transition_degrees(), &[4]);
        assert_eq!(schema.max_constraint_degree(), 4);
    }

    #[test]
    fn duplicate_constant_handles_are_rejected() {
        let mut schema = AirSchema::new(96769).unwrap();
        schema
            .add_constant(Value::Scalar(Felt(3)), Some("alpha".into()))
            .unwrap();
        let err = schema
            .add_constant(Value::Scalar(Felt(5)), Some("alpha".into()))
            .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateHandle { .. }));
    }

    #[test]
    fn non_canonical_literals_are_rejected() {
        let mut schema = AirSchema::new(96769).unwrap();
        let err = schema
            .add_constant(Value::Scalar(Felt(96769)), None)
            .unwrap_err();
        assert!(matches!(err, CompileError::Structure(_)));
    }

    #[test]
    fn procedure_width_mismatch_is_rejected() {
        let mut schema = AirSchema::new(96769).unwrap();
        let bank = StaticRegisterSet::new(Vec::new()).unwrap();
        schema.set_static_registers(bank).unwrap();

        let ctx = ProcedureContext::new(ProcedureKind::Transition, &schema, 1).unwrap();
        let row = ctx.build_load(LoadSource::Trace, Reference::from(0)).unwrap();
        let result = Expression::binary(
            BinaryOp::Add,
            row,
            Expression::literal(Value::Scalar(Felt(1))),
        )
        .unwrap();
        let transition = ctx.into_procedure(Vec::new(), result).unwrap();
        schema.set_transition_function(transition).unwrap();

        let ctx = ProcedureContext::new(ProcedureKind::Evaluation, &schema, 2).unwrap();
        let row = ctx.build_load(LoadSource::Trace, Reference::from(1)).unwrap();
        let evaluation = ctx.into_procedure(Vec::new(), row).unwrap();
        schema.set_constraint_evaluator(evaluation).unwrap();

        let err = schema
            .set_exports(vec![
                ExportDeclaration::new(MAIN_EXPORT, 16, Some(Initializer::Seed)).unwrap()
            ])
            .unwrap_err();
        assert!(matches!(err, CompileError::Arity { .. }));
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use crate::ir::{BinaryOp, Expression, LoadSource};

    /// Builds the MiMC-style schema used across the test suites: one secret
    /// vector input (shift -1), an inverted mask over it, and a sha256 PRNG
    /// cycle of 16 round constants.
    pub fn mimc_schema() -> AirSchema {
        let mut schema = AirSchema::new(96769).unwrap();
        schema
            .add_constant(Value::Scalar(Felt(3)), Some("alpha".into()))
            .unwrap();
        schema
            .set_static_registers(
                StaticRegisterSet::new(vec![
                    StaticRegister::Input(InputRegister {
                        scope: InputScope::Secret,
                        binary: false,
                        kind: InputKind::Vector,
                        steps: Some(16),
                        shift: -1,
                    }),
                    StaticRegister::Mask(MaskRegister {
                        source: 0,
                        inverted: true,
                    }),
                    StaticRegister::Cyclic(CyclicRegister {
                        source: CyclicSource::Prng(PrngSequence {
                            seed: 0x4d69_4d43,
                            count: 16,
                        }),
                    }),
                ])
                .unwrap(),
            )
            .unwrap();

        let transition = {
            let mut ctx = ProcedureContext::new(ProcedureKind::Transition, &schema, 1).unwrap();
            ctx.add_local(crate::ir::Dimensions::Vector(1), None).unwrap();
            let round = Expression::binary(
                BinaryOp::Add,
                Expression::binary(
                    BinaryOp::Exp,
                    ctx.build_load(LoadSource::Trace, Reference::from(0)).unwrap(),
                    ctx.build_load(LoadSource::Const, Reference::from("alpha"))
                        .unwrap(),
                )
                .unwrap(),
                ctx.build_load(LoadSource::Static, Reference::from(2)).unwrap(),
            )
            .unwrap();
            let store = ctx.build_store(Reference::from(0), round).unwrap();
            let result = Expression::binary(
                BinaryOp::Add,
                Expression::binary(
                    BinaryOp::Mul,
                    ctx.build_load(LoadSource::Local, Reference::from(0)).unwrap(),
                    ctx.build_load(LoadSource::Static, Reference::from(1)).unwrap(),
                )
                .unwrap(),
                ctx.build_load(LoadSource::Static, Reference::from(0)).unwrap(),
            )
            .unwrap();
            ctx.into_procedure(vec![store], result).unwrap()
        };
        schema.set_transition_function(transition).unwrap();

        let evaluation = {
            let mut ctx = ProcedureContext::new(ProcedureKind::Evaluation, &schema, 1).unwrap();
            ctx.add_local(crate::ir::Dimensions::Vector(1), None).unwrap();
            let round = Expression::binary(
                BinaryOp::Add,
                Expression::binary(
                    BinaryOp::Exp,
                    ctx.build_load(LoadSource::Trace, Reference::from(0)).unwrap(),
                    ctx.build_load(LoadSource::Const, Reference::from("alpha"))
                        .unwrap(),
                )
                .unwrap(),
                ctx.build_load(LoadSource::Static, Reference::from(2)).unwrap(),
            )
            .unwrap();
            let store = ctx.build_store(Reference::from(0), round).unwrap();
            let stepped = Expression::binary(
                BinaryOp::Add,
                Expression::binary(
                    BinaryOp::Mul,
                    ctx.build_load(LoadSource::Local, Reference::from(0)).unwrap(),
                    ctx.build_load(LoadSource::Static, Reference::from(1)).unwrap(),
                )
                .unwrap(),
                ctx.build_load(LoadSource::Static, Reference::from(0)).unwrap(),
            )
            .unwrap();
            let result = Expression::binary(
                BinaryOp::Sub,
                ctx.build_load(LoadSource::Trace, Reference::from(1)).unwrap(),
                stepped,
            )
            .unwrap();
            ctx.into_procedure(vec![store], result).unwrap()
        };
        schema.set_constraint_evaluator(evaluation).unwrap();

        schema
            .set_exports(vec![
                ExportDeclaration::new(MAIN_EXPORT, 16, Some(Initializer::Seed)).unwrap()
            ])
            .unwrap();
        schema
    }
}
