//! Schema analysis: declared constraint degrees and domain sizing.

use serde::{Deserialize, Serialize};

use crate::schema::{AirSchema, InputScope, StaticRegister, MAIN_EXPORT};

/// Static register counts by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCounts {
    /// Input-driven registers.
    pub inputs: usize,
    /// Input registers with secret scope.
    pub secret_inputs: usize,
    /// Mask registers.
    pub masks: usize,
    /// Cyclic registers.
    pub cyclic: usize,
}

/// Report produced by [`analyze`] for a frozen schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Prime modulus of the schema field.
    pub field_modulus: u64,
    /// Execution trace width.
    pub trace_width: usize,
    /// Cycle length of the `main` export.
    pub cycle_length: usize,
    /// Per-cell degree bounds of the transition function result.
    pub transition_degrees: Vec<u64>,
    /// Per-cell degree bounds of the constraint evaluator result.
    pub constraint_degrees: Vec<u64>,
    /// Largest constraint cell degree.
    pub max_constraint_degree: u64,
    /// Required composition domain size for the `main` export: the next
    /// power of two of `cycle_length * max_constraint_degree`.
    pub composition_domain_size: usize,
    /// Static register counts.
    pub registers: RegisterCounts,
}

/// Summarizes a frozen schema for domain sizing and tooling.
pub fn analyze(schema: &AirSchema) -> AnalysisReport {
    let cycle_length = schema
        .export(MAIN_EXPORT)
        .map(|export| export.cycle_length())
        .unwrap_or(0);
    let max_constraint_degree = schema.max_constraint_degree();

    let mut registers = RegisterCounts {
        inputs: 0,
        secret_inputs: 0,
        masks: 0,
        cyclic: 0,
    };
    for register in schema.static_registers().registers() {
        match register {
            StaticRegister::Input(input) => {
                registers.inputs += 1;
                if input.scope == InputScope::Secret {
                    registers.secret_inputs += 1;
                }
            }
            StaticRegister::Mask(_) => registers.masks += 1,
            StaticRegister::Cyclic(_) => registers.cyclic += 1,
        }
    }

    AnalysisReport {
        field_modulus: schema.field().modulus(),
        trace_width: schema.trace_width(),
        cycle_length,
        transition_degrees: schema.transition_degrees().to_vec(),
        constraint_degrees: schema.constraint_degrees().to_vec(),
        max_constraint_degree,
        composition_domain_size: (cycle_length * max_constraint_degree as usize)
            .next_power_of_two(),
        registers,
    }
}
