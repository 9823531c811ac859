//! Export declarations naming the schema's entry points.

use crate::field::Felt;
use crate::ir::CompileError;

/// How the first trace row of an export is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initializer {
    /// Fixed literal row.
    Literal(Vec<Felt>),
    /// Row supplied by the caller at proof time.
    Seed,
}

/// Top-level entry point: a name, a trace cycle length, and an optional
/// initial-row recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDeclaration {
    name: String,
    cycle_length: usize,
    initializer: Option<Initializer>,
}

impl ExportDeclaration {
    /// Creates an export declaration; the cycle length must be a power of
    /// two.
    pub fn new(
        name: impl Into<String>,
        cycle_length: usize,
        initializer: Option<Initializer>,
    ) -> Result<Self, CompileError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CompileError::Structure("export name must not be empty"));
        }
        if cycle_length == 0 || !cycle_length.is_power_of_two() {
            return Err(CompileError::Structure(
                "export cycle length must be a power of two",
            ));
        }
        Ok(Self {
            name,
            cycle_length,
            initializer,
        })
    }

    /// Export name; `main` is the canonical entry point.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps per trace cycle.
    pub fn cycle_length(&self) -> usize {
        self.cycle_length
    }

    /// Initial-row recipe, if declared.
    pub fn initializer(&self) -> Option<&Initializer> {
        self.initializer.as_ref()
    }
}
