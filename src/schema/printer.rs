//! Canonical S-expression rendering of a schema.
//!
//! The output is round-trip faithful: parsing the rendered text rebuilds a
//! structurally equal schema. Handles are printed on declarations; all
//! references use the resolved numeric indices.

use core::fmt;

use crate::field::Felt;
use crate::ir::{
    AirFunction, Dimensions, Expression, ExpressionKind, LocalSlot, Parameter, Procedure, Value,
};

use super::exports::{ExportDeclaration, Initializer};
use super::registers::{CyclicSource, InputKind, StaticRegister};
use super::AirSchema;

impl fmt::Display for AirSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(module")?;
        writeln!(f, "  (field prime {})", self.field().modulus())?;

        for (ix, value) in self.constants().iter().enumerate() {
            write!(f, "  (const")?;
            if let Some(handle) = self.constant_handle(ix) {
                write!(f, " ${handle}")?;
            }
            write!(f, " ")?;
            write_value_decl(f, value)?;
            writeln!(f, ")")?;
        }

        if !self.static_registers().is_empty() {
            writeln!(f, "  (static")?;
            let last = self.static_registers().len() - 1;
            for (ix, register) in self.static_registers().registers().iter().enumerate() {
                write!(f, "    ")?;
                write_register(f, register)?;
                if ix == last {
                    writeln!(f, ")")?;
                } else {
                    writeln!(f)?;
                }
            }
        }

        for function in self.functions() {
            write_function(f, function)?;
        }
        if let Some(transition) = self.transition() {
            write_procedure(f, transition)?;
        }
        if let Some(evaluation) = self.evaluation() {
            write_procedure(f, evaluation)?;
        }

        for (ix, export) in self.exports().iter().enumerate() {
            write_export(f, export)?;
            if ix + 1 < self.exports().len() {
                writeln!(f)?;
            }
        }
        write!(f, ")")
    }
}

fn write_dims(f: &mut fmt::Formatter<'_>, dims: Dimensions) -> fmt::Result {
    match dims {
        Dimensions::Scalar => f.write_str("scalar"),
        Dimensions::Vector(length) => write!(f, "vector {length}"),
        Dimensions::Matrix(rows, cols) => write!(f, "matrix {rows} {cols}"),
    }
}

fn write_value_decl(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Scalar(cell) => write!(f, "scalar {cell}"),
        Value::Vector(cells) => {
            f.write_str("vector")?;
            for cell in cells {
                write!(f, " {cell}")?;
            }
            Ok(())
        }
        Value::Matrix(rows) => {
            f.write_str("matrix")?;
            for row in rows {
                f.write_str(" (")?;
                write_cells(f, row)?;
                f.write_str(")")?;
            }
            Ok(())
        }
    }
}

fn write_cells(f: &mut fmt::Formatter<'_>, cells: &[Felt]) -> fmt::Result {
    for (ix, cell) in cells.iter().enumerate() {
        if ix > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{cell}")?;
    }
    Ok(())
}

fn write_register(f: &mut fmt::Formatter<'_>, register: &StaticRegister) -> fmt::Result {
    match register {
        StaticRegister::Input(input) => {
            write!(f, "(input {}", input.scope.keyword())?;
            if input.binary {
                f.write_str(" binary")?;
            }
            match input.kind {
                InputKind::Scalar => f.write_str(" scalar")?,
                InputKind::Vector => f.write_str(" vector")?,
                InputKind::Nested { parent } => write!(f, " (parent {parent})")?,
            }
            if let Some(steps) = input.steps {
                write!(f, " (steps {steps})")?;
            }
            if input.shift != 0 {
                write!(f, " (shift {})", input.shift)?;
            }
            f.write_str(")")
        }
        StaticRegister::Mask(mask) => {
            f.write_str("(mask")?;
            if mask.inverted {
                f.write_str(" inverted")?;
            }
            write!(f, " (input {}))", mask.source)
        }
        StaticRegister::Cyclic(cyclic) => match &cyclic.source {
            CyclicSource::Literal(values) => {
                f.write_str("(cycle ")?;
                write_cells(f, values)?;
                f.write_str(")")
            }
            CyclicSource::Prng(sequence) => write!(
                f,
                "(cycle (prng sha256 0x{:x} {}))",
                sequence.seed, sequence.count
            ),
        },
    }
}

fn write_slot(
    f: &mut fmt::Formatter<'_>,
    keyword: &str,
    handle: Option<&str>,
    dims: Dimensions,
) -> fmt::Result {
    write!(f, "    ({keyword}")?;
    if let Some(handle) = handle {
        write!(f, " ${handle}")?;
    }
    f.write_str(" ")?;
    write_dims(f, dims)?;
    writeln!(f, ")")
}

fn write_function(f: &mut fmt::Formatter<'_>, function: &AirFunction) -> fmt::Result {
    f.write_str("  (function")?;
    if let Some(handle) = function.handle() {
        write!(f, " ${handle}")?;
    }
    writeln!(f)?;
    write!(f, "    (result ")?;
    write_dims(f, function.result_dims())?;
    writeln!(f, ")")?;
    for Parameter { dims, handle } in function.params() {
        write_slot(f, "param", handle.as_deref(), *dims)?;
    }
    for LocalSlot { dims, handle } in function.locals() {
        write_slot(f, "local", handle.as_deref(), *dims)?;
    }
    for store in function.stores() {
        write!(f, "    (store.local {} ", store.target)?;
        write_expression(f, &store.value)?;
        writeln!(f, ")")?;
    }
    f.write_str("    ")?;
    write_expression(f, function.result())?;
    writeln!(f, ")")
}

fn write_procedure(f: &mut fmt::Formatter<'_>, procedure: &Procedure) -> fmt::Result {
    writeln!(f, "  ({}", procedure.kind().keyword())?;
    writeln!(f, "    (span {})", procedure.span())?;
    writeln!(f, "    (result vector {})", procedure.width())?;
    for LocalSlot { dims, handle } in procedure.locals() {
        write_slot(f, "local", handle.as_deref(), *dims)?;
    }
    for store in procedure.stores() {
        write!(f, "    (store.local {} ", store.target)?;
        write_expression(f, &store.value)?;
        writeln!(f, ")")?;
    }
    f.write_str("    ")?;
    write_expression(f, procedure.result())?;
    writeln!(f, ")")
}

fn write_export(f: &mut fmt::Formatter<'_>, export: &ExportDeclaration) -> fmt::Result {
    write!(f, "  (export {}", export.name())?;
    match export.initializer() {
        Some(Initializer::Seed) => f.write_str(" (init seed)")?,
        Some(Initializer::Literal(row)) => {
            f.write_str(" (init (vector ")?;
            write_cells(f, row)?;
            f.write_str("))")?;
        }
        None => {}
    }
    write!(f, " (steps {}))", export.cycle_length())
}

fn write_expression(f: &mut fmt::Formatter<'_>, expr: &Expression) -> fmt::Result {
    match expr.kind() {
        ExpressionKind::Literal(Value::Scalar(cell)) => write!(f, "{cell}"),
        ExpressionKind::Literal(Value::Vector(cells)) => {
            f.write_str("(vector ")?;
            write_cells(f, cells)?;
            f.write_str(")")
        }
        ExpressionKind::Literal(Value::Matrix(rows)) => {
            f.write_str("(matrix")?;
            for row in rows {
                f.write_str(" (")?;
                write_cells(f, row)?;
                f.write_str(")")?;
            }
            f.write_str(")")
        }
        ExpressionKind::Binary { op, lhs, rhs } => {
            write!(f, "({} ", op.keyword())?;
            write_expression(f, lhs)?;
            f.write_str(" ")?;
            write_expression(f, rhs)?;
            f.write_str(")")
        }
        ExpressionKind::Unary { op, operand } => {
            write!(f, "({} ", op.keyword())?;
            write_expression(f, operand)?;
            f.write_str(")")
        }
        ExpressionKind::MakeVector(elements) => {
            f.write_str("(vector")?;
            for element in elements {
                f.write_str(" ")?;
                write_expression(f, element)?;
            }
            f.write_str(")")
        }
        ExpressionKind::MakeMatrix(rows) => {
            f.write_str("(matrix")?;
            for row in rows {
                f.write_str(" (")?;
                for (ix, cell) in row.iter().enumerate() {
                    if ix > 0 {
                        f.write_str(" ")?;
                    }
                    write_expression(f, cell)?;
                }
                f.write_str(")")?;
            }
            f.write_str(")")
        }
        ExpressionKind::GetElement { source, index } => {
            f.write_str("(get ")?;
            write_expression(f, source)?;
            write!(f, " {index})")
        }
        ExpressionKind::Slice { source, start, end } => {
            f.write_str("(slice ")?;
            write_expression(f, source)?;
            write!(f, " {start} {end})")
        }
        ExpressionKind::Load { source, index } => {
            write!(f, "({} {index})", source.keyword())
        }
        ExpressionKind::Call { function, args } => {
            write!(f, "(call {function}")?;
            for arg in args {
                f.write_str(" ")?;
                write_expression(f, arg)?;
            }
            f.write_str(")")
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::tests_support::mimc_schema;

    const MIMC_SOURCE: &str = "\
(module
  (field prime 96769)
  (const $alpha scalar 3)
  (static
    (input secret vector (steps 16) (shift -1))
    (mask inverted (input 0))
    (cycle (prng sha256 0x4d694d43 16)))
  (transition
    (span 1)
    (result vector 1)
    (local vector 1)
    (store.local 0 (add (exp (load.trace 0) (load.const 0)) (load.static 2)))
    (add (mul (load.local 0) (load.static 1)) (load.static 0)))
  (evaluation
    (span 2)
    (result vector 1)
    (local vector 1)
    (store.local 0 (add (exp (load.trace 0) (load.const 0)) (load.static 2)))
    (sub (load.trace 1) (add (mul (load.local 0) (load.static 1)) (load.static 0))))
  (export main (init seed) (steps 16)))";

    #[test]
    fn canonical_rendering_is_stable() {
        let schema = mimc_schema();
        assert_eq!(schema.to_string(), MIMC_SOURCE);
        assert_eq!(schema.digest(), mimc_schema().digest());
    }
}
