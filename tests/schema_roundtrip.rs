//! Round-trip, analyzer and error-taxonomy coverage for compiled schemas.

use airschema::{analyze, compile, CompileError, Felt, PrimeField};
use sha2::{Digest, Sha256};

const SOURCE: &str = "\
(module
  (field prime 96769)
  (const $alpha scalar 3)
  (const vector 1 2 4 8)
  (static
    (input secret vector (steps 16) (shift -1))
    (input public binary scalar)
    (mask inverted (input 0))
    (cycle (prng sha256 0x4d694d43 16))
    (cycle 1 0 1 0))
  (function $round
    (result scalar)
    (param $value scalar)
    (local scalar)
    (store.local 0 (exp (load.param 0) (load.const 0)))
    (add (load.local 0) (load.param 0)))
  (transition
    (span 1)
    (result vector 1)
    (vector (call 0 (get (load.trace 0) 0))))
  (evaluation
    (span 2)
    (result vector 1)
    (sub (load.trace 1) (vector (call 0 (get (load.trace 0) 0)))))
  (export main (init seed) (steps 16)))";

#[test]
fn compile_to_string_compile_is_structural_identity() {
    let schema = compile(SOURCE).unwrap();
    let rendered = schema.to_string();
    let reparsed = compile(&rendered).unwrap();
    assert_eq!(reparsed, schema);
    // Canonical rendering is a fixed point.
    assert_eq!(reparsed.to_string(), rendered);
    assert_eq!(reparsed.digest(), schema.digest());
}

#[test]
fn analyzer_reports_functions_and_registers() {
    let schema = compile(SOURCE).unwrap();
    let report = analyze(&schema);
    assert_eq!(report.trace_width, 1);
    assert_eq!(report.cycle_length, 16);
    // round(x) = x^3 + x applied to a degree-1 trace cell.
    assert_eq!(report.constraint_degrees, vec![3]);
    assert_eq!(report.registers.inputs, 2);
    assert_eq!(report.registers.secret_inputs, 1);
    assert_eq!(report.registers.masks, 1);
    assert_eq!(report.registers.cyclic, 2);
    assert_eq!(report.composition_domain_size, 64);
}

#[test]
fn prng_registers_follow_the_specified_derivation() {
    // Independent derivation: sha256(seed_be || be32(i)) as a big-endian
    // integer, reduced modulo the prime.
    let field = PrimeField::new(96769).unwrap();
    let expected: Vec<Felt> = (0..16u32)
        .map(|counter| {
            let mut hasher = Sha256::new();
            hasher.update([0x4d, 0x69, 0x4d, 0x43]);
            hasher.update(counter.to_be_bytes());
            field.reduce_bytes_be(&hasher.finalize())
        })
        .collect();
    assert_eq!(
        airschema::hash::prng_sequence(&field, 0x4d69_4d43, 16),
        expected
    );
}

#[test]
fn field_errors_surface_at_schema_construction() {
    let source = SOURCE.replace("(field prime 96769)", "(field prime 96768)");
    let err = compile(&source).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Field(airschema::FieldError::NotPrime { modulus: 96768 })
    ));
}

#[test]
fn shape_mismatches_are_type_errors() {
    let source = SOURCE.replace(
        "(sub (load.trace 1) (vector (call 0 (get (load.trace 0) 0))))",
        "(sub (load.trace 1) (vector 1 2))",
    );
    let err = compile(&source).unwrap_err();
    assert!(matches!(err, CompileError::ShapeMismatch { .. }));
}

#[test]
fn unresolved_handles_are_reported() {
    let source = SOURCE.replace("(load.const 0)", "(load.const $beta)");
    let err = compile(&source).unwrap_err();
    assert!(matches!(
        err,
        CompileError::UndefinedReference { reference, .. } if reference == "$beta"
    ));
}

#[test]
fn duplicate_handles_are_reported() {
    let source = SOURCE.replace("(const vector 1 2 4 8)", "(const $alpha vector 1 2 4 8)");
    let err = compile(&source).unwrap_err();
    assert!(matches!(
        err,
        CompileError::DuplicateHandle { handle } if handle == "alpha"
    ));
}

#[test]
fn non_constant_exponents_are_rejected() {
    let source = SOURCE.replace(
        "(exp (load.param 0) (load.const 0))",
        "(exp (load.param 0) (load.param 0))",
    );
    let err = compile(&source).unwrap_err();
    assert_eq!(err, CompileError::NonConstantExponent);
}

#[test]
fn out_of_range_static_references_are_rejected() {
    let source = SOURCE.replace("(load.trace 1)", "(load.static 9)");
    let err = compile(&source).unwrap_err();
    assert!(matches!(
        err,
        CompileError::IndexOutOfRange { index: 9, limit: 5, .. }
    ));
}