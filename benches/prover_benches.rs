use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use airschema::field::ntt::{eval_polys_at_roots, interpolate_columns};
use airschema::field::{Felt, Matrix, PrimeField};
use airschema::{compile, instantiate, AirSchema, InputValue, ProofOptions};

const GOLDILOCKS: u64 = 0xffffffff00000001;
const DOMAIN_LOG2_SIZES: [usize; 3] = [10, 12, 14];

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

fn deterministic_column(field: &PrimeField, len: usize) -> Vec<Felt> {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(0x5851_f42d_4c95_7f2d)
                .wrapping_add(0x1405_7b7e_f767_814f);
            field.element(state)
        })
        .collect()
}

fn mimc_schema() -> Arc<AirSchema> {
    Arc::new(compile(MIMC_SOURCE).expect("bench schema compiles"))
}

fn bench_ntt(c: &mut Criterion) {
    let field = PrimeField::new(GOLDILOCKS).expect("Goldilocks modulus is prime");
    let mut group = c.benchmark_group("ntt");
    for log2_size in DOMAIN_LOG2_SIZES {
        let size = 1usize << log2_size;
        let values = Matrix::new(vec![deterministic_column(&field, size)]).expect("rectangular");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("interpolate", size),
            &values,
            |b, values| {
                b.iter(|| interpolate_columns(&field, black_box(values)).expect("interpolation"));
            },
        );
        let polys = interpolate_columns(&field, &values).expect("interpolation");
        group.bench_with_input(BenchmarkId::new("extend_x8", size), &polys, |b, polys| {
            b.iter(|| eval_polys_at_roots(&field, black_box(polys), size * 8).expect("extension"));
        });
    }
    group.finish();
}

fn bench_prover(c: &mut Criterion) {
    let air = instantiate(mimc_schema(), ProofOptions::default()).expect("instance");
    let inputs = vec![InputValue::Flat(vec![Felt(3), Felt(4), Felt(5), Felt(6)])];
    let proof = air.init_proof(&inputs).expect("proof context");
    let trace = proof
        .generate_execution_trace(&[Felt(3)])
        .expect("trace generation");
    let trace_polys = proof.interpolate_trace(&trace).expect("interpolation");

    let mut group = c.benchmark_group("prover");
    group.bench_function("generate_execution_trace", |b| {
        b.iter(|| {
            proof
                .generate_execution_trace(black_box(&[Felt(3)]))
                .expect("trace generation")
        });
    });
    group.bench_function("evaluate_transition_constraints", |b| {
        b.iter(|| {
            proof
                .evaluate_transition_constraints(black_box(&trace_polys))
                .expect("constraint evaluation")
        });
    });
    group.finish();
}

criterion_group!(benches, bench_ntt, bench_prover);
criterion_main!(benches);
