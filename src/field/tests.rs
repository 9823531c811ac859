use super::{Felt, FieldError, PrimeField};
use proptest::prelude::*;

const PRIME: u64 = 96769;
const GOLDILOCKS: u64 = 0xffffffff00000001;

fn field() -> PrimeField {
    PrimeField::new(PRIME).expect("96769 is prime")
}

#[test]
fn add_mul_inv_laws_ok() {
    let field = field();
    let a = field.element(5);
    let b = field.element(7);

    assert_eq!(field.add(a, b), field.element(12));
    assert_eq!(field.add(a, field.neg(a)), Felt::ZERO);
    assert_eq!(field.mul(a, b), field.element(35));

    let inv_b = field.inv(b).expect("inverse exists for non-zero element");
    assert_eq!(field.mul(b, inv_b), Felt::ONE);
    assert_eq!(field.inv(Felt::ZERO), Err(FieldError::NotInvertible));
}

#[test]
fn composite_modulus_is_rejected() {
    assert_eq!(
        PrimeField::new(96768),
        Err(FieldError::NotPrime { modulus: 96768 })
    );
    assert_eq!(PrimeField::new(1), Err(FieldError::NotPrime { modulus: 1 }));
}

#[test]
fn large_modulus_is_accepted() {
    let field = PrimeField::new(GOLDILOCKS).expect("Goldilocks modulus is prime");
    assert_eq!(field.two_adicity(), 32);
    let root = field.root_of_unity(1 << 20).unwrap();
    assert_eq!(field.exp(root, 1 << 20), Felt::ONE);
    assert_ne!(field.exp(root, 1 << 19), Felt::ONE);
}

#[test]
fn root_of_unity_orders() {
    let field = field();
    // 96768 = 2^9 * 189, so the largest power-of-two subgroup has order 512.
    assert_eq!(field.two_adicity(), 9);
    for log2_order in 0..=9u32 {
        let order = 1u64 << log2_order;
        let root = field.root_of_unity(order).unwrap();
        assert_eq!(field.exp(root, order), Felt::ONE);
        if order > 1 {
            assert_ne!(field.exp(root, order / 2), Felt::ONE);
        }
    }
    assert_eq!(
        field.root_of_unity(1024),
        Err(FieldError::NoRootOfUnity { order: 1024 })
    );
    assert_eq!(
        field.root_of_unity(3),
        Err(FieldError::NoRootOfUnity { order: 3 })
    );
}

#[test]
fn domain_lists_successive_powers() {
    let field = field();
    let domain = field.domain(8).unwrap();
    assert_eq!(domain.len(), 8);
    assert_eq!(domain[0], Felt::ONE);
    let root = field.root_of_unity(8).unwrap();
    for (ix, point) in domain.iter().enumerate() {
        assert_eq!(*point, field.exp(root, ix as u64));
    }
}

#[test]
fn big_endian_reduction_matches_arithmetic() {
    let field = field();
    // 0x01_00_00 = 65536.
    assert_eq!(field.reduce_bytes_be(&[1, 0, 0]), field.element(65536));
    let wide = [0xffu8; 32];
    let reduced = field.reduce_bytes_be(&wide);
    assert!(reduced.as_u64() < PRIME);
}

proptest! {
    #[test]
    fn proptest_field_axioms(a in 0u64..PRIME, b in 0u64..PRIME, c in 0u64..PRIME) {
        let field = field();
        let (a, b, c) = (Felt(a), Felt(b), Felt(c));
        prop_assert_eq!(field.add(a, b), field.add(b, a));
        prop_assert_eq!(field.mul(a, b), field.mul(b, a));
        prop_assert_eq!(
            field.mul(a, field.add(b, c)),
            field.add(field.mul(a, b), field.mul(a, c))
        );
        prop_assert_eq!(field.sub(field.add(a, b), b), a);
    }

    #[test]
    fn proptest_division_inverts_multiplication(a in 0u64..PRIME, b in 1u64..PRIME) {
        let field = field();
        let (a, b) = (Felt(a), Felt(b));
        let quotient = field.div(field.mul(a, b), b).unwrap();
        prop_assert_eq!(quotient, a);
    }
}
