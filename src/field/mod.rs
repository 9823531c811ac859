//! Prime field arithmetic for the `airschema` engine.
//!
//! Unlike a fixed-modulus field, the modulus here is chosen by the schema at
//! load time, so all arithmetic routines live on [`PrimeField`] rather than
//! on the element type. Construction derives a generator of the maximal
//! power-of-two subgroup, which later drives root-of-unity domain generation
//! for trace interpolation and constraint evaluation.

use core::fmt;

pub mod ntt;

pub use ntt::Matrix;

/// Field element represented as a canonical value in `[0, modulus)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Felt(pub u64);

impl Felt {
    /// Additive identity.
    pub const ZERO: Felt = Felt(0);
    /// Multiplicative identity.
    pub const ONE: Felt = Felt(1);

    /// Returns the canonical representative as `u64`.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` when the element is the additive identity.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error enumeration covering deterministic field failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    /// The requested modulus failed the primality check.
    NotPrime {
        /// Rejected modulus value.
        modulus: u64,
    },
    /// The multiplicative group has no subgroup of the requested order.
    NoRootOfUnity {
        /// Requested subgroup order.
        order: u64,
    },
    /// Inversion of the additive identity was attempted.
    NotInvertible,
    /// A transform was asked to operate on a non power-of-two length.
    NonPowerOfTwo {
        /// Offending length.
        size: usize,
    },
    /// Matrix columns or domain orders with inconsistent lengths.
    DimensionMismatch {
        /// Required length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::NotPrime { modulus } => {
                write!(f, "modulus {modulus} is not prime")
            }
            FieldError::NoRootOfUnity { order } => {
                write!(f, "field has no root of unity of order {order}")
            }
            FieldError::NotInvertible => f.write_str("zero has no multiplicative inverse"),
            FieldError::NonPowerOfTwo { size } => {
                write!(f, "length {size} is not a power of two")
            }
            FieldError::DimensionMismatch { expected, actual } => {
                write!(f, "expected length {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Prime field with a runtime modulus.
///
/// The constructor factors `modulus - 1` into `2^s * t` and records a
/// generator of the order-`2^s` subgroup; every evaluation domain used by
/// the proof executor is a subgroup of that group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeField {
    modulus: u64,
    two_adicity: u32,
    two_adic_generator: Felt,
}

impl PrimeField {
    /// Creates a field for `modulus`, verifying primality and deriving the
    /// power-of-two subgroup generator.
    pub fn new(modulus: u64) -> Result<Self, FieldError> {
        if !is_prime(modulus) {
            return Err(FieldError::NotPrime { modulus });
        }

        let mut odd = modulus - 1;
        let mut two_adicity = 0u32;
        while odd % 2 == 0 {
            odd /= 2;
            two_adicity += 1;
        }

        let generator = if two_adicity == 0 {
            Felt::ONE
        } else {
            let non_residue = quadratic_non_residue(modulus)?;
            Felt(pow_mod(non_residue, odd, modulus))
        };

        Ok(Self {
            modulus,
            two_adicity,
            two_adic_generator: generator,
        })
    }

    /// Returns the prime modulus.
    pub const fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Returns `log2` of the largest power-of-two subgroup order.
    pub const fn two_adicity(&self) -> u32 {
        self.two_adicity
    }

    /// Constructs an element from a raw value reduced modulo the prime.
    pub fn element(&self, value: u64) -> Felt {
        Felt(value % self.modulus)
    }

    /// Reduces a big-endian byte string modulo the prime.
    ///
    /// Used by the PRNG register expansion, which interprets each 32-byte
    /// hash block as a big-endian integer.
    pub fn reduce_bytes_be(&self, bytes: &[u8]) -> Felt {
        let modulus = self.modulus as u128;
        let mut acc = 0u128;
        for byte in bytes {
            acc = (acc << 8 | *byte as u128) % modulus;
        }
        Felt(acc as u64)
    }

    /// Computes the modular addition of two field elements.
    pub fn add(&self, lhs: Felt, rhs: Felt) -> Felt {
        let sum = lhs.0.wrapping_add(rhs.0);
        let mut result = sum;
        if result >= self.modulus || sum < lhs.0 {
            result = result.wrapping_sub(self.modulus);
        }
        Felt(result)
    }

    /// Computes modular subtraction.
    pub fn sub(&self, lhs: Felt, rhs: Felt) -> Felt {
        let mut result = lhs.0.wrapping_sub(rhs.0);
        if lhs.0 < rhs.0 {
            result = result.wrapping_add(self.modulus);
        }
        Felt(result)
    }

    /// Computes the additive inverse.
    pub fn neg(&self, value: Felt) -> Felt {
        self.sub(Felt::ZERO, value)
    }

    /// Computes modular multiplication using 128-bit widening.
    pub fn mul(&self, lhs: Felt, rhs: Felt) -> Felt {
        Felt(mul_mod(lhs.0, rhs.0, self.modulus))
    }

    /// Computes modular exponentiation via square-and-multiply.
    pub fn exp(&self, base: Felt, exponent: u64) -> Felt {
        Felt(pow_mod(base.0, exponent, self.modulus))
    }

    /// Computes the multiplicative inverse using Fermat's little theorem.
    pub fn inv(&self, value: Felt) -> Result<Felt, FieldError> {
        if value.is_zero() {
            return Err(FieldError::NotInvertible);
        }
        Ok(self.exp(value, self.modulus - 2))
    }

    /// Computes modular division as multiplication by the inverse.
    pub fn div(&self, lhs: Felt, rhs: Felt) -> Result<Felt, FieldError> {
        Ok(self.mul(lhs, self.inv(rhs)?))
    }

    /// Returns a primitive root of unity of the requested power-of-two order.
    pub fn root_of_unity(&self, order: u64) -> Result<Felt, FieldError> {
        if order == 0 || !order.is_power_of_two() {
            return Err(FieldError::NoRootOfUnity { order });
        }
        let log2_order = order.trailing_zeros();
        if log2_order > self.two_adicity {
            return Err(FieldError::NoRootOfUnity { order });
        }
        let exponent = 1u64 << (self.two_adicity - log2_order);
        Ok(self.exp(self.two_adic_generator, exponent))
    }

    /// Returns the ordered domain `{g^0, g^1, .., g^(order-1)}` for the
    /// primitive root of the requested order.
    pub fn domain(&self, order: usize) -> Result<Vec<Felt>, FieldError> {
        let root = self.root_of_unity(order as u64)?;
        let mut points = Vec::with_capacity(order);
        let mut current = Felt::ONE;
        for _ in 0..order {
            points.push(current);
            current = self.mul(current, root);
        }
        Ok(points)
    }
}

fn mul_mod(lhs: u64, rhs: u64, modulus: u64) -> u64 {
    ((lhs as u128 * rhs as u128) % modulus as u128) as u64
}

fn pow_mod(base: u64, mut exponent: u64, modulus: u64) -> u64 {
    let mut result = 1u64 % modulus;
    let mut base = base % modulus;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = mul_mod(result, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exponent >>= 1;
    }
    result
}

/// Deterministic Miller-Rabin primality test for `u64` candidates.
fn is_prime(candidate: u64) -> bool {
    if candidate < 2 {
        return false;
    }
    for small in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        if candidate == small {
            return true;
        }
        if candidate % small == 0 {
            return false;
        }
    }

    let mut d = candidate - 1;
    let mut r = 0u32;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }

    // This witness set decides primality for every 64-bit integer.
    'witness: for witness in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        let mut x = pow_mod(witness, d, candidate);
        if x == 1 || x == candidate - 1 {
            continue;
        }
        for _ in 0..r - 1 {
            x = mul_mod(x, x, candidate);
            if x == candidate - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn quadratic_non_residue(modulus: u64) -> Result<u64, FieldError> {
    let exponent = (modulus - 1) / 2;
    let mut candidate = 2u64;
    while candidate < modulus {
        if pow_mod(candidate, exponent, modulus) == modulus - 1 {
            return Ok(candidate);
        }
        candidate += 1;
    }
    Err(FieldError::NotPrime { modulus })
}

#[cfg(test)]
pub mod tests;
