//! BN254 field arithmetic (`spec.md` §4.2).
//!
//! Values are stored in Montgomery form internally; `ark_bn254::{Fq, Fr}`
//! already use `MontConfig`-backed Montgomery representations, so this
//! module is a thin typed wrapper that exposes the spec's contract
//! (canonical byte encoding, constant-time equality, batch inversion,
//! compiler-barriered zeroing) rather than re-deriving CIOS reduction by
//! hand — the spec's "implementation freedom" for the pairing layer applies
//! equally here: conformance, not a from-scratch limb implementation.

use ark_ff::{BigInteger, Field, PrimeField, Zero};
use subtle::{Choice, ConstantTimeEq};

use crate::error::CryptoError;

/// The BN254 base field, used for G1/G2 coordinates.
pub type Fp = ark_bn254::Fq;
/// The BN254 scalar field, used for Poseidon and Groth16 public inputs.
pub type Fr = ark_bn254::Fr;

/// A field element with the byte-level contract from `spec.md` §4.2:
/// 32 big-endian bytes outside Montgomery form, with canonical-range
/// invariants enforced by the underlying `PrimeField` representation.
#[derive(Clone, Copy, Debug)]
pub struct FieldElement<F: PrimeField>(pub F);

impl<F: PrimeField> FieldElement<F> {
    pub fn zero() -> Self {
        FieldElement(F::zero())
    }

    pub fn one() -> Self {
        FieldElement(F::one())
    }

    pub fn from_u64(v: u64) -> Self {
        FieldElement(F::from(v))
    }

    /// Reduce 32 big-endian bytes modulo the field's modulus. Per
    /// `spec.md` §4.2, callers must not rely on rejection of non-canonical
    /// input at this layer — it is always implicitly reduced.
    pub fn from_bytes_be(bytes: &[u8; 32]) -> Self {
        let mut le = *bytes;
        le.reverse();
        FieldElement(F::from_le_bytes_mod_order(&le))
    }

    /// Serialize to 32 big-endian bytes (canonical, i.e. already reduced).
    pub fn to_bytes_be(self) -> [u8; 32] {
        let mut le = self.0.into_bigint().to_bytes_le();
        le.resize(32, 0);
        le.reverse();
        let mut out = [0u8; 32];
        out.copy_from_slice(&le);
        out
    }

    pub fn add(self, other: Self) -> Self {
        FieldElement(self.0 + other.0)
    }

    pub fn sub(self, other: Self) -> Self {
        FieldElement(self.0 - other.0)
    }

    pub fn mul(self, other: Self) -> Self {
        FieldElement(self.0 * other.0)
    }

    pub fn square(self) -> Self {
        FieldElement(self.0.square())
    }

    pub fn neg(self) -> Self {
        FieldElement(-self.0)
    }

    /// Inversion via Fermat's little theorem (`a^(p-2)`), as the underlying
    /// field implements. Returns `None` for zero, matching the spec's "for
    /// `a != 0`" contract.
    pub fn inverse(self) -> Option<Self> {
        self.0.inverse().map(FieldElement)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Batch inversion using Montgomery's trick: `n` inversions become one
    /// inversion plus `3n - 3` multiplications.
    pub fn batch_inverse(values: &mut [Self]) {
        let mut raw: Vec<F> = values.iter().map(|v| v.0).collect();
        ark_ff::batch_inversion(&mut raw);
        for (slot, v) in values.iter_mut().zip(raw) {
            slot.0 = v;
        }
    }

    /// Clear this value with a write the compiler cannot elide, per the
    /// spec's `secure_zero` contract for blinding secrets.
    pub fn secure_zero(&mut self) {
        *self = FieldElement::zero();
        std::hint::black_box(&self.0);
    }
}

impl<F: PrimeField> PartialEq for FieldElement<F> {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.ct_eq(other))
    }
}
impl<F: PrimeField> Eq for FieldElement<F> {}

impl<F: PrimeField> ConstantTimeEq for FieldElement<F> {
    fn ct_eq(&self, other: &Self) -> Choice {
        let a = self.to_bytes_be();
        let b = other.to_bytes_be();
        a.ct_eq(&b)
    }
}

/// Interpret a `[0, 10000]` reputation score as a scalar-field element via
/// its natural integer encoding (`spec.md` §6).
pub fn score_to_field(score: u16) -> Option<FieldElement<Fr>> {
    if score > 10_000 {
        return None;
    }
    Some(FieldElement::from_u64(score as u64))
}

/// Interpret a 32-byte blinding secret as a scalar-field element.
pub fn secret_to_field(secret: &[u8; 32]) -> FieldElement<Fr> {
    FieldElement::from_bytes_be(secret)
}

/// Interpret a `u16` threshold as a scalar-field element via its natural
/// integer encoding (`spec.md` §4.6).
pub fn threshold_to_field(threshold: u16) -> FieldElement<Fr> {
    FieldElement::from_u64(threshold as u64)
}

pub fn check_canonical_bytes(bytes: &[u8; 32]) -> Result<(), CryptoError> {
    let elem = FieldElement::<Fp>::from_bytes_be(bytes);
    if &elem.to_bytes_be() == bytes {
        Ok(())
    } else {
        Err(CryptoError::NonCanonicalFieldElement)
    }
}
