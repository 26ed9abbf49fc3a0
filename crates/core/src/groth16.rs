//! Groth16 verification key loading, single-proof verification, and
//! randomized batch verification (`spec.md` §4.5).
//!
//! The verification-equation rearrangement and shared-Miller-loop batching
//! strategy are grounded on `bellperson::groth16::verifier::{verify_proof,
//! verify_proofs_batch}` (`other_examples/ce907e6d_FILkaogudui-bellperson-1`),
//! adapted from that crate's engine-generic trait API to this crate's
//! concrete `ark_bn254::Bn254` types and to the spec's 128-bit scalar
//! soundness target.

use ark_bn254::{G1Affine, G2Affine};
use ark_ec::CurveGroup;
use ark_ff::BigInt;
use rand_core::{CryptoRng, RngCore};

use crate::error::{EngineError, WireError};
use crate::field::Fr;
use crate::pairing::{self, Gt};

/// Groth16 verification key: `(alpha, beta, gamma, delta, IC[0..n])` plus the
/// precomputed `e(alpha, beta)`.
#[derive(Clone, Debug)]
pub struct VerifyingKey {
    pub alpha_g1: G1Affine,
    pub beta_g2: G2Affine,
    pub gamma_g2: G2Affine,
    pub delta_g2: G2Affine,
    pub ic: Vec<G1Affine>,
    alpha_beta: Gt,
}

/// Maximum accepted VK blob size (`spec.md` §4.5).
pub const MAX_VK_SIZE: usize = 1024 * 1024;

const HEADER_LEN: usize = 64 + 128 + 128 + 128 + 4;

impl VerifyingKey {
    /// Number of public inputs this key expects (`|IC| - 1`).
    pub fn num_public_inputs(&self) -> usize {
        self.ic.len() - 1
    }

    /// `e(alpha, beta)`, computed once at load time and cached.
    pub fn alpha_beta(&self) -> Gt {
        self.alpha_beta
    }

    /// Parse a VK blob: `alpha(64) | beta(128) | gamma(128) | delta(128) |
    /// ic_len(4 LE) | IC[ic_len](64 each)`. Rejects any non-curve or
    /// out-of-subgroup point and any blob exceeding [`MAX_VK_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.len() > MAX_VK_SIZE {
            return Err(WireError::VkTooLarge { max: MAX_VK_SIZE }.into());
        }
        if bytes.len() < HEADER_LEN {
            return Err(WireError::TooShort {
                needed: HEADER_LEN,
                got: bytes.len(),
            }
            .into());
        }

        let alpha_g1 = parse_g1(&bytes[0..64])?;
        let beta_g2 = parse_g2(&bytes[64..192])?;
        let gamma_g2 = parse_g2(&bytes[192..320])?;
        let delta_g2 = parse_g2(&bytes[320..448])?;

        let ic_len = u32::from_le_bytes(bytes[448..452].try_into().unwrap()) as usize;
        if ic_len == 0 {
            return Err(WireError::EmptyIc(0).into());
        }
        let needed = HEADER_LEN + 64 * ic_len;
        if bytes.len() < needed {
            return Err(WireError::TooShort {
                needed,
                got: bytes.len(),
            }
            .into());
        }
        let mut ic = Vec::with_capacity(ic_len);
        for i in 0..ic_len {
            let off = HEADER_LEN + i * 64;
            ic.push(parse_g1(&bytes[off..off + 64])?);
        }

        let alpha_beta = pairing::pairing(alpha_g1, beta_g2);

        Ok(VerifyingKey {
            alpha_g1,
            beta_g2,
            gamma_g2,
            delta_g2,
            ic,
            alpha_beta,
        })
    }
}

fn parse_g1(bytes: &[u8]) -> Result<G1Affine, EngineError> {
    let x: [u8; 32] = bytes[0..32].try_into().unwrap();
    let y: [u8; 32] = bytes[32..64].try_into().unwrap();
    Ok(pairing::g1_from_bytes(&x, &y)?)
}

fn parse_g2(bytes: &[u8]) -> Result<G2Affine, EngineError> {
    // Wire layout is `x_re | x_im | y_re | y_im`, matching `spec.md` §4.5.
    let x_re: [u8; 32] = bytes[0..32].try_into().unwrap();
    let x_im: [u8; 32] = bytes[32..64].try_into().unwrap();
    let y_re: [u8; 32] = bytes[64..96].try_into().unwrap();
    let y_im: [u8; 32] = bytes[96..128].try_into().unwrap();
    Ok(pairing::g2_from_bytes(&x_re, &x_im, &y_re, &y_im)?)
}

/// A Groth16 proof `(A, B, C)`.
#[derive(Clone, Copy, Debug)]
pub struct Proof {
    pub a: G1Affine,
    pub b: G2Affine,
    pub c: G1Affine,
}

impl Proof {
    /// Reject the proof if any component fails the on-curve/subgroup check.
    pub fn validate(&self) -> Result<(), EngineError> {
        pairing::check_g1(&self.a)?;
        pairing::check_g2(&self.b)?;
        pairing::check_g1(&self.c)?;
        Ok(())
    }
}

/// Result of a cryptographic check: `true` means the equation held.
pub type PairingCheck = bool;

fn check_input_arity(vk: &VerifyingKey, len: usize) -> Result<(), EngineError> {
    if len + 1 != vk.ic.len() {
        return Err(WireError::TooShort {
            needed: vk.ic.len() - 1,
            got: len,
        }
        .into());
    }
    Ok(())
}

/// Compute `IC_acc = IC[0] + sum_i public_inputs[i] * IC[i+1]`.
fn linear_combination(vk: &VerifyingKey, public_inputs: &[Fr]) -> G1Affine {
    let acc = pairing::msm_g1(&vk.ic[1..], public_inputs);
    (acc + vk.ic[0]).into_affine()
}

/// Verify a single Groth16 proof:
/// `e(A,B) * e(-IC_acc, gamma) * e(-C, delta) = e(alpha, beta)`.
pub fn verify(
    vk: &VerifyingKey,
    proof: &Proof,
    public_inputs: &[Fr],
) -> Result<PairingCheck, EngineError> {
    check_input_arity(vk, public_inputs.len())?;
    proof.validate()?;
    let ic_acc = linear_combination(vk, public_inputs);

    let lhs = pairing::multi_pairing(&[
        (proof.a, proof.b),
        (pairing::g1_negate(ic_acc), vk.gamma_g2),
        (pairing::g1_negate(proof.c), vk.delta_g2),
    ]);

    Ok(lhs == vk.alpha_beta())
}

/// Draw a 128-bit random scalar as a scalar-field element, zero-extended into
/// the 256-bit scalar-field representation. 128 bits of entropy caps the
/// batch-forgery probability at `2^-127` per `spec.md` §4.5's soundness bound.
///
/// Fails closed on RNG failure (`spec.md` §4.5/§7) rather than panicking:
/// uses `try_fill_bytes` and surfaces `EngineError::RngFailure`.
fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Fr, EngineError> {
    let mut half = [0u8; 16];
    rng.try_fill_bytes(&mut half)
        .map_err(|_| EngineError::RngFailure)?;
    let mut limbs = [0u64; 4];
    limbs[0] = u64::from_be_bytes(half[8..16].try_into().unwrap());
    limbs[1] = u64::from_be_bytes(half[0..8].try_into().unwrap());
    Ok(Fr::from(BigInt::<4>(limbs)))
}

/// Verify `n >= 4` proofs sharing a VK and public-input shape in one
/// amortized pass: `(n+2)`-term multi-pairing on the left, a single
/// `e(sum r_i * alpha, beta)` on the right. For `n < 4` this degrades to
/// sequential verification, matching `spec.md` §4.5.
pub fn verify_batch<R: RngCore + CryptoRng>(
    vk: &VerifyingKey,
    proofs: &[Proof],
    public_inputs: &[Vec<Fr>],
    rng: &mut R,
) -> Result<PairingCheck, EngineError> {
    if proofs.len() != public_inputs.len() {
        return Err(WireError::TooShort {
            needed: proofs.len(),
            got: public_inputs.len(),
        }
        .into());
    }
    for pi in public_inputs {
        check_input_arity(vk, pi.len())?;
    }

    if proofs.len() < 4 {
        for (p, pi) in proofs.iter().zip(public_inputs.iter()) {
            if !verify(vk, p, pi)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    for p in proofs {
        p.validate()?;
    }

    let scalars: Vec<Fr> = (0..proofs.len())
        .map(|_| random_scalar(rng))
        .collect::<Result<_, _>>()?;

    // IC_acc = sum_i r_i * (IC[0] + sum_j pi_ij * IC[j+1])
    //        = (sum_i r_i) * IC[0] + sum_j (sum_i r_i * pi_ij) * IC[j+1]
    let num_pub = vk.num_public_inputs();
    let mut combined_pi_scalars = vec![Fr::from(0u64); num_pub];
    let mut sum_r = Fr::from(0u64);
    for (r, pi) in scalars.iter().zip(public_inputs.iter()) {
        sum_r += *r;
        for (slot, input) in combined_pi_scalars.iter_mut().zip(pi.iter()) {
            *slot += *r * *input;
        }
    }
    let mut ic_acc = pairing::msm_g1(&vk.ic[1..], &combined_pi_scalars);
    ic_acc += pairing::g1_mul(vk.ic[0], sum_r);
    let ic_acc = ic_acc.into_affine();

    let c_points: Vec<G1Affine> = proofs.iter().map(|p| p.c).collect();
    let sum_c = pairing::msm_g1(&c_points, &scalars).into_affine();

    // e(r_i * A_i, B_i) terms plus the two accumulator terms: n + 2 total.
    let mut pairs: Vec<(G1Affine, G2Affine)> = Vec::with_capacity(proofs.len() + 2);
    for (p, r) in proofs.iter().zip(scalars.iter()) {
        pairs.push((pairing::g1_mul(p.a, *r).into_affine(), p.b));
    }
    pairs.push((pairing::g1_negate(ic_acc), vk.gamma_g2));
    pairs.push((pairing::g1_negate(sum_c), vk.delta_g2));

    let lhs = pairing::multi_pairing(&pairs);

    let alpha_scaled = pairing::g1_mul(vk.alpha_g1, sum_r).into_affine();
    let rhs = pairing::pairing(alpha_scaled, vk.beta_g2);

    Ok(lhs == rhs)
}
