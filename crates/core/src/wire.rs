//! Wire-format parsing for proof records (`spec.md` §4.6).
//!
//! A proof record is a fixed 330-byte layout:
//! `type(1) | version(1) | threshold(2 BE) | timestamp(4 LE) | agent_id(32)
//! | commitment(32) | proof_points(256)`. Only version 1 is accepted; any
//! other layout (including the historical 128-byte truncated format some
//! callers may still hold) is rejected as [`WireError`] rather than emulated.

use ark_bn254::{G1Affine, G2Affine};
use ark_ec::AffineRepr;

use crate::error::{EngineError, WireError};
use crate::groth16::Proof;

/// Only wire-format version 1 is accepted.
pub const SUPPORTED_VERSION: u8 = 1;

/// Record type tag for a reputation proof (`spec.md` §4.6).
pub const RECORD_TYPE_REPUTATION_PROOF: u8 = 1;

pub const RECORD_LEN: usize = 330;

/// A parsed proof record, prior to policy or cryptographic checks.
#[derive(Clone, Debug)]
pub struct ProofRecord {
    pub record_type: u8,
    pub version: u8,
    pub threshold: u16,
    pub timestamp: u32,
    pub agent_id: [u8; 32],
    pub commitment: [u8; 32],
    pub proof: Proof,
}

impl ProofRecord {
    /// Parse a 330-byte proof record. Rejects anything shorter, any
    /// unsupported version, and any malformed curve point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.len() != RECORD_LEN {
            return Err(WireError::TooShort {
                needed: RECORD_LEN,
                got: bytes.len(),
            }
            .into());
        }

        let record_type = bytes[0];
        let version = bytes[1];
        if version != SUPPORTED_VERSION {
            return Err(WireError::UnsupportedVersion(version).into());
        }

        let threshold = u16::from_be_bytes([bytes[2], bytes[3]]);
        let timestamp = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let agent_id: [u8; 32] = bytes[8..40].try_into().unwrap();
        let commitment: [u8; 32] = bytes[40..72].try_into().unwrap();

        let proof = parse_proof_points(&bytes[72..330])?;

        Ok(ProofRecord {
            record_type,
            version,
            threshold,
            timestamp,
            agent_id,
            commitment,
            proof,
        })
    }

    /// Re-encode this record to its 330-byte wire form.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0] = self.record_type;
        out[1] = self.version;
        out[2..4].copy_from_slice(&self.threshold.to_be_bytes());
        out[4..8].copy_from_slice(&self.timestamp.to_le_bytes());
        out[8..40].copy_from_slice(&self.agent_id);
        out[40..72].copy_from_slice(&self.commitment);
        out[72..330].copy_from_slice(&encode_proof_points(&self.proof));
        out
    }
}

/// `proof_points` is `A(64) | B(128) | C(64)` = 256 bytes.
fn parse_proof_points(bytes: &[u8]) -> Result<Proof, EngineError> {
    debug_assert_eq!(bytes.len(), 256);
    let a = parse_g1(&bytes[0..64])?;
    let b = parse_g2(&bytes[64..192])?;
    let c = parse_g1(&bytes[192..256])?;
    Ok(Proof { a, b, c })
}

fn encode_proof_points(proof: &Proof) -> [u8; 256] {
    let mut out = [0u8; 256];
    out[0..64].copy_from_slice(&crate::pairing::g1_to_bytes(&proof.a));
    out[64..192].copy_from_slice(&g2_to_bytes(&proof.b));
    out[192..256].copy_from_slice(&crate::pairing::g1_to_bytes(&proof.c));
    out
}

fn parse_g1(bytes: &[u8]) -> Result<G1Affine, EngineError> {
    let x: [u8; 32] = bytes[0..32].try_into().unwrap();
    let y: [u8; 32] = bytes[32..64].try_into().unwrap();
    Ok(crate::pairing::g1_from_bytes(&x, &y)?)
}

fn parse_g2(bytes: &[u8]) -> Result<G2Affine, EngineError> {
    let x_re: [u8; 32] = bytes[0..32].try_into().unwrap();
    let x_im: [u8; 32] = bytes[32..64].try_into().unwrap();
    let y_re: [u8; 32] = bytes[64..96].try_into().unwrap();
    let y_im: [u8; 32] = bytes[96..128].try_into().unwrap();
    Ok(crate::pairing::g2_from_bytes(&x_re, &x_im, &y_re, &y_im)?)
}

fn g2_to_bytes(p: &G2Affine) -> [u8; 128] {
    use ark_ff::Zero;
    let mut out = [0u8; 128];
    if p.is_zero() {
        return out;
    }
    out[0..32].copy_from_slice(&crate::pairing::fp_to_be(p.x.c0));
    out[32..64].copy_from_slice(&crate::pairing::fp_to_be(p.x.c1));
    out[64..96].copy_from_slice(&crate::pairing::fp_to_be(p.y.c0));
    out[96..128].copy_from_slice(&crate::pairing::fp_to_be(p.y.c1));
    out
}
