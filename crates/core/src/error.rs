//! Error and outcome types for the verifier core.
//!
//! `spec.md` §7 distinguishes three classes of result: input errors, policy
//! outcomes, and cryptographic failure. Policy/crypto outcomes are business
//! results, not `Err` values — they are carried by [`VerifyOutcome`]. Only
//! genuinely exceptional conditions (malformed wire bytes, resource
//! exhaustion, RNG failure) are modeled as `Err`.

use thiserror::Error;

/// Errors while parsing wire-format bytes (proof records, VK blobs, SMT
/// exclusion proofs).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer too short: need {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },

    #[error("unsupported wire format version: {0}")]
    UnsupportedVersion(u8),

    #[error("verification key exceeds maximum size of {max} bytes")]
    VkTooLarge { max: usize },

    #[error("ic_len must be at least 1, got {0}")]
    EmptyIc(u32),

    #[error("SMT proof depth {0} exceeds maximum of 256")]
    SmtDepthTooLarge(usize),

    #[error("SMT proof direction byte must be 0 or 1, got {0}")]
    InvalidSmtDirection(u8),
}

/// Errors from field/curve arithmetic and Poseidon. These are expected to be
/// unreachable in normal operation given arena-allocated, length-checked
/// inputs; they exist so the arena-exhaustion path has somewhere to surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("point is not on the BN254 curve")]
    NotOnCurve,

    #[error("point is not in the prime-order subgroup")]
    NotInSubgroup,

    #[error("field element out of canonical range")]
    NonCanonicalFieldElement,

    #[error("poseidon hash requires 1, 2, or 3 inputs, got {0}")]
    InvalidPoseidonArity(usize),
}

/// Resource conditions: exceptional, never silently recovered except where
/// spec.md §7 explicitly allows batch-to-sequential degradation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    ArenaExhausted { requested: usize, available: usize },

    #[error("secure RNG failed while drawing batch scalars")]
    RngFailure,

    #[error("verification key not loaded")]
    MissingVerifyingKey,

    #[error("batch capacity exceeded: max {max}, got {got}")]
    BatchCapacityExceeded { max: usize, got: usize },

    #[error("batch is not open for adding proofs")]
    BatchNotOpen,

    #[error("batch has no proofs to verify")]
    EmptyBatch,

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl EngineError {
    /// `true` for conditions `spec.md` §7 calls out as requiring an
    /// `ERROR`-level log event: exhausted resources, RNG failure, and a
    /// refusal to verify due to missing key material.
    pub fn is_fatal_resource_failure(&self) -> bool {
        matches!(
            self,
            EngineError::ArenaExhausted { .. }
                | EngineError::RngFailure
                | EngineError::MissingVerifyingKey
        )
    }
}

pub type WireResult<T> = Result<T, WireError>;
pub type CryptoResult<T> = Result<T, CryptoError>;
pub type EngineResult<T> = Result<T, EngineError>;

/// The per-proof result taxonomy from `spec.md` §6. Every verification
/// request produces exactly one of these; none of them are `Err` — they are
/// returned by value from [`crate::engine::VerifyContext::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Proof parsed, passed policy, and the pairing check succeeded.
    Ok,
    /// Proof parsed and passed policy, but the pairing equation did not hold.
    InvalidProof,
    /// Declared threshold is below the context's configured minimum.
    BelowThreshold,
    /// `timestamp + max_age < now`.
    Expired,
    /// Parse failure, unknown wire version, or an off-curve/out-of-subgroup
    /// point.
    Malformed,
    /// Commitment or agent id present in the blacklist exclusion set.
    Blacklisted,
    /// Caller-supplied commitment does not match a recomputed one (checked
    /// by the outer API layer, not by Groth16 verification itself).
    CommitmentMismatch,
}

impl VerifyOutcome {
    /// `true` for the single accepting outcome.
    pub fn is_accepted(self) -> bool {
        matches!(self, VerifyOutcome::Ok)
    }
}
