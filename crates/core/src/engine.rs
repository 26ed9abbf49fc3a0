//! The verify engine: per-proof and batch state machines (`spec.md` §5–§7).
//!
//! A single proof moves `WIRE_IN -> PARSED -> POLICY_OK -> CRYPTO_OK ->
//! ACCEPT`, exiting early to a terminal [`VerifyOutcome`] at the first check
//! that fails. A batch moves `OPEN -> ADDING -> FROZEN -> VERIFIED ->
//! CLOSED`; a failed batch falls back to verifying its members sequentially
//! so a single bad proof cannot mask the rest (`spec.md` §4.5's batch
//! soundness note).

use std::sync::Arc;
use std::time::Instant;

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, error, instrument, trace, warn};

use crate::arena::Arena;
use crate::error::{EngineError, EngineResult, VerifyOutcome};
use crate::field::{threshold_to_field, FieldElement, Fr};
use crate::groth16::{self, Proof, VerifyingKey};
use crate::poseidon;
use crate::smt::{self, PathNode};
use crate::stats::{Stats, StatsSnapshot};
use crate::wire::ProofRecord;

/// `timestamp + max_age < current_time`, per `spec.md` §4.6. A `max_age` of
/// zero disables expiry checking entirely rather than enforcing zero
/// tolerance. A future-dated `timestamp` is not itself a reason to reject —
/// only the sum formula decides expiry.
fn is_expired(timestamp: u32, now: u32, max_age: u32) -> bool {
    if max_age == 0 {
        return false;
    }
    timestamp.saturating_add(max_age) < now
}

/// Default cap on the number of proofs a single batch may hold, used when a
/// [`VerifyConfig`] does not override it (`spec.md` §4.5).
pub const DEFAULT_BATCH_CAPACITY: usize = 1024;

/// Static, per-process verification policy: clock tolerance, minimum
/// acceptable threshold, blacklist root, and batch capacity. None of this is
/// loaded from a config file by this crate — callers own configuration
/// plumbing and hand in already-parsed values, per `spec.md`'s "no
/// config-loading" non-goal.
#[derive(Clone, Debug)]
pub struct VerifyConfig {
    pub max_proof_age_secs: u32,
    pub min_threshold: u16,
    pub blacklist_root: Fr,
    pub batch_capacity: usize,
}

/// Owns the verifying key, policy, and running statistics for one verifier
/// instance. Not `Sync`; share across threads via `Arc` with external
/// synchronization, matching [`crate::arena::Arena`]'s contract.
///
/// Per `spec.md` §4.1, the VK is held only once loaded and is immutable
/// thereafter; a context constructed without one refuses every `verify`
/// call with [`EngineError::MissingVerifyingKey`] until [`Self::load_vk`]
/// is called.
pub struct VerifyContext {
    vk: Option<VerifyingKey>,
    config: VerifyConfig,
    stats: Stats,
}

impl VerifyContext {
    /// Create a context with no verifying key loaded yet.
    pub fn new(config: VerifyConfig) -> Self {
        VerifyContext {
            vk: None,
            config,
            stats: Stats::new(),
        }
    }

    /// Convenience constructor for the common case of loading the VK
    /// immediately, e.g. at service start.
    pub fn with_vk(vk: VerifyingKey, config: VerifyConfig) -> Self {
        let mut ctx = Self::new(config);
        ctx.load_vk(vk);
        ctx
    }

    /// Load the verifying key. The VK is loaded once and is immutable
    /// thereafter (`spec.md` §4.1's lifecycle); callers should call this
    /// exactly once before serving verify traffic.
    pub fn load_vk(&mut self, vk: VerifyingKey) {
        self.vk = Some(vk);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Public-input derivation: `Poseidon(agent_id, commitment, threshold)`,
    /// per `spec.md` §4.6.
    fn derive_public_input(agent_id: &[u8; 32], commitment: &[u8; 32], threshold: u16) -> Fr {
        let agent_fe = FieldElement::<Fr>::from_bytes_be(agent_id).0;
        let commitment_fe = FieldElement::<Fr>::from_bytes_be(commitment).0;
        let threshold_fe = threshold_to_field(threshold).0;
        poseidon::hash3(agent_fe, commitment_fe, threshold_fe)
    }

    /// Run one proof through `WIRE_IN -> PARSED -> POLICY_OK -> CRYPTO_OK ->
    /// ACCEPT`, exiting early on the first failing check. `now` is the
    /// caller-supplied current timestamp (seconds since epoch) so the engine
    /// never reads the system clock itself.
    #[instrument(skip(self, record_bytes, blacklist_path), fields(now))]
    pub fn verify(
        &self,
        record_bytes: &[u8],
        now: u32,
        blacklist_path: &[PathNode],
    ) -> EngineResult<VerifyOutcome> {
        let Some(vk) = self.vk.as_ref() else {
            error!("refusing to verify: no verifying key loaded");
            return Err(EngineError::MissingVerifyingKey);
        };

        let start = Instant::now();
        let outcome = self.verify_inner(vk, record_bytes, now, blacklist_path);
        let elapsed_micros = start.elapsed().as_micros() as u64;

        match &outcome {
            Ok(o) => {
                self.stats.record_verify(o.is_accepted(), elapsed_micros);
                debug!(outcome = ?o, elapsed_micros, "proof verified");
            }
            Err(e) => {
                self.stats.record_verify(false, elapsed_micros);
                if e.is_fatal_resource_failure() {
                    error!(error = %e, "fatal resource failure during proof verification");
                } else {
                    warn!(error = %e, "proof verification errored");
                }
            }
        }
        outcome
    }

    fn verify_inner(
        &self,
        vk: &VerifyingKey,
        record_bytes: &[u8],
        now: u32,
        blacklist_path: &[PathNode],
    ) -> EngineResult<VerifyOutcome> {
        // WIRE_IN -> PARSED
        let record = match ProofRecord::from_bytes(record_bytes) {
            Ok(r) => r,
            Err(_) => return Ok(VerifyOutcome::Malformed),
        };
        trace!(agent_id = ?hex::encode(record.agent_id), "parsed proof record");

        // PARSED -> POLICY_OK
        if record.threshold < self.config.min_threshold {
            return Ok(VerifyOutcome::BelowThreshold);
        }
        if is_expired(record.timestamp, now, self.config.max_proof_age_secs) {
            return Ok(VerifyOutcome::Expired);
        }
        let leaf = FieldElement::<Fr>::from_bytes_be(&record.commitment).0;
        if smt::verify(self.config.blacklist_root, leaf, blacklist_path) {
            return Ok(VerifyOutcome::Blacklisted);
        }

        // POLICY_OK -> CRYPTO_OK -> ACCEPT
        let public_input =
            Self::derive_public_input(&record.agent_id, &record.commitment, record.threshold);
        let valid = groth16::verify(vk, &record.proof, &[public_input])?;
        if valid {
            Ok(VerifyOutcome::Ok)
        } else {
            Ok(VerifyOutcome::InvalidProof)
        }
    }

    /// Run a batch of proofs through the amortized pairing check, falling
    /// back to per-proof sequential verification if the batch check fails or
    /// if any proof fails policy before reaching the cryptographic stage.
    #[instrument(skip(self, batch, rng))]
    pub fn verify_batch<R: RngCore + CryptoRng>(
        &self,
        batch: &mut BatchContext,
        rng: &mut R,
    ) -> EngineResult<Vec<VerifyOutcome>> {
        let Some(vk) = self.vk.as_ref() else {
            error!("refusing to verify batch: no verifying key loaded");
            return Err(EngineError::MissingVerifyingKey);
        };

        batch.freeze()?;
        let n = batch.records.len();

        let mut outcomes = vec![VerifyOutcome::Malformed; n];
        let mut crypto_indices = Vec::with_capacity(n);
        let mut proofs = Vec::with_capacity(n);
        let mut public_inputs = Vec::with_capacity(n);

        for (i, record) in batch.records.iter().enumerate() {
            if record.threshold < self.config.min_threshold {
                outcomes[i] = VerifyOutcome::BelowThreshold;
                continue;
            }
            if is_expired(record.timestamp, batch.now, self.config.max_proof_age_secs) {
                outcomes[i] = VerifyOutcome::Expired;
                continue;
            }
            let leaf = FieldElement::<Fr>::from_bytes_be(&record.commitment).0;
            if smt::verify(self.config.blacklist_root, leaf, &batch.blacklist_paths[i]) {
                outcomes[i] = VerifyOutcome::Blacklisted;
                continue;
            }
            let public_input = Self::derive_public_input(
                &record.agent_id,
                &record.commitment,
                record.threshold,
            );
            crypto_indices.push(i);
            proofs.push(record.proof);
            public_inputs.push(vec![public_input]);
        }

        if !proofs.is_empty() {
            let batch_ok = groth16::verify_batch(vk, &proofs, &public_inputs, rng)?;
            if batch_ok {
                for &i in &crypto_indices {
                    outcomes[i] = VerifyOutcome::Ok;
                }
            } else {
                // Sequential fallback: one bad proof must not fail its peers.
                for (&i, (p, pi)) in crypto_indices.iter().zip(proofs.iter().zip(public_inputs.iter()))
                {
                    let ok = groth16::verify(vk, p, pi)?;
                    outcomes[i] = if ok {
                        VerifyOutcome::Ok
                    } else {
                        VerifyOutcome::InvalidProof
                    };
                }
            }
        }

        self.stats.record_batch(n);
        self.stats.observe_arena_usage(batch.arena_peak_usage());
        batch.state = BatchState::Verified;
        Ok(outcomes)
    }
}

/// Batch state machine stages (`spec.md` §5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    Open,
    Adding,
    Frozen,
    Verified,
    Closed,
}

/// A bounded collection of proofs awaiting batch verification, each carrying
/// its own blacklist exclusion path and sharing one `now` timestamp. The
/// arena is shared via `Arc` so the batch can outlive the thread that
/// populated it (`spec.md` §4.1's sharing contract for [`Arena`]).
pub struct BatchContext {
    state: BatchState,
    now: u32,
    records: Vec<ProofRecord>,
    blacklist_paths: Vec<Vec<PathNode>>,
    arena: Arc<Arena>,
    capacity: usize,
}

impl BatchContext {
    /// `capacity` bounds how many proofs this batch will accept; callers
    /// typically pass their [`VerifyConfig::batch_capacity`].
    pub fn new(now: u32, arena: Arc<Arena>, capacity: usize) -> Self {
        BatchContext {
            state: BatchState::Open,
            now,
            records: Vec::new(),
            blacklist_paths: Vec::new(),
            arena,
            capacity,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add one proof record to the batch. Transitions `OPEN`/`ADDING ->
    /// ADDING`. Rejects once this batch's configured capacity is reached or
    /// the batch has already been frozen.
    pub fn add(&mut self, record_bytes: &[u8], blacklist_path: Vec<PathNode>) -> EngineResult<()> {
        if self.state != BatchState::Open && self.state != BatchState::Adding {
            return Err(EngineError::BatchNotOpen);
        }
        if self.records.len() >= self.capacity {
            return Err(EngineError::BatchCapacityExceeded {
                max: self.capacity,
                got: self.records.len() + 1,
            });
        }
        let record = ProofRecord::from_bytes(record_bytes)?;
        self.records.push(record);
        self.blacklist_paths.push(blacklist_path);
        self.state = BatchState::Adding;
        Ok(())
    }

    /// Freeze the batch: no further proofs may be added. `ADDING -> FROZEN`.
    fn freeze(&mut self) -> EngineResult<()> {
        if self.records.is_empty() {
            return Err(EngineError::EmptyBatch);
        }
        self.state = BatchState::Frozen;
        Ok(())
    }

    /// Peak bytes used by this batch's scratch arena so far.
    pub fn arena_peak_usage(&self) -> usize {
        self.arena.peak_usage()
    }

    /// Close the batch, releasing its staging buffers. `VERIFIED -> CLOSED`.
    pub fn close(mut self) {
        self.state = BatchState::Closed;
    }
}
