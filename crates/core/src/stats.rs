//! Running verify-engine statistics (`spec.md` §5 supplement).
//!
//! Counters are updated by the single thread driving a [`crate::engine::VerifyContext`]
//! and read via an atomic snapshot, so a monitoring thread can poll them
//! without taking a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time copy of the running counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_verified: u64,
    pub total_failed: u64,
    pub total_batches: u64,
    pub mean_verify_micros: u64,
    pub mean_batch_size: u64,
    pub peak_arena_bytes: u64,
}

/// Lock-free running statistics. All updates use `Ordering::Relaxed`: the
/// counters are diagnostic, not used to make verification decisions, so
/// cross-thread visibility ordering relative to other state does not matter.
#[derive(Default)]
pub struct Stats {
    total_verified: AtomicU64,
    total_failed: AtomicU64,
    total_batches: AtomicU64,
    verify_micros_sum: AtomicU64,
    batch_size_sum: AtomicU64,
    peak_arena_bytes: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one single-proof verification outcome and its wall-clock cost.
    pub fn record_verify(&self, accepted: bool, micros: u64) {
        if accepted {
            self.total_verified.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.verify_micros_sum.fetch_add(micros, Ordering::Relaxed);
    }

    /// Record one completed batch of `size` proofs.
    pub fn record_batch(&self, size: usize) {
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        self.batch_size_sum
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Raise the peak arena usage high-water mark if `bytes` exceeds it.
    pub fn observe_arena_usage(&self, bytes: usize) {
        let bytes = bytes as u64;
        let mut current = self.peak_arena_bytes.load(Ordering::Relaxed);
        while bytes > current {
            match self.peak_arena_bytes.compare_exchange_weak(
                current,
                bytes,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total_verified = self.total_verified.load(Ordering::Relaxed);
        let total_failed = self.total_failed.load(Ordering::Relaxed);
        let total_batches = self.total_batches.load(Ordering::Relaxed);
        let verify_micros_sum = self.verify_micros_sum.load(Ordering::Relaxed);
        let batch_size_sum = self.batch_size_sum.load(Ordering::Relaxed);
        let total_proofs = total_verified + total_failed;

        StatsSnapshot {
            total_verified,
            total_failed,
            total_batches,
            mean_verify_micros: checked_mean(verify_micros_sum, total_proofs),
            mean_batch_size: checked_mean(batch_size_sum, total_batches),
            peak_arena_bytes: self.peak_arena_bytes.load(Ordering::Relaxed),
        }
    }
}

fn checked_mean(sum: u64, count: u64) -> u64 {
    if count == 0 {
        0
    } else {
        sum / count
    }
}
