//! Cryptographic core for verifying BN254 Groth16 zero-knowledge reputation
//! proofs: arena allocation, field arithmetic, Poseidon hashing, pairing
//! operations, Groth16 verification, and the verify-engine state machine
//! that ties them together.
//!
//! This crate is deliberately a pure verification library: it has no
//! transport, storage, or configuration-loading layer, and no circuit
//! synthesis or proving-key machinery. Callers own the wire transport and
//! hand in already-parsed policy (see [`engine::VerifyConfig`]).

pub mod arena;
pub mod commitment;
pub mod engine;
pub mod error;
pub mod field;
pub mod groth16;
pub mod pairing;
pub mod poseidon;
pub mod smt;
pub mod stats;
pub mod wire;

pub use engine::{BatchContext, BatchState, VerifyConfig, VerifyContext};
pub use error::{CryptoError, EngineError, VerifyOutcome, WireError};
pub use field::{Fp, FieldElement, Fr};
pub use groth16::{Proof, VerifyingKey};
pub use wire::ProofRecord;
