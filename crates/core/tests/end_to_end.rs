//! End-to-end scenarios against the public API: happy path, expiry,
//! below-threshold, tampering, a mixed batch, and commitment mismatch.

use std::sync::Arc;

use ark_bn254::{Fr as ArkFr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{AffineRepr, CurveGroup, Group};
use ark_ff::Field;
use ark_std::{test_rng, UniformRand};
use rand::rngs::OsRng;

use repzk_core::engine::{BatchContext, VerifyConfig, VerifyContext, DEFAULT_BATCH_CAPACITY};
use repzk_core::error::VerifyOutcome;
use repzk_core::field::{threshold_to_field, FieldElement};
use repzk_core::groth16::{Proof, VerifyingKey};
use repzk_core::pairing::{fp_to_be, g1_to_bytes};
use repzk_core::poseidon;
use repzk_core::wire::{ProofRecord, RECORD_TYPE_REPUTATION_PROOF, SUPPORTED_VERSION};
use repzk_core::{arena::Arena, field::Fr};

struct Setup {
    vk: VerifyingKey,
    alpha: ArkFr,
    beta: ArkFr,
    gamma: ArkFr,
    delta: ArkFr,
    ic0: ArkFr,
    ic1: ArkFr,
}

fn g2_bytes(p: G2Affine) -> [u8; 128] {
    let mut out = [0u8; 128];
    out[0..32].copy_from_slice(&fp_to_be(p.x.c0));
    out[32..64].copy_from_slice(&fp_to_be(p.x.c1));
    out[64..96].copy_from_slice(&fp_to_be(p.y.c0));
    out[96..128].copy_from_slice(&fp_to_be(p.y.c1));
    out
}

fn make_setup() -> Setup {
    let mut rng = test_rng();
    let alpha = ArkFr::rand(&mut rng);
    let beta = ArkFr::rand(&mut rng);
    let gamma = ArkFr::rand(&mut rng);
    let delta = ArkFr::rand(&mut rng);
    let ic0 = ArkFr::rand(&mut rng);
    let ic1 = ArkFr::rand(&mut rng);

    let g1 = G1Projective::generator();
    let g2 = G2Projective::generator();
    let alpha_g1 = (g1 * alpha).into_affine();
    let beta_g2 = (g2 * beta).into_affine();
    let gamma_g2 = (g2 * gamma).into_affine();
    let delta_g2 = (g2 * delta).into_affine();
    let ic: Vec<G1Affine> = vec![(g1 * ic0).into_affine(), (g1 * ic1).into_affine()];

    let mut blob = Vec::new();
    blob.extend_from_slice(&g1_to_bytes(&alpha_g1));
    blob.extend_from_slice(&g2_bytes(beta_g2));
    blob.extend_from_slice(&g2_bytes(gamma_g2));
    blob.extend_from_slice(&g2_bytes(delta_g2));
    blob.extend_from_slice(&(ic.len() as u32).to_le_bytes());
    for p in &ic {
        blob.extend_from_slice(&g1_to_bytes(p));
    }
    let vk = VerifyingKey::from_bytes(&blob).unwrap();

    Setup {
        vk,
        alpha,
        beta,
        gamma,
        delta,
        ic0,
        ic1,
    }
}

fn public_input(agent_id: &[u8; 32], commitment: &[u8; 32], threshold: u16) -> Fr {
    let agent_fe = FieldElement::<Fr>::from_bytes_be(agent_id).0;
    let commitment_fe = FieldElement::<Fr>::from_bytes_be(commitment).0;
    let threshold_fe = threshold_to_field(threshold).0;
    poseidon::hash3(agent_fe, commitment_fe, threshold_fe)
}

fn record_for(
    setup: &Setup,
    agent_id: [u8; 32],
    commitment: [u8; 32],
    threshold: u16,
    timestamp: u32,
) -> Vec<u8> {
    let mut rng = test_rng();
    let w = public_input(&agent_id, &commitment, threshold);

    let g1 = G1Projective::generator();
    let g2 = G2Projective::generator();
    let r = ArkFr::rand(&mut rng);
    let a_scalar = setup.alpha + r * setup.delta;
    let b_scalar = setup.beta;
    let l_scalar = setup.ic0 + w * setup.ic1;
    let c_scalar = (a_scalar * b_scalar - setup.alpha * setup.beta - l_scalar * setup.gamma)
        * setup.delta.inverse().unwrap();

    let proof = Proof {
        a: (g1 * a_scalar).into_affine(),
        b: (g2 * b_scalar).into_affine(),
        c: (g1 * c_scalar).into_affine(),
    };

    let record = ProofRecord {
        record_type: RECORD_TYPE_REPUTATION_PROOF,
        version: SUPPORTED_VERSION,
        threshold,
        timestamp,
        agent_id,
        commitment,
        proof,
    };
    record.to_bytes().to_vec()
}

fn config() -> VerifyConfig {
    VerifyConfig {
        max_proof_age_secs: 3600,
        min_threshold: 5000,
        blacklist_root: Fr::from(0u64),
        batch_capacity: DEFAULT_BATCH_CAPACITY,
    }
}

#[test]
fn happy_path_is_accepted() {
    let setup = make_setup();
    let ctx = VerifyContext::with_vk(setup.vk.clone(), config());
    let bytes = record_for(&setup, [1u8; 32], [2u8; 32], 7000, 1_700_000_000);
    assert_eq!(
        ctx.verify(&bytes, 1_700_000_100, &[]).unwrap(),
        VerifyOutcome::Ok
    );
}

#[test]
fn expired_proof_is_rejected() {
    let setup = make_setup();
    let ctx = VerifyContext::with_vk(setup.vk.clone(), config());
    let bytes = record_for(&setup, [1u8; 32], [2u8; 32], 7000, 1_700_000_000);
    assert_eq!(
        ctx.verify(&bytes, 1_700_000_000 + 10_000, &[]).unwrap(),
        VerifyOutcome::Expired
    );
}

#[test]
fn below_configured_threshold_is_rejected() {
    let setup = make_setup();
    let ctx = VerifyContext::with_vk(setup.vk.clone(), config());
    let bytes = record_for(&setup, [1u8; 32], [2u8; 32], 1000, 1_700_000_000);
    assert_eq!(
        ctx.verify(&bytes, 1_700_000_100, &[]).unwrap(),
        VerifyOutcome::BelowThreshold
    );
}

#[test]
fn tampered_proof_is_invalid_not_accepted() {
    let setup = make_setup();
    let ctx = VerifyContext::with_vk(setup.vk.clone(), config());
    let mut bytes = record_for(&setup, [1u8; 32], [2u8; 32], 7000, 1_700_000_000);
    bytes[72 + 32 + 5] ^= 0x01; // flip a bit inside A's y-coordinate
    let outcome = ctx.verify(&bytes, 1_700_000_100, &[]).unwrap();
    assert!(!outcome.is_accepted());
}

#[test]
fn batch_of_four_with_one_tampered_only_rejects_that_one() {
    let setup = make_setup();
    let cfg = config();
    let batch_capacity = cfg.batch_capacity;
    let ctx = VerifyContext::with_vk(setup.vk.clone(), cfg);
    let arena = Arc::new(Arena::new(4096));
    let mut batch = BatchContext::new(1_700_000_100, arena, batch_capacity);

    for i in 0..4u8 {
        let mut bytes = record_for(&setup, [i; 32], [i + 10; 32], 7000, 1_700_000_000);
        if i == 1 {
            bytes[72 + 32 + 5] ^= 0x01;
        }
        batch.add(&bytes, vec![]).unwrap();
    }

    let mut rng = OsRng;
    let outcomes = ctx.verify_batch(&mut batch, &mut rng).unwrap();
    assert_eq!(outcomes[0], VerifyOutcome::Ok);
    assert_eq!(outcomes[1], VerifyOutcome::InvalidProof);
    assert_eq!(outcomes[2], VerifyOutcome::Ok);
    assert_eq!(outcomes[3], VerifyOutcome::Ok);
    batch.close();
}

#[test]
fn commitment_mismatch_is_detected_by_the_caller_via_commitment_module() {
    use repzk_core::commitment;
    let secret = [4u8; 32];
    let real_commitment = commitment::compute(8200, &secret).unwrap();
    // The caller recomputes the commitment from the claimed score/secret and
    // compares it against what the proof record carries; a mismatch here
    // means the prover lied about their score before ever reaching the
    // pairing check.
    assert!(commitment::verify(real_commitment, 8200, &secret));
    assert!(!commitment::verify(real_commitment, 8100, &secret));
}
