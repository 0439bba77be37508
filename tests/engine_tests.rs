mod common;

use common::*;
use zk_context::{
    batch_verify, verify, verify_with_details, AccessPolicy, Category, ChallengeNonce, ContextEngine,
    ContextError, ContextProof, ContextWitness, ErrorKind, InMemoryPolicyStore, PolicyKey,
    PolicyParameters, PolicySnapshot,
};

#[test]
fn test_full_context_round_trip() {
    init_tracing();
    let nonce = nonce("req-round-trip");
    let snapshot = snapshot();
    let engine = ContextEngine::new();

    let proof = engine.prove(&full_witness(&nonce), &snapshot, &nonce).unwrap();
    assert!(proof.artifact.device_verified);
    assert!(proof.artifact.timestamp_verified);
    assert!(proof.artifact.location_verified);
    assert!(proof.artifact.pattern_verified);
    assert!(proof.artifact.overall_valid);
    assert_eq!(proof.artifact.trust_score, 100);
    assert!(proof.artifact.verification_level_met);
    assert_eq!(proof.policy_version, 1);

    assert!(verify(&proof, &snapshot, &nonce));
    assert!(engine.verify(&proof, &snapshot, &nonce));
}

#[test]
fn test_proof_survives_json_transport() {
    let nonce = nonce("req-json");
    let snapshot = snapshot();
    let proof = ContextEngine::new().prove(&full_witness(&nonce), &snapshot, &nonce).unwrap();

    let wire = serde_json::to_string(&proof).unwrap();
    let received: ContextProof = serde_json::from_str(&wire).unwrap();
    assert_eq!(received, proof);
    assert!(verify(&received, &snapshot, &nonce));
}

#[test]
fn test_policy_loaded_from_json() {
    let document = policy().to_json().unwrap();
    let params = PolicyParameters::from_json(&document).unwrap();
    assert_eq!(params, policy());

    let snapshot = PolicySnapshot::new(params).unwrap();
    assert_eq!(snapshot.digest(), PolicySnapshot::new(policy()).unwrap().digest());
}

#[test]
fn test_any_policy_change_breaks_verification() {
    let nonce = nonce("req-policy-change");
    let original = snapshot();
    let proof = ContextEngine::new().prove(&full_witness(&nonce), &original, &nonce).unwrap();
    assert!(verify(&proof, &original, &nonce));

    let edits: Vec<(&str, Box<dyn Fn(&mut PolicyParameters)>)> = vec![
        ("device.revoked", Box::new(|p| p.device.revoked_commitments.clear())),
        ("device.whitelist", Box::new(|p| p.device.whitelist_root = Some([1u8; 32]))),
        ("time.min_interval", Box::new(|p| p.time.min_interval_secs += 1)),
        ("time.max_timestamp", Box::new(|p| p.time.max_timestamp += 1)),
        ("location.radius", Box::new(|p| p.location.authorized.radius_sq += 1)),
        ("location.speed", Box::new(|p| p.location.max_speed_per_hour += 1)),
        ("location.ip_tolerance", Box::new(|p| p.location.ip_tolerance_radius_sq -= 1)),
        ("location.blacklist", Box::new(|p| p.location.blacklisted = None)),
        ("pattern.confidence", Box::new(|p| p.pattern.required_confidence = 60)),
        ("pattern.typing", Box::new(|p| p.pattern.max_typing_speed = 199)),
    ];

    for (name, edit) in edits {
        let changed = snapshot_with(|p| edit(p));
        assert_eq!(changed.version(), original.version());
        assert_ne!(changed.digest(), original.digest(), "{}", name);
        assert!(!verify(&proof, &changed, &nonce), "proof still verified after {} changed", name);
    }
}

#[test]
fn test_nonce_reuse_rejected() {
    let issued = nonce("req-issued");
    let snapshot = snapshot();
    let proof = ContextEngine::new().prove(&full_witness(&issued), &snapshot, &issued).unwrap();

    let other = nonce("req-other");
    let report = verify_with_details(&proof, &snapshot, &other);
    assert!(!report.valid);
    assert!(report.error.is_some());
    assert_eq!(report.proof_id, proof.artifact.audit_id());
}

#[test]
fn test_blank_inputs_rejected_before_proving() {
    assert!(matches!(ChallengeNonce::new(""), Err(ContextError::InvalidNonce)));
    assert!(matches!(ChallengeNonce::new(" \t"), Err(ContextError::InvalidNonce)));

    let nonce = nonce("req-blank");
    let mut device = device_witness(&nonce);
    device.fingerprint = String::new();
    let witness = full_witness(&nonce).with_device(device);

    let err = ContextEngine::new().prove(&witness, &snapshot(), &nonce).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_rate_limited_request_still_proves() {
    let nonce = nonce("req-rate");
    let mut time = time_witness();
    time.previous_timestamp = NOW - 5;
    let witness = full_witness(&nonce).with_time(time);
    let snapshot = snapshot();
    let engine = ContextEngine::new();

    let evaluation = engine.evaluate(&witness, &snapshot, &nonce).unwrap();
    let time_out = evaluation.time.unwrap();
    assert!(!time_out.rate_limit_ok);
    assert!(time_out.in_window);

    // An unsatisfied policy is a valid proof of a negative decision.
    let proof = engine.prove(&witness, &snapshot, &nonce).unwrap();
    assert!(!proof.artifact.timestamp_verified);
    assert!(!proof.artifact.overall_valid);
    assert_eq!(proof.artifact.failed_categories(), vec![Category::Time]);
    // (120 + 0 + 100 + 100) / 4
    assert_eq!(proof.artifact.trust_score, 80);
    assert!(!proof.artifact.verification_level_met);
    assert!(verify(&proof, &snapshot, &nonce));
}

#[test]
fn test_missing_required_context() {
    let nonce = nonce("req-missing");
    let mut witness = full_witness(&nonce);
    witness.location = None;

    let err = ContextEngine::new().prove(&witness, &snapshot(), &nonce).unwrap_err();
    assert!(matches!(err, ContextError::MissingContext(Category::Location)));
}

#[test]
fn test_standard_policy_without_behavior() {
    let nonce = nonce("req-standard");
    let snapshot = snapshot_with(|p| p.access = AccessPolicy::standard());
    let witness = ContextWitness::new()
        .with_device(device_witness(&nonce))
        .with_time(time_witness())
        .with_location(location_witness());

    let proof = ContextEngine::new().prove(&witness, &snapshot, &nonce).unwrap();
    assert!(proof.artifact.overall_valid);
    assert!(!proof.artifact.pattern_verified);
    assert_eq!(proof.artifact.trust_score, 75);
    assert!(proof.artifact.verification_level_met);
    assert!(verify(&proof, &snapshot, &nonce));
}

#[test]
fn test_batch_verify_mixed() {
    let snapshot = snapshot();
    let engine = ContextEngine::new();
    let nonces: Vec<ChallengeNonce> = (0..4).map(|i| nonce(&format!("req-batch-{}", i))).collect();
    let mut proofs: Vec<ContextProof> = nonces
        .iter()
        .map(|n| engine.prove(&full_witness(n), &snapshot, n).unwrap())
        .collect();

    proofs[2].artifact.trust_score = 42;

    let pairs: Vec<(&ContextProof, &ChallengeNonce)> = proofs.iter().zip(nonces.iter()).collect();
    assert_eq!(batch_verify(&pairs, &snapshot), vec![true, true, false, true]);

    #[cfg(feature = "parallel")]
    assert_eq!(
        zk_context::par_batch_verify(&pairs, &snapshot),
        batch_verify(&pairs, &snapshot)
    );
}

#[test]
fn test_store_pins_version_for_each_request() {
    let store = InMemoryPolicyStore::new();
    let key = PolicyKey::new("acme", "payroll");
    store.publish(key.clone(), policy()).unwrap();

    let engine = ContextEngine::new();
    let nonce = nonce("req-store");
    let (pinned, proof) = engine
        .prove_for_key(&store, &key, &full_witness(&nonce), &nonce)
        .unwrap();
    assert_eq!(pinned.version(), 1);

    let mut tightened = policy();
    tightened.time.min_interval_secs = 3_600;
    let latest = store.publish(key.clone(), tightened).unwrap();
    assert_eq!(latest.version(), 2);

    // The proof verifies against its own snapshot only.
    assert!(verify(&proof, &pinned, &nonce));
    assert!(!verify(&proof, &latest, &nonce));

    let witness = full_witness(&nonce).for_policy_version(1);
    let err = engine.prove(&witness, &latest, &nonce).unwrap_err();
    assert!(matches!(err, ContextError::PolicyVersionMismatch { expected: 2, found: 1 }));

    let err = engine
        .prove_for_key(&store, &PolicyKey::new("acme", "unknown"), &full_witness(&nonce), &nonce)
        .unwrap_err();
    assert!(matches!(err, ContextError::UnknownPolicy(_)));
}
