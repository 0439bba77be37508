//! Basic example of a zero-trust context check.
//!
//! A laptop at the office proves device, time, location and behavior
//! against a tenant policy; the relying party verifies the artifact.
//!
//! Run with: RUST_LOG=zk_context=info cargo run --example basic

use tracing_subscriber::EnvFilter;
use zk_context::{
    behavior_commitment, device_commitment, rolling_code, time_step, verify, verify_with_details, AccessPolicy,
    BehaviorWitness, ChallengeNonce, ContextEngine, ContextWitness, DevicePolicy, DeviceSigningKey, DeviceWitness,
    GeoPoint, InMemoryPolicyStore, LocationPolicy, LocationWitness, PatternPolicy, PolicyKey, PolicyParameters,
    Region, TimePolicy, TimeWitness, VerificationLevel,
};

const FINGERPRINT: &str = "tpm:laptop-7f3a";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          zk-context: Context Verification Demo             ║");
    println!("║   Device • Time Window • Location Chain • Behavior         ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    // 2024-01-15 12:00:00 UTC
    let now: i64 = 1_705_320_000;
    let device_salt = [5u8; 32];
    let rolling_seed = [4u8; 32];
    let identity_service = DeviceSigningKey::generate();

    let behavior = BehaviorWitness {
        actions: [3, 1, 4, 1, 5, 9, 2, 6, 5, 3],
        timing_intervals: [240, 260, 250, 250, 255, 245, 250, 250, 250],
        session_duration_secs: 900,
        typing_speed: 55,
        pointer_activity: 12,
        access_frequency: 4,
        salt: [8u8; 32],
    };

    // Step 1: Publish the tenant policy
    println!("📋 Step 1: Publishing policy for acme/payroll...");
    let params = PolicyParameters {
        version: 0,
        device: DevicePolicy {
            expected_commitment: device_commitment(FINGERPRINT, &device_salt),
            signer_public_key: identity_service.public_key(),
            whitelist_root: None,
            revoked_commitments: Vec::new(),
        },
        time: TimePolicy {
            min_timestamp: now - 86_400,
            max_timestamp: now + 86_400,
            min_interval_secs: 60,
            business_hours_start: 9,
            business_hours_end: 17,
            rolling_code_step_secs: 30,
            expected_rolling_code: rolling_code(&rolling_seed, time_step(now, 30)),
            require_business_hours: true,
            require_rolling_code: true,
        },
        location: LocationPolicy {
            authorized: Region::new(GeoPoint::new(4_071, -7_400), 10_000),
            blacklisted: Some(Region::new(GeoPoint::new(5_575, 3_761), 2_500)),
            max_speed_per_hour: 500,
            ip_tolerance_radius_sq: 40_000,
            require_ip_consistency: true,
        },
        pattern: PatternPolicy {
            expected_commitment: behavior_commitment(&behavior),
            min_session_secs: 60,
            max_session_secs: 14_400,
            min_typing_speed: 10,
            max_typing_speed: 200,
            max_timing_variance: 300,
            risk_threshold: 30,
            required_confidence: 70,
        },
        access: AccessPolicy::maximum(),
    };

    let store = InMemoryPolicyStore::new();
    let key = PolicyKey::new("acme", "payroll");
    let snapshot = store.publish(key.clone(), params).expect("policy should be valid");
    println!("   ✓ Version: {}", snapshot.version());
    println!("   ✓ Digest: 0x{}...", hex::encode(&snapshot.digest()[..8]));
    println!("   ✓ Level: {:?} (trust ≥ {})", snapshot.access.level, snapshot.access.level.min_trust_score());
    println!();

    // Step 2: Relying party issues a challenge, the device assembles its witness
    println!("🔑 Step 2: Assembling private witness...");
    let nonce = ChallengeNonce::random();
    let witness = ContextWitness::new()
        .with_device(DeviceWitness {
            fingerprint: FINGERPRINT.to_string(),
            salt: device_salt,
            signature: identity_service.sign(FINGERPRINT, &nonce),
            signer_secret: identity_service.secret_bytes(),
            whitelist_proof: None,
        })
        .with_time(TimeWitness {
            current_timestamp: now,
            previous_timestamp: now - 600,
            timezone_offset_secs: 0,
            rolling_seed,
        })
        .with_location(LocationWitness {
            current: GeoPoint::new(4_071, -7_400),
            previous: GeoPoint::new(4_050, -7_380),
            ip_derived: GeoPoint::new(4_080, -7_410),
            travel_time_hours: 1,
        })
        .with_behavior(behavior)
        .for_policy_version(snapshot.version());
    println!("   ✓ Witness: {:?}", witness);
    println!();

    // Step 3: Prove
    println!("🔗 Step 3: Generating context proof...");
    let engine = ContextEngine::new();
    let start = std::time::Instant::now();
    let (pinned, proof) = engine
        .prove_for_key(&store, &key, &witness, &nonce)
        .expect("proof generation should succeed");
    let prove_time = start.elapsed();

    let artifact = &proof.artifact;
    println!("   • Device:   {}", mark(artifact.device_verified));
    println!("   • Time:     {}", mark(artifact.timestamp_verified));
    println!("   • Location: {}", mark(artifact.location_verified));
    println!("   • Pattern:  {}", mark(artifact.pattern_verified));
    println!("   ✓ Trust score: {}", artifact.trust_score);
    println!("   ✓ Audit: 0x{}...", &artifact.audit_id()[..16]);
    println!("   ✓ Proof size: {} bytes", proof.proof.size());
    println!("   ⏱ Prove time: {:?}", prove_time);
    println!();

    // Step 4: Verify
    println!("✅ Step 4: Verifying...");
    let report = verify_with_details(&proof, &pinned, &nonce);
    println!("   Result: {}", if report.valid { "✓ VALID" } else { "✗ INVALID" });
    println!("   ⏱ Verification time: {:?}", report.elapsed);
    println!();

    // Demonstrate tamper detection
    println!("🔒 Security Demonstration:");

    let replay = ChallengeNonce::random();
    println!("   • Replayed under a new nonce: {}", rejected(!verify(&proof, &pinned, &replay)));

    let mut inflated = proof.clone();
    inflated.artifact.trust_score = 100;
    inflated.artifact.pattern_verified = !inflated.artifact.pattern_verified;
    println!("   • Edited artifact: {}", rejected(!verify(&inflated, &pinned, &nonce)));

    let mut tightened = pinned.params().clone();
    tightened.time.min_interval_secs = 3_600;
    let newer = store.publish(key, tightened).expect("policy should be valid");
    println!("   • Checked against policy v{}: {}", newer.version(), rejected(!verify(&proof, &newer, &nonce)));
    println!();

    println!("📊 Verification Levels:");
    for level in [
        VerificationLevel::Basic,
        VerificationLevel::Standard,
        VerificationLevel::High,
        VerificationLevel::Maximum,
    ] {
        println!("   Level {}: trust ≥ {:>3} - {:?}", level.as_u8(), level.min_trust_score(), level);
    }
    println!();

    assert!(report.valid, "Proof should be valid");
    println!("🎉 Demo completed successfully!");
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

fn rejected(ok: bool) -> &'static str {
    if ok {
        "✓ Rejected"
    } else {
        "✗ Accepted!"
    }
}
