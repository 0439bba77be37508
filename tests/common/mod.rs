//! Shared fixtures: one tenant policy and a witness that satisfies all of it.
#![allow(dead_code)]

use zk_context::{
    behavior_commitment, device_commitment, rolling_code, time_step, AccessPolicy, BehaviorWitness,
    ChallengeNonce, ContextWitness, DevicePolicy, DeviceSigningKey, DeviceWitness, GeoPoint,
    LocationPolicy, LocationWitness, PatternPolicy, PolicyParameters, PolicySnapshot, Region,
    TimePolicy, TimeWitness,
};

/// 2024-01-15 12:00:00 UTC
pub const NOW: i64 = 1_705_320_000;
pub const FINGERPRINT: &str = "tpm:fixture-0001";
pub const DEVICE_SALT: [u8; 32] = [5u8; 32];
pub const ROLLING_SEED: [u8; 32] = [4u8; 32];
pub const STEP_SECS: u32 = 30;

pub const OFFICE: GeoPoint = GeoPoint::new(4_071, -7_400);
pub const OFFICE_RADIUS_SQ: u64 = 10_000;
pub const BLOCKED: GeoPoint = GeoPoint::new(5_575, 3_761);
pub const BLOCKED_RADIUS_SQ: u64 = 2_500;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn signing_key() -> DeviceSigningKey {
    DeviceSigningKey::from_bytes([7u8; 32])
}

pub fn nonce(label: &str) -> ChallengeNonce {
    ChallengeNonce::new(label).unwrap()
}

pub fn device_witness(nonce: &ChallengeNonce) -> DeviceWitness {
    let key = signing_key();
    DeviceWitness {
        fingerprint: FINGERPRINT.to_string(),
        salt: DEVICE_SALT,
        signature: key.sign(FINGERPRINT, nonce),
        signer_secret: key.secret_bytes(),
        whitelist_proof: None,
    }
}

pub fn time_witness() -> TimeWitness {
    TimeWitness {
        current_timestamp: NOW,
        previous_timestamp: NOW - 600,
        timezone_offset_secs: 0,
        rolling_seed: ROLLING_SEED,
    }
}

pub fn location_witness() -> LocationWitness {
    LocationWitness {
        current: OFFICE,
        previous: GeoPoint::new(4_050, -7_380),
        ip_derived: GeoPoint::new(4_080, -7_410),
        travel_time_hours: 1,
    }
}

pub fn behavior_witness() -> BehaviorWitness {
    BehaviorWitness {
        actions: [3, 1, 4, 1, 5, 9, 2, 6, 5, 3],
        timing_intervals: [250; 9],
        session_duration_secs: 900,
        typing_speed: 55,
        pointer_activity: 12,
        access_frequency: 4,
        salt: [8u8; 32],
    }
}

pub fn full_witness(nonce: &ChallengeNonce) -> ContextWitness {
    ContextWitness::new()
        .with_device(device_witness(nonce))
        .with_time(time_witness())
        .with_location(location_witness())
        .with_behavior(behavior_witness())
}

pub fn device_policy() -> DevicePolicy {
    DevicePolicy {
        expected_commitment: device_commitment(FINGERPRINT, &DEVICE_SALT),
        signer_public_key: signing_key().public_key(),
        whitelist_root: None,
        revoked_commitments: vec![[0xEE; 32]],
    }
}

pub fn time_policy() -> TimePolicy {
    TimePolicy {
        min_timestamp: NOW - 86_400,
        max_timestamp: NOW + 86_400,
        min_interval_secs: 60,
        business_hours_start: 9,
        business_hours_end: 17,
        rolling_code_step_secs: STEP_SECS,
        expected_rolling_code: rolling_code(&ROLLING_SEED, time_step(NOW, STEP_SECS)),
        require_business_hours: true,
        require_rolling_code: true,
    }
}

pub fn location_policy() -> LocationPolicy {
    LocationPolicy {
        authorized: Region::new(OFFICE, OFFICE_RADIUS_SQ),
        blacklisted: Some(Region::new(BLOCKED, BLOCKED_RADIUS_SQ)),
        max_speed_per_hour: 500,
        ip_tolerance_radius_sq: 40_000,
        require_ip_consistency: true,
    }
}

pub fn pattern_policy() -> PatternPolicy {
    PatternPolicy {
        expected_commitment: behavior_commitment(&behavior_witness()),
        min_session_secs: 60,
        max_session_secs: 14_400,
        min_typing_speed: 10,
        max_typing_speed: 200,
        max_timing_variance: 300,
        risk_threshold: 30,
        required_confidence: 70,
    }
}

/// Every category required at the maximum level.
pub fn policy() -> PolicyParameters {
    PolicyParameters {
        version: 1,
        device: device_policy(),
        time: time_policy(),
        location: location_policy(),
        pattern: pattern_policy(),
        access: AccessPolicy::maximum(),
    }
}

pub fn snapshot() -> PolicySnapshot {
    PolicySnapshot::new(policy()).unwrap()
}

pub fn snapshot_with(edit: impl FnOnce(&mut PolicyParameters)) -> PolicySnapshot {
    let mut params = policy();
    edit(&mut params);
    PolicySnapshot::new(params).unwrap()
}
