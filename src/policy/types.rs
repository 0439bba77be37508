//! Public policy parameters.
//!
//! Supplied by the external policy store per tenant and resource, loaded
//! from JSON, and validated before any circuit sees them.

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, Result};
use crate::types::{Commitment, GeoPoint, RequirementMask, VerificationLevel};
use crate::utils::commit;

const POLICY_DIGEST_TAG: &[u8] = b"zkctx/policy-digest/v1";

/// Device attestation policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePolicy {
    /// Expected `H(fingerprint || salt)`.
    #[serde(with = "crate::utils::serde_hex")]
    pub expected_commitment: Commitment,
    #[serde(with = "crate::utils::serde_hex")]
    pub signer_public_key: Commitment,
    /// Merkle root of whitelisted device commitments; `None` disables the check.
    #[serde(default, with = "crate::utils::serde_hex::option")]
    pub whitelist_root: Option<Commitment>,
    /// Revoked device commitments.
    #[serde(default, with = "crate::utils::serde_hex::vec")]
    pub revoked_commitments: Vec<Commitment>,
}

/// Access-time policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePolicy {
    pub min_timestamp: i64,
    pub max_timestamp: i64,
    /// Minimum seconds between consecutive accesses.
    pub min_interval_secs: i64,
    /// Local hour the business window opens (inclusive).
    pub business_hours_start: u8,
    /// Local hour the business window closes (exclusive).
    pub business_hours_end: u8,
    pub rolling_code_step_secs: u32,
    pub expected_rolling_code: u32,
    #[serde(default)]
    pub require_business_hours: bool,
    #[serde(default)]
    pub require_rolling_code: bool,
}

/// Circular region with a squared radius in fixed-point units².
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub center: GeoPoint,
    pub radius_sq: u64,
}

impl Region {
    pub const fn new(center: GeoPoint, radius_sq: u64) -> Self {
        Self { center, radius_sq }
    }
}

/// Geographic policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationPolicy {
    pub authorized: Region,
    #[serde(default)]
    pub blacklisted: Option<Region>,
    /// Fixed-point units per hour.
    pub max_speed_per_hour: u64,
    pub ip_tolerance_radius_sq: u64,
    #[serde(default)]
    pub require_ip_consistency: bool,
}

/// Behavioral policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternPolicy {
    /// Baseline commitment from the behavior-learning subsystem.
    #[serde(with = "crate::utils::serde_hex")]
    pub expected_commitment: Commitment,
    pub min_session_secs: i64,
    pub max_session_secs: i64,
    pub min_typing_speed: u32,
    pub max_typing_speed: u32,
    /// Largest accepted mean absolute deviation of timing intervals (ms).
    pub max_timing_variance: u64,
    /// Risk must stay strictly below this.
    pub risk_threshold: u8,
    /// Minimum `100 - risk` reported as `confidence_ok`.
    pub required_confidence: u8,
}

/// Requirement mask and strictness tier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub requirements: RequirementMask,
    pub level: VerificationLevel,
}

impl AccessPolicy {
    /// Device only, basic level. For low-sensitivity operations.
    pub fn device_only() -> Self {
        Self {
            requirements: RequirementMask::DEVICE,
            level: VerificationLevel::Basic,
        }
    }

    /// Device, time and location at the standard level.
    pub fn standard() -> Self {
        Self {
            requirements: RequirementMask::DEVICE | RequirementMask::TIME | RequirementMask::LOCATION,
            level: VerificationLevel::Standard,
        }
    }

    /// Every category, perfect score required.
    pub fn maximum() -> Self {
        Self {
            requirements: RequirementMask::all(),
            level: VerificationLevel::Maximum,
        }
    }
}

/// Complete public parameter bundle for one tenant/resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyParameters {
    pub version: u64,
    pub device: DevicePolicy,
    pub time: TimePolicy,
    pub location: LocationPolicy,
    pub pattern: PatternPolicy,
    pub access: AccessPolicy,
}

impl PolicyParameters {
    /// Parse and validate a JSON policy document.
    pub fn from_json(document: &str) -> Result<Self> {
        let params: PolicyParameters = serde_json::from_str(document)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// SHA3 digest over the canonical encoding. Any field change alters it.
    pub fn digest(&self) -> Result<Commitment> {
        let encoded = serde_json::to_vec(self)?;
        Ok(commit(POLICY_DIGEST_TAG, &[&encoded]))
    }

    /// Structural sanity checks.
    pub fn validate(&self) -> Result<()> {
        let t = &self.time;
        if t.min_timestamp > t.max_timestamp {
            return Err(ContextError::invalid_policy(
                "time.min_timestamp",
                "allowed range is empty (min > max)",
            ));
        }
        if t.min_interval_secs < 0 {
            return Err(ContextError::invalid_policy("time.min_interval_secs", "negative interval"));
        }
        if t.business_hours_start > 23 || t.business_hours_end > 24 {
            return Err(ContextError::invalid_policy(
                "time.business_hours",
                format!("hours {}..{} outside 0..=24", t.business_hours_start, t.business_hours_end),
            ));
        }
        if t.rolling_code_step_secs == 0 {
            return Err(ContextError::invalid_policy("time.rolling_code_step_secs", "step must be non-zero"));
        }

        let l = &self.location;
        l.authorized.center.validate("location.authorized.center").map_err(as_policy_error)?;
        if let Some(blacklisted) = &l.blacklisted {
            blacklisted.center.validate("location.blacklisted.center").map_err(as_policy_error)?;
        }

        let p = &self.pattern;
        if p.min_session_secs > p.max_session_secs {
            return Err(ContextError::invalid_policy("pattern.session_bounds", "min > max"));
        }
        if p.min_typing_speed > p.max_typing_speed {
            return Err(ContextError::invalid_policy("pattern.typing_bounds", "min > max"));
        }
        if p.max_timing_variance == 0 {
            return Err(ContextError::invalid_policy("pattern.max_timing_variance", "must be non-zero"));
        }
        if p.risk_threshold > 100 || p.required_confidence > 100 {
            return Err(ContextError::invalid_policy(
                "pattern.risk_threshold",
                "risk threshold and confidence are percentages",
            ));
        }

        if !RequirementMask::all().contains(self.access.requirements) {
            return Err(ContextError::invalid_policy(
                "access.requirements",
                format!("unknown requirement bits {:#06b}", self.access.requirements.bits()),
            ));
        }
        Ok(())
    }
}

fn as_policy_error(err: ContextError) -> ContextError {
    match err {
        ContextError::InvalidInput { field, reason } => ContextError::InvalidPolicy { field, reason },
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_policy() -> PolicyParameters {
        PolicyParameters {
            version: 1,
            device: DevicePolicy {
                expected_commitment: [1u8; 32],
                signer_public_key: [2u8; 32],
                whitelist_root: None,
                revoked_commitments: vec![[9u8; 32]],
            },
            time: TimePolicy {
                min_timestamp: 0,
                max_timestamp: 4_000_000_000,
                min_interval_secs: 60,
                business_hours_start: 9,
                business_hours_end: 17,
                rolling_code_step_secs: 30,
                expected_rolling_code: 0,
                require_business_hours: false,
                require_rolling_code: false,
            },
            location: LocationPolicy {
                authorized: Region::new(GeoPoint::new(4_071, -7_400), 10_000),
                blacklisted: Some(Region::new(GeoPoint::new(5_575, 3_761), 2_500)),
                max_speed_per_hour: 500,
                ip_tolerance_radius_sq: 40_000,
                require_ip_consistency: true,
            },
            pattern: PatternPolicy {
                expected_commitment: [3u8; 32],
                min_session_secs: 60,
                max_session_secs: 14_400,
                min_typing_speed: 10,
                max_typing_speed: 200,
                max_timing_variance: 300,
                risk_threshold: 30,
                required_confidence: 70,
            },
            access: AccessPolicy::maximum(),
        }
    }

    #[test]
    fn test_json_round_trip_uses_hex() {
        let policy = sample_policy();
        let json = policy.to_json().unwrap();
        assert!(json.contains(&hex::encode([1u8; 32])));
        assert_eq!(PolicyParameters::from_json(&json).unwrap(), policy);
    }

    #[test]
    fn test_digest_changes_with_any_field() {
        let policy = sample_policy();
        let mut changed = policy.clone();
        changed.location.authorized.radius_sq += 1;
        assert_ne!(policy.digest().unwrap(), changed.digest().unwrap());
    }

    #[test]
    fn test_zero_rolling_step_rejected() {
        let mut policy = sample_policy();
        policy.time.rolling_code_step_secs = 0;
        assert!(matches!(
            policy.validate(),
            Err(ContextError::InvalidPolicy { field: "time.rolling_code_step_secs", .. })
        ));
    }

    #[test]
    fn test_zero_timing_variance_rejected() {
        let mut policy = sample_policy();
        policy.pattern.max_timing_variance = 0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_bad_region_center_is_policy_error() {
        let mut policy = sample_policy();
        policy.location.authorized.center = GeoPoint::new(0, 20_000);
        assert!(matches!(policy.validate(), Err(ContextError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_level_out_of_range_in_json() {
        let mut value = serde_json::to_value(sample_policy()).unwrap();
        value["access"]["level"] = serde_json::json!(7);
        assert!(PolicyParameters::from_json(&value.to_string()).is_err());
    }
}
