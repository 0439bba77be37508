//! Private witness bundle.
//!
//! Built fresh per request by the device/edge agent, consumed by proof
//! generation and zeroized on drop. `Debug` is redacted on every type so a
//! stray `{:?}` cannot leak attributes into logs.

use core::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{ContextError, Result};
use crate::types::{Category, GeoPoint, MerkleProof};

/// Length of the recent action sequence.
pub const ACTION_SEQUENCE_LEN: usize = 10;
/// Length of the inter-action timing vector.
pub const TIMING_INTERVALS_LEN: usize = ACTION_SEQUENCE_LEN - 1;

/// Largest timezone offset accepted, in seconds (UTC±14:00).
pub const MAX_TIMEZONE_OFFSET_SECS: i32 = 14 * 3600;

/// Latest timestamp accepted: 9999-12-31T23:59:59Z.
pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

/// Device attestation secrets.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DeviceWitness {
    pub fingerprint: String,
    pub salt: [u8; 32],
    /// Signature issued by the identity service over fingerprint + nonce.
    pub signature: [u8; 32],
    /// Signer key material the signature binding is recomputed from.
    pub signer_secret: [u8; 32],
    /// Membership path into the policy whitelist, if one is configured.
    #[zeroize(skip)]
    pub whitelist_proof: Option<MerkleProof>,
}

impl DeviceWitness {
    pub fn validate(&self) -> Result<()> {
        if self.fingerprint.trim().is_empty() {
            return Err(ContextError::invalid_input(
                "device.fingerprint",
                "empty or whitespace-only fingerprint",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for DeviceWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceWitness").finish_non_exhaustive()
    }
}

/// Timing secrets.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TimeWitness {
    /// Unix seconds.
    pub current_timestamp: i64,
    /// Unix seconds of the previous access.
    pub previous_timestamp: i64,
    pub timezone_offset_secs: i32,
    pub rolling_seed: [u8; 32],
}

impl TimeWitness {
    pub fn validate(&self) -> Result<()> {
        if self.current_timestamp < 0 {
            return Err(ContextError::invalid_input(
                "time.current_timestamp",
                "timestamp before the unix epoch",
            ));
        }
        if self.current_timestamp > MAX_TIMESTAMP {
            return Err(ContextError::invalid_input(
                "time.current_timestamp",
                format!("timestamp beyond {}", MAX_TIMESTAMP),
            ));
        }
        if self.previous_timestamp < 0 {
            return Err(ContextError::invalid_input(
                "time.previous_timestamp",
                "timestamp before the unix epoch",
            ));
        }
        if self.previous_timestamp > self.current_timestamp {
            return Err(ContextError::invalid_input(
                "time.previous_timestamp",
                "previous access is after the current one (negative interval)",
            ));
        }
        if self.timezone_offset_secs.abs() > MAX_TIMEZONE_OFFSET_SECS {
            return Err(ContextError::invalid_input(
                "time.timezone_offset_secs",
                format!("offset {} beyond ±{}", self.timezone_offset_secs, MAX_TIMEZONE_OFFSET_SECS),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TimeWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeWitness").finish_non_exhaustive()
    }
}

/// Geographic secrets.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocationWitness {
    pub current: GeoPoint,
    pub previous: GeoPoint,
    /// Position derived from the client IP address.
    pub ip_derived: GeoPoint,
    pub travel_time_hours: i64,
}

impl LocationWitness {
    pub fn validate(&self) -> Result<()> {
        self.current.validate("location.current")?;
        self.previous.validate("location.previous")?;
        self.ip_derived.validate("location.ip_derived")?;
        if self.travel_time_hours < 0 {
            return Err(ContextError::invalid_input(
                "location.travel_time_hours",
                "negative travel time",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for LocationWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationWitness").finish_non_exhaustive()
    }
}

/// Behavioral telemetry.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BehaviorWitness {
    pub actions: [u32; ACTION_SEQUENCE_LEN],
    /// Milliseconds between consecutive actions.
    pub timing_intervals: [u64; TIMING_INTERVALS_LEN],
    pub session_duration_secs: i64,
    /// Keystrokes per minute.
    pub typing_speed: u32,
    pub pointer_activity: u32,
    pub access_frequency: u32,
    pub salt: [u8; 32],
}

impl BehaviorWitness {
    pub fn validate(&self) -> Result<()> {
        if self.session_duration_secs < 0 {
            return Err(ContextError::invalid_input(
                "pattern.session_duration_secs",
                "negative session duration",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for BehaviorWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorWitness").finish_non_exhaustive()
    }
}

/// The full private bundle for one request.
///
/// Any category may be absent; absence is only an error when the policy
/// mask requires that category.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct ContextWitness {
    pub device: Option<DeviceWitness>,
    pub time: Option<TimeWitness>,
    pub location: Option<LocationWitness>,
    pub behavior: Option<BehaviorWitness>,
    /// Policy version this witness was assembled for, if the caller pinned one.
    #[zeroize(skip)]
    pub policy_version: Option<u64>,
}

impl ContextWitness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: DeviceWitness) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_time(mut self, time: TimeWitness) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_location(mut self, location: LocationWitness) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_behavior(mut self, behavior: BehaviorWitness) -> Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn for_policy_version(mut self, version: u64) -> Self {
        self.policy_version = Some(version);
        self
    }

    pub fn has(&self, category: Category) -> bool {
        match category {
            Category::Device => self.device.is_some(),
            Category::Time => self.time.is_some(),
            Category::Location => self.location.is_some(),
            Category::Pattern => self.behavior.is_some(),
        }
    }

    /// Validate every present category.
    pub fn validate(&self) -> Result<()> {
        if let Some(device) = &self.device {
            device.validate()?;
        }
        if let Some(time) = &self.time {
            time.validate()?;
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        if let Some(behavior) = &self.behavior {
            behavior.validate()?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContextWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextWitness")
            .field("device", &self.device.is_some())
            .field("time", &self.time.is_some())
            .field("location", &self.location.is_some())
            .field("behavior", &self.behavior.is_some())
            .field("policy_version", &self.policy_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(fingerprint: &str) -> DeviceWitness {
        DeviceWitness {
            fingerprint: fingerprint.to_string(),
            salt: [1u8; 32],
            signature: [2u8; 32],
            signer_secret: [3u8; 32],
            whitelist_proof: None,
        }
    }

    #[test]
    fn test_empty_fingerprint_rejected() {
        for fp in ["", "   ", "\t\n"] {
            let err = device(fp).validate().unwrap_err();
            assert!(matches!(err, ContextError::InvalidInput { field: "device.fingerprint", .. }));
        }
        assert!(device("fp-001").validate().is_ok());
    }

    #[test]
    fn test_negative_interval_rejected() {
        let time = TimeWitness {
            current_timestamp: 1_000,
            previous_timestamp: 2_000,
            timezone_offset_secs: 0,
            rolling_seed: [0u8; 32],
        };
        assert!(matches!(
            time.validate(),
            Err(ContextError::InvalidInput { field: "time.previous_timestamp", .. })
        ));
    }

    #[test]
    fn test_timestamps_outside_epoch_range_rejected() {
        let mut time = TimeWitness {
            current_timestamp: 10,
            previous_timestamp: i64::MIN,
            timezone_offset_secs: 0,
            rolling_seed: [0u8; 32],
        };
        assert!(matches!(
            time.validate(),
            Err(ContextError::InvalidInput { field: "time.previous_timestamp", .. })
        ));

        time.previous_timestamp = 0;
        time.current_timestamp = MAX_TIMESTAMP + 1;
        assert!(matches!(
            time.validate(),
            Err(ContextError::InvalidInput { field: "time.current_timestamp", .. })
        ));

        time.current_timestamp = MAX_TIMESTAMP;
        assert!(time.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let location = LocationWitness {
            current: GeoPoint::new(9_500, 0),
            previous: GeoPoint::default(),
            ip_derived: GeoPoint::default(),
            travel_time_hours: 1,
        };
        assert!(matches!(
            location.validate(),
            Err(ContextError::InvalidInput { field: "location.current", .. })
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let witness = ContextWitness::new().with_device(device("secret-fingerprint"));
        let rendered = format!("{:?}", witness);
        assert!(!rendered.contains("secret-fingerprint"));
        assert!(rendered.contains("device: true"));
    }
}
