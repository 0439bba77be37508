//! Public types shared between the prover and the relying party.
//!
//! Nothing in this module carries witness data. A [`ContextProof`] is the
//! only object that ever leaves the prover.

use core::fmt;

use bitflags::bitflags;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{ContextError, Result};

/// 32-byte SHA3 commitment.
pub type Commitment = [u8; 32];

/// The four independently verifiable context categories.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Device,
    Time,
    Location,
    Pattern,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Device,
        Category::Time,
        Category::Location,
        Category::Pattern,
    ];

    /// The requirement-mask bit for this category.
    pub fn flag(self) -> RequirementMask {
        match self {
            Category::Device => RequirementMask::DEVICE,
            Category::Time => RequirementMask::TIME,
            Category::Location => RequirementMask::LOCATION,
            Category::Pattern => RequirementMask::PATTERN,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Device => "device",
            Category::Time => "time",
            Category::Location => "location",
            Category::Pattern => "pattern",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Which categories must pass for the context to be valid.
    ///
    /// Bit 0 = device, 1 = time, 2 = location, 3 = pattern.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RequirementMask: u8 {
        const DEVICE = 0b0001;
        const TIME = 0b0010;
        const LOCATION = 0b0100;
        const PATTERN = 0b1000;
    }
}

impl RequirementMask {
    /// True if `category` is mandatory under this mask.
    pub fn requires(self, category: Category) -> bool {
        self.contains(category.flag())
    }
}

/// Policy-selected strictness tier.
///
/// Each level demands a trust score of at least `level × 25`, so
/// [`VerificationLevel::Maximum`] demands a perfect score.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum VerificationLevel {
    Basic = 1,
    Standard = 2,
    High = 3,
    Maximum = 4,
}

impl VerificationLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Minimum trust score this level accepts.
    pub fn min_trust_score(self) -> u8 {
        self.as_u8() * 25
    }
}

impl TryFrom<u8> for VerificationLevel {
    type Error = ContextError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(VerificationLevel::Basic),
            2 => Ok(VerificationLevel::Standard),
            3 => Ok(VerificationLevel::High),
            4 => Ok(VerificationLevel::Maximum),
            other => Err(ContextError::invalid_policy(
                "access.level",
                format!("verification level {} outside 1..=4", other),
            )),
        }
    }
}

impl From<VerificationLevel> for u8 {
    fn from(level: VerificationLevel) -> u8 {
        level.as_u8()
    }
}

/// Maximum latitude magnitude in fixed-point units (degrees × 100).
pub const MAX_LATITUDE: i32 = 9_000;
/// Maximum longitude magnitude in fixed-point units (degrees × 100).
pub const MAX_LONGITUDE: i32 = 18_000;

/// A coordinate in fixed-point degrees × 100.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Zeroize)]
pub struct GeoPoint {
    pub lat: i32,
    pub lon: i32,
}

impl GeoPoint {
    pub const fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// Reject coordinates outside the valid latitude/longitude ranges.
    pub fn validate(&self, field: &'static str) -> Result<()> {
        if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.lat) {
            return Err(ContextError::invalid_input(
                field,
                format!("latitude {} outside ±{}", self.lat, MAX_LATITUDE),
            ));
        }
        if !(-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&self.lon) {
            return Err(ContextError::invalid_input(
                field,
                format!("longitude {} outside ±{}", self.lon, MAX_LONGITUDE),
            ));
        }
        Ok(())
    }

    /// Squared Euclidean distance in fixed-point units.
    ///
    /// Exact for any pair of valid points: the largest possible value
    /// (18 000² + 36 000²) fits comfortably in a `u64`.
    pub fn squared_distance(&self, other: &GeoPoint) -> u64 {
        let dlat = (self.lat as i64 - other.lat as i64).unsigned_abs();
        let dlon = (self.lon as i64 - other.lon as i64).unsigned_abs();
        dlat * dlat + dlon * dlon
    }

    pub(crate) fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.lat.to_le_bytes());
        out[4..].copy_from_slice(&self.lon.to_le_bytes());
        out
    }
}

/// Merkle proof for whitelist membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Sibling hashes along the path to the root
    siblings: Vec<[u8; 32]>,
    /// Index of the leaf in the tree
    leaf_index: usize,
    /// The commitment at this leaf
    leaf_hash: [u8; 32],
}

impl MerkleProof {
    pub fn new(siblings: Vec<[u8; 32]>, leaf_index: usize, leaf_hash: [u8; 32]) -> Self {
        Self { siblings, leaf_index, leaf_hash }
    }

    pub fn siblings(&self) -> &[[u8; 32]] {
        &self.siblings
    }

    pub fn leaf_index(&self) -> usize {
        self.leaf_index
    }

    pub fn leaf_hash(&self) -> &[u8; 32] {
        &self.leaf_hash
    }
}

/// Fresh per-request challenge issued by the relying party.
///
/// Binds a proof to one request so it cannot be replayed for another.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeNonce(Vec<u8>);

impl ChallengeNonce {
    /// Wrap raw nonce bytes. Empty or whitespace-only nonces are rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let nonce = Self(bytes.into());
        nonce.validate()?;
        Ok(nonce)
    }

    /// Deserialized nonces skip [`ChallengeNonce::new`], so the engine
    /// re-checks before use.
    pub fn validate(&self) -> Result<()> {
        if self.0.iter().all(u8::is_ascii_whitespace) {
            return Err(ContextError::InvalidNonce);
        }
        Ok(())
    }

    /// 32 bytes from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ChallengeNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChallengeNonce({})", hex::encode(&self.0))
    }
}

/// The summary handed to the relying party. Never a transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    pub device_verified: bool,
    pub timestamp_verified: bool,
    pub location_verified: bool,
    pub pattern_verified: bool,
    pub overall_valid: bool,
    pub trust_score: u8,
    pub verification_level_met: bool,
    /// Binds all verdicts, the nonce and the policy version.
    #[serde(with = "crate::utils::serde_hex")]
    pub audit_commitment: Commitment,
}

impl ProofArtifact {
    /// Verdict for a single category.
    pub fn verdict(&self, category: Category) -> bool {
        match category {
            Category::Device => self.device_verified,
            Category::Time => self.timestamp_verified,
            Category::Location => self.location_verified,
            Category::Pattern => self.pattern_verified,
        }
    }

    /// Categories whose verdict is false, regardless of requirement.
    pub fn failed_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| !self.verdict(*c))
            .collect()
    }

    /// Hex form of the audit commitment, the key an audit service stores it under.
    pub fn audit_id(&self) -> String {
        hex::encode(self.audit_commitment)
    }
}

/// Number of entries in the public-signal vector.
pub const NUM_PUBLIC_SIGNALS: usize = 10;

/// Public-signal vector consumed by third-party verification.
///
/// Layout: `[device, time, location, pattern, overall, trust_score,
/// level_met, level, mask, risk_score]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    pub device: bool,
    pub time: bool,
    pub location: bool,
    pub pattern: bool,
    pub overall: bool,
    pub trust_score: u8,
    pub level_met: bool,
    pub level: VerificationLevel,
    pub mask: RequirementMask,
    pub risk_score: u8,
}

impl PublicSignals {
    pub fn to_vec(&self) -> Vec<u64> {
        vec![
            self.device as u64,
            self.time as u64,
            self.location as u64,
            self.pattern as u64,
            self.overall as u64,
            self.trust_score as u64,
            self.level_met as u64,
            self.level.as_u8() as u64,
            self.mask.bits() as u64,
            self.risk_score as u64,
        ]
    }

    /// Decode a signal vector, rejecting wrong lengths and non-boolean verdicts.
    pub fn from_slice(signals: &[u64]) -> Result<Self> {
        if signals.len() != NUM_PUBLIC_SIGNALS {
            return Err(ContextError::MalformedProof {
                reason: format!(
                    "expected {} public signals, got {}",
                    NUM_PUBLIC_SIGNALS,
                    signals.len()
                ),
            });
        }

        let bit = |idx: usize| -> Result<bool> {
            match signals[idx] {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(ContextError::MalformedProof {
                    reason: format!("signal {} is not boolean: {}", idx, other),
                }),
            }
        };
        let byte = |idx: usize| -> Result<u8> {
            u8::try_from(signals[idx]).map_err(|_| ContextError::MalformedProof {
                reason: format!("signal {} out of range: {}", idx, signals[idx]),
            })
        };

        let mask = RequirementMask::from_bits(byte(8)?).ok_or_else(|| ContextError::MalformedProof {
            reason: format!("unknown requirement bits: {:#06b}", signals[8]),
        })?;

        Ok(Self {
            device: bit(0)?,
            time: bit(1)?,
            location: bit(2)?,
            pattern: bit(3)?,
            overall: bit(4)?,
            trust_score: byte(5)?,
            level_met: bit(6)?,
            level: VerificationLevel::try_from(byte(7)?)?,
            mask,
            risk_score: byte(9)?,
        })
    }

    /// Bytes fed to the public-inputs hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_vec()
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }
}

/// Opaque proof produced by a [`ProvingBackend`](crate::proof::ProvingBackend).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProof {
    /// Serialized proof bytes
    pub(crate) proof_bytes: Vec<u8>,
    /// Commitment to the public statement
    pub(crate) public_inputs_hash: [u8; 32],
}

impl ZkProof {
    pub fn new(proof_bytes: Vec<u8>, public_inputs_hash: [u8; 32]) -> Self {
        Self { proof_bytes, public_inputs_hash }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.proof_bytes
    }

    pub fn public_inputs_hash(&self) -> &[u8; 32] {
        &self.public_inputs_hash
    }

    pub fn size(&self) -> usize {
        self.proof_bytes.len()
    }
}

/// Everything the relying party receives for one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextProof {
    pub artifact: ProofArtifact,
    pub public_signals: Vec<u64>,
    /// Policy version the prover pinned.
    pub policy_version: u64,
    pub proof: ZkProof,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signals() -> PublicSignals {
        PublicSignals {
            device: true,
            time: false,
            location: true,
            pattern: true,
            overall: false,
            trust_score: 77,
            level_met: true,
            level: VerificationLevel::High,
            mask: RequirementMask::DEVICE | RequirementMask::TIME,
            risk_score: 12,
        }
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(VerificationLevel::Basic.min_trust_score(), 25);
        assert_eq!(VerificationLevel::Standard.min_trust_score(), 50);
        assert_eq!(VerificationLevel::High.min_trust_score(), 75);
        assert_eq!(VerificationLevel::Maximum.min_trust_score(), 100);
    }

    #[test]
    fn test_level_out_of_range() {
        assert!(VerificationLevel::try_from(0).is_err());
        assert!(VerificationLevel::try_from(5).is_err());
    }

    #[test]
    fn test_mask_bits_match_categories() {
        assert_eq!(RequirementMask::DEVICE.bits(), 1);
        assert_eq!(RequirementMask::TIME.bits(), 2);
        assert_eq!(RequirementMask::LOCATION.bits(), 4);
        assert_eq!(RequirementMask::PATTERN.bits(), 8);
        assert!(RequirementMask::all().requires(Category::Pattern));
        assert!(!RequirementMask::DEVICE.requires(Category::Time));
    }

    #[test]
    fn test_nonce_rejects_empty_and_whitespace() {
        assert!(matches!(ChallengeNonce::new(Vec::new()), Err(ContextError::InvalidNonce)));
        assert!(matches!(ChallengeNonce::new(" \t\n"), Err(ContextError::InvalidNonce)));
        assert!(ChallengeNonce::new("n-1").is_ok());
        assert_ne!(ChallengeNonce::random(), ChallengeNonce::random());
    }

    #[test]
    fn test_public_signals_layout() {
        let signals = sample_signals();
        let vec = signals.to_vec();
        assert_eq!(vec, vec![1, 0, 1, 1, 0, 77, 1, 3, 3, 12]);
        assert_eq!(PublicSignals::from_slice(&vec).unwrap(), signals);
    }

    #[test]
    fn test_public_signals_reject_non_boolean() {
        let mut vec = sample_signals().to_vec();
        vec[0] = 2;
        assert!(PublicSignals::from_slice(&vec).is_err());
        assert!(PublicSignals::from_slice(&vec[..9]).is_err());
    }

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(9_000, -18_000).validate("p").is_ok());
        assert!(GeoPoint::new(9_001, 0).validate("p").is_err());
        assert!(GeoPoint::new(0, 18_001).validate("p").is_err());
    }

    #[test]
    fn test_squared_distance() {
        let a = GeoPoint::new(0, 0);
        let b = GeoPoint::new(300, -400);
        assert_eq!(a.squared_distance(&b), 250_000);
        assert_eq!(b.squared_distance(&a), 250_000);
        let far = GeoPoint::new(-9_000, -18_000).squared_distance(&GeoPoint::new(9_000, 18_000));
        assert_eq!(far, 18_000u64 * 18_000 + 36_000u64 * 36_000);
    }

    #[test]
    fn test_failed_categories() {
        let artifact = ProofArtifact {
            device_verified: true,
            timestamp_verified: false,
            location_verified: true,
            pattern_verified: false,
            overall_valid: false,
            trust_score: 40,
            verification_level_met: true,
            audit_commitment: [0u8; 32],
        };
        assert_eq!(artifact.failed_categories(), vec![Category::Time, Category::Pattern]);
    }
}
