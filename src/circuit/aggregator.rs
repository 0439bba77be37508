//! Context aggregator.
//!
//! Composes the four category verdicts under the requirement mask, derives
//! the trust score, gates it on the verification level and emits the audit
//! commitment. Arithmetic range violations abort; nothing is clamped.

use tracing::debug;

use crate::circuit::gadgets::{all, leq, Bit};
use crate::error::{ContextError, Result};
use crate::policy::AccessPolicy;
use crate::types::{
    Category, ChallengeNonce, Commitment, ProofArtifact, PublicSignals, RequirementMask, VerificationLevel,
};
use crate::utils::commit;

const AUDIT_TAG: &[u8] = b"zkctx/audit/v1";

// Weights ×4 so the score stays integral: 0.30, 0.20, 0.25, 0.25.
const DEVICE_WEIGHT: u64 = 120;
const TIME_WEIGHT: u64 = 80;
const LOCATION_WEIGHT: u64 = 100;
const WEIGHT_SCALE: u64 = 4;

/// Upper bound for both the trust and the risk score.
pub const MAX_SCORE: u64 = 100;

/// Public verdicts from the four circuits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CategoryVerdicts {
    pub device: bool,
    pub time: bool,
    pub location: bool,
    pub pattern: bool,
    pub pattern_risk: u8,
}

impl CategoryVerdicts {
    pub fn get(&self, category: Category) -> bool {
        match category {
            Category::Device => self.device,
            Category::Time => self.time,
            Category::Location => self.location,
            Category::Pattern => self.pattern,
        }
    }
}

/// Per-category proof-hash contributions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CategoryHashes {
    pub device: Commitment,
    pub time: Commitment,
    pub location: Commitment,
    pub pattern: Commitment,
}

/// `required ? verdict : 1`
pub fn effective(mask: RequirementMask, category: Category, verdict: bool) -> Bit {
    Bit::enforced_if(Bit::from_bool(verdict), mask.requires(category))
}

/// `(120·d + 80·t + 100·l + (100 − risk)) / 4`, floored.
pub fn trust_score(verdicts: &CategoryVerdicts) -> Result<u8> {
    let risk = verdicts.pattern_risk as u64;
    if risk > MAX_SCORE {
        return Err(ContextError::RiskScoreOutOfRange(risk));
    }
    let weighted = DEVICE_WEIGHT * verdicts.device as u64
        + TIME_WEIGHT * verdicts.time as u64
        + LOCATION_WEIGHT * verdicts.location as u64
        + (MAX_SCORE - risk);
    let score = weighted / WEIGHT_SCALE;
    if score > MAX_SCORE {
        return Err(ContextError::TrustScoreOutOfRange(score as i64));
    }
    Ok(score as u8)
}

/// `trust >= level × 25`
pub fn level_met(trust: u8, level: VerificationLevel) -> bool {
    leq(level.min_trust_score(), trust).is_set()
}

/// Audit commitment over the decision, the nonce, the policy version and
/// all four category hashes.
pub fn audit_commitment(
    overall_valid: bool,
    trust: u8,
    access: &AccessPolicy,
    nonce: &ChallengeNonce,
    policy_version: u64,
    hashes: &CategoryHashes,
) -> Commitment {
    commit(
        AUDIT_TAG,
        &[
            &[overall_valid as u8, trust, access.level.as_u8(), access.requirements.bits()],
            nonce.as_bytes(),
            &policy_version.to_le_bytes(),
            &hashes.device,
            &hashes.time,
            &hashes.location,
            &hashes.pattern,
        ],
    )
}

/// Aggregated result: the artifact plus its public-signal vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregate {
    pub artifact: ProofArtifact,
    pub signals: PublicSignals,
}

/// Run the aggregator.
pub fn aggregate(
    verdicts: &CategoryVerdicts,
    hashes: &CategoryHashes,
    access: &AccessPolicy,
    nonce: &ChallengeNonce,
    policy_version: u64,
) -> Result<Aggregate> {
    let mask = access.requirements;
    let checks: Vec<Bit> = Category::ALL
        .into_iter()
        .map(|c| effective(mask, c, verdicts.get(c)))
        .collect();
    let overall_valid = all(&checks).is_set();

    let trust = trust_score(verdicts)?;
    let level_met = level_met(trust, access.level);
    let audit = audit_commitment(overall_valid, trust, access, nonce, policy_version, hashes);

    debug!(overall_valid, trust, level = access.level.as_u8(), level_met, "aggregated context");

    Ok(Aggregate {
        artifact: ProofArtifact {
            device_verified: verdicts.device,
            timestamp_verified: verdicts.time,
            location_verified: verdicts.location,
            pattern_verified: verdicts.pattern,
            overall_valid,
            trust_score: trust,
            verification_level_met: level_met,
            audit_commitment: audit,
        },
        signals: PublicSignals {
            device: verdicts.device,
            time: verdicts.time,
            location: verdicts.location,
            pattern: verdicts.pattern,
            overall: overall_valid,
            trust_score: trust,
            level_met,
            level: access.level,
            mask,
            risk_score: verdicts.pattern_risk,
        },
    })
}
