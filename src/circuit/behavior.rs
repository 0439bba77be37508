//! Behavioral pattern circuit.
//!
//! Matches the session's behavior vector against a learned baseline
//! commitment and derives a 0..=100 risk score. The risk stays a public
//! output so the aggregator can degrade the trust score gradually.

use tracing::debug;

use crate::circuit::gadgets::{all, commitment_eq, in_range, leq, lt, Bit};
use crate::error::{ContextError, Result};
use crate::policy::PatternPolicy;
use crate::types::Commitment;
use crate::utils::commit;
use crate::witness::{BehaviorWitness, TIMING_INTERVALS_LEN};

const BEHAVIOR_COMMIT_TAG: &[u8] = b"zkctx/behavior-commit/v1";
const PATTERN_PROOF_TAG: &[u8] = b"zkctx/pattern-proof/v1";

const PATTERN_MISMATCH_WEIGHT: u64 = 25;
const SESSION_ANOMALY_WEIGHT: u64 = 20;
const TYPING_ANOMALY_WEIGHT: u64 = 15;
const TIMING_ANOMALY_WEIGHT: u64 = 10;
const VARIANCE_WEIGHT: u128 = 30;

/// Risk assigned to a pattern category with no witness.
pub const MAX_RISK: u8 = 100;

/// Mean and mean absolute deviation of the timing intervals, both floored.
pub fn timing_statistics(intervals: &[u64; TIMING_INTERVALS_LEN]) -> (u64, u64) {
    let n = TIMING_INTERVALS_LEN as u128;
    let sum: u128 = intervals.iter().map(|&x| x as u128).sum();
    let mean = (sum / n) as u64;
    let deviation: u128 = intervals.iter().map(|&x| x.abs_diff(mean) as u128).sum();
    (mean, (deviation / n) as u64)
}

/// Commitment over the full behavior vector.
///
/// Timing enters as its (mean, deviation) summary, so baselines tolerate
/// jitter that leaves the summary unchanged.
pub fn behavior_commitment(witness: &BehaviorWitness) -> Commitment {
    let actions: Vec<u8> = witness.actions.iter().flat_map(|a| a.to_le_bytes()).collect();
    let (mean, mad) = timing_statistics(&witness.timing_intervals);
    commit(
        BEHAVIOR_COMMIT_TAG,
        &[
            &actions,
            &mean.to_le_bytes(),
            &mad.to_le_bytes(),
            &witness.typing_speed.to_le_bytes(),
            &witness.pointer_activity.to_le_bytes(),
            &witness.access_frequency.to_le_bytes(),
            &witness.salt,
        ],
    )
}

/// Weighted risk: fixed penalties per failed sub-check plus up to 30 points
/// proportional to `mad / max_variance`.
pub fn risk_score(
    pattern_matches: Bit,
    session_ok: Bit,
    typing_ok: Bit,
    timing_ok: Bit,
    mad: u64,
    max_variance: u64,
) -> Result<u8> {
    if max_variance == 0 {
        return Err(ContextError::invalid_policy(
            "pattern.max_timing_variance",
            "must be non-zero",
        ));
    }
    let continuous = (mad as u128 * VARIANCE_WEIGHT / max_variance as u128).min(VARIANCE_WEIGHT) as u64;
    let risk = PATTERN_MISMATCH_WEIGHT * pattern_matches.not().value()
        + SESSION_ANOMALY_WEIGHT * session_ok.not().value()
        + TYPING_ANOMALY_WEIGHT * typing_ok.not().value()
        + TIMING_ANOMALY_WEIGHT * timing_ok.not().value()
        + continuous;

    u8::try_from(risk)
        .ok()
        .filter(|r| *r <= MAX_RISK)
        .ok_or(ContextError::RiskScoreOutOfRange(risk))
}

/// Public outputs of the pattern circuit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PatternOutputs {
    pub pattern_matches: bool,
    pub session_ok: bool,
    pub typing_ok: bool,
    pub timing_consistency_ok: bool,
    pub risk_score: u8,
    /// `100 - risk_score`
    pub confidence: u8,
    pub confidence_ok: bool,
    pub overall_pattern_valid: bool,
    pub proof_hash: Commitment,
}

/// Hash contribution binding the baseline, thresholds, verdict and risk.
pub fn pattern_proof_hash(policy: &PatternPolicy, verified: bool, risk: u8) -> Commitment {
    commit(
        PATTERN_PROOF_TAG,
        &[
            &policy.expected_commitment,
            &policy.max_timing_variance.to_le_bytes(),
            &[policy.risk_threshold, policy.required_confidence],
            &[verified as u8, risk],
        ],
    )
}

/// Evaluate the pattern circuit.
pub fn verify_behavior(witness: &BehaviorWitness, policy: &PatternPolicy) -> Result<PatternOutputs> {
    witness.validate()?;

    let pattern_matches = commitment_eq(&behavior_commitment(witness), &policy.expected_commitment);
    let session_ok = in_range(
        witness.session_duration_secs,
        policy.min_session_secs,
        policy.max_session_secs,
    );
    let typing_ok = in_range(witness.typing_speed, policy.min_typing_speed, policy.max_typing_speed);

    let (_, mad) = timing_statistics(&witness.timing_intervals);
    let timing_ok = leq(mad, policy.max_timing_variance);

    let risk = risk_score(
        pattern_matches,
        session_ok,
        typing_ok,
        timing_ok,
        mad,
        policy.max_timing_variance,
    )?;
    let below_threshold = lt(risk, policy.risk_threshold);
    let confidence = MAX_RISK - risk;

    let verified = all(&[pattern_matches, session_ok, typing_ok, timing_ok, below_threshold]);
    debug!(
        pattern_matches = pattern_matches.is_set(),
        risk,
        verified = verified.is_set(),
        "pattern circuit evaluated"
    );

    Ok(PatternOutputs {
        pattern_matches: pattern_matches.is_set(),
        session_ok: session_ok.is_set(),
        typing_ok: typing_ok.is_set(),
        timing_consistency_ok: timing_ok.is_set(),
        risk_score: risk,
        confidence,
        confidence_ok: confidence >= policy.required_confidence,
        overall_pattern_valid: verified.is_set(),
        proof_hash: pattern_proof_hash(policy, verified.is_set(), risk),
    })
}
