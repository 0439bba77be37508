//! Time-window circuit.
//!
//! Range-checks the access time, enforces the minimum interval between
//! accesses, and optionally enforces business hours and a rolling code.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::circuit::gadgets::{all, in_range, leq, lt, Bit};
use crate::error::Result;
use crate::policy::TimePolicy;
use crate::types::Commitment;
use crate::utils::commit;
use crate::witness::TimeWitness;

const ROLLING_CODE_TAG: &[u8] = b"zkctx/rolling-code/v1";
const TIME_PROOF_TAG: &[u8] = b"zkctx/time-proof/v1";

const SECS_PER_DAY: i64 = 86_400;
const SECS_PER_HOUR: i64 = 3_600;
const ROLLING_CODE_MODULUS: u32 = 1_000_000;

/// Time step index for `timestamp` under a step length of `step_secs`.
pub fn time_step(timestamp: i64, step_secs: u32) -> i64 {
    timestamp.div_euclid(step_secs.max(1) as i64)
}

/// Six-digit rolling code for `seed` at `step` (HOTP-style truncation).
pub fn rolling_code(seed: &[u8; 32], step: i64) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(ROLLING_CODE_TAG);
    hasher.update(seed);
    hasher.update(step.to_be_bytes());
    let digest = hasher.finalize();

    let offset = (digest[31] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    binary % ROLLING_CODE_MODULUS
}

/// Local hour of day (0..24) after applying the timezone offset.
pub fn local_hour(timestamp: i64, timezone_offset_secs: i32) -> u8 {
    let local = (timestamp as i128 + timezone_offset_secs as i128).rem_euclid(SECS_PER_DAY as i128);
    (local / SECS_PER_HOUR as i128) as u8
}

/// `[start, end)`, wrapping past midnight when `start > end`.
fn within_business_hours(hour: u8, start: u8, end: u8) -> Bit {
    let after_open = leq(start, hour);
    let before_close = lt(hour, end);
    let same_day = leq(start, end);
    same_day.select_bit(after_open.and(before_close), after_open.or(before_close))
}

/// Public outputs of the time-window circuit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeOutputs {
    pub in_window: bool,
    pub rate_limit_ok: bool,
    pub business_hours_ok: bool,
    pub rolling_code_ok: bool,
    pub overall_valid: bool,
    pub proof_hash: Commitment,
}

/// Hash contribution binding the public time policy and verdict.
pub fn time_proof_hash(policy: &TimePolicy, verified: bool) -> Commitment {
    commit(
        TIME_PROOF_TAG,
        &[
            &policy.min_timestamp.to_le_bytes(),
            &policy.max_timestamp.to_le_bytes(),
            &policy.min_interval_secs.to_le_bytes(),
            &[
                policy.business_hours_start,
                policy.business_hours_end,
                policy.require_business_hours as u8,
                policy.require_rolling_code as u8,
            ],
            &policy.rolling_code_step_secs.to_le_bytes(),
            &policy.expected_rolling_code.to_le_bytes(),
            &[verified as u8],
        ],
    )
}

/// Evaluate the time-window circuit.
pub fn verify_time_window(witness: &TimeWitness, policy: &TimePolicy) -> Result<TimeOutputs> {
    witness.validate()?;

    let now = witness.current_timestamp;
    let in_window = in_range(now, policy.min_timestamp, policy.max_timestamp);

    let elapsed = now.saturating_sub(witness.previous_timestamp);
    let rate_limit_ok = leq(policy.min_interval_secs, elapsed);

    let hour = local_hour(now, witness.timezone_offset_secs);
    let business_hours_ok = Bit::enforced_if(
        within_business_hours(hour, policy.business_hours_start, policy.business_hours_end),
        policy.require_business_hours,
    );

    let code = rolling_code(&witness.rolling_seed, time_step(now, policy.rolling_code_step_secs));
    let rolling_code_ok = Bit::enforced_if(
        Bit::from_bool(code == policy.expected_rolling_code),
        policy.require_rolling_code,
    );

    let verified = all(&[in_window, rate_limit_ok, business_hours_ok, rolling_code_ok]);
    debug!(
        in_window = in_window.is_set(),
        rate_limit_ok = rate_limit_ok.is_set(),
        verified = verified.is_set(),
        "time circuit evaluated"
    );

    Ok(TimeOutputs {
        in_window: in_window.is_set(),
        rate_limit_ok: rate_limit_ok.is_set(),
        business_hours_ok: business_hours_ok.is_set(),
        rolling_code_ok: rolling_code_ok.is_set(),
        overall_valid: verified.is_set(),
        proof_hash: time_proof_hash(policy, verified.is_set()),
    })
}
