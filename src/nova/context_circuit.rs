//! StepCircuit that recomputes the context verdicts from the witness.
//!
//! # Public Inputs/Outputs (z)
//! - `z[0..10]`: the public-signal vector, constrained by the aggregator
//!   relation exactly as in [`AggregationStepCircuit`](crate::nova::AggregationStepCircuit).
//! - `z[10..34]`: the numeric policy parameters (see [`public_inputs`]).
//! - `z[34]`: a binding scalar taken from the statement's public-inputs
//!   hash, so a proof cannot be replayed under another nonce or policy.
//!
//! The step passes `z` through unchanged.
//!
//! # Relations proved from the witness
//! - time: window range, rate limit, local hour derived from the timestamp
//!   and offset, the business-hours selector, the rolling-code selector
//! - location: squared-distance geofence, blacklist, travel bound, IP
//!   tolerance selector
//! - behavior: session and typing ranges, floored mean and mean absolute
//!   deviation of the timing intervals, the weighted risk sum and the
//!   threshold gate
//!
//! Hash relations stay outside R1CS: the device commitment, signature,
//! revocation and whitelist checks, the seed-to-code derivation of the
//! rolling code, and the behavior baseline commitment. Their outcomes enter
//! as witness bits (or, for the device verdict, as the public signal only).

use core::fmt;
use std::marker::PhantomData;

use bellpepper_core::{num::AllocatedNum, ConstraintSystem, SynthesisError};
use ff::PrimeField;
use nova_snark::traits::circuit::StepCircuit;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::circuit::behavior::behavior_commitment;
use crate::circuit::gadgets::commitment_eq;
use crate::circuit::time_window::{rolling_code, time_step};
use crate::nova::circuit::{enforce_aggregation, LOCATION, PATTERN, RISK, TIME};
use crate::nova::gadgets::{
    alloc, alloc_bit, and_all, enforce_equal, fe, implies, is_equal, leq, lt, mul, range_check, Term,
};
use crate::policy::PolicyParameters;
use crate::proof::PublicStatement;
use crate::types::{GeoPoint, NUM_PUBLIC_SIGNALS};
use crate::witness::{ContextWitness, MAX_TIMEZONE_OFFSET_SECS, TIMING_INTERVALS_LEN};

const MIN_TIMESTAMP: usize = NUM_PUBLIC_SIGNALS;
const MAX_TIMESTAMP: usize = MIN_TIMESTAMP + 1;
const MIN_INTERVAL: usize = MIN_TIMESTAMP + 2;
const HOURS_START: usize = MIN_TIMESTAMP + 3;
const HOURS_END: usize = MIN_TIMESTAMP + 4;
const REQUIRE_HOURS: usize = MIN_TIMESTAMP + 5;
const REQUIRE_CODE: usize = MIN_TIMESTAMP + 6;
const EXPECTED_CODE: usize = MIN_TIMESTAMP + 7;
const AUTH_LAT: usize = MIN_TIMESTAMP + 8;
const AUTH_LON: usize = MIN_TIMESTAMP + 9;
const AUTH_RADIUS_SQ: usize = MIN_TIMESTAMP + 10;
const BLOCKED_PRESENT: usize = MIN_TIMESTAMP + 11;
const BLOCKED_LAT: usize = MIN_TIMESTAMP + 12;
const BLOCKED_LON: usize = MIN_TIMESTAMP + 13;
const BLOCKED_RADIUS_SQ: usize = MIN_TIMESTAMP + 14;
const MAX_SPEED: usize = MIN_TIMESTAMP + 15;
const IP_TOLERANCE_SQ: usize = MIN_TIMESTAMP + 16;
const REQUIRE_IP: usize = MIN_TIMESTAMP + 17;
const MIN_SESSION: usize = MIN_TIMESTAMP + 18;
const MAX_SESSION: usize = MIN_TIMESTAMP + 19;
const MIN_TYPING: usize = MIN_TIMESTAMP + 20;
const MAX_TYPING: usize = MIN_TIMESTAMP + 21;
const MAX_VARIANCE: usize = MIN_TIMESTAMP + 22;
const RISK_THRESHOLD: usize = MIN_TIMESTAMP + 23;
const BINDING: usize = MIN_TIMESTAMP + 24;

pub const CONTEXT_ARITY: usize = BINDING + 1;

/// Comparison width for differences of 64-bit policy and witness values.
const WIDE: usize = 66;
/// Comparison width for hours, thresholds and other small values.
const SMALL: usize = 9;
const TIMESTAMP_BITS: usize = 38;
const OFFSET_BITS: usize = 17;
const ROLLING_CODE_BITS: usize = 20;

const SECS_PER_DAY: i128 = 86_400;
const SECS_PER_HOUR: i128 = 3_600;

const LAT_BIAS: i128 = 9_000;
const LON_BIAS: i128 = 18_000;
/// Beyond this reach every pair of in-range points is within travel.
const REACH_CAP: i128 = (1 << 17) - 1;

const SAMPLES: i128 = TIMING_INTERVALS_LEN as i128;
const VARIANCE_WEIGHT: i128 = 30;
const FIXED_RISK: i128 = 25 + 20 + 15 + 10;
const MAX_RISK: i128 = 100;

/// Integer view of the private witness, as the step circuit consumes it.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct CircuitWitness {
    has_time: bool,
    current_timestamp: i64,
    previous_timestamp: i64,
    timezone_offset_secs: i32,
    rolling_code: u32,

    has_location: bool,
    current: [i32; 2],
    previous: [i32; 2],
    ip_derived: [i32; 2],
    travel_time_hours: i64,

    has_behavior: bool,
    pattern_matches: bool,
    session_duration_secs: i64,
    typing_speed: u32,
    timing_intervals: [u64; TIMING_INTERVALS_LEN],
}

fn coords(p: &GeoPoint) -> [i32; 2] {
    [p.lat, p.lon]
}

impl CircuitWitness {
    /// Flatten `witness` and run the hash relations the circuit takes as bits.
    pub fn new(witness: &ContextWitness, params: &PolicyParameters) -> Self {
        let mut out = Self::default();

        if let Some(t) = &witness.time {
            out.has_time = true;
            out.current_timestamp = t.current_timestamp;
            out.previous_timestamp = t.previous_timestamp;
            out.timezone_offset_secs = t.timezone_offset_secs;
            out.rolling_code = rolling_code(
                &t.rolling_seed,
                time_step(t.current_timestamp, params.time.rolling_code_step_secs),
            );
        }

        if let Some(l) = &witness.location {
            out.has_location = true;
            out.current = coords(&l.current);
            out.previous = coords(&l.previous);
            out.ip_derived = coords(&l.ip_derived);
            out.travel_time_hours = l.travel_time_hours;
        }

        if let Some(b) = &witness.behavior {
            out.has_behavior = true;
            out.pattern_matches =
                commitment_eq(&behavior_commitment(b), &params.pattern.expected_commitment).is_set();
            out.session_duration_secs = b.session_duration_secs;
            out.typing_speed = b.typing_speed;
            out.timing_intervals = b.timing_intervals;
        }

        out
    }
}

impl fmt::Debug for CircuitWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitWitness").finish_non_exhaustive()
    }
}

/// Public `z` vector for `statement`.
pub fn public_inputs<F: PrimeField>(statement: &PublicStatement) -> Vec<F> {
    let params = statement.snapshot.params();
    let (t, l, p) = (&params.time, &params.location, &params.pattern);
    let blocked = l.blacklisted.unwrap_or(crate::policy::Region::new(GeoPoint::default(), 0));

    let policy: [i128; CONTEXT_ARITY - NUM_PUBLIC_SIGNALS - 1] = [
        t.min_timestamp as i128,
        t.max_timestamp as i128,
        t.min_interval_secs as i128,
        t.business_hours_start as i128,
        t.business_hours_end as i128,
        t.require_business_hours as i128,
        t.require_rolling_code as i128,
        t.expected_rolling_code as i128,
        l.authorized.center.lat as i128,
        l.authorized.center.lon as i128,
        l.authorized.radius_sq as i128,
        l.blacklisted.is_some() as i128,
        blocked.center.lat as i128,
        blocked.center.lon as i128,
        blocked.radius_sq as i128,
        l.max_speed_per_hour as i128,
        l.ip_tolerance_radius_sq as i128,
        l.require_ip_consistency as i128,
        p.min_session_secs as i128,
        p.max_session_secs as i128,
        p.min_typing_speed as i128,
        p.max_typing_speed as i128,
        p.max_timing_variance as i128,
        p.risk_threshold as i128,
    ];

    statement
        .signals
        .to_vec()
        .into_iter()
        .map(F::from)
        .chain(policy.into_iter().map(fe::<F>))
        .chain(std::iter::once(binding_scalar(&statement.inputs_hash())))
        .collect()
}

/// First 24 bytes of the inputs hash as a field element.
fn binding_scalar<F: PrimeField>(hash: &[u8; 32]) -> F {
    let two_64 = F::from(u64::MAX) + F::ONE;
    hash.chunks_exact(8).take(3).fold(F::ZERO, |acc, chunk| {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        acc * two_64 + F::from(u64::from_le_bytes(word))
    })
}

/// Context relation as R1CS. `witness` is `None` only for parameter setup.
#[derive(Clone, Debug, Default)]
pub struct ContextStepCircuit<F: PrimeField> {
    witness: Option<CircuitWitness>,
    _marker: PhantomData<F>,
}

impl<F: PrimeField> ContextStepCircuit<F> {
    pub fn new(witness: CircuitWitness) -> Self {
        Self {
            witness: Some(witness),
            _marker: PhantomData,
        }
    }

    /// Shape-only instance for parameter generation.
    pub fn blank() -> Self {
        Self::default()
    }

    fn value(&self, f: impl Fn(&CircuitWitness) -> i128) -> Option<i128> {
        self.witness.as_ref().map(f)
    }

    fn flag(&self, f: impl Fn(&CircuitWitness) -> bool) -> Option<bool> {
        self.witness.as_ref().map(f)
    }

    fn point<CS: ConstraintSystem<F>>(
        &self,
        mut cs: CS,
        f: impl Fn(&CircuitWitness) -> [i32; 2],
    ) -> Result<[Term<F>; 2], SynthesisError> {
        let lat = alloc(cs.namespace(|| "lat"), self.value(|w| f(w)[0] as i128))?;
        let lon = alloc(cs.namespace(|| "lon"), self.value(|w| f(w)[1] as i128))?;
        range_check(cs.namespace(|| "lat_range"), &lat.add_const::<CS>(LAT_BIAS), 15)?;
        range_check(cs.namespace(|| "lon_range"), &lon.add_const::<CS>(LON_BIAS), 16)?;
        Ok([lat, lon])
    }

    fn time_verdict<CS: ConstraintSystem<F>>(
        &self,
        mut cs: CS,
        z: &[AllocatedNum<F>],
    ) -> Result<Term<F>, SynthesisError> {
        let public = |i: usize| Term::from_num(&z[i]);

        let present = alloc_bit(cs.namespace(|| "present"), self.flag(|w| w.has_time))?;
        let now = alloc(cs.namespace(|| "now"), self.value(|w| w.current_timestamp as i128))?;
        let previous = alloc(cs.namespace(|| "previous"), self.value(|w| w.previous_timestamp as i128))?;
        let offset = alloc(cs.namespace(|| "offset"), self.value(|w| w.timezone_offset_secs as i128))?;
        let elapsed = now.sub(&previous);
        range_check(cs.namespace(|| "now_range"), &now, TIMESTAMP_BITS)?;
        range_check(cs.namespace(|| "previous_range"), &previous, TIMESTAMP_BITS)?;
        range_check(cs.namespace(|| "elapsed_range"), &elapsed, TIMESTAMP_BITS)?;
        range_check(
            cs.namespace(|| "offset_range"),
            &offset.add_const::<CS>(MAX_TIMEZONE_OFFSET_SECS as i128),
            OFFSET_BITS,
        )?;

        let after_min = leq(cs.namespace(|| "after_min"), &public(MIN_TIMESTAMP), &now, WIDE)?;
        let before_max = leq(cs.namespace(|| "before_max"), &now, &public(MAX_TIMESTAMP), WIDE)?;
        let rate_ok = leq(cs.namespace(|| "rate_limit"), &public(MIN_INTERVAL), &elapsed, WIDE)?;

        // now + offset + 1 day = days·86400 + hour·3600 + rest
        let shifted = now.add(&offset).add_const::<CS>(SECS_PER_DAY);
        let days = alloc(cs.namespace(|| "days"), shifted.value.map(|s| s / SECS_PER_DAY))?;
        let hour = alloc(
            cs.namespace(|| "hour"),
            shifted.value.map(|s| (s % SECS_PER_DAY) / SECS_PER_HOUR),
        )?;
        let rest = alloc(cs.namespace(|| "rest"), shifted.value.map(|s| s % SECS_PER_HOUR))?;
        range_check(cs.namespace(|| "days_range"), &days, 32)?;
        range_check(cs.namespace(|| "hour_range"), &hour, 5)?;
        range_check(
            cs.namespace(|| "hour_below_24"),
            &Term::constant::<CS>(23).sub(&hour),
            5,
        )?;
        range_check(cs.namespace(|| "rest_range"), &rest, 12)?;
        range_check(
            cs.namespace(|| "rest_below_hour"),
            &Term::constant::<CS>(SECS_PER_HOUR - 1).sub(&rest),
            12,
        )?;
        let recomposed = days.scale(SECS_PER_DAY).add(&hour.scale(SECS_PER_HOUR)).add(&rest);
        enforce_equal(&mut cs, "local_time", &recomposed, &shifted);

        // [start, end), wrapping past midnight when start > end
        let after_open = leq(cs.namespace(|| "after_open"), &public(HOURS_START), &hour, SMALL)?;
        let before_close = lt(cs.namespace(|| "before_close"), &hour, &public(HOURS_END), SMALL)?;
        let same_day = leq(cs.namespace(|| "same_day"), &public(HOURS_START), &public(HOURS_END), SMALL)?;
        let both = mul(cs.namespace(|| "both"), &after_open, &before_close)?;
        let either = after_open.add(&before_close).sub(&both);
        let adjust = mul(cs.namespace(|| "select_window"), &same_day, &both.sub(&either))?;
        let within = either.add(&adjust);
        let hours_ok = implies(cs.namespace(|| "hours_selector"), &public(REQUIRE_HOURS), &within)?;

        let code = alloc(cs.namespace(|| "code"), self.value(|w| w.rolling_code as i128))?;
        range_check(cs.namespace(|| "code_range"), &code, ROLLING_CODE_BITS)?;
        let code_matches = is_equal(cs.namespace(|| "code_matches"), &code, &public(EXPECTED_CODE))?;
        let code_ok = implies(cs.namespace(|| "code_selector"), &public(REQUIRE_CODE), &code_matches)?;

        and_all(
            cs.namespace(|| "verdict"),
            &[present, after_min, before_max, rate_ok, hours_ok, code_ok],
        )
    }

    fn location_verdict<CS: ConstraintSystem<F>>(
        &self,
        mut cs: CS,
        z: &[AllocatedNum<F>],
    ) -> Result<Term<F>, SynthesisError> {
        let public = |i: usize| Term::from_num(&z[i]);

        let present = alloc_bit(cs.namespace(|| "present"), self.flag(|w| w.has_location))?;
        let current = self.point(cs.namespace(|| "current"), |w| w.current)?;
        let previous = self.point(cs.namespace(|| "previous"), |w| w.previous)?;
        let ip = self.point(cs.namespace(|| "ip"), |w| w.ip_derived)?;
        let hours = alloc(cs.namespace(|| "hours"), self.value(|w| w.travel_time_hours as i128))?;
        range_check(cs.namespace(|| "hours_range"), &hours, 64)?;

        let authorized_center = [public(AUTH_LAT), public(AUTH_LON)];
        let blocked_center = [public(BLOCKED_LAT), public(BLOCKED_LON)];

        let d_auth = squared_distance(cs.namespace(|| "d_auth"), &current, &authorized_center)?;
        let authorized = leq(cs.namespace(|| "authorized"), &d_auth, &public(AUTH_RADIUS_SQ), WIDE)?;

        let d_blocked = squared_distance(cs.namespace(|| "d_blocked"), &current, &blocked_center)?;
        let inside_blocked = leq(cs.namespace(|| "inside_blocked"), &d_blocked, &public(BLOCKED_RADIUS_SQ), WIDE)?;
        let blocked = mul(cs.namespace(|| "blocked"), &public(BLOCKED_PRESENT), &inside_blocked)?;
        let not_blocked = Term::constant::<CS>(1).sub(&blocked);

        // reach = min(hours · speed, REACH_CAP)
        let reach = mul(cs.namespace(|| "reach"), &hours, &public(MAX_SPEED))?;
        let cap = Term::constant::<CS>(REACH_CAP);
        let far = leq(cs.namespace(|| "far"), &cap, &reach, 130)?;
        let clamp = mul(cs.namespace(|| "clamp"), &far, &cap.sub(&reach))?;
        let capped = reach.add(&clamp);
        let reach_sq = mul(cs.namespace(|| "reach_sq"), &capped, &capped)?;
        let d_travel = squared_distance(cs.namespace(|| "d_travel"), &current, &previous)?;
        let travel_ok = leq(cs.namespace(|| "travel"), &d_travel, &reach_sq, 36)?;

        let d_ip = squared_distance(cs.namespace(|| "d_ip"), &current, &ip)?;
        let ip_close = leq(cs.namespace(|| "ip_close"), &d_ip, &public(IP_TOLERANCE_SQ), WIDE)?;
        let ip_ok = implies(cs.namespace(|| "ip_selector"), &public(REQUIRE_IP), &ip_close)?;

        and_all(
            cs.namespace(|| "verdict"),
            &[present, authorized, not_blocked, travel_ok, ip_ok],
        )
    }

    /// Pattern verdict and risk score.
    fn pattern_verdict<CS: ConstraintSystem<F>>(
        &self,
        mut cs: CS,
        z: &[AllocatedNum<F>],
    ) -> Result<(Term<F>, Term<F>), SynthesisError> {
        let public = |i: usize| Term::from_num(&z[i]);

        let present = alloc_bit(cs.namespace(|| "present"), self.flag(|w| w.has_behavior))?;
        let matches = alloc_bit(cs.namespace(|| "matches"), self.flag(|w| w.pattern_matches))?;

        let session = alloc(cs.namespace(|| "session"), self.value(|w| w.session_duration_secs as i128))?;
        let typing = alloc(cs.namespace(|| "typing"), self.value(|w| w.typing_speed as i128))?;
        range_check(cs.namespace(|| "session_range"), &session, 64)?;
        range_check(cs.namespace(|| "typing_range"), &typing, 32)?;

        let session_min = leq(cs.namespace(|| "session_min"), &public(MIN_SESSION), &session, WIDE)?;
        let session_max = leq(cs.namespace(|| "session_max"), &session, &public(MAX_SESSION), WIDE)?;
        let session_ok = and_all(cs.namespace(|| "session_ok"), &[session_min, session_max])?;
        let typing_min = leq(cs.namespace(|| "typing_min"), &public(MIN_TYPING), &typing, WIDE)?;
        let typing_max = leq(cs.namespace(|| "typing_max"), &typing, &public(MAX_TYPING), WIDE)?;
        let typing_ok = and_all(cs.namespace(|| "typing_ok"), &[typing_min, typing_max])?;

        let mut intervals = Vec::with_capacity(TIMING_INTERVALS_LEN);
        for k in 0..TIMING_INTERVALS_LEN {
            let x = alloc(
                cs.namespace(|| format!("interval_{}", k)),
                self.value(|w| w.timing_intervals[k] as i128),
            )?;
            range_check(cs.namespace(|| format!("interval_{}_range", k)), &x, 64)?;
            intervals.push(x);
        }

        let sum = intervals
            .iter()
            .fold(Term::constant::<CS>(0), |acc, x| acc.add(x));
        let mean = floor_div(cs.namespace(|| "mean"), &sum, SAMPLES)?;

        let mut deviation = Term::constant::<CS>(0);
        for (k, x) in intervals.iter().enumerate() {
            let delta = x.sub(&mean);
            let above = leq(cs.namespace(|| format!("above_{}", k)), &mean, x, WIDE)?;
            let gated = mul(cs.namespace(|| format!("abs_{}", k)), &above, &delta)?;
            // |delta| = 2·above·delta − delta
            deviation = deviation.add(&gated.scale(2).sub(&delta));
        }
        let mad = floor_div(cs.namespace(|| "mad"), &deviation, SAMPLES)?;
        let timing_ok = leq(cs.namespace(|| "timing_ok"), &mad, &public(MAX_VARIANCE), WIDE)?;

        // 30·mad = max_variance · quotient + rem, rem < max_variance
        let weighted = mad.scale(VARIANCE_WEIGHT);
        let quotient = alloc(
            cs.namespace(|| "quotient"),
            weighted.value.zip(public(MAX_VARIANCE).value).and_then(|(n, d)| n.checked_div(d)),
        )?;
        let rem = alloc(
            cs.namespace(|| "rem"),
            weighted.value.zip(public(MAX_VARIANCE).value).and_then(|(n, d)| n.checked_rem(d)),
        )?;
        range_check(cs.namespace(|| "quotient_range"), &quotient, 70)?;
        range_check(cs.namespace(|| "rem_range"), &rem, 64)?;
        range_check(
            cs.namespace(|| "rem_below_divisor"),
            &public(MAX_VARIANCE).sub(&rem).add_const::<CS>(-1),
            64,
        )?;
        let divided = mul(cs.namespace(|| "divided"), &public(MAX_VARIANCE), &quotient)?;
        enforce_equal(&mut cs, "variance_division", &divided.add(&rem), &weighted);

        let weight = Term::constant::<CS>(VARIANCE_WEIGHT);
        let saturated = leq(cs.namespace(|| "saturated"), &weight, &quotient, 72)?;
        let clamp = mul(cs.namespace(|| "clamp"), &saturated, &weight.sub(&quotient))?;
        let continuous = quotient.add(&clamp);

        // 25·(1 − m) + 20·(1 − s) + 15·(1 − t) + 10·(1 − v) + continuous
        let risk = Term::constant::<CS>(FIXED_RISK)
            .sub(&matches.scale(25))
            .sub(&session_ok.scale(20))
            .sub(&typing_ok.scale(15))
            .sub(&timing_ok.scale(10))
            .add(&continuous);
        let below = lt(cs.namespace(|| "below_threshold"), &risk, &public(RISK_THRESHOLD), SMALL)?;

        let verdict = and_all(
            cs.namespace(|| "verdict"),
            &[present.clone(), matches, session_ok, typing_ok, timing_ok, below],
        )?;

        // missing behavior counts as maximum risk
        let max_risk = Term::constant::<CS>(MAX_RISK);
        let gated = mul(cs.namespace(|| "risk_present"), &present, &risk.sub(&max_risk))?;
        Ok((verdict, max_risk.add(&gated)))
    }
}

/// `(a.lat − b.lat)² + (a.lon − b.lon)²`
fn squared_distance<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    a: &[Term<F>; 2],
    b: &[Term<F>; 2],
) -> Result<Term<F>, SynthesisError> {
    let dx = a[0].sub(&b[0]);
    let dy = a[1].sub(&b[1]);
    let dx2 = mul(cs.namespace(|| "dx2"), &dx, &dx)?;
    let dy2 = mul(cs.namespace(|| "dy2"), &dy, &dy)?;
    Ok(dx2.add(&dy2))
}

/// `floor(n / d)` for a small constant `d`, with `n` non-negative.
fn floor_div<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    n: &Term<F>,
    d: i128,
) -> Result<Term<F>, SynthesisError> {
    let q = alloc(cs.namespace(|| "quotient"), n.value.map(|v| v.div_euclid(d)))?;
    let r = alloc(cs.namespace(|| "remainder"), n.value.map(|v| v.rem_euclid(d)))?;
    range_check(cs.namespace(|| "quotient_range"), &q, 64)?;
    range_check(cs.namespace(|| "remainder_range"), &r, 8)?;
    range_check(
        cs.namespace(|| "remainder_below_divisor"),
        &Term::constant::<CS>(d - 1).sub(&r),
        8,
    )?;
    enforce_equal(&mut cs, "division", &q.scale(d).add(&r), n);
    Ok(q)
}

impl<F: PrimeField> StepCircuit<F> for ContextStepCircuit<F> {
    fn arity(&self) -> usize {
        CONTEXT_ARITY
    }

    fn synthesize<CS: ConstraintSystem<F>>(
        &self,
        cs: &mut CS,
        z: &[AllocatedNum<F>],
    ) -> Result<Vec<AllocatedNum<F>>, SynthesisError> {
        if z.len() != CONTEXT_ARITY {
            return Err(SynthesisError::Unsatisfiable);
        }
        enforce_aggregation(&mut cs.namespace(|| "aggregate"), z)?;

        let time = self.time_verdict(cs.namespace(|| "time"), z)?;
        let location = self.location_verdict(cs.namespace(|| "location"), z)?;
        let (pattern, risk) = self.pattern_verdict(cs.namespace(|| "pattern"), z)?;

        enforce_equal(cs, "time_signal", &time, &Term::from_num(&z[TIME]));
        enforce_equal(cs, "location_signal", &location, &Term::from_num(&z[LOCATION]));
        enforce_equal(cs, "pattern_signal", &pattern, &Term::from_num(&z[PATTERN]));
        enforce_equal(cs, "risk_signal", &risk, &Term::from_num(&z[RISK]));

        Ok(z.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bellpepper_core::test_cs::TestConstraintSystem;
    use pasta_curves::pallas::Scalar;

    use crate::circuit::aggregator::{aggregate, CategoryVerdicts};
    use crate::policy::types::tests::sample_policy;
    use crate::policy::PolicySnapshot;
    use crate::types::ChallengeNonce;
    use crate::verifier::category_hashes;
    use crate::witness::{BehaviorWitness, LocationWitness, TimeWitness};

    const NOON: i64 = 1_705_320_000;

    fn witness() -> ContextWitness {
        ContextWitness::new()
            .with_time(TimeWitness {
                current_timestamp: NOON,
                previous_timestamp: NOON - 600,
                timezone_offset_secs: -5 * 3_600,
                rolling_seed: [4u8; 32],
            })
            .with_location(LocationWitness {
                current: GeoPoint::new(4_071, -7_400),
                previous: GeoPoint::new(4_060, -7_390),
                ip_derived: GeoPoint::new(4_080, -7_410),
                travel_time_hours: 1,
            })
            .with_behavior(BehaviorWitness {
                actions: [3, 1, 4, 1, 5, 9, 2, 6, 5, 3],
                timing_intervals: [100, 300, 100, 300, 100, 300, 100, 300, 200],
                session_duration_secs: 900,
                typing_speed: 55,
                pointer_activity: 12,
                access_frequency: 4,
                salt: [8u8; 32],
            })
    }

    fn statement(verdicts: &CategoryVerdicts) -> PublicStatement {
        let snapshot = PolicySnapshot::new(sample_policy()).unwrap();
        let nonce = ChallengeNonce::new("circuit").unwrap();
        let hashes = category_hashes(snapshot.params(), &nonce, verdicts);
        let agg = aggregate(verdicts, &hashes, &snapshot.access, &nonce, snapshot.version()).unwrap();
        PublicStatement::new(&snapshot, nonce, agg.signals)
    }

    fn satisfied(circuit: &ContextStepCircuit<Scalar>, statement: &PublicStatement) -> bool {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let z: Vec<AllocatedNum<Scalar>> = public_inputs::<Scalar>(statement)
            .into_iter()
            .enumerate()
            .map(|(i, v)| AllocatedNum::alloc(cs.namespace(|| format!("z_{}", i)), || Ok(v)).unwrap())
            .collect();
        let out = circuit.synthesize(&mut cs, &z).unwrap();
        assert_eq!(out.len(), CONTEXT_ARITY);
        cs.is_satisfied()
    }

    /// The native circuits' verdicts for `witness` under the sample policy.
    fn native(witness: &ContextWitness, device: bool) -> CategoryVerdicts {
        let policy = sample_policy();
        let time = crate::verify_time_window(witness.time.as_ref().unwrap(), &policy.time).unwrap();
        let location = crate::verify_location(witness.location.as_ref().unwrap(), &policy.location).unwrap();
        let pattern = crate::verify_behavior(witness.behavior.as_ref().unwrap(), &policy.pattern).unwrap();
        CategoryVerdicts {
            device,
            time: time.overall_valid,
            location: location.overall_valid,
            pattern: pattern.overall_pattern_valid,
            pattern_risk: pattern.risk_score,
        }
    }

    #[test]
    fn test_honest_witness_satisfies() {
        let w = witness();
        let verdicts = native(&w, true);
        // sample baseline does not match: risk 25 + continuous 8 (mad 88 of 300)
        assert_eq!(verdicts.pattern_risk, 33);
        assert!(verdicts.time && verdicts.location && !verdicts.pattern);

        let circuit = ContextStepCircuit::new(CircuitWitness::new(&w, &sample_policy()));
        assert!(satisfied(&circuit, &statement(&verdicts)));
    }

    #[test]
    fn test_claimed_location_must_follow_witness() {
        let mut w = witness();
        if let Some(l) = w.location.as_mut() {
            l.current = GeoPoint::new(5_575, 3_761);
        }
        let honest = native(&w, true);
        assert!(!honest.location);

        let circuit = ContextStepCircuit::new(CircuitWitness::new(&w, &sample_policy()));
        assert!(satisfied(&circuit, &statement(&honest)));

        let mut forged = honest;
        forged.location = true;
        assert!(!satisfied(&circuit, &statement(&forged)));
    }

    #[test]
    fn test_claimed_risk_must_follow_witness() {
        let w = witness();
        let circuit = ContextStepCircuit::new(CircuitWitness::new(&w, &sample_policy()));
        let mut forged = native(&w, true);
        forged.pattern_risk = 0;
        assert!(!satisfied(&circuit, &statement(&forged)));
    }

    #[test]
    fn test_empty_witness_only_proves_denial() {
        let circuit = ContextStepCircuit::new(CircuitWitness::new(&ContextWitness::new(), &sample_policy()));
        let denied = CategoryVerdicts {
            device: false,
            time: false,
            location: false,
            pattern: false,
            pattern_risk: 100,
        };
        assert!(satisfied(&circuit, &statement(&denied)));

        let claimed = CategoryVerdicts {
            device: true,
            time: true,
            location: true,
            pattern: true,
            pattern_risk: 0,
        };
        assert!(!satisfied(&circuit, &statement(&claimed)));
    }
}
