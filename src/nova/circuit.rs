//! StepCircuit enforcing the aggregator relation.
//!
//! # Public Inputs/Outputs (z)
//! The public-signal vector, in [`PublicSignals`](crate::types::PublicSignals)
//! order: `device, time, location, pattern, overall, trust_score, level_met,
//! level, mask, risk_score`. The step passes `z` through unchanged; a proof
//! exists only if the signals satisfy every constraint below.

use std::marker::PhantomData;

use bellpepper_core::{num::AllocatedNum, ConstraintSystem, SynthesisError};
use ff::PrimeField;
use nova_snark::traits::circuit::StepCircuit;

use crate::nova::gadgets::{alloc_bits, packed, scalar, to_u64};
use crate::types::NUM_PUBLIC_SIGNALS;

pub const ARITY: usize = NUM_PUBLIC_SIGNALS;

pub(crate) const DEVICE: usize = 0;
pub(crate) const TIME: usize = 1;
pub(crate) const LOCATION: usize = 2;
pub(crate) const PATTERN: usize = 3;
const OVERALL: usize = 4;
const TRUST: usize = 5;
const LEVEL_MET: usize = 6;
const LEVEL: usize = 7;
const MASK: usize = 8;
pub(crate) const RISK: usize = 9;

/// Aggregator relation as R1CS.
#[derive(Clone, Debug, Default)]
pub struct AggregationStepCircuit<F: PrimeField> {
    _marker: PhantomData<F>,
}

impl<F: PrimeField> AggregationStepCircuit<F> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<F: PrimeField> StepCircuit<F> for AggregationStepCircuit<F> {
    fn arity(&self) -> usize {
        ARITY
    }

    fn synthesize<CS: ConstraintSystem<F>>(
        &self,
        cs: &mut CS,
        z: &[AllocatedNum<F>],
    ) -> Result<Vec<AllocatedNum<F>>, SynthesisError> {
        if z.len() != ARITY {
            return Err(SynthesisError::Unsatisfiable);
        }
        enforce_aggregation(cs, z)?;
        Ok(z.to_vec())
    }
}

/// Aggregator constraints over the first [`ARITY`] entries of `z`.
pub(crate) fn enforce_aggregation<F: PrimeField, CS: ConstraintSystem<F>>(
    cs: &mut CS,
    z: &[AllocatedNum<F>],
) -> Result<(), SynthesisError> {
    if z.len() < ARITY {
        return Err(SynthesisError::Unsatisfiable);
    }
    let one = CS::one();
    let value = |i: usize| z[i].get_value().and_then(to_u64);

    // 1. Verdicts, overall and level_met are boolean.
    for (idx, name) in [
        (DEVICE, "device"),
        (TIME, "time"),
        (LOCATION, "location"),
        (PATTERN, "pattern"),
        (OVERALL, "overall"),
        (LEVEL_MET, "level_met"),
    ] {
        let v = z[idx].get_variable();
        cs.enforce(
            || format!("{}_boolean", name),
            |lc| lc + v,
            |lc| lc + one - v,
            |lc| lc,
        );
    }

    // 2. mask = b0 + 2·b1 + 4·b2 + 8·b3
    let mask_bits = alloc_bits(cs, "mask", value(MASK), 4)?;
    cs.enforce(
        || "mask_decomposition",
        |_| packed(&mask_bits),
        |lc| lc + one,
        |lc| lc + z[MASK].get_variable(),
    );

    // 3. blocked_i = m_i·(1 − v_i), overall = Π (1 − blocked_i)
    let mut product: Option<AllocatedNum<F>> = None;
    for (k, idx) in [DEVICE, TIME, LOCATION, PATTERN].into_iter().enumerate() {
        let m = &mask_bits[k];
        let v = z[idx].get_variable();
        let blocked_value = m
            .get_value()
            .zip(value(idx))
            .map(|(required, verdict)| required && verdict == 0);

        let blocked = AllocatedNum::alloc(cs.namespace(|| format!("blocked_{}", k)), || {
            blocked_value.map(scalar).ok_or(SynthesisError::AssignmentMissing)
        })?;
        cs.enforce(
            || format!("blocked_{}_def", k),
            |lc| lc + m.get_variable(),
            |lc| lc + one - v,
            |lc| lc + blocked.get_variable(),
        );

        let next_value = match &product {
            None => blocked.get_value().map(|b| F::ONE - b),
            Some(prev) => prev.get_value().zip(blocked.get_value()).map(|(p, b)| p * (F::ONE - b)),
        };
        let next = AllocatedNum::alloc(cs.namespace(|| format!("and_{}", k)), || {
            next_value.ok_or(SynthesisError::AssignmentMissing)
        })?;
        match &product {
            None => cs.enforce(
                || format!("and_{}_def", k),
                |lc| lc + one,
                |lc| lc + one - blocked.get_variable(),
                |lc| lc + next.get_variable(),
            ),
            Some(prev) => cs.enforce(
                || format!("and_{}_def", k),
                |lc| lc + prev.get_variable(),
                |lc| lc + one - blocked.get_variable(),
                |lc| lc + next.get_variable(),
            ),
        }
        product = Some(next);
    }
    let product = product.ok_or(SynthesisError::Unsatisfiable)?;
    cs.enforce(
        || "overall_is_and",
        |lc| lc + product.get_variable(),
        |lc| lc + one,
        |lc| lc + z[OVERALL].get_variable(),
    );

    // 4. 0 <= risk <= 100 and 0 <= trust < 128
    let risk_bits = alloc_bits(cs, "risk", value(RISK), 7)?;
    cs.enforce(
        || "risk_range",
        |_| packed(&risk_bits),
        |lc| lc + one,
        |lc| lc + z[RISK].get_variable(),
    );
    let headroom_bits = alloc_bits(cs, "risk_headroom", value(RISK).map(|r| 100u64.wrapping_sub(r)), 7)?;
    cs.enforce(
        || "risk_at_most_100",
        |_| packed(&headroom_bits),
        |lc| lc + one,
        |lc| lc + (F::from(100), one) - z[RISK].get_variable(),
    );
    let trust_bits = alloc_bits(cs, "trust", value(TRUST), 7)?;
    cs.enforce(
        || "trust_range",
        |_| packed(&trust_bits),
        |lc| lc + one,
        |lc| lc + z[TRUST].get_variable(),
    );

    // 5. 4·trust + rem = 120·d + 80·t + 100·l + 100 − risk, rem < 4
    let weighted = value(DEVICE)
        .zip(value(TIME))
        .zip(value(LOCATION))
        .zip(value(RISK))
        .map(|(((d, t), l), r)| {
            120u64
                .wrapping_mul(d)
                .wrapping_add(80u64.wrapping_mul(t))
                .wrapping_add(100u64.wrapping_mul(l))
                .wrapping_add(100)
                .wrapping_sub(r)
        });
    let rem_bits = alloc_bits(cs, "trust_rem", weighted.map(|w| w % 4), 2)?;
    cs.enforce(
        || "trust_score_relation",
        |_| packed(&rem_bits) + (F::from(4), z[TRUST].get_variable()),
        |lc| lc + one,
        |lc| {
            lc + (F::from(120), z[DEVICE].get_variable())
                + (F::from(80), z[TIME].get_variable())
                + (F::from(100), z[LOCATION].get_variable())
                + (F::from(100), one)
                - z[RISK].get_variable()
        },
    );

    // 6. level in 1..=4
    let level_bits = alloc_bits(cs, "level", value(LEVEL).map(|l| l.wrapping_sub(1)), 2)?;
    cs.enforce(
        || "level_range",
        |_| packed(&level_bits),
        |lc| lc + one,
        |lc| lc + z[LEVEL].get_variable() - one,
    );

    // 7. level_met = [trust >= 25·level]
    //    p = lm·(2·trust − 50·L + 1); slack = p + 25·L − trust − 1 ∈ [0, 256)
    let lm = z[LEVEL_MET].get_variable();
    let trust = z[TRUST].get_variable();
    let level = z[LEVEL].get_variable();
    let p_value = z[LEVEL_MET]
        .get_value()
        .zip(z[TRUST].get_value())
        .zip(z[LEVEL].get_value())
        .map(|((m, t), l)| m * (t.double() - F::from(50) * l + F::ONE));
    let p = AllocatedNum::alloc(cs.namespace(|| "level_gate_product"), || {
        p_value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    cs.enforce(
        || "level_gate_product_def",
        |lc| lc + lm,
        |lc| lc + (F::from(2), trust) - (F::from(50), level) + one,
        |lc| lc + p.get_variable(),
    );

    let slack_value = value(LEVEL_MET)
        .zip(value(TRUST))
        .zip(value(LEVEL))
        .map(|((m, t), l)| {
            let floor = 25u64.wrapping_mul(l);
            if m == 1 {
                t.wrapping_sub(floor)
            } else {
                floor.wrapping_sub(t).wrapping_sub(1)
            }
        });
    let slack_bits = alloc_bits(cs, "level_slack", slack_value, 8)?;
    cs.enforce(
        || "level_gate",
        |_| packed(&slack_bits),
        |lc| lc + one,
        |lc| lc + p.get_variable() + (F::from(25), level) - trust - one,
    );
    Ok(())
}
