//! Integer gadgets over R1CS.
//!
//! A [`Term`] is a linear combination together with the signed integer it
//! evaluates to on the prover side. Comparisons decompose a slack value
//! into bits, so every gadget documents the magnitude it stays sound for.

use bellpepper_core::{
    boolean::AllocatedBit, num::AllocatedNum, ConstraintSystem, LinearCombination, SynthesisError,
};
use ff::PrimeField;

/// Small field element as `u64`, `None` if it does not fit.
pub fn to_u64<F: PrimeField>(value: F) -> Option<u64> {
    let repr = value.to_repr();
    let bytes = repr.as_ref();
    if bytes.len() < 8 || bytes[8..].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&bytes[..8]);
    Some(u64::from_le_bytes(low))
}

/// Signed integer held in a field element, if its magnitude fits in 64 bits.
pub fn to_i128<F: PrimeField>(value: F) -> Option<i128> {
    to_u64(value)
        .map(i128::from)
        .or_else(|| to_u64(-value).map(|m| -i128::from(m)))
}

/// Field element for a signed integer.
pub fn fe<F: PrimeField>(value: i128) -> F {
    let magnitude = value.unsigned_abs();
    let two_64 = F::from(u64::MAX) + F::ONE;
    let f = F::from((magnitude >> 64) as u64) * two_64 + F::from(magnitude as u64);
    if value < 0 {
        -f
    } else {
        f
    }
}

pub fn scalar<F: PrimeField>(b: bool) -> F {
    if b {
        F::ONE
    } else {
        F::ZERO
    }
}

fn bit_of(value: i128, j: usize) -> bool {
    j < 127 && (value >> j) & 1 == 1
}

pub fn alloc_bits<F: PrimeField, CS: ConstraintSystem<F>>(
    cs: &mut CS,
    name: &str,
    value: Option<u64>,
    width: usize,
) -> Result<Vec<AllocatedBit>, SynthesisError> {
    (0..width)
        .map(|j| {
            AllocatedBit::alloc(
                cs.namespace(|| format!("{}_bit_{}", name, j)),
                value.map(|v| j < 64 && (v >> j) & 1 == 1),
            )
        })
        .collect()
}

/// `Σ 2^j · b_j`
pub fn packed<F: PrimeField>(bits: &[AllocatedBit]) -> LinearCombination<F> {
    let mut lc = LinearCombination::zero();
    let mut coeff = F::ONE;
    for bit in bits {
        lc = lc + (coeff, bit.get_variable());
        coeff = coeff.double();
    }
    lc
}

/// Linear combination plus its prover-side integer value.
#[derive(Clone)]
pub struct Term<F: PrimeField> {
    pub lc: LinearCombination<F>,
    pub value: Option<i128>,
}

impl<F: PrimeField> Term<F> {
    pub fn constant<CS: ConstraintSystem<F>>(value: i128) -> Self {
        Self {
            lc: LinearCombination::zero() + (fe(value), CS::one()),
            value: Some(value),
        }
    }

    pub fn from_num(num: &AllocatedNum<F>) -> Self {
        Self {
            lc: LinearCombination::zero() + num.get_variable(),
            value: num.get_value().and_then(to_i128),
        }
    }

    pub fn from_bit(bit: &AllocatedBit) -> Self {
        Self {
            lc: LinearCombination::zero() + bit.get_variable(),
            value: bit.get_value().map(i128::from),
        }
    }

    pub fn add(&self, other: &Term<F>) -> Self {
        Self {
            lc: self.lc.clone() + &other.lc,
            value: self.value.zip(other.value).and_then(|(a, b)| a.checked_add(b)),
        }
    }

    pub fn sub(&self, other: &Term<F>) -> Self {
        Self {
            lc: self.lc.clone() - &other.lc,
            value: self.value.zip(other.value).and_then(|(a, b)| a.checked_sub(b)),
        }
    }

    pub fn scale(&self, k: i128) -> Self {
        Self {
            lc: LinearCombination::zero() + (fe(k), &self.lc),
            value: self.value.and_then(|v| v.checked_mul(k)),
        }
    }

    pub fn add_const<CS: ConstraintSystem<F>>(&self, k: i128) -> Self {
        self.add(&Term::constant::<CS>(k))
    }
}

/// Fresh witness variable.
pub fn alloc<F: PrimeField, CS: ConstraintSystem<F>>(
    cs: CS,
    value: Option<i128>,
) -> Result<Term<F>, SynthesisError> {
    let num = AllocatedNum::alloc(cs, || value.map(fe).ok_or(SynthesisError::AssignmentMissing))?;
    Ok(Term {
        lc: LinearCombination::zero() + num.get_variable(),
        value,
    })
}

/// Fresh boolean witness variable.
pub fn alloc_bit<F: PrimeField, CS: ConstraintSystem<F>>(
    cs: CS,
    value: Option<bool>,
) -> Result<Term<F>, SynthesisError> {
    let bit = AllocatedBit::alloc(cs, value)?;
    Ok(Term::from_bit(&bit))
}

/// `a · b`
pub fn mul<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    a: &Term<F>,
    b: &Term<F>,
) -> Result<Term<F>, SynthesisError> {
    let value = a.value.zip(b.value).and_then(|(x, y)| x.checked_mul(y));
    let product = alloc(cs.namespace(|| "product"), value)?;
    cs.enforce(
        || "product_def",
        |lc| lc + &a.lc,
        |lc| lc + &b.lc,
        |lc| lc + &product.lc,
    );
    Ok(product)
}

/// `a == b` as a hard constraint.
pub fn enforce_equal<F: PrimeField, CS: ConstraintSystem<F>>(cs: &mut CS, name: &str, a: &Term<F>, b: &Term<F>) {
    cs.enforce(
        || name.to_string(),
        |lc| lc + &a.lc,
        |lc| lc + CS::one(),
        |lc| lc + &b.lc,
    );
}

/// `0 <= t < 2^bits` by bit decomposition.
pub fn range_check<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    t: &Term<F>,
    bits: usize,
) -> Result<(), SynthesisError> {
    let decomposed = (0..bits)
        .map(|j| AllocatedBit::alloc(cs.namespace(|| format!("bit_{}", j)), t.value.map(|v| bit_of(v, j))))
        .collect::<Result<Vec<_>, _>>()?;
    cs.enforce(
        || "packing",
        |_| packed(&decomposed),
        |lc| lc + CS::one(),
        |lc| lc + &t.lc,
    );
    Ok(())
}

/// Bit `[a <= b]`. Sound while `|b - a| < 2^bits`.
///
/// With `c` the claimed bit, `c·(b − a)` is allocated and the slack
/// `2·c·(b − a) − (b − a) + c − 1` is range-checked: it equals `b − a` when
/// `c = 1` and `a − b − 1` when `c = 0`, so only the true bit has a
/// non-negative slack.
pub fn leq<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    a: &Term<F>,
    b: &Term<F>,
    bits: usize,
) -> Result<Term<F>, SynthesisError> {
    let diff = b.sub(a);
    let flag = diff.value.map(|d| d >= 0);
    let c = alloc_bit(cs.namespace(|| "flag"), flag)?;
    let gated = mul(cs.namespace(|| "gated"), &c, &diff)?;

    let slack = Term {
        lc: LinearCombination::zero() + (F::from(2), &gated.lc) - &diff.lc + &c.lc - CS::one(),
        value: flag
            .zip(diff.value)
            .map(|(f, d)| if f { d } else { -d - 1 }),
    };
    range_check(cs.namespace(|| "slack"), &slack, bits)?;
    Ok(c)
}

/// Bit `[a < b]`. Sound while `|b - a| < 2^bits`.
pub fn lt<F: PrimeField, CS: ConstraintSystem<F>>(
    cs: CS,
    a: &Term<F>,
    b: &Term<F>,
    bits: usize,
) -> Result<Term<F>, SynthesisError> {
    leq(cs, &a.add_const::<CS>(1), b, bits)
}

/// Bit `[a == b]`.
pub fn is_equal<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    a: &Term<F>,
    b: &Term<F>,
) -> Result<Term<F>, SynthesisError> {
    let diff = a.sub(b);
    let eq = alloc_bit(cs.namespace(|| "eq"), diff.value.map(|d| d == 0))?;
    let inverse = diff.value.map(|d| fe::<F>(d).invert().unwrap_or(F::ZERO));
    let inv = AllocatedNum::alloc(cs.namespace(|| "inverse"), || {
        inverse.ok_or(SynthesisError::AssignmentMissing)
    })?;

    // diff · inv = 1 − eq
    cs.enforce(
        || "inverse_def",
        |lc| lc + &diff.lc,
        |lc| lc + inv.get_variable(),
        |lc| lc + CS::one() - &eq.lc,
    );
    // diff · eq = 0
    cs.enforce(
        || "zero_when_equal",
        |lc| lc + &diff.lc,
        |lc| lc + &eq.lc,
        |lc| lc,
    );
    Ok(eq)
}

/// `!flag || check`, i.e. `1 − flag + flag · check`.
pub fn implies<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    flag: &Term<F>,
    check: &Term<F>,
) -> Result<Term<F>, SynthesisError> {
    let gated = mul(cs.namespace(|| "gated"), flag, check)?;
    Ok(Term::constant::<CS>(1).sub(flag).add(&gated))
}

/// Product of every bit.
pub fn and_all<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    bits: &[Term<F>],
) -> Result<Term<F>, SynthesisError> {
    let mut acc = Term::constant::<CS>(1);
    for (k, bit) in bits.iter().enumerate() {
        acc = mul(cs.namespace(|| format!("and_{}", k)), &acc, bit)?;
    }
    Ok(acc)
}
