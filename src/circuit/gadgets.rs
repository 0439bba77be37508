//! Branch-free boolean algebra over 0/1 values.
//!
//! Every policy condition is computed as a [`Bit`] and combined with
//! multiplication (AND) and `1 - x` (NOT), the same shape the constraints
//! take inside an arithmetic circuit.

use crate::types::Commitment;
use crate::utils::ct_eq;

/// A value constrained to 0 or 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bit(u64);

impl Bit {
    pub const ZERO: Bit = Bit(0);
    pub const ONE: Bit = Bit(1);

    #[inline]
    pub fn from_bool(b: bool) -> Self {
        Bit(b as u64)
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_set(self) -> bool {
        self.0 == 1
    }

    /// `a * b`
    #[inline]
    pub fn and(self, other: Bit) -> Bit {
        Bit(self.0 * other.0)
    }

    /// `1 - a`
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Bit {
        Bit(1 - self.0)
    }

    /// `a + b - a * b`
    #[inline]
    pub fn or(self, other: Bit) -> Bit {
        Bit(self.0 + other.0 - self.0 * other.0)
    }

    /// `b * t + (1 - b) * f`
    #[inline]
    pub fn select(self, if_set: u64, if_clear: u64) -> u64 {
        self.0 * if_set + (1 - self.0) * if_clear
    }

    #[inline]
    pub fn select_bit(self, if_set: Bit, if_clear: Bit) -> Bit {
        Bit(self.select(if_set.0, if_clear.0))
    }

    /// A check that only binds when `flag` is set: `!flag || check`.
    #[inline]
    pub fn enforced_if(check: Bit, flag: bool) -> Bit {
        Bit::from_bool(flag).not().or(check)
    }
}

/// AND of every bit.
pub fn all(bits: &[Bit]) -> Bit {
    bits.iter().fold(Bit::ONE, |acc, b| acc.and(*b))
}

#[inline]
pub fn leq<T: PartialOrd>(a: T, b: T) -> Bit {
    Bit::from_bool(a <= b)
}

#[inline]
pub fn lt<T: PartialOrd>(a: T, b: T) -> Bit {
    Bit::from_bool(a < b)
}

/// `lo <= x <= hi`
#[inline]
pub fn in_range<T: PartialOrd + Copy>(x: T, lo: T, hi: T) -> Bit {
    leq(lo, x).and(Bit::from_bool(x <= hi))
}

/// Constant-time commitment equality.
#[inline]
pub fn commitment_eq(a: &Commitment, b: &Commitment) -> Bit {
    Bit::from_bool(ct_eq(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_tables() {
        for a in [Bit::ZERO, Bit::ONE] {
            for b in [Bit::ZERO, Bit::ONE] {
                assert_eq!(a.and(b).is_set(), a.is_set() && b.is_set());
                assert_eq!(a.or(b).is_set(), a.is_set() || b.is_set());
            }
            assert_eq!(a.not().is_set(), !a.is_set());
        }
    }

    #[test]
    fn test_select() {
        assert_eq!(Bit::ONE.select(7, 9), 7);
        assert_eq!(Bit::ZERO.select(7, 9), 9);
    }

    #[test]
    fn test_enforced_if() {
        assert!(Bit::enforced_if(Bit::ZERO, false).is_set());
        assert!(!Bit::enforced_if(Bit::ZERO, true).is_set());
        assert!(Bit::enforced_if(Bit::ONE, true).is_set());
    }

    #[test]
    fn test_all_and_range() {
        assert!(all(&[]).is_set());
        assert!(!all(&[Bit::ONE, Bit::ZERO, Bit::ONE]).is_set());
        assert!(in_range(5, 5, 10).is_set());
        assert!(in_range(10, 5, 10).is_set());
        assert!(!in_range(11, 5, 10).is_set());
    }

    #[test]
    fn test_in_range_on_signed_timestamps() {
        let now: i64 = 1_705_320_000;
        assert!(in_range(now, now - 1, now + 1).is_set());
        assert!(!in_range(-1i64, 0, i64::MAX).is_set());
    }
}
