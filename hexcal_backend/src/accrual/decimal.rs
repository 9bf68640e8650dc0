//! WAD-scaled arbitrary-precision decimal.
//!
//! Backed by `BigUint` so sums over thousands of days never overflow. Every
//! division rounds down, and only the `floor_nat`/`to_f64` conversions leave
//! the scaled representation.

use candid::Nat;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use std::fmt;
use std::ops::Add;

/// Digits of precision
pub const SCALE: usize = 18;
/// Identity
pub const WAD: u64 = 1_000_000_000_000_000_000;

fn wad() -> BigUint {
    BigUint::from(WAD)
}

/// Non-negative decimal value, precise to 18 digits
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Decimal(BigUint);

impl Decimal {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_nat(n: &Nat) -> Self {
        Self(&n.0 * wad())
    }

    pub fn from_u64(n: u64) -> Self {
        Self(BigUint::from(n) * wad())
    }

    /// `numerator / denominator`, None when the denominator is zero
    pub fn from_ratio(numerator: &BigUint, denominator: &BigUint) -> Option<Self> {
        if denominator.is_zero() {
            return None;
        }
        Some(Self(numerator * wad() / denominator))
    }

    pub fn mul_u64(&self, n: u64) -> Self {
        Self(&self.0 * BigUint::from(n))
    }

    pub fn div_u64(&self, n: u64) -> Option<Self> {
        if n == 0 {
            return None;
        }
        Some(Self(&self.0 / BigUint::from(n)))
    }

    /// `self / other`, None when `other` is zero
    pub fn ratio(&self, other: &Decimal) -> Option<Self> {
        if other.is_zero() {
            return None;
        }
        Some(Self(&self.0 * wad() / &other.0))
    }

    /// Whole units, rounded down
    pub fn floor_nat(&self) -> Nat {
        Nat(&self.0 / wad())
    }

    pub fn to_f64(&self) -> f64 {
        let whole = (&self.0 / wad()).to_f64().unwrap_or(f64::INFINITY);
        let frac = (&self.0 % wad()).to_f64().unwrap_or(0.0) / WAD as f64;
        whole + frac
    }
}

impl Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Decimal> for Decimal {
    type Output = Decimal;

    fn add(self, rhs: &'a Decimal) -> Decimal {
        Decimal(self.0 + &rhs.0)
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scaled_val = self.0.to_string();
        if scaled_val.len() <= SCALE {
            scaled_val.insert_str(0, &"0".repeat(SCALE - scaled_val.len()));
            scaled_val.insert_str(0, "0.");
        } else {
            scaled_val.insert(scaled_val.len() - SCALE, '.');
        }
        f.write_str(&scaled_val)
    }
}
