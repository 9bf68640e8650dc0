use candid::{CandidType, Deserialize, Nat};
use chrono::NaiveDate;
use ic_stable_structures::{storable::Bound, Storable};
use num_bigint::BigUint;
use num_traits::{Num, Zero};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::HexcalError;

// =============================================================================
// CONSTANTS
// =============================================================================

pub const HEARTS_PER_HEX: u64 = 100_000_000; // 1 HEX = 10^8 hearts
pub const HEX_DECIMALS: u32 = 8;
pub const SATOSHIS_PER_BTC: u64 = 100_000_000;
pub const HEX_PER_BTC: u64 = 10_000;
pub const HEARTS_PER_SATOSHI: u64 = HEARTS_PER_HEX / SATOSHIS_PER_BTC * HEX_PER_BTC;

/// Shares are denominated in 10^-12 T-shares
pub const SHARES_PER_TSHARE: u64 = 1_000_000_000_000;

pub const PRE_CLAIM_DAYS: u64 = 1;
pub const CLAIM_PHASE_WEEKS: u64 = 50;
pub const CLAIM_PHASE_DAYS: u64 = CLAIM_PHASE_WEEKS * 7;
/// The only day carrying a non-zero one-time bonus
pub const BONUS_DAY: u64 = PRE_CLAIM_DAYS + CLAIM_PHASE_DAYS + 1;

pub const LAUNCH_YEAR: i32 = 2019;
pub const LAUNCH_MONTH: u32 = 12;
pub const LAUNCH_DAY: u32 = 3;

/// Calendar date of day 1
pub fn launch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(LAUNCH_YEAR, LAUNCH_MONTH, LAUNCH_DAY).unwrap_or(NaiveDate::MIN)
}

/// Calendar date for a 1-based day index. Day 0 and overflowing days have no date.
pub fn date_for_day(day: u64) -> Option<NaiveDate> {
    if day == 0 {
        return None;
    }
    launch_date().checked_add_days(chrono::Days::new(day - 1))
}

// =============================================================================
// ADDRESS
// =============================================================================

/// 20-byte account handle on the ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[38..])
    }
}

impl FromStr for Address {
    type Err = HexcalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 40 {
            return Err(HexcalError::InvalidAddress(s.to_string()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|_| HexcalError::InvalidAddress(s.to_string()))?;
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Storable for Address {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Borrowed(&self.0)
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        let mut out = [0u8; 20];
        let len = bytes.len().min(20);
        out[..len].copy_from_slice(&bytes[..len]);
        Address(out)
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 20,
        is_fixed_size: true,
    };
}

// =============================================================================
// RAW LEDGER VALUES
// =============================================================================

/// Numeric field as returned by the ledger: decimal (or 0x-hex) text, or a Nat
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum RawNumber {
    Text(String),
    Nat(Nat),
}

impl RawNumber {
    /// None for negative, empty or non-numeric text
    pub fn to_biguint(&self) -> Option<BigUint> {
        match self {
            RawNumber::Nat(n) => Some(n.0.clone()),
            RawNumber::Text(s) => {
                let s = s.trim();
                match s.strip_prefix("0x") {
                    Some(hex_digits) => BigUint::from_str_radix(hex_digits, 16).ok(),
                    None => BigUint::from_str_radix(s, 10).ok(),
                }
            }
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.to_biguint().and_then(|n| u64::try_from(n).ok())
    }
}

impl From<u64> for RawNumber {
    fn from(n: u64) -> Self {
        RawNumber::Nat(Nat::from(n))
    }
}

impl From<&str> for RawNumber {
    fn from(s: &str) -> Self {
        RawNumber::Text(s.to_string())
    }
}

impl From<BigUint> for RawNumber {
    fn from(n: BigUint) -> Self {
        RawNumber::Nat(Nat(n))
    }
}

/// One entry of the ledger's per-owner stake list
#[derive(CandidType, Deserialize, Serialize, Clone, Debug)]
pub struct RawStake {
    pub stake_id: RawNumber,
    pub staked_hearts: RawNumber,
    pub stake_shares: RawNumber,
    pub locked_day: RawNumber,
    pub staked_days: RawNumber,
    pub unlocked_day: RawNumber,
    pub is_auto_stake: bool,
}

// =============================================================================
// DISPLAY HELPERS
// =============================================================================

/// Render hearts as whole tokens with all 8 fractional digits
pub fn format_hearts(hearts: &Nat) -> String {
    let scale = BigUint::from(HEARTS_PER_HEX);
    let whole = &hearts.0 / &scale;
    let frac = &hearts.0 % &scale;
    let frac = if frac.is_zero() { 0u64 } else { u64::try_from(frac).unwrap_or(0) };
    format!("{}.{:0width$}", whole, frac, width = HEX_DECIMALS as usize)
}
