//! Packed per-day ledger records.
//!
//! Each day arrives as one 25-byte big-endian unsigned integer:
//!
//! ```text
//! | bytes 0..7        | bytes 7..16   | bytes 16..25 |
//! | unclaimed satoshis| total shares  | payout       |
//! |     56 bits       |   72 bits     |   72 bits    |
//! ```

use candid::Nat;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::collections::BTreeMap;

use crate::accrual::decimal::Decimal;
use crate::error::HexcalError;
use crate::types::{RawNumber, BONUS_DAY, HEARTS_PER_SATOSHI};

pub const PACKED_RECORD_BYTES: u64 = 25;
const PAYOUT_BITS: u64 = 72;
const SHARES_BITS: u64 = 72;
const SATOSHIS_BITS: u64 = 56;

/// Sparse day -> record map. Absent days are not zero days.
pub type DailyRecords = BTreeMap<u64, DailyRecord>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyRecord {
    pub day: u64,
    pub payout: Nat,
    pub total_shares: Nat,
    pub unclaimed_satoshis: Nat,
}

fn mask(bits: u64) -> BigUint {
    (BigUint::one() << bits) - BigUint::one()
}

impl DailyRecord {
    /// A day with zero pool shares cannot be divided by and is skipped everywhere
    pub fn is_usable(&self) -> bool {
        !self.total_shares.0.is_zero()
    }

    /// payout / totalShares
    pub fn interest_per_share(&self) -> Option<Decimal> {
        Decimal::from_ratio(&self.payout.0, &self.total_shares.0)
    }

    /// unclaimedSatoshis * heartsPerSatoshi / totalShares on the bonus day, zero on every other day
    pub fn bonus_per_share(&self) -> Option<Decimal> {
        if !self.is_usable() {
            return None;
        }
        if self.day != BONUS_DAY {
            return Some(Decimal::zero());
        }
        Decimal::from_ratio(&self.bonus_pool_hearts(), &self.total_shares.0)
    }

    fn bonus_pool_hearts(&self) -> BigUint {
        &self.unclaimed_satoshis.0 * BigUint::from(HEARTS_PER_SATOSHI)
    }

    /// `payout * stake_shares / total_shares` kept at full precision
    pub fn interest_for_shares(&self, stake_shares: &Nat) -> Option<Decimal> {
        Decimal::from_ratio(&(&self.payout.0 * &stake_shares.0), &self.total_shares.0)
    }

    /// Bonus hearts owed to `stake_shares` on this day
    pub fn bonus_for_shares(&self, stake_shares: &Nat) -> Option<Decimal> {
        if !self.is_usable() {
            return None;
        }
        if self.day != BONUS_DAY {
            return Some(Decimal::zero());
        }
        Decimal::from_ratio(&(self.bonus_pool_hearts() * &stake_shares.0), &self.total_shares.0)
    }
}

/// Decode one packed value for `day`
pub fn decode_daily_record(day: u64, packed: &BigUint) -> Result<DailyRecord, HexcalError> {
    if packed.bits() > PACKED_RECORD_BYTES * 8 {
        return Err(HexcalError::MalformedDailyRecord(format!(
            "day {}: value is {} bits wide, at most {} allowed",
            day,
            packed.bits(),
            PACKED_RECORD_BYTES * 8
        )));
    }

    let payout = packed & mask(PAYOUT_BITS);
    let total_shares = (packed >> PAYOUT_BITS) & mask(SHARES_BITS);
    let unclaimed_satoshis = (packed >> (PAYOUT_BITS + SHARES_BITS)) & mask(SATOSHIS_BITS);

    Ok(DailyRecord {
        day,
        payout: Nat(payout),
        total_shares: Nat(total_shares),
        unclaimed_satoshis: Nat(unclaimed_satoshis),
    })
}

/// Decode a ledger-supplied value. Negative or non-numeric text is structurally impossible.
pub fn decode_raw_daily_record(day: u64, raw: &RawNumber) -> Result<DailyRecord, HexcalError> {
    let packed = raw.to_biguint().ok_or_else(|| {
        HexcalError::MalformedDailyRecord(format!("day {}: not a non-negative integer: {:?}", day, raw))
    })?;
    decode_daily_record(day, &packed)
}

/// Pack a record back into the ledger layout. None if a field overflows its slot.
pub fn encode_daily_record(record: &DailyRecord) -> Option<BigUint> {
    if record.payout.0.bits() > PAYOUT_BITS
        || record.total_shares.0.bits() > SHARES_BITS
        || record.unclaimed_satoshis.0.bits() > SATOSHIS_BITS
    {
        return None;
    }
    Some(
        (&record.unclaimed_satoshis.0 << (PAYOUT_BITS + SHARES_BITS))
            | (&record.total_shares.0 << PAYOUT_BITS)
            | &record.payout.0,
    )
}

/// Decode a contiguous range starting at `start_day`, keyed by day.
///
/// Malformed entries are left out and counted; they never abort the batch.
pub fn decode_daily_range(start_day: u64, packed: &[RawNumber]) -> (DailyRecords, u32) {
    let mut records = DailyRecords::new();
    let mut skipped = 0u32;
    for (offset, raw) in packed.iter().enumerate() {
        let day = start_day + offset as u64;
        match decode_raw_daily_record(day, raw) {
            Ok(record) => {
                records.insert(day, record);
            }
            Err(_) => skipped += 1,
        }
    }
    (records, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(day: u64, payout: u64, shares: u64, sats: u64) -> DailyRecord {
        DailyRecord {
            day,
            payout: Nat::from(payout),
            total_shares: Nat::from(shares),
            unclaimed_satoshis: Nat::from(sats),
        }
    }

    #[test]
    fn test_byte_layout() {
        // 25 bytes: 7 sats | 9 shares | 9 payout
        let mut bytes = [0u8; 25];
        bytes[6] = 0x03; // sats = 3
        bytes[15] = 0x02; // shares = 2
        bytes[24] = 0x01; // payout = 1
        let packed = BigUint::from_bytes_be(&bytes);

        let decoded = decode_daily_record(10, &packed).unwrap();
        assert_eq!(decoded, record(10, 1, 2, 3));
    }

    #[test]
    fn test_rejects_wider_than_25_bytes() {
        let packed = BigUint::one() << 200;
        assert!(matches!(
            decode_daily_record(1, &packed),
            Err(HexcalError::MalformedDailyRecord(_))
        ));
        // the widest legal value decodes
        assert!(decode_daily_record(1, &mask(200)).is_ok());
    }

    #[test]
    fn test_rejects_negative_text() {
        let raw = RawNumber::from("-12");
        assert!(matches!(
            decode_raw_daily_record(1, &raw),
            Err(HexcalError::MalformedDailyRecord(_))
        ));
    }

    #[test]
    fn test_zero_shares_is_unusable_not_an_error() {
        let r = decode_daily_record(5, &BigUint::from(999u64)).unwrap();
        assert!(!r.is_usable());
        assert_eq!(r.interest_per_share(), None);
        assert_eq!(r.bonus_per_share(), None);
        assert_eq!(r.interest_for_shares(&Nat::from(10u64)), None);
    }

    #[test]
    fn test_interest_per_share() {
        let r = record(3, 2_000, 1_000, 0);
        assert_eq!(r.interest_per_share(), Some(Decimal::from_u64(2)));
    }

    #[test]
    fn test_bonus_only_on_bonus_day() {
        // 1 sat * 10_000 hearts/sat / 2_000 shares = 5 per share
        let r = record(BONUS_DAY, 0, 2_000, 1);
        assert_eq!(r.bonus_per_share(), Some(Decimal::from_u64(5)));

        let other = record(BONUS_DAY + 1, 0, 2_000, 1);
        assert_eq!(other.bonus_per_share(), Some(Decimal::zero()));
    }

    #[test]
    fn test_decode_range_skips_malformed() {
        let packed = vec![
            RawNumber::from(BigUint::from(7u64) << 72u32),
            RawNumber::from("garbage"),
            RawNumber::from(BigUint::from(9u64) << 72u32),
        ];
        let (records, skipped) = decode_daily_range(100, &packed);
        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[&100].total_shares, Nat::from(7u64));
        assert!(!records.contains_key(&101));
        assert_eq!(records[&102].total_shares, Nat::from(9u64));
    }

    proptest! {
        #[test]
        fn prop_decode_encode_round_trip(
            sats in any::<u64>().prop_map(|v| v >> 8),
            shares_hi in any::<u8>(),
            shares_lo in any::<u64>(),
            payout_hi in any::<u8>(),
            payout_lo in any::<u64>(),
            day in 1u64..10_000,
        ) {
            let shares = (BigUint::from(shares_hi) << 64u32) | BigUint::from(shares_lo);
            let payout = (BigUint::from(payout_hi) << 64u32) | BigUint::from(payout_lo);
            let original = DailyRecord {
                day,
                payout: Nat(payout),
                total_shares: Nat(shares),
                unclaimed_satoshis: Nat::from(sats),
            };

            let packed = encode_daily_record(&original).unwrap();
            prop_assert!(packed.bits() <= PACKED_RECORD_BYTES * 8);
            let decoded = decode_daily_record(day, &packed).unwrap();
            prop_assert_eq!(decoded, original);
        }
    }
}
