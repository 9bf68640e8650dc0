use candid::Nat;
use chrono::NaiveDate;

use crate::error::HexcalError;
use crate::types::{date_for_day, Address, RawNumber, RawStake};

/// Typed stake snapshot. Immutable once decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stake {
    pub stake_id: u64,
    pub owner: Address,
    pub staked_hearts: Nat,
    pub stake_shares: Nat,
    pub locked_day: u64,
    pub staked_days: u64,
    /// 0 while the stake is open
    pub unlocked_day: u64,
    pub is_auto_stake: bool,
}

impl Stake {
    /// Day index the stake becomes unlockable
    pub fn unlock_day(&self) -> u64 {
        self.locked_day.saturating_add(self.staked_days)
    }

    /// Launch date + (lockedDay + stakedDays - 1) days
    pub fn unlock_date(&self) -> Option<NaiveDate> {
        date_for_day(self.unlock_day())
    }

    pub fn is_open(&self) -> bool {
        self.unlocked_day == 0
    }
}

fn field_u64(name: &str, raw: &RawNumber) -> Result<u64, HexcalError> {
    raw.to_u64()
        .ok_or_else(|| HexcalError::MalformedStake(format!("{}: {:?}", name, raw)))
}

fn field_nat(name: &str, raw: &RawNumber) -> Result<Nat, HexcalError> {
    raw.to_biguint()
        .map(Nat)
        .ok_or_else(|| HexcalError::MalformedStake(format!("{}: {:?}", name, raw)))
}

/// Decode one ledger stake entry for `owner`
pub fn decode_stake(owner: Address, raw: &RawStake) -> Result<Stake, HexcalError> {
    let stake = Stake {
        stake_id: field_u64("stakeId", &raw.stake_id)?,
        owner,
        staked_hearts: field_nat("stakedHearts", &raw.staked_hearts)?,
        stake_shares: field_nat("stakeShares", &raw.stake_shares)?,
        locked_day: field_u64("lockedDay", &raw.locked_day)?,
        staked_days: field_u64("stakedDays", &raw.staked_days)?,
        unlocked_day: field_u64("unlockedDay", &raw.unlocked_day)?,
        is_auto_stake: raw.is_auto_stake,
    };

    if stake.locked_day == 0 {
        return Err(HexcalError::MalformedStake(format!(
            "stake {} has lockedDay 0", stake.stake_id
        )));
    }
    if stake.staked_days == 0 {
        return Err(HexcalError::MalformedStake(format!(
            "stake {} has stakedDays 0", stake.stake_id
        )));
    }

    Ok(stake)
}

/// Inverse of `decode_stake`, used by ledger fakes and tests
pub fn encode_stake(stake: &Stake) -> RawStake {
    RawStake {
        stake_id: RawNumber::from(stake.stake_id),
        staked_hearts: RawNumber::from(stake.staked_hearts.0.clone()),
        stake_shares: RawNumber::from(stake.stake_shares.0.clone()),
        locked_day: RawNumber::from(stake.locked_day),
        staked_days: RawNumber::from(stake.staked_days),
        unlocked_day: RawNumber::from(stake.unlocked_day),
        is_auto_stake: stake.is_auto_stake,
    }
}
