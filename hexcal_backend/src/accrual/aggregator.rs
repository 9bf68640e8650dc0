use candid::Nat;
use num_bigint::BigUint;

use super::decimal::Decimal;
use crate::ledger::daily::DailyRecords;
use crate::ledger::stake::Stake;
use crate::types::BONUS_DAY;

/// Trailing days, ending at `last_day`, averaged for the yield estimate
pub const YIELD_WINDOW_DAYS: usize = 3;
const DAYS_PER_YEAR: u64 = 365;

/// Accrual of a single stake at one `last_day`
#[derive(Clone, Debug, PartialEq)]
pub struct StakeAccrual {
    pub stake: Stake,
    pub interest: Decimal,
    pub bonus: Decimal,
}

/// Result of one aggregation pass. Rebuilt from scratch on every refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct AccrualResult {
    pub last_day: u64,
    /// Sorted by unlock day, then owner, then stake id
    pub stakes: Vec<StakeAccrual>,
    pub total_staked_hearts: Nat,
    pub total_stake_shares: Nat,
    pub total_interest: Decimal,
    pub total_bonus: Decimal,
    /// None unless the three days ending at `last_day` are all usable
    pub annualized_yield_percent: Option<f64>,
    /// None when `last_day` has no usable record
    pub pool_share_percent: Option<f64>,
}

/// Σ interestPerShare × stakeShares over days in (lockedDay, lastDay]
///
/// Absent days and days with zero pool shares contribute nothing.
pub fn accrue_stake(stake: &Stake, records: &DailyRecords, last_day: u64) -> Decimal {
    let first_day = stake.locked_day.saturating_add(1);
    if first_day > last_day {
        return Decimal::zero();
    }
    records
        .range(first_day..=last_day)
        .filter_map(|(_, record)| record.interest_for_shares(&stake.stake_shares))
        .sum()
}

/// Bonus owed on the bonus day, zero unless it falls in (lockedDay, lastDay]
pub fn accrue_bonus(stake: &Stake, records: &DailyRecords, last_day: u64) -> Decimal {
    if BONUS_DAY <= stake.locked_day || BONUS_DAY > last_day {
        return Decimal::zero();
    }
    records
        .get(&BONUS_DAY)
        .and_then(|record| record.bonus_for_shares(&stake.stake_shares))
        .unwrap_or_default()
}

/// Earliest day a batched range query must cover for `stakes`
pub fn batch_min_day(stakes: &[Stake]) -> Option<u64> {
    stakes.iter().map(|s| s.locked_day.saturating_sub(1)).min()
}

fn sum_nats<'a>(values: impl Iterator<Item = &'a Nat>) -> Nat {
    Nat(values.fold(BigUint::default(), |acc, n| acc + &n.0))
}

/// Fold every stake into one result for `last_day`
pub fn aggregate(stakes: &[Stake], records: &DailyRecords, last_day: u64) -> AccrualResult {
    let mut accruals: Vec<StakeAccrual> = stakes
        .iter()
        .map(|stake| StakeAccrual {
            stake: stake.clone(),
            interest: accrue_stake(stake, records, last_day),
            bonus: accrue_bonus(stake, records, last_day),
        })
        .collect();
    accruals.sort_by(|a, b| {
        (a.stake.unlock_day(), a.stake.owner, a.stake.stake_id)
            .cmp(&(b.stake.unlock_day(), b.stake.owner, b.stake.stake_id))
    });

    let total_staked_hearts = sum_nats(stakes.iter().map(|s| &s.staked_hearts));
    let total_stake_shares = sum_nats(stakes.iter().map(|s| &s.stake_shares));
    let total_interest: Decimal = accruals.iter().map(|a| a.interest.clone()).sum();
    let total_bonus: Decimal = accruals.iter().map(|a| a.bonus.clone()).sum();

    let annualized_yield_percent = yield_from_totals(
        records,
        last_day,
        &total_stake_shares,
        &total_staked_hearts,
        &total_interest,
    );
    let pool_share_percent = share_of_pool(records, last_day, &total_stake_shares);

    AccrualResult {
        last_day,
        stakes: accruals,
        total_staked_hearts,
        total_stake_shares,
        total_interest,
        total_bonus,
        annualized_yield_percent,
        pool_share_percent,
    }
}

/// Annualized yield from the three days ending at `last_day`
///
/// Every day in the window must be present and usable, otherwise the yield
/// is unknown.
///
/// ```text
/// avg_daily = Σ(interestPerShare_d × trackedShares) / 3
/// yield     = avg_daily / (totalStaked + totalInterest) × 365 × 100
/// ```
pub fn annualized_yield(stakes: &[Stake], records: &DailyRecords, last_day: u64) -> Option<f64> {
    let tracked_shares = sum_nats(stakes.iter().map(|s| &s.stake_shares));
    let staked = sum_nats(stakes.iter().map(|s| &s.staked_hearts));
    let interest: Decimal = stakes
        .iter()
        .map(|s| accrue_stake(s, records, last_day))
        .sum();
    yield_from_totals(records, last_day, &tracked_shares, &staked, &interest)
}

fn yield_from_totals(
    records: &DailyRecords,
    last_day: u64,
    tracked_shares: &Nat,
    total_staked: &Nat,
    total_interest: &Decimal,
) -> Option<f64> {
    let first_day = last_day.saturating_sub(YIELD_WINDOW_DAYS as u64 - 1);
    let window: Vec<Decimal> = records
        .range(first_day..=last_day)
        .filter_map(|(_, record)| record.interest_for_shares(tracked_shares))
        .collect();
    if window.len() < YIELD_WINDOW_DAYS {
        return None;
    }

    let avg_daily = window.into_iter().sum::<Decimal>().div_u64(YIELD_WINDOW_DAYS as u64)?;
    let base = Decimal::from_nat(total_staked) + total_interest;
    let ratio = avg_daily.ratio(&base)?;
    Some(ratio.mul_u64(DAYS_PER_YEAR * 100).to_f64())
}

/// Tracked shares as a percentage of the pool on `last_day`
pub fn pool_share(stakes: &[Stake], records: &DailyRecords, last_day: u64) -> Option<f64> {
    let tracked_shares = sum_nats(stakes.iter().map(|s| &s.stake_shares));
    share_of_pool(records, last_day, &tracked_shares)
}

fn share_of_pool(records: &DailyRecords, last_day: u64, tracked_shares: &Nat) -> Option<f64> {
    let record = records.get(&last_day)?;
    let share = Decimal::from_ratio(&tracked_shares.0, &record.total_shares.0)?;
    Some(share.mul_u64(100).to_f64())
}

/// Whole hearts (rounded down) for display and transport
pub fn to_hearts(value: &Decimal) -> Nat {
    value.floor_nat()
}
