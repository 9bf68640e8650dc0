use candid::{CandidType, Deserialize, Nat};
use serde::Serialize;

use super::snapshot::{FetchReport, LedgerSnapshot};
use num_bigint::BigUint;

use crate::accrual::{aggregate, to_hearts, AccrualResult, Decimal, StakeAccrual};
use crate::price::hearts_to_fiat;
use crate::types::SHARES_PER_TSHARE;

/// Per-stake row of a portfolio report
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct StakeView {
    pub stake_id: u64,
    pub owner: String,
    pub staked_hearts: Nat,
    pub stake_shares: Nat,
    pub stake_tshares: f64,
    pub locked_day: u64,
    pub staked_days: u64,
    pub unlock_day: u64,
    /// ISO date, None past the calendar range
    pub unlock_date: Option<String>,
    pub is_open: bool,
    pub is_auto_stake: bool,
    pub interest_hearts: Nat,
    pub bonus_hearts: Nat,
    pub value_fiat: Option<f64>,
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct OwnerBalance {
    pub owner: String,
    /// None when the read failed
    pub balance_hearts: Option<Nat>,
    pub value_fiat: Option<f64>,
}

/// Everything the canister serves about the tracked owners at one ledger day
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PortfolioReport {
    pub generation: u64,
    /// None when the ledger's current day could not be read
    pub last_day: Option<u64>,
    pub stakes: Vec<StakeView>,
    pub balances: Vec<OwnerBalance>,
    pub total_staked_hearts: Nat,
    pub total_stake_shares: Nat,
    pub total_tshares: f64,
    pub total_interest_hearts: Nat,
    pub total_bonus_hearts: Nat,
    pub annualized_yield_percent: Option<f64>,
    pub pool_share_percent: Option<f64>,
    pub fiat_rate: Option<f64>,
    /// Staked principal, interest, bonus and unstaked balances, all at `fiat_rate`
    pub total_value_fiat: Option<f64>,
    pub fetch: FetchReport,
}

/// Shares in T-share units for display
fn to_tshares(shares: &Nat) -> f64 {
    Decimal::from_ratio(&shares.0, &BigUint::from(SHARES_PER_TSHARE)).map_or(0.0, |d| d.to_f64())
}

fn stake_view(accrual: &StakeAccrual, fiat_rate: Option<f64>) -> StakeView {
    let stake = &accrual.stake;
    let interest_hearts = to_hearts(&accrual.interest);
    let bonus_hearts = to_hearts(&accrual.bonus);
    let total = Nat(&stake.staked_hearts.0 + &interest_hearts.0 + &bonus_hearts.0);

    StakeView {
        stake_id: stake.stake_id,
        owner: stake.owner.to_string(),
        staked_hearts: stake.staked_hearts.clone(),
        stake_shares: stake.stake_shares.clone(),
        stake_tshares: to_tshares(&stake.stake_shares),
        locked_day: stake.locked_day,
        staked_days: stake.staked_days,
        unlock_day: stake.unlock_day(),
        unlock_date: stake.unlock_date().map(|d| d.to_string()),
        is_open: stake.is_open(),
        is_auto_stake: stake.is_auto_stake,
        interest_hearts,
        bonus_hearts,
        value_fiat: hearts_to_fiat(&total, fiat_rate),
    }
}

fn empty_accrual() -> AccrualResult {
    aggregate(&[], &Default::default(), 0)
}

/// Fold a snapshot into the served report
pub fn build_report(generation: u64, snapshot: &LedgerSnapshot, fiat_rate: Option<f64>) -> PortfolioReport {
    let accrual = match snapshot.last_day {
        Some(last_day) => aggregate(&snapshot.stakes, &snapshot.records, last_day),
        None => empty_accrual(),
    };

    let stakes: Vec<StakeView> = accrual.stakes.iter().map(|a| stake_view(a, fiat_rate)).collect();

    let balances: Vec<OwnerBalance> = snapshot
        .balances
        .iter()
        .map(|(owner, balance)| OwnerBalance {
            owner: owner.to_string(),
            balance_hearts: balance.clone(),
            value_fiat: balance.as_ref().and_then(|b| hearts_to_fiat(b, fiat_rate)),
        })
        .collect();

    let total_interest_hearts = to_hearts(&accrual.total_interest);
    let total_bonus_hearts = to_hearts(&accrual.total_bonus);
    let unstaked = snapshot
        .balances
        .iter()
        .filter_map(|(_, balance)| balance.as_ref())
        .fold(BigUint::default(), |acc, b| acc + &b.0);
    let grand_total = Nat(&accrual.total_staked_hearts.0 + &total_interest_hearts.0 + &total_bonus_hearts.0 + unstaked);

    PortfolioReport {
        generation,
        last_day: snapshot.last_day,
        stakes,
        balances,
        total_staked_hearts: accrual.total_staked_hearts,
        total_tshares: to_tshares(&accrual.total_stake_shares),
        total_stake_shares: accrual.total_stake_shares,
        total_interest_hearts,
        total_bonus_hearts,
        annualized_yield_percent: accrual.annualized_yield_percent,
        pool_share_percent: accrual.pool_share_percent,
        fiat_rate,
        total_value_fiat: hearts_to_fiat(&grand_total, fiat_rate),
        fetch: snapshot.report.clone(),
    }
}
