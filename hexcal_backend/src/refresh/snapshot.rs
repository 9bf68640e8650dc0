//! One consistent read of the ledger for a set of owners.
//!
//! `last_day` is read once up front and threaded through every later step,
//! so all stakes and records in a snapshot belong to the same ledger day.

use candid::{CandidType, Deserialize, Nat};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::accrual::aggregator::batch_min_day;
use crate::accrual::YIELD_WINDOW_DAYS;
use crate::ledger::daily::{decode_daily_range, DailyRecords};
use crate::ledger::gateway::{current_day_from_global_info, LedgerGateway};
use crate::ledger::stake::{decode_stake, Stake};
use crate::types::Address;

/// What was lost while reading a snapshot
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub failed_calls: u32,
    pub skipped_stakes: u32,
    pub skipped_days: u32,
}

impl FetchReport {
    fn absorb(&mut self, other: &FetchReport) {
        self.failed_calls += other.failed_calls;
        self.skipped_stakes += other.skipped_stakes;
        self.skipped_days += other.skipped_days;
    }
}

#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    /// None when the ledger's current day could not be read
    pub last_day: Option<u64>,
    pub stakes: Vec<Stake>,
    pub records: DailyRecords,
    /// Per owner, in request order. None when the read failed.
    pub balances: Vec<(Address, Option<Nat>)>,
    pub report: FetchReport,
}

/// Ledger calls a snapshot keeps in flight at once
pub const MAX_CONCURRENT_CALLS: usize = 100;

struct OwnerFetch {
    owner: Address,
    stake_count: u64,
    stakes: Vec<Stake>,
    balance: Option<Nat>,
    report: FetchReport,
}

async fn fetch_owner_summary<G: LedgerGateway>(gateway: &G, owner: Address) -> OwnerFetch {
    let mut report = FetchReport::default();

    let (count, balance) = futures::join!(gateway.stake_count(&owner), gateway.balance_of(&owner));
    let stake_count = count.unwrap_or_else(|_| {
        report.failed_calls += 1;
        0
    });
    let balance = match balance {
        Ok(b) => Some(b),
        Err(_) => {
            report.failed_calls += 1;
            None
        }
    };

    OwnerFetch {
        owner,
        stake_count,
        stakes: Vec::new(),
        balance,
        report,
    }
}

/// Counts and balances for every owner, then every stake entry, each phase
/// capped at `MAX_CONCURRENT_CALLS` outstanding calls
async fn fetch_owners<G: LedgerGateway>(gateway: &G, owners: &[Address]) -> Vec<OwnerFetch> {
    // two calls per owner summary
    let mut fetched: Vec<OwnerFetch> = stream::iter(owners.iter().copied())
        .map(|owner| fetch_owner_summary(gateway, owner))
        .buffered(MAX_CONCURRENT_CALLS / 2)
        .collect()
        .await;

    let entries: Vec<(usize, Address, u64)> = fetched
        .iter()
        .enumerate()
        .flat_map(|(slot, f)| (0..f.stake_count).map(move |index| (slot, f.owner, index)))
        .collect();

    let raw_stakes: Vec<_> = stream::iter(entries)
        .map(|(slot, owner, index)| async move { (slot, gateway.stake_list(&owner, index).await) })
        .buffered(MAX_CONCURRENT_CALLS)
        .collect()
        .await;

    for (slot, raw) in raw_stakes {
        let owner_fetch = &mut fetched[slot];
        match raw {
            Ok(raw) => match decode_stake(owner_fetch.owner, &raw) {
                Ok(stake) => owner_fetch.stakes.push(stake),
                Err(_) => owner_fetch.report.skipped_stakes += 1,
            },
            Err(_) => owner_fetch.report.failed_calls += 1,
        }
    }

    fetched
}

/// First day of the single batched range query
///
/// Covers every stake's accrual window and the trailing yield window.
pub fn range_start(stakes: &[Stake], last_day: u64) -> u64 {
    let yield_start = last_day.saturating_sub(YIELD_WINDOW_DAYS as u64 - 1);
    batch_min_day(stakes).map_or(yield_start, |min_day| min_day.min(yield_start))
}

/// Read stakes, balances and daily records for `owners` at one ledger day
pub async fn fetch_snapshot<G: LedgerGateway>(gateway: &G, owners: &[Address]) -> LedgerSnapshot {
    let mut report = FetchReport::default();

    let last_day = match gateway.global_info().await {
        Ok(info) => current_day_from_global_info(&info),
        Err(_) => {
            report.failed_calls += 1;
            None
        }
    };
    let last_day = match last_day {
        Some(day) => day,
        None => {
            return LedgerSnapshot { report, ..LedgerSnapshot::default() };
        }
    };

    let fetched = fetch_owners(gateway, owners).await;

    let mut stakes = Vec::new();
    let mut balances = Vec::with_capacity(fetched.len());
    for owner_fetch in fetched {
        report.absorb(&owner_fetch.report);
        stakes.extend(owner_fetch.stakes);
        balances.push((owner_fetch.owner, owner_fetch.balance));
    }

    let mut records = DailyRecords::new();
    if !stakes.is_empty() {
        let start_day = range_start(&stakes, last_day);
        match gateway.daily_data_range(start_day, last_day).await {
            Ok(packed) => {
                let (decoded, skipped) = decode_daily_range(start_day, &packed);
                report.skipped_days += skipped;
                records = decoded;
            }
            Err(_) => report.failed_calls += 1,
        }
    }

    LedgerSnapshot {
        last_day: Some(last_day),
        stakes,
        records,
        balances,
        report,
    }
}
