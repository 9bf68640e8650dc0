use candid::{CandidType, Deserialize};
use serde::Serialize;
use std::cell::RefCell;
use std::time::Duration;

use super::report::{build_report, PortfolioReport};
use super::snapshot::fetch_snapshot;
use crate::calendar::{calendar_events, CalendarEvent};
use crate::config::get_config;
use crate::ledger::gateway::CanisterLedgerGateway;
use crate::price::fetch_fiat_rate;
use crate::tracked::list_owners;

// =============================================================================
// GENERATIONS
// =============================================================================

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    /// Generation of the most recently started refresh, 0 before the first
    pub issued_generation: u64,
    pub committed_generation: Option<u64>,
    pub in_flight: u32,
    /// Refreshes that finished after a newer one had started
    pub discarded: u64,
    pub committed_at_ns: Option<u64>,
}

/// Serializes overlapping refreshes.
///
/// Every refresh takes a generation from `begin`. Only the most recently
/// issued generation may commit; anything older is dropped on arrival.
#[derive(Debug)]
pub struct RefreshCoordinator<T> {
    issued: u64,
    in_flight: u32,
    discarded: u64,
    committed: Option<(u64, T)>,
    committed_at_ns: Option<u64>,
}

impl<T> Default for RefreshCoordinator<T> {
    fn default() -> Self {
        Self {
            issued: 0,
            in_flight: 0,
            discarded: 0,
            committed: None,
            committed_at_ns: None,
        }
    }
}

impl<T> RefreshCoordinator<T> {
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight += 1;
        self.issued
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.issued
    }

    /// Store `value` if `generation` is still the newest. Returns whether it was kept.
    pub fn commit(&mut self, generation: u64, value: T, now_ns: u64) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if !self.is_current(generation) {
            self.discarded += 1;
            return false;
        }
        self.committed = Some((generation, value));
        self.committed_at_ns = Some(now_ns);
        true
    }

    pub fn latest(&self) -> Option<&T> {
        self.committed.as_ref().map(|(_, value)| value)
    }

    pub fn status(&self) -> RefreshStatus {
        RefreshStatus {
            issued_generation: self.issued,
            committed_generation: self.committed.as_ref().map(|(g, _)| *g),
            in_flight: self.in_flight,
            discarded: self.discarded,
            committed_at_ns: self.committed_at_ns,
        }
    }
}

// =============================================================================
// CANISTER STATE
// =============================================================================

/// What a committed refresh publishes
#[derive(Clone, Debug)]
pub struct CommittedRefresh {
    pub report: PortfolioReport,
    pub calendar: Vec<CalendarEvent>,
}

thread_local! {
    static COORDINATOR: RefCell<RefreshCoordinator<CommittedRefresh>> = RefCell::new(RefreshCoordinator::default());
    static REFRESH_TIMER_ID: RefCell<Option<ic_cdk_timers::TimerId>> = RefCell::new(None);
}

/// (Re)start the periodic refresh, replacing any running timer
pub fn start_refresh_timer(interval_secs: u64) {
    REFRESH_TIMER_ID.with(|id| {
        if let Some(old) = id.borrow_mut().take() {
            ic_cdk_timers::clear_timer(old);
        }
        let timer_id = ic_cdk_timers::set_timer_interval(Duration::from_secs(interval_secs), || {
            ic_cdk::spawn(async {
                run_refresh().await;
            });
        });
        *id.borrow_mut() = Some(timer_id);
    });
}

/// Read the ledger for every tracked owner and publish the result
pub async fn run_refresh() -> RefreshStatus {
    let generation = COORDINATOR.with(|c| c.borrow_mut().begin());
    let config = get_config();
    let owners = list_owners();
    let gateway = CanisterLedgerGateway::new(config.ledger_canister);

    let snapshot = fetch_snapshot(&gateway, &owners).await;
    let fiat_rate = match &config.price_source {
        Some(source) => fetch_fiat_rate(&gateway, source).await,
        None => None,
    };

    let report = build_report(generation, &snapshot, fiat_rate);
    let calendar = calendar_events(&snapshot.stakes);
    let fetch = report.fetch.clone();
    let stake_count = report.stakes.len();

    COORDINATOR.with(|c| {
        let mut c = c.borrow_mut();
        if c.commit(generation, CommittedRefresh { report, calendar }, ic_cdk::api::time()) {
            ic_cdk::println!(
                "Refresh {} committed: {} owners, {} stakes, day {:?}, {} failed calls, {} skipped stakes, {} skipped days",
                generation,
                owners.len(),
                stake_count,
                snapshot.last_day,
                fetch.failed_calls,
                fetch.skipped_stakes,
                fetch.skipped_days
            );
        } else {
            ic_cdk::println!("Refresh {} discarded: superseded by {}", generation, c.status().issued_generation);
        }
        c.status()
    })
}

pub fn with_latest<R>(f: impl FnOnce(Option<&CommittedRefresh>) -> R) -> R {
    COORDINATOR.with(|c| f(c.borrow().latest()))
}

pub fn refresh_status() -> RefreshStatus {
    COORDINATOR.with(|c| c.borrow().status())
}
