use candid::Nat;
use futures::executor::block_on;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use hexcal_backend::error::HexcalError;
use hexcal_backend::ledger::daily::{encode_daily_record, DailyRecord};
use hexcal_backend::ledger::gateway::LedgerGateway;
use hexcal_backend::ledger::stake::{encode_stake, Stake};
use hexcal_backend::price::{fetch_fiat_rate, PriceSource};
use hexcal_backend::refresh::{build_report, fetch_snapshot, RefreshCoordinator, MAX_CONCURRENT_CALLS};
use hexcal_backend::types::{Address, RawNumber, RawStake, BONUS_DAY};

// =============================================================================
// IN-MEMORY LEDGER
// =============================================================================

#[derive(Default)]
struct FakeLedger {
    last_day: Option<u64>,
    stakes: HashMap<Address, Vec<RawStake>>,
    balances: HashMap<Address, Nat>,
    failing_owners: HashSet<Address>,
    records: BTreeMap<u64, RawNumber>,
    reserves: HashMap<Address, (Nat, Nat)>,
    oracles: HashMap<Address, Nat>,
    range_calls: RefCell<Vec<(u64, u64)>>,
    in_flight: Cell<usize>,
    max_in_flight: Cell<usize>,
}

/// Pending on the first poll so concurrent calls overlap
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

fn unreachable_call(method: &str) -> HexcalError {
    HexcalError::LedgerCallFailed(format!("{}: canister unreachable", method))
}

impl FakeLedger {
    fn with_day(last_day: u64) -> Self {
        Self { last_day: Some(last_day), ..Default::default() }
    }

    fn add_stake(&mut self, stake: &Stake) {
        self.stakes.entry(stake.owner).or_default().push(encode_stake(stake));
    }

    fn add_uniform_days(&mut self, days: std::ops::RangeInclusive<u64>, payout: u64, total_shares: u64) {
        for day in days {
            let record = DailyRecord {
                day,
                payout: Nat::from(payout),
                total_shares: Nat::from(total_shares),
                unclaimed_satoshis: Nat::from(0u64),
            };
            let packed = encode_daily_record(&record).unwrap();
            self.records.insert(day, RawNumber::from(packed));
        }
    }

    async fn per_owner_call<T>(&self, result: T) -> T {
        self.in_flight.set(self.in_flight.get() + 1);
        self.max_in_flight.set(self.max_in_flight.get().max(self.in_flight.get()));
        YieldOnce(false).await;
        self.in_flight.set(self.in_flight.get() - 1);
        result
    }
}

impl LedgerGateway for FakeLedger {
    async fn stake_count(&self, owner: &Address) -> Result<u64, HexcalError> {
        let result = if self.failing_owners.contains(owner) {
            Err(unreachable_call("stakeCount"))
        } else {
            Ok(self.stakes.get(owner).map_or(0, |s| s.len() as u64))
        };
        self.per_owner_call(result).await
    }

    async fn stake_list(&self, owner: &Address, index: u64) -> Result<RawStake, HexcalError> {
        let result = self
            .stakes
            .get(owner)
            .and_then(|s| s.get(index as usize))
            .cloned()
            .ok_or_else(|| unreachable_call("stakeLists"));
        self.per_owner_call(result).await
    }

    async fn daily_data_range(&self, start_day: u64, end_day: u64) -> Result<Vec<RawNumber>, HexcalError> {
        self.range_calls.borrow_mut().push((start_day, end_day));
        // days the ledger never recorded come back as packed zero
        Ok((start_day..=end_day)
            .map(|day| self.records.get(&day).cloned().unwrap_or_else(|| RawNumber::from(0u64)))
            .collect())
    }

    async fn global_info(&self) -> Result<Vec<RawNumber>, HexcalError> {
        let last_day = self.last_day.ok_or_else(|| unreachable_call("globalInfo"))?;
        Ok(vec![
            RawNumber::from(0u64),
            RawNumber::from(0u64),
            RawNumber::from(0u64),
            RawNumber::from(0u64),
            RawNumber::Text(last_day.to_string()),
        ])
    }

    async fn balance_of(&self, owner: &Address) -> Result<Nat, HexcalError> {
        let result = if self.failing_owners.contains(owner) {
            Err(unreachable_call("balanceOf"))
        } else {
            Ok(self.balances.get(owner).cloned().unwrap_or_else(|| Nat::from(0u64)))
        };
        self.per_owner_call(result).await
    }

    async fn pool_reserves(&self, pool: &Address) -> Result<(Nat, Nat), HexcalError> {
        self.reserves.get(pool).cloned().ok_or_else(|| unreachable_call("getReserves"))
    }

    async fn oracle_read(&self, oracle: &Address) -> Result<Nat, HexcalError> {
        self.oracles.get(oracle).cloned().ok_or_else(|| unreachable_call("read"))
    }

    async fn swap_quote(&self, pool: &Address, amount_in: &Nat) -> Result<Nat, HexcalError> {
        // fixed 5 quote units (6 decimals) per whole token in
        self.pool_reserves(pool).await?;
        Ok(Nat(&amount_in.0 * 5u64 / 100u64))
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

const ALICE: Address = Address([0xa1; 20]);
const BOB: Address = Address([0xb0; 20]);
const POOL: &str = "0x1111111111111111111111111111111111111111";
const ORACLE: &str = "0x2222222222222222222222222222222222222222";

fn stake(id: u64, owner: Address, locked_day: u64, staked_days: u64, shares: u64) -> Stake {
    Stake {
        stake_id: id,
        owner,
        staked_hearts: Nat::from(100_000_000u64),
        stake_shares: Nat::from(shares),
        locked_day,
        staked_days,
        unlocked_day: 0,
        is_auto_stake: false,
    }
}

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

// =============================================================================
// SNAPSHOT
// =============================================================================

#[test]
fn test_one_range_call_covers_every_stake() {
    let mut ledger = FakeLedger::with_day(150);
    ledger.add_stake(&stake(1, ALICE, 100, 50, 1000));
    ledger.add_stake(&stake(2, BOB, 120, 30, 500));
    ledger.add_uniform_days(90..=150, 2_000_000, 1_000_000);

    let snapshot = block_on(fetch_snapshot(&ledger, &[ALICE, BOB]));

    assert_eq!(*ledger.range_calls.borrow(), vec![(99, 150)]);
    assert_eq!(snapshot.last_day, Some(150));
    assert_eq!(snapshot.stakes.len(), 2);
    assert_eq!(snapshot.records.len(), 52);
    assert_eq!(snapshot.report.failed_calls, 0);
}

#[test]
fn test_owner_reads_stay_within_call_limit() {
    let mut ledger = FakeLedger::with_day(150);
    let whale = Address([0x77; 20]);
    for id in 0..250 {
        ledger.add_stake(&stake(id, whale, 100, 50, 1000));
    }
    let mut owners = vec![whale];
    for i in 0..80u8 {
        let owner = Address([i; 20]);
        ledger.add_stake(&stake(1000 + i as u64, owner, 120, 30, 500));
        owners.push(owner);
    }
    ledger.add_uniform_days(90..=150, 2_000_000, 1_000_000);

    let snapshot = block_on(fetch_snapshot(&ledger, &owners));

    assert_eq!(snapshot.stakes.len(), 330);
    assert_eq!(snapshot.balances.len(), 81);
    assert_eq!(snapshot.report.failed_calls, 0);
    assert!(ledger.max_in_flight.get() > 1);
    assert!(ledger.max_in_flight.get() <= MAX_CONCURRENT_CALLS);
    assert_eq!(ledger.in_flight.get(), 0);
    // stakes keep per-owner ledger order
    assert!(snapshot.stakes[..250].iter().enumerate().all(|(i, s)| s.stake_id == i as u64));
}

#[test]
fn test_fifty_day_stake_accrues_hundred_thousand_hearts() {
    let mut ledger = FakeLedger::with_day(150);
    ledger.add_stake(&stake(1, ALICE, 100, 50, 1000));
    ledger.add_uniform_days(101..=150, 2_000_000, 1_000_000);

    let snapshot = block_on(fetch_snapshot(&ledger, &[ALICE]));
    let report = build_report(1, &snapshot, None);

    assert_eq!(report.stakes[0].interest_hearts, Nat::from(100_000u64));
    assert_eq!(report.total_interest_hearts, Nat::from(100_000u64));
    assert_eq!(report.stakes[0].unlock_date.as_deref(), Some("2020-04-30"));
    // packed zeros before day 101 carry no shares and are skipped
    assert!(report.annualized_yield_percent.is_some());
    assert_eq!(report.pool_share_percent, Some(0.1));
}

#[test]
fn test_bonus_day_payout() {
    let mut ledger = FakeLedger::with_day(BONUS_DAY + 2);
    ledger.add_stake(&stake(1, ALICE, BONUS_DAY - 5, 30, 200));
    ledger.add_stake(&stake(2, ALICE, BONUS_DAY, 30, 200));
    let bonus = DailyRecord {
        day: BONUS_DAY,
        payout: Nat::from(0u64),
        total_shares: Nat::from(2_000u64),
        unclaimed_satoshis: Nat::from(1u64),
    };
    ledger.records.insert(BONUS_DAY, RawNumber::from(encode_daily_record(&bonus).unwrap()));

    let snapshot = block_on(fetch_snapshot(&ledger, &[ALICE]));
    let report = build_report(1, &snapshot, None);

    let by_id: HashMap<u64, Nat> = report.stakes.iter().map(|s| (s.stake_id, s.bonus_hearts.clone())).collect();
    assert_eq!(by_id[&1], Nat::from(1000u64));
    assert_eq!(by_id[&2], Nat::from(0u64));
    assert_eq!(report.total_bonus_hearts, Nat::from(1000u64));
}

#[test]
fn test_failed_owner_degrades_to_empty() {
    let mut ledger = FakeLedger::with_day(150);
    ledger.add_stake(&stake(1, ALICE, 100, 50, 1000));
    ledger.add_stake(&stake(2, BOB, 110, 50, 1000));
    ledger.failing_owners.insert(BOB);
    ledger.balances.insert(ALICE, Nat::from(42u64));

    let snapshot = block_on(fetch_snapshot(&ledger, &[ALICE, BOB]));

    assert_eq!(snapshot.stakes.len(), 1);
    assert_eq!(snapshot.stakes[0].owner, ALICE);
    assert_eq!(snapshot.report.failed_calls, 2);
    assert_eq!(snapshot.balances, vec![(ALICE, Some(Nat::from(42u64))), (BOB, None)]);
}

#[test]
fn test_malformed_entries_are_skipped() {
    let mut ledger = FakeLedger::with_day(150);
    ledger.add_stake(&stake(1, ALICE, 100, 50, 1000));
    let mut broken = encode_stake(&stake(2, ALICE, 100, 50, 1000));
    broken.locked_day = RawNumber::from("abc");
    ledger.stakes.entry(ALICE).or_default().push(broken);

    ledger.add_uniform_days(101..=150, 2_000_000, 1_000_000);
    ledger.records.insert(120, RawNumber::from("-1"));

    let snapshot = block_on(fetch_snapshot(&ledger, &[ALICE]));
    let report = build_report(1, &snapshot, None);

    assert_eq!(snapshot.report.skipped_stakes, 1);
    assert_eq!(snapshot.report.skipped_days, 1);
    assert_eq!(report.stakes.len(), 1);
    // day 120 is gone, 49 days remain
    assert_eq!(report.stakes[0].interest_hearts, Nat::from(98_000u64));
}

#[test]
fn test_unreadable_day_yields_no_stakes() {
    let mut ledger = FakeLedger::default();
    ledger.add_stake(&stake(1, ALICE, 100, 50, 1000));

    let snapshot = block_on(fetch_snapshot(&ledger, &[ALICE]));

    assert_eq!(snapshot.last_day, None);
    assert!(snapshot.stakes.is_empty());
    assert_eq!(snapshot.report.failed_calls, 1);
    assert!(ledger.range_calls.borrow().is_empty());
}

#[test]
fn test_no_stakes_skips_range_call() {
    let ledger = FakeLedger::with_day(150);
    let snapshot = block_on(fetch_snapshot(&ledger, &[ALICE]));
    let report = build_report(1, &snapshot, Some(1.0));

    assert!(ledger.range_calls.borrow().is_empty());
    assert!(report.stakes.is_empty());
    assert_eq!(report.annualized_yield_percent, None);
    assert_eq!(report.total_value_fiat, Some(0.0));
}

// =============================================================================
// PRICE
// =============================================================================

#[test]
fn test_chained_price_source() {
    let mut ledger = FakeLedger::with_day(1);
    // 100 tokens (8 decimals) against 1 intermediate (18 decimals)
    ledger.reserves.insert(
        addr(POOL),
        (Nat::from(10_000_000_000u64), Nat::from(1_000_000_000_000_000_000u64)),
    );
    ledger.oracles.insert(addr(ORACLE), Nat::from(2_000_000_000_000_000_000_000u128));

    let source = PriceSource::Chained {
        token_pool: POOL.to_string(),
        token_decimals: 8,
        intermediate_decimals: 18,
        oracle: ORACLE.to_string(),
        oracle_decimals: 18,
    };
    let rate = block_on(fetch_fiat_rate(&ledger, &source)).unwrap();
    assert!((rate - 20.0).abs() < 1e-9);
}

#[test]
fn test_reserve_and_quote_sources() {
    let mut ledger = FakeLedger::with_day(1);
    ledger.reserves.insert(addr(POOL), (Nat::from(500u64), Nat::from(1_000_000u64)));

    let reserves = PriceSource::Reserves { pool: POOL.to_string(), token_decimals: 6, quote_decimals: 6 };
    assert_eq!(block_on(fetch_fiat_rate(&ledger, &reserves)), Some(2000.0));

    let quote = PriceSource::Quote {
        pool: POOL.to_string(),
        amount_in: Nat::from(100_000_000u64),
        decimals_in: 8,
        decimals_out: 6,
    };
    assert_eq!(block_on(fetch_fiat_rate(&ledger, &quote)), Some(5.0));
}

#[test]
fn test_unreachable_price_source_is_unavailable() {
    let ledger = FakeLedger::with_day(1);
    let source = PriceSource::Chained {
        token_pool: POOL.to_string(),
        token_decimals: 8,
        intermediate_decimals: 18,
        oracle: ORACLE.to_string(),
        oracle_decimals: 18,
    };
    assert_eq!(block_on(fetch_fiat_rate(&ledger, &source)), None);
}

// =============================================================================
// GENERATIONS
// =============================================================================

#[test]
fn test_stale_refresh_never_overwrites_newer_report() {
    let mut coordinator = RefreshCoordinator::default();

    let mut early = FakeLedger::with_day(140);
    early.add_stake(&stake(1, ALICE, 100, 50, 1000));
    early.add_uniform_days(101..=140, 2_000_000, 1_000_000);
    let mut late = FakeLedger::with_day(150);
    late.add_stake(&stake(1, ALICE, 100, 50, 1000));
    late.add_uniform_days(101..=150, 2_000_000, 1_000_000);

    let first = coordinator.begin();
    let second = coordinator.begin();

    let newer = build_report(second, &block_on(fetch_snapshot(&late, &[ALICE])), None);
    let older = build_report(first, &block_on(fetch_snapshot(&early, &[ALICE])), None);

    assert!(coordinator.commit(second, newer, 2));
    assert!(!coordinator.commit(first, older, 3));

    let latest = coordinator.latest().unwrap();
    assert_eq!(latest.generation, 2);
    assert_eq!(latest.last_day, Some(150));
    assert_eq!(coordinator.status().discarded, 1);
}
