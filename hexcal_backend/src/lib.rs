use candid::Principal;
use ic_cdk::{init, post_upgrade, query, update};
use ic_stable_structures::memory_manager::{MemoryManager, VirtualMemory};
use ic_stable_structures::DefaultMemoryImpl;
use std::cell::RefCell;

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

pub mod accrual;
pub mod calendar;
pub mod config;
pub mod error;
pub mod ledger;
mod memory_ids;
pub mod price;
pub mod refresh;
pub mod tracked;
pub mod types;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use calendar::CalendarEvent;
pub use config::HexcalConfig;
pub use error::HexcalError;
pub use refresh::{PortfolioReport, RefreshStatus, StakeView};
pub use types::Address;

// =============================================================================
// MEMORY MANAGEMENT
// =============================================================================

type Memory = VirtualMemory<DefaultMemoryImpl>;

thread_local! {
    static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> =
        RefCell::new(MemoryManager::init(DefaultMemoryImpl::default()));
}

// =============================================================================
// LIFECYCLE HOOKS
// =============================================================================

#[init]
fn init(config: Option<HexcalConfig>) {
    if let Some(config) = config {
        if let Err(e) = config::set_config(config) {
            ic_cdk::trap(&e.to_string());
        }
    }
    let config = config::get_config();
    ic_cdk::println!(
        "Hexcal Backend Initialized: ledger {}, refresh every {}s",
        config.ledger_canister,
        config.refresh_interval_secs
    );
    refresh::start_refresh_timer(config.refresh_interval_secs);
}

#[post_upgrade]
fn post_upgrade() {
    // Config and tracked owners live in stable memory; only the timer needs restarting
    let config = config::get_config();
    ic_cdk::println!(
        "Hexcal Backend Upgraded: {} tracked owners",
        tracked::list_owners().len()
    );
    refresh::start_refresh_timer(config.refresh_interval_secs);
}

fn require_controller() -> Result<Principal, HexcalError> {
    let caller = ic_cdk::caller();
    if !ic_cdk::api::is_controller(&caller) {
        return Err(HexcalError::Unauthorized);
    }
    Ok(caller)
}

// =============================================================================
// ADMIN ENDPOINTS
// =============================================================================

#[update]
fn configure(config: HexcalConfig) -> Result<(), String> {
    let caller = require_controller()?;
    let interval = config.refresh_interval_secs;
    config::set_config(config)?;
    ic_cdk::println!("Config replaced by {}", caller);
    refresh::start_refresh_timer(interval);
    Ok(())
}

#[update]
fn add_owner(address: String) -> Result<bool, String> {
    require_controller()?;
    let owner: Address = address.parse()?;
    let added = tracked::add_owner(owner);
    if added {
        ic_cdk::println!("Tracking {}", owner.short());
    }
    Ok(added)
}

#[update]
fn remove_owner(address: String) -> Result<bool, String> {
    require_controller()?;
    let owner: Address = address.parse()?;
    let removed = tracked::remove_owner(&owner);
    if removed {
        ic_cdk::println!("Stopped tracking {}", owner.short());
    }
    Ok(removed)
}

#[update]
async fn refresh() -> Result<RefreshStatus, String> {
    require_controller()?;
    Ok(refresh::run_refresh().await)
}

// =============================================================================
// QUERY ENDPOINTS
// =============================================================================

#[query]
fn get_config() -> HexcalConfig {
    config::get_config()
}

#[query]
fn list_owners() -> Vec<String> {
    tracked::list_owners().iter().map(|owner| owner.to_string()).collect()
}

#[query]
fn get_report() -> Option<PortfolioReport> {
    refresh::with_latest(|latest| latest.map(|r| r.report.clone()))
}

/// Stakes from the latest report, optionally for one owner
#[query]
fn get_stakes(owner: Option<String>) -> Result<Vec<StakeView>, String> {
    // normalize to the lowercase form the report carries
    let owner = owner.map(|o| o.parse::<Address>()).transpose()?.map(|o| o.to_string());
    Ok(refresh::with_latest(|latest| {
        latest
            .map(|r| {
                r.report
                    .stakes
                    .iter()
                    .filter(|s| owner.as_ref().map_or(true, |o| &s.owner == o))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }))
}

#[query]
fn get_calendar_events() -> Vec<CalendarEvent> {
    refresh::with_latest(|latest| latest.map(|r| r.calendar.clone()).unwrap_or_default())
}

#[query]
fn get_refresh_status() -> RefreshStatus {
    refresh::refresh_status()
}
