pub mod report;
pub mod scheduler;
pub mod snapshot;

pub use report::{build_report, OwnerBalance, PortfolioReport, StakeView};
pub use scheduler::{refresh_status, run_refresh, start_refresh_timer, with_latest, CommittedRefresh, RefreshCoordinator, RefreshStatus};
pub use snapshot::{fetch_snapshot, range_start, FetchReport, LedgerSnapshot, MAX_CONCURRENT_CALLS};
