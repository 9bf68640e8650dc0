pub mod aggregator;
pub mod decimal;

pub use aggregator::{
    accrue_bonus,
    accrue_stake,
    aggregate,
    annualized_yield,
    batch_min_day,
    pool_share,
    to_hearts,
    AccrualResult,
    StakeAccrual,
    YIELD_WINDOW_DAYS,
};
pub use decimal::Decimal;
