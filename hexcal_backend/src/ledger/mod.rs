pub mod daily;
pub mod gateway;
pub mod stake;

pub use daily::{decode_daily_range, decode_daily_record, encode_daily_record, DailyRecord, DailyRecords};
pub use gateway::{current_day_from_global_info, CanisterLedgerGateway, LedgerGateway};
pub use stake::{decode_stake, encode_stake, Stake};
