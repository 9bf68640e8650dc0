use candid::{CandidType, Deserialize};
use std::fmt;

/// Failure taxonomy for ledger reads, decoding and conversion.
///
/// Only the decoders, the gateway and the admin surface produce these. A
/// zero-share division or a missing price is not an error: the aggregator
/// and price converter return `None`, so callers can tell "unknown" apart
/// from zero.
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum HexcalError {
    MalformedStake(String),
    MalformedDailyRecord(String),
    LedgerCallFailed(String),
    InvalidAddress(String),
    InvalidConfig(String),
    Unauthorized,
}

impl fmt::Display for HexcalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HexcalError::MalformedStake(reason) => write!(f, "Malformed stake: {}", reason),
            HexcalError::MalformedDailyRecord(reason) => write!(f, "Malformed daily record: {}", reason),
            HexcalError::LedgerCallFailed(reason) => write!(f, "Ledger call failed: {}", reason),
            HexcalError::InvalidAddress(input) => write!(f, "Invalid address: {}", input),
            HexcalError::InvalidConfig(reason) => write!(f, "Invalid config: {}", reason),
            HexcalError::Unauthorized => write!(f, "Caller is not a controller"),
        }
    }
}

impl std::error::Error for HexcalError {}

impl From<HexcalError> for String {
    fn from(e: HexcalError) -> Self {
        e.to_string()
    }
}
