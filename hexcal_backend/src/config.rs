use candid::{CandidType, Deserialize, Principal};
use ic_stable_structures::memory_manager::MemoryId;
use ic_stable_structures::{StableCell, Storable};
use serde::Serialize;
use std::borrow::Cow;
use std::cell::RefCell;

use crate::error::HexcalError;
use crate::memory_ids::CONFIG_MEMORY_ID;
use crate::price::PriceSource;
use crate::Memory;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct HexcalConfig {
    /// Read-only ledger mirror answering the gateway calls
    pub ledger_canister: Principal,
    pub refresh_interval_secs: u64,
    /// None disables fiat values
    pub price_source: Option<PriceSource>,
}

impl Default for HexcalConfig {
    fn default() -> Self {
        Self {
            ledger_canister: Principal::anonymous(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            price_source: None,
        }
    }
}

impl Storable for HexcalConfig {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("HexcalConfig: serialization failed"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(&bytes).expect("HexcalConfig: corrupted stable config")
    }

    const BOUND: ic_stable_structures::storable::Bound =
        ic_stable_structures::storable::Bound::Bounded {
            max_size: 1024,
            is_fixed_size: false,
        };
}

thread_local! {
    static CONFIG: RefCell<StableCell<HexcalConfig, Memory>> = RefCell::new(
        StableCell::init(
            crate::MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(CONFIG_MEMORY_ID))),
            HexcalConfig::default(),
        ).expect("Failed to init config cell")
    );
}

pub fn validate_config(config: &HexcalConfig) -> Result<(), HexcalError> {
    if config.refresh_interval_secs < MIN_REFRESH_INTERVAL_SECS {
        return Err(HexcalError::InvalidConfig(format!(
            "refresh interval {}s is below the {}s minimum",
            config.refresh_interval_secs, MIN_REFRESH_INTERVAL_SECS
        )));
    }
    if let Some(source) = &config.price_source {
        source.validate()?;
    }
    Ok(())
}

pub fn get_config() -> HexcalConfig {
    CONFIG.with(|c| c.borrow().get().clone())
}

pub fn set_config(config: HexcalConfig) -> Result<(), HexcalError> {
    validate_config(&config)?;
    CONFIG.with(|c| {
        c.borrow_mut()
            .set(config)
            .map(|_| ())
            .map_err(|e| HexcalError::InvalidConfig(format!("{:?}", e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> String {
        "0xf6dcdce0ac3001b2f67f750bc64ea5beb37b5824".to_string()
    }

    #[test]
    fn test_default_config() {
        let config = HexcalConfig::default();
        assert_eq!(config.refresh_interval_secs, 600);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_interval_below_minimum_rejected() {
        let config = HexcalConfig { refresh_interval_secs: 5, ..Default::default() };
        assert!(matches!(validate_config(&config), Err(HexcalError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_price_source_rejected() {
        let config = HexcalConfig {
            price_source: Some(PriceSource::Reserves { pool: "0x12".to_string(), token_decimals: 8, quote_decimals: 6 }),
            ..Default::default()
        };
        assert!(matches!(validate_config(&config), Err(HexcalError::InvalidAddress(_))));
    }

    #[test]
    fn test_storable_round_trip() {
        let config = HexcalConfig {
            ledger_canister: Principal::management_canister(),
            refresh_interval_secs: 900,
            price_source: Some(PriceSource::Quote {
                pool: pool(),
                amount_in: candid::Nat::from(100_000_000u64),
                decimals_in: 8,
                decimals_out: 6,
            }),
        };
        let bytes = config.to_bytes();
        assert!(bytes.len() <= 1024);
        assert_eq!(HexcalConfig::from_bytes(bytes), config);
    }

    #[test]
    fn test_set_and_get_config() {
        let config = HexcalConfig { refresh_interval_secs: 120, ..Default::default() };
        set_config(config.clone()).unwrap();
        assert_eq!(get_config(), config);

        let rejected = HexcalConfig { refresh_interval_secs: 1, ..Default::default() };
        assert!(set_config(rejected).is_err());
        assert_eq!(get_config(), config);
    }
}
