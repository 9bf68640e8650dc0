use candid::{Nat, Principal};
use ic_cdk::api::call::RejectionCode;

use crate::error::HexcalError;
use crate::types::{Address, RawNumber, RawStake};

/// Index of the last recorded day inside the ledger's global info tuple
pub const GLOBAL_INFO_LAST_DAY_INDEX: usize = 4;

/// Read-only view of the ledger and its price sources.
///
/// Implementations are passed into the refresh pipeline explicitly. Every
/// method may fail with `LedgerCallFailed`; the pipeline degrades those
/// failures to empty inputs instead of propagating them.
#[allow(async_fn_in_trait)]
pub trait LedgerGateway {
    async fn stake_count(&self, owner: &Address) -> Result<u64, HexcalError>;

    async fn stake_list(&self, owner: &Address, index: u64) -> Result<RawStake, HexcalError>;

    /// One packed record per day in `[start_day, end_day]`
    async fn daily_data_range(&self, start_day: u64, end_day: u64) -> Result<Vec<RawNumber>, HexcalError>;

    async fn global_info(&self) -> Result<Vec<RawNumber>, HexcalError>;

    /// Unstaked balance in hearts
    async fn balance_of(&self, owner: &Address) -> Result<Nat, HexcalError>;

    /// (token side, quote side) reserves of a constant-product pool
    async fn pool_reserves(&self, pool: &Address) -> Result<(Nat, Nat), HexcalError>;

    /// Scaled integer published by a price oracle
    async fn oracle_read(&self, oracle: &Address) -> Result<Nat, HexcalError>;

    /// Output amount a pool would return for `amount_in`
    async fn swap_quote(&self, pool: &Address, amount_in: &Nat) -> Result<Nat, HexcalError>;
}

/// Last recorded day from a `globalInfo()` tuple
pub fn current_day_from_global_info(info: &[RawNumber]) -> Option<u64> {
    info.get(GLOBAL_INFO_LAST_DAY_INDEX)?.to_u64()
}

/// Gateway backed by a read-only ledger mirror canister
#[derive(Clone, Copy, Debug)]
pub struct CanisterLedgerGateway {
    canister: Principal,
}

impl CanisterLedgerGateway {
    pub fn new(canister: Principal) -> Self {
        Self { canister }
    }
}

fn call_failed(method: &str, (code, msg): (RejectionCode, String)) -> HexcalError {
    HexcalError::LedgerCallFailed(format!("{}: {:?} {}", method, code, msg))
}

impl LedgerGateway for CanisterLedgerGateway {
    async fn stake_count(&self, owner: &Address) -> Result<u64, HexcalError> {
        let (count,): (RawNumber,) = ic_cdk::call(self.canister, "stakeCount", (owner.to_string(),))
            .await
            .map_err(|e| call_failed("stakeCount", e))?;
        count
            .to_u64()
            .ok_or_else(|| HexcalError::LedgerCallFailed(format!("stakeCount: unreadable {:?}", count)))
    }

    async fn stake_list(&self, owner: &Address, index: u64) -> Result<RawStake, HexcalError> {
        let (stake,): (RawStake,) = ic_cdk::call(self.canister, "stakeLists", (owner.to_string(), Nat::from(index)))
            .await
            .map_err(|e| call_failed("stakeLists", e))?;
        Ok(stake)
    }

    async fn daily_data_range(&self, start_day: u64, end_day: u64) -> Result<Vec<RawNumber>, HexcalError> {
        let (records,): (Vec<RawNumber>,) =
            ic_cdk::call(self.canister, "dailyDataRange", (Nat::from(start_day), Nat::from(end_day)))
                .await
                .map_err(|e| call_failed("dailyDataRange", e))?;
        Ok(records)
    }

    async fn global_info(&self) -> Result<Vec<RawNumber>, HexcalError> {
        let (info,): (Vec<RawNumber>,) = ic_cdk::call(self.canister, "globalInfo", ())
            .await
            .map_err(|e| call_failed("globalInfo", e))?;
        Ok(info)
    }

    async fn balance_of(&self, owner: &Address) -> Result<Nat, HexcalError> {
        let (balance,): (Nat,) = ic_cdk::call(self.canister, "balanceOf", (owner.to_string(),))
            .await
            .map_err(|e| call_failed("balanceOf", e))?;
        Ok(balance)
    }

    async fn pool_reserves(&self, pool: &Address) -> Result<(Nat, Nat), HexcalError> {
        let (reserve_a, reserve_b): (Nat, Nat) = ic_cdk::call(self.canister, "getReserves", (pool.to_string(),))
            .await
            .map_err(|e| call_failed("getReserves", e))?;
        Ok((reserve_a, reserve_b))
    }

    async fn oracle_read(&self, oracle: &Address) -> Result<Nat, HexcalError> {
        let (value,): (Nat,) = ic_cdk::call(self.canister, "read", (oracle.to_string(),))
            .await
            .map_err(|e| call_failed("read", e))?;
        Ok(value)
    }

    async fn swap_quote(&self, pool: &Address, amount_in: &Nat) -> Result<Nat, HexcalError> {
        let (amount_out,): (Nat,) =
            ic_cdk::call(self.canister, "getAmountOut", (pool.to_string(), amount_in.clone()))
                .await
                .map_err(|e| call_failed("getAmountOut", e))?;
        Ok(amount_out)
    }
}
