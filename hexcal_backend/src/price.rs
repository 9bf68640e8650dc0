//! Fiat conversion from external price quotes.
//!
//! Every converter returns `None` when an input is missing or a divisor is
//! zero. A missing price must never render as 0.

use candid::{CandidType, Deserialize, Nat};
use num_bigint::BigUint;
use serde::Serialize;

use crate::accrual::decimal::Decimal;
use crate::error::HexcalError;
use crate::ledger::gateway::LedgerGateway;
use crate::types::{Address, HEX_DECIMALS};

/// Where the canister reads its fiat rate from
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub enum PriceSource {
    /// Constant-product pool of the token against a fiat-pegged asset
    Reserves {
        pool: String,
        token_decimals: u32,
        quote_decimals: u32,
    },
    /// Swap quote for a hypothetical input amount of the token
    Quote {
        pool: String,
        amount_in: Nat,
        decimals_in: u32,
        decimals_out: u32,
    },
    /// Token priced in an intermediate asset, intermediate priced by an oracle
    Chained {
        token_pool: String,
        token_decimals: u32,
        intermediate_decimals: u32,
        oracle: String,
        oracle_decimals: u32,
    },
}

impl PriceSource {
    /// Reject sources whose addresses do not parse
    pub fn validate(&self) -> Result<(), HexcalError> {
        match self {
            PriceSource::Reserves { pool, .. } | PriceSource::Quote { pool, .. } => {
                pool.parse::<Address>().map(|_| ())
            }
            PriceSource::Chained { token_pool, oracle, .. } => {
                token_pool.parse::<Address>()?;
                oracle.parse::<Address>().map(|_| ())
            }
        }
    }
}

fn pow10(decimals: u32) -> BigUint {
    BigUint::from(10u64).pow(decimals)
}

fn finite(rate: f64) -> Option<f64> {
    if rate.is_finite() {
        Some(rate)
    } else {
        None
    }
}

/// `(num / 10^num_decimals) / (den / 10^den_decimals)` at full precision
fn scaled_ratio(num: &Nat, num_decimals: u32, den: &Nat, den_decimals: u32) -> Option<f64> {
    let numerator = &num.0 * pow10(den_decimals);
    let denominator = &den.0 * pow10(num_decimals);
    Decimal::from_ratio(&numerator, &denominator).and_then(|d| finite(d.to_f64()))
}

/// token-per-intermediate × intermediate-per-fiat
pub fn chained_rate(token_per_intermediate: Option<f64>, intermediate_per_fiat: Option<f64>) -> Option<f64> {
    finite(token_per_intermediate? * intermediate_per_fiat?)
}

/// `reserve_b / reserve_a`, each side scaled by its own decimals
pub fn reserve_rate(reserve_a: Option<&Nat>, decimals_a: u32, reserve_b: Option<&Nat>, decimals_b: u32) -> Option<f64> {
    scaled_ratio(reserve_b?, decimals_b, reserve_a?, decimals_a)
}

/// Single scaled integer from a price oracle
pub fn oracle_rate(raw: Option<&Nat>, decimals: u32) -> Option<f64> {
    scaled_ratio(raw?, decimals, &Nat::from(1u64), 0)
}

/// Output per unit of input for a swap quote
pub fn swap_quote_rate(amount_in: &Nat, decimals_in: u32, amount_out: Option<&Nat>, decimals_out: u32) -> Option<f64> {
    reserve_rate(Some(amount_in), decimals_in, amount_out, decimals_out)
}

/// Fiat value of `hearts` at `rate` fiat per token
pub fn hearts_to_fiat(hearts: &Nat, rate: Option<f64>) -> Option<f64> {
    let tokens = scaled_ratio(hearts, HEX_DECIMALS, &Nat::from(1u64), 0)?;
    finite(tokens * rate?)
}

/// Read the configured source through `gateway` and convert. Any failed read yields None.
pub async fn fetch_fiat_rate<G: LedgerGateway>(gateway: &G, source: &PriceSource) -> Option<f64> {
    match source {
        PriceSource::Reserves { pool, token_decimals, quote_decimals } => {
            let pool = pool.parse::<Address>().ok()?;
            let (token_reserve, quote_reserve) = gateway.pool_reserves(&pool).await.ok()?;
            reserve_rate(Some(&token_reserve), *token_decimals, Some(&quote_reserve), *quote_decimals)
        }
        PriceSource::Quote { pool, amount_in, decimals_in, decimals_out } => {
            let pool = pool.parse::<Address>().ok()?;
            let amount_out = gateway.swap_quote(&pool, amount_in).await.ok();
            swap_quote_rate(amount_in, *decimals_in, amount_out.as_ref(), *decimals_out)
        }
        PriceSource::Chained { token_pool, token_decimals, intermediate_decimals, oracle, oracle_decimals } => {
            let token_pool = token_pool.parse::<Address>().ok()?;
            let oracle = oracle.parse::<Address>().ok()?;
            let reserves = gateway.pool_reserves(&token_pool).await.ok();
            let oracle_value = gateway.oracle_read(&oracle).await.ok();

            let token_per_intermediate = reserves.as_ref().and_then(|(token, intermediate)| {
                reserve_rate(Some(token), *token_decimals, Some(intermediate), *intermediate_decimals)
            });
            chained_rate(token_per_intermediate, oracle_rate(oracle_value.as_ref(), *oracle_decimals))
        }
    }
}
