//! Exchange rates and pool quotes read from NEAR and Ethereum

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::derived::RateProvider;
use crate::catalog::{PoolQuote, RateSource};
use crate::chain::{parse_address, parse_selector, EvmClient, NearRpcClient};

#[derive(Debug, Deserialize)]
struct FtMetadata {
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct RefPool {
    token_account_ids: Vec<String>,
    amounts: Vec<String>,
}

/// Integer amount with `scale` implied decimals
fn scaled(raw: &str, scale: u32) -> Result<Decimal> {
    let units: i128 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid integer amount {raw:?}"))?;
    Decimal::try_from_i128_with_scale(units, scale)
        .with_context(|| format!("Amount {raw} does not fit with scale {scale}"))
}

/// The rate string out of a view result, optionally inside one field
fn rate_field<'v>(value: &'v Value, field: Option<&str>) -> Result<&'v str> {
    let target = match field {
        Some(name) => value
            .get(name)
            .with_context(|| format!("View result has no field {name}"))?,
        None => value,
    };
    target.as_str().context("Rate is not a string")
}

fn pool_liquidity(pool: &RefPool, token: &str) -> Result<u128> {
    let index = pool
        .token_account_ids
        .iter()
        .position(|t| t == token)
        .with_context(|| format!("Pool does not hold {token}"))?;
    let amount = pool.amounts.get(index).context("Pool amounts are incomplete")?;
    amount
        .parse::<u128>()
        .with_context(|| format!("Invalid pool amount {amount}"))
}

/// Production rate provider
pub struct ChainRateProvider {
    near: NearRpcClient,
    evm: Arc<EvmClient>,
    ref_contract_id: String,
    min_pool_liquidity: u128,
}

impl ChainRateProvider {
    pub fn new(near: NearRpcClient, evm: Arc<EvmClient>, ref_contract_id: String, min_pool_liquidity: u128) -> Self {
        Self {
            near,
            evm,
            ref_contract_id,
            min_pool_liquidity,
        }
    }
}

#[async_trait]
impl RateProvider for ChainRateProvider {
    async fn exchange_rate(&self, source: &RateSource) -> Result<Decimal> {
        match source {
            RateSource::NearView {
                contract,
                method,
                field,
                scale_decimals,
                require_ft_decimals,
            } => {
                if let Some(expected) = require_ft_decimals {
                    let metadata: FtMetadata = self.near.view(contract, "ft_metadata", &json!({})).await?;
                    if metadata.decimals != *expected {
                        bail!(
                            "{contract} reports {} decimals, expected {expected}",
                            metadata.decimals
                        );
                    }
                }

                let value: Value = self.near.view(contract, method, &json!({})).await?;
                let rate = scaled(rate_field(&value, field.as_deref())?, *scale_decimals)?;
                debug!(contract = %contract, method = %method, rate = %rate, "Exchange rate");
                Ok(rate)
            }
            RateSource::EthCall {
                contract,
                selector,
                scale_decimals,
            } => {
                let raw = self
                    .evm
                    .call_u256(parse_address(contract)?, parse_selector(selector)?)
                    .await?;
                let rate = scaled(&raw.to_string(), *scale_decimals)?;
                debug!(contract = %contract, selector = %selector, rate = %rate, "Exchange rate");
                Ok(rate)
            }
        }
    }

    async fn pool_quote(&self, quote: &PoolQuote) -> Result<Decimal> {
        let pool: RefPool = self
            .near
            .view(&self.ref_contract_id, "get_pool", &json!({ "pool_id": quote.pool_id }))
            .await?;

        let liquidity = pool_liquidity(&pool, &quote.token_in)?;
        if liquidity < self.min_pool_liquidity {
            bail!(
                "Pool {} holds {} of {}, below minimum {}",
                quote.pool_id,
                liquidity,
                quote.token_in,
                self.min_pool_liquidity
            );
        }

        let amount_in = 10u128
            .checked_pow(quote.token_in_decimals)
            .context("token_in decimals too large")?;
        let amount_out: String = self
            .near
            .view(
                &self.ref_contract_id,
                "get_return",
                &json!({
                    "pool_id": quote.pool_id,
                    "token_in": quote.token_in,
                    "amount_in": amount_in.to_string(),
                    "token_out": quote.token_out,
                }),
            )
            .await?;

        let rate = scaled(&amount_out, quote.token_out_decimals)?;
        debug!(pool_id = quote.pool_id, rate = %rate, "Pool quote");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn scaled_amounts() {
        assert_eq!(scaled("1400000000000000000000000", 24).unwrap(), dec!(1.4));
        assert_eq!(scaled("998123", 6).unwrap(), dec!(0.998123));
        assert!(scaled("12.5", 6).is_err());
    }

    #[test]
    fn rate_field_reads_nested_or_plain() {
        let state = json!({"st_near_price": "1420000000000000000000000", "total_actually_staked": "1"});
        assert_eq!(rate_field(&state, Some("st_near_price")).unwrap(), "1420000000000000000000000");
        assert!(rate_field(&state, Some("missing")).is_err());
        assert_eq!(rate_field(&json!("1300000000000000000000000"), None).unwrap(), "1300000000000000000000000");
    }

    #[test]
    fn pool_liquidity_finds_token() {
        let pool: RefPool = serde_json::from_value(json!({
            "pool_kind": "STABLE_SWAP",
            "token_account_ids": ["usn", "dac17f958d2ee523a2206206994597c13d831ec7.factory.bridge.near"],
            "amounts": ["52000000000000000000000", "51000000000"],
            "total_fee": 5,
            "shares_total_supply": "1"
        }))
        .unwrap();

        assert_eq!(pool_liquidity(&pool, "usn").unwrap(), 52_000 * 10u128.pow(18));
        assert!(pool_liquidity(&pool, "wrap.near").is_err());
    }
}
