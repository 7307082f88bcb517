//! Uniswap V3 Quoter on Ethereum mainnet

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::types::{Bytes, U256};
use ethers::utils::{format_units, id};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::warn;

use super::FeedAdapter;
use crate::catalog::{AssetTable, UniswapV3Pool};
use crate::chain::{parse_address, EvmClient};
use crate::types::RawQuotes;

const QUOTER_ADDRESS: &str = "0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6";
const QUOTE_SIGNATURE: &str = "quoteExactInputSingle(address,address,uint24,uint256,uint160)";

/// Quote this many whole `token_in` to smooth out rounding on small pools
const AMOUNT_IN: u64 = 10_000;

fn quote_calldata(pool: &UniswapV3Pool) -> Result<Bytes> {
    let amount_in = U256::from(AMOUNT_IN) * U256::exp10(pool.token_in.decimals as usize);
    let args = encode(&[
        Token::Address(parse_address(&pool.token_in.address)?),
        Token::Address(parse_address(&pool.token_out.address)?),
        Token::Uint(U256::from(pool.fee)),
        Token::Uint(amount_in),
        Token::Uint(U256::zero()),
    ]);

    let mut data = id(QUOTE_SIGNATURE).to_vec();
    data.extend(args);
    Ok(Bytes::from(data))
}

fn amount_out_to_price(amount_out: U256, pool: &UniswapV3Pool) -> Result<f64> {
    let units = format_units(amount_out, pool.token_out.decimals).context("Invalid quote amount")?;
    let total: f64 = units.parse()?;
    Ok(total / AMOUNT_IN as f64)
}

#[derive(Debug, Clone)]
pub struct UniswapV3Client {
    evm: Arc<EvmClient>,
}

impl UniswapV3Client {
    pub fn new(evm: Arc<EvmClient>) -> Self {
        Self { evm }
    }

    async fn quote(&self, pool: &UniswapV3Pool) -> Result<f64> {
        let amount_out = self
            .evm
            .call_u256(parse_address(QUOTER_ADDRESS)?, quote_calldata(pool)?)
            .await?;
        amount_out_to_price(amount_out, pool)
    }
}

#[async_trait]
impl FeedAdapter for UniswapV3Client {
    fn name(&self) -> &'static str {
        "uniswap-v3"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let pools: Vec<(&String, &UniswapV3Pool)> = assets
            .iter()
            .filter_map(|(id, config)| config.uniswap_v3.as_ref().map(|pool| (id, pool)))
            .collect();

        let results = join_all(pools.iter().map(|(_, pool)| self.quote(pool))).await;

        let mut quotes = RawQuotes::new();
        for ((asset_id, _), result) in pools.into_iter().zip(results) {
            match result {
                Ok(price) if price > 0.0 => {
                    quotes.insert(asset_id.clone(), price);
                }
                Ok(_) => {}
                Err(e) => warn!(source = "uniswap-v3", asset = %asset_id, error = %e, "Quote failed"),
            }
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TokenRef;

    fn weth_usdc() -> UniswapV3Pool {
        UniswapV3Pool {
            token_in: TokenRef {
                address: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".into(),
                decimals: 18,
            },
            token_out: TokenRef {
                address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".into(),
                decimals: 6,
            },
            fee: 500,
        }
    }

    #[test]
    fn calldata_has_selector_and_five_words() {
        let data = quote_calldata(&weth_usdc()).unwrap();
        assert_eq!(data.len(), 4 + 5 * 32);
        assert_eq!(&data[..4], &id(QUOTE_SIGNATURE)[..]);
        // fee word
        assert_eq!(U256::from_big_endian(&data[4 + 64..4 + 96]), U256::from(500));
    }

    #[test]
    fn amount_out_is_divided_by_amount_in() {
        // 10 000 WETH -> 30 123 450 USDC
        let amount_out = U256::from(30_123_450u64) * U256::exp10(6);
        let price = amount_out_to_price(amount_out, &weth_usdc()).unwrap();
        assert!((price - 3012.345).abs() < 1e-9);
    }
}
