//! Chainlink aggregators on Ethereum mainnet (`latestAnswer()`)

use anyhow::{bail, Result};
use async_trait::async_trait;
use ethers::types::I256;
use std::sync::Arc;

use super::{quote_each, tickers, FeedAdapter};
use crate::catalog::AssetTable;
use crate::chain::{parse_address, parse_selector, EvmClient};
use crate::types::RawQuotes;

/// `latestAnswer()`
const LATEST_ANSWER: &str = "0x50d25bcd";

/// USD feeds answer with 8 decimals
const ANSWER_DECIMALS: i32 = 8;

fn answer_to_usd(answer: I256) -> Result<f64> {
    if answer <= I256::zero() {
        bail!("Chainlink answer {} is not positive", answer);
    }
    let raw: f64 = answer.to_string().parse()?;
    Ok(raw / 10f64.powi(ANSWER_DECIMALS))
}

#[derive(Debug, Clone)]
pub struct ChainlinkClient {
    evm: Arc<EvmClient>,
}

impl ChainlinkClient {
    pub fn new(evm: Arc<EvmClient>) -> Self {
        Self { evm }
    }

    async fn fetch_feed(&self, aggregator: &str) -> Result<f64> {
        let answer = self
            .evm
            .call_i256(parse_address(aggregator)?, parse_selector(LATEST_ANSWER)?)
            .await?;
        answer_to_usd(answer)
    }
}

#[async_trait]
impl FeedAdapter for ChainlinkClient {
    fn name(&self) -> &'static str {
        "chainlink"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.chainlink.as_deref());
        Ok(quote_each(self.name(), targets, |aggregator| self.fetch_feed(aggregator)).await)
    }
}
