//! Gate.io legacy ticker API

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{parse_quote, quote_each, tickers, FeedAdapter};
use crate::catalog::AssetTable;
use crate::oracle::aggregator::avg_price;
use crate::types::RawQuotes;

const GATE_URL: &str = "https://data.gateapi.io/api2/1/ticker";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GateTicker {
    result: String,
    #[serde(default)]
    highest_bid: String,
    #[serde(default)]
    lowest_ask: String,
    #[serde(default)]
    last: String,
}

fn ticker_price(ticker: GateTicker) -> Result<f64> {
    if ticker.result != "true" {
        bail!("Gate ticker result {}", ticker.result);
    }
    Ok(avg_price(
        parse_quote(&ticker.highest_bid)?,
        parse_quote(&ticker.lowest_ask)?,
        parse_quote(&ticker.last)?,
    ))
}

#[derive(Debug, Clone)]
pub struct GateClient {
    http: Client,
}

impl GateClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn fetch_symbol(&self, pair: &str) -> Result<f64> {
        let ticker: GateTicker = self
            .http
            .get(format!("{GATE_URL}/{pair}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        ticker_price(ticker)
    }
}

#[async_trait]
impl FeedAdapter for GateClient {
    fn name(&self) -> &'static str {
        "gate"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.gate.as_deref());
        Ok(quote_each(self.name(), targets, |pair| self.fetch_symbol(pair)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_inside_book() {
        let json = r#"{"quoteVolume":"1","baseVolume":"1","highestBid":"5.11","high24hr":"5.4",
            "last":"5.12","lowestAsk":"5.13","elapsed":"1ms","result":"true","low24hr":"5.0",
            "percentChange":"0.1"}"#;
        let ticker: GateTicker = serde_json::from_str(json).unwrap();
        assert_eq!(ticker_price(ticker).unwrap(), 5.12);
    }

    #[test]
    fn failed_result_is_rejected() {
        let json = r#"{"result":"false","code":7,"message":"Invalid currency pair"}"#;
        let ticker: GateTicker = serde_json::from_str(json).unwrap();
        assert!(ticker_price(ticker).is_err());
    }
}
