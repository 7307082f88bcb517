//! Crypto.com Exchange public tickers

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use super::{parse_quote, quote_each, tickers, FeedAdapter};
use crate::catalog::AssetTable;
use crate::oracle::aggregator::avg_price;
use crate::types::RawQuotes;

const CRYPTOCOM_URL: &str = "https://api.crypto.com/exchange/v1/public/get-tickers";

/// Tickers older than this are stale
const MAX_TICKER_AGE_MS: i64 = 10_000;

#[derive(Debug, Deserialize)]
struct TickersResponse {
    result: Option<TickersResult>,
}

#[derive(Debug, Deserialize)]
struct TickersResult {
    #[serde(default)]
    data: Vec<TickerData>,
}

/// `b` best bid, `k` best ask, `a` last trade, `t` timestamp ms
#[derive(Debug, Deserialize)]
struct TickerData {
    i: String,
    #[serde(default)]
    b: Option<String>,
    #[serde(default)]
    k: Option<String>,
    #[serde(default)]
    a: Option<String>,
    t: i64,
}

fn ticker_price(response: TickersResponse, symbol: &str, now_ms: i64) -> Result<f64> {
    let data = response
        .result
        .and_then(|r| r.data.into_iter().next())
        .context("Crypto.com response without ticker data")?;

    if data.i != symbol {
        bail!("Crypto.com returned {} for {}", data.i, symbol);
    }
    if data.t < now_ms - MAX_TICKER_AGE_MS {
        bail!("Crypto.com ticker is {} ms old", now_ms - data.t);
    }

    let field = |v: &Option<String>| v.as_deref().map(parse_quote).transpose().map(|p| p.unwrap_or(0.0));
    Ok(avg_price(field(&data.b)?, field(&data.k)?, field(&data.a)?))
}

#[derive(Debug, Clone)]
pub struct CryptoComClient {
    http: Client,
}

impl CryptoComClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn fetch_symbol(&self, symbol: &str) -> Result<f64> {
        let response: TickersResponse = self
            .http
            .get(CRYPTOCOM_URL)
            .query(&[("instrument_name", symbol)])
            .send()
            .await
            .context("Failed to fetch Crypto.com ticker")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Crypto.com ticker")?;
        ticker_price(response, symbol, Utc::now().timestamp_millis())
    }
}

#[async_trait]
impl FeedAdapter for CryptoComClient {
    fn name(&self) -> &'static str {
        "cryptocom"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.cryptocom.as_deref());
        Ok(quote_each(self.name(), targets, |symbol| self.fetch_symbol(symbol)).await)
    }
}
