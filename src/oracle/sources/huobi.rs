//! Huobi merged market detail: mid of the best bid and ask

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{quote_each, tickers, FeedAdapter};
use crate::catalog::AssetTable;
use crate::types::RawQuotes;

const HUOBI_URL: &str = "https://api.huobi.pro/market/detail/merged";

#[derive(Debug, Deserialize)]
struct MergedResponse {
    status: String,
    tick: Option<MergedTick>,
}

/// `bid`/`ask` are `[price, size]`
#[derive(Debug, Deserialize)]
struct MergedTick {
    bid: Vec<f64>,
    ask: Vec<f64>,
}

fn mid_price(response: MergedResponse) -> Result<f64> {
    if response.status != "ok" {
        bail!("Huobi status {}", response.status);
    }
    let tick = response.tick.context("Huobi response without tick")?;
    match (tick.bid.first(), tick.ask.first()) {
        (Some(bid), Some(ask)) => Ok((bid + ask) / 2.0),
        _ => bail!("Huobi book is empty"),
    }
}

#[derive(Debug, Clone)]
pub struct HuobiClient {
    http: Client,
}

impl HuobiClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn fetch_symbol(&self, symbol: &str) -> Result<f64> {
        let response: MergedResponse = self
            .http
            .get(HUOBI_URL)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("Failed to fetch Huobi ticker")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Huobi ticker")?;
        mid_price(response)
    }
}

#[async_trait]
impl FeedAdapter for HuobiClient {
    fn name(&self) -> &'static str {
        "huobi"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.huobi.as_deref());
        Ok(quote_each(self.name(), targets, |symbol| self.fetch_symbol(symbol)).await)
    }
}
