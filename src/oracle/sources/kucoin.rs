//! KuCoin level-1 order book

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{parse_quote, quote_each, tickers, FeedAdapter};
use crate::catalog::AssetTable;
use crate::oracle::aggregator::avg_price;
use crate::types::RawQuotes;

const KUCOIN_URL: &str = "https://api.kucoin.com/api/v1/market/orderbook/level1";

#[derive(Debug, Deserialize)]
struct Level1Response {
    code: String,
    data: Option<Level1>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Level1 {
    best_bid: String,
    best_ask: String,
    price: String,
}

fn level1_price(response: Level1Response) -> Result<f64> {
    if response.code != "200000" {
        bail!("KuCoin code {}", response.code);
    }
    let book = response.data.context("KuCoin response without data")?;
    Ok(avg_price(
        parse_quote(&book.best_bid)?,
        parse_quote(&book.best_ask)?,
        parse_quote(&book.price)?,
    ))
}

#[derive(Debug, Clone)]
pub struct KucoinClient {
    http: Client,
}

impl KucoinClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn fetch_symbol(&self, symbol: &str) -> Result<f64> {
        let response: Level1Response = self
            .http
            .get(KUCOIN_URL)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("Failed to fetch KuCoin order book")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse KuCoin order book")?;
        level1_price(response)
    }
}

#[async_trait]
impl FeedAdapter for KucoinClient {
    fn name(&self) -> &'static str {
        "kucoin"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.kucoin.as_deref());
        Ok(quote_each(self.name(), targets, |symbol| self.fetch_symbol(symbol)).await)
    }
}
