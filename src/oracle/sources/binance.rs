//! Binance REST clients for spot and USD-M futures last prices

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::{parse_quote, quote_each, tickers, FeedAdapter};
use crate::catalog::AssetTable;
use crate::types::RawQuotes;

const BINANCE_SPOT_URL: &str = "https://api.binance.com/api/v3/ticker/price";
const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com/fapi/v1/ticker/price";

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// Spot last price, one request per symbol
#[derive(Debug, Clone)]
pub struct BinanceSpotClient {
    http: Client,
}

impl BinanceSpotClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn fetch_symbol(&self, symbol: &str) -> Result<f64> {
        let ticker: TickerPrice = self
            .http
            .get(BINANCE_SPOT_URL)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("Failed to fetch Binance ticker")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Binance ticker")?;
        parse_quote(&ticker.price)
    }
}

#[async_trait]
impl FeedAdapter for BinanceSpotClient {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.binance.as_deref());
        Ok(quote_each(self.name(), targets, |symbol| self.fetch_symbol(symbol)).await)
    }
}

/// Futures last prices, one request for the whole market
#[derive(Debug, Clone)]
pub struct BinanceFuturesClient {
    http: Client,
}

impl BinanceFuturesClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

/// Pick the catalog symbols out of the full futures price list
fn match_futures_prices(all: Vec<TickerPrice>, targets: &[(&str, &str)]) -> RawQuotes {
    let by_symbol: HashMap<String, String> = all.into_iter().map(|t| (t.symbol, t.price)).collect();

    targets
        .iter()
        .filter_map(|(asset_id, symbol)| {
            let price = parse_quote(by_symbol.get(*symbol)?).ok()?;
            (price > 0.0).then(|| (asset_id.to_string(), price))
        })
        .collect()
}

#[async_trait]
impl FeedAdapter for BinanceFuturesClient {
    fn name(&self) -> &'static str {
        "binance-futures"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.binance.as_deref());
        if targets.is_empty() {
            return Ok(RawQuotes::new());
        }

        let all: Vec<TickerPrice> = self
            .http
            .get(BINANCE_FUTURES_URL)
            .send()
            .await
            .context("Failed to fetch Binance futures prices")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Binance futures prices")?;

        Ok(match_futures_prices(all, &targets))
    }
}
