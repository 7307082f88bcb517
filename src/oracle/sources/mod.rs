//! Feed adapters (CoinGecko, Binance, Huobi, Crypto.com, KuCoin, Gate,
//! Chainlink, Pyth, Uniswap V3)
//!
//! Every adapter maps the catalog's per-source symbol to a USD quote. The
//! fan-out isolates adapters from each other: an error or timeout in one
//! source only removes that source's quotes from the cycle.

mod binance;
mod chainlink;
mod coingecko;
mod cryptocom;
mod gate;
mod huobi;
mod kucoin;
mod pyth;
mod uniswap_v3;

pub use binance::{BinanceFuturesClient, BinanceSpotClient};
pub use chainlink::ChainlinkClient;
pub use coingecko::CoinGeckoClient;
pub use cryptocom::CryptoComClient;
pub use gate::GateClient;
pub use huobi::HuobiClient;
pub use kucoin::KucoinClient;
pub use pyth::PythClient;
pub use uniswap_v3::UniswapV3Client;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::{AssetConfig, AssetTable};
use crate::chain::EvmClient;
use crate::config::OracleConfig;
use crate::types::RawQuotes;

/// A source of USD quotes for primary assets
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    /// Name used in logs and in `oracle.disabled_sources`
    fn name(&self) -> &'static str;

    /// Quote every asset of the table this source knows; omit the rest
    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes>;
}

/// All adapters that are not disabled in configuration
pub fn default_adapters(
    config: &OracleConfig,
    http: &Client,
    evm: Arc<EvmClient>,
) -> Vec<Box<dyn FeedAdapter>> {
    let all: Vec<Box<dyn FeedAdapter>> = vec![
        Box::new(BinanceSpotClient::new(http.clone())),
        Box::new(BinanceFuturesClient::new(http.clone())),
        Box::new(CoinGeckoClient::new(http.clone())),
        Box::new(HuobiClient::new(http.clone())),
        Box::new(CryptoComClient::new(http.clone())),
        Box::new(KucoinClient::new(http.clone())),
        Box::new(GateClient::new(http.clone())),
        Box::new(ChainlinkClient::new(evm.clone())),
        Box::new(PythClient::new(http.clone())),
        Box::new(UniswapV3Client::new(evm)),
    ];

    let enabled: Vec<Box<dyn FeedAdapter>> = all
        .into_iter()
        .filter(|adapter| config.is_source_enabled(adapter.name()))
        .collect();

    info!(
        sources = ?enabled.iter().map(|a| a.name()).collect::<Vec<_>>(),
        "Feed adapters enabled"
    );
    enabled
}

/// Query every adapter concurrently.
///
/// Returns one quote map per adapter, in adapter order. A failed or
/// timed-out adapter contributes an empty map.
pub async fn collect_quotes(
    adapters: &[Box<dyn FeedAdapter>],
    assets: &AssetTable,
    timeout: Duration,
) -> Vec<RawQuotes> {
    join_all(
        adapters
            .iter()
            .map(|adapter| fetch_isolated(adapter.as_ref(), assets, timeout)),
    )
    .await
}

async fn fetch_isolated(adapter: &dyn FeedAdapter, assets: &AssetTable, timeout: Duration) -> RawQuotes {
    match tokio::time::timeout(timeout, adapter.get_prices(assets)).await {
        Ok(Ok(quotes)) => {
            debug!(source = adapter.name(), count = quotes.len(), "Source quotes received");
            quotes
        }
        Ok(Err(e)) => {
            warn!(source = adapter.name(), error = %e, "Source failed, skipping this cycle");
            RawQuotes::new()
        }
        Err(_) => {
            warn!(
                source = adapter.name(),
                timeout_ms = timeout.as_millis() as u64,
                "Source timed out, skipping this cycle"
            );
            RawQuotes::new()
        }
    }
}

/// `(asset_id, symbol)` pairs for every asset that has a symbol on this source
pub(crate) fn tickers<'a>(
    assets: &'a AssetTable,
    symbol: impl Fn(&'a AssetConfig) -> Option<&'a str>,
) -> Vec<(&'a str, &'a str)> {
    assets
        .iter()
        .filter_map(|(id, config)| symbol(config).map(|s| (id.as_str(), s)))
        .collect()
}

/// Fetch one quote per ticker concurrently. A failing ticker is logged and
/// left out; the others still count.
pub(crate) async fn quote_each<'a, F, Fut>(
    source: &'static str,
    targets: Vec<(&'a str, &'a str)>,
    fetch: F,
) -> RawQuotes
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<f64>>,
{
    let fetches = targets.into_iter().map(|(asset_id, symbol)| {
        let pending = fetch(symbol);
        async move { (asset_id, symbol, pending.await) }
    });

    let mut quotes = RawQuotes::new();
    for (asset_id, symbol, result) in join_all(fetches).await {
        match result {
            Ok(price) if price.is_finite() && price > 0.0 => {
                quotes.insert(asset_id.to_string(), price);
            }
            Ok(price) => debug!(source, symbol, price, "Discarding unusable quote"),
            Err(e) => warn!(source, symbol, error = %e, "Ticker fetch failed"),
        }
    }
    quotes
}

/// Parse a decimal string quote the way exchanges send them
pub(crate) fn parse_quote(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("invalid quote {raw:?}: {e}"))
}
