//! CoinGecko `simple/price`, one batched request per cycle

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::{BTreeSet, HashMap};

use super::{tickers, FeedAdapter};
use crate::catalog::AssetTable;
use crate::types::RawQuotes;

const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// `{ "<coin id>": { "usd": 5.12 } }`
type SimplePrice = HashMap<String, HashMap<String, f64>>;

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: Client,
}

impl CoinGeckoClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

fn match_prices(body: &SimplePrice, targets: &[(&str, &str)]) -> RawQuotes {
    targets
        .iter()
        .filter_map(|(asset_id, coin)| {
            let usd = *body.get(*coin)?.get("usd")?;
            (usd > 0.0).then(|| (asset_id.to_string(), usd))
        })
        .collect()
}

#[async_trait]
impl FeedAdapter for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.coingecko.as_deref());
        if targets.is_empty() {
            return Ok(RawQuotes::new());
        }

        let ids: BTreeSet<&str> = targets.iter().map(|(_, coin)| *coin).collect();
        let ids = ids.into_iter().collect::<Vec<_>>().join(",");

        let body: SimplePrice = self
            .http
            .get(COINGECKO_URL)
            .query(&[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .send()
            .await
            .context("Failed to fetch CoinGecko prices")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse CoinGecko prices")?;

        Ok(match_prices(&body, &targets))
    }
}
