//! Pyth Hermes latest price feeds

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::{parse_quote, tickers, FeedAdapter};
use crate::catalog::AssetTable;
use crate::types::RawQuotes;

const HERMES_URL: &str = "https://hermes.pyth.network/api/latest_price_feeds";

#[derive(Debug, Deserialize)]
struct PriceFeed {
    id: String,
    price: FeedPrice,
}

#[derive(Debug, Deserialize)]
struct FeedPrice {
    price: String,
    expo: i32,
}

fn normalize_id(id: &str) -> String {
    id.trim_start_matches("0x").to_ascii_lowercase()
}

fn match_feeds(feeds: Vec<PriceFeed>, targets: &[(&str, &str)]) -> RawQuotes {
    let by_id: HashMap<String, FeedPrice> = feeds
        .into_iter()
        .map(|feed| (normalize_id(&feed.id), feed.price))
        .collect();

    targets
        .iter()
        .filter_map(|(asset_id, feed_id)| {
            let feed = by_id.get(&normalize_id(feed_id))?;
            let price = parse_quote(&feed.price).ok()? * 10f64.powi(feed.expo);
            (price > 0.0).then(|| (asset_id.to_string(), price))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct PythClient {
    http: Client,
}

impl PythClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl FeedAdapter for PythClient {
    fn name(&self) -> &'static str {
        "pyth"
    }

    async fn get_prices(&self, assets: &AssetTable) -> Result<RawQuotes> {
        let targets = tickers(assets, |a| a.pyth.as_deref());
        if targets.is_empty() {
            return Ok(RawQuotes::new());
        }

        let query: Vec<(&str, &str)> = targets.iter().map(|(_, id)| ("ids[]", *id)).collect();
        let feeds: Vec<PriceFeed> = self
            .http
            .get(HERMES_URL)
            .query(&query)
            .send()
            .await
            .context("Failed to fetch Pyth price feeds")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Pyth price feeds")?;

        Ok(match_feeds(feeds, &targets))
    }
}
