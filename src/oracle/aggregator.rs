//! Quote Reconciler - Combines raw quotes from multiple feeds
//!
//! Takes the per-source quote maps of one cycle and produces one fixed-point
//! price per primary asset: median across sources, stablecoin parity guard,
//! then scaling to the asset's on-chain decimals.

use tracing::{debug, error};

use crate::catalog::{AssetConfig, AssetTable};
use crate::types::{Price, RawQuotes, ResolvedPrices};

/// Parity band a stablecoin median must fall in
pub const STABLECOIN_MIN: f64 = 0.95;
pub const STABLECOIN_MAX: f64 = 1.05;

/// Median of every finite quote for `asset_id` across all sources, 0 if none
pub fn median_price(source_results: &[RawQuotes], asset_id: &str) -> f64 {
    let mut values: Vec<f64> = source_results
        .iter()
        .filter_map(|quotes| quotes.get(asset_id).copied())
        .filter(|price| price.is_finite())
        .collect();

    debug!(
        asset = %asset_id,
        prices = ?values,
        "Source quotes"
    );

    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let half = values.len() / 2;
    if values.len() % 2 == 1 {
        values[half]
    } else {
        (values[half - 1] + values[half]) / 2.0
    }
}

/// Combine bid/ask/last of one order book into a single quote.
///
/// Returns 0 for a crossed or empty book; otherwise `last` clamped into
/// `[bid, ask]`.
pub fn avg_price(bid: f64, ask: f64, last: f64) -> f64 {
    if bid * ask == 0.0 || !(bid * ask).is_finite() || bid > ask {
        return 0.0;
    }
    if last <= bid {
        return bid;
    }
    if last >= ask {
        return ask;
    }
    last
}

/// Turns per-source quotes into fixed-point prices
#[derive(Debug, Clone)]
pub struct QuoteReconciler {
    /// Digits kept after the decimal point when an asset sets none
    default_fraction_digits: u32,
}

impl QuoteReconciler {
    pub fn new(default_fraction_digits: u32) -> Self {
        Self {
            default_fraction_digits,
        }
    }

    /// Price every asset of the table. Assets without quotes get the sentinel.
    pub fn reconcile_all(&self, assets: &AssetTable, source_results: &[RawQuotes]) -> ResolvedPrices {
        assets
            .iter()
            .map(|(id, config)| {
                let median = median_price(source_results, id);
                (id.clone(), self.to_price(id, config, median))
            })
            .collect()
    }

    /// Apply the stablecoin guard and scale a USD price to the asset's units
    pub fn to_price(&self, asset_id: &str, config: &AssetConfig, price: f64) -> Price {
        let fraction_digits = config
            .fraction_digits
            .unwrap_or(self.default_fraction_digits);
        let denominator = 10f64.powi(fraction_digits as i32);

        let mut price = price;
        if config.stablecoin && price > 0.0 && !(STABLECOIN_MIN..=STABLECOIN_MAX).contains(&price) {
            error!(
                asset = %asset_id,
                price = price,
                "Stablecoin price is out of range, dropping it this cycle"
            );
            price = 0.0;
        }

        Price::from_f64(price * denominator, config.decimals + fraction_digits)
    }
}

impl Default for QuoteReconciler {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn quotes(asset: &str, prices: &[f64]) -> Vec<RawQuotes> {
        prices
            .iter()
            .map(|p| HashMap::from([(asset.to_string(), *p)]))
            .collect()
    }

    #[test]
    fn median_of_odd_count_is_middle() {
        assert_eq!(median_price(&quotes("near", &[10.0, 12.0, 11.0]), "near"), 11.0);
    }

    #[test]
    fn median_of_even_count_is_mean_of_middles() {
        assert_eq!(median_price(&quotes("near", &[10.0, 12.0]), "near"), 11.0);
        assert_eq!(median_price(&quotes("near", &[4.0, 1.0, 3.0, 2.0]), "near"), 2.5);
    }

    #[test]
    fn median_of_single_and_empty() {
        assert_eq!(median_price(&quotes("near", &[7.5]), "near"), 7.5);
        assert_eq!(median_price(&[], "near"), 0.0);
        assert_eq!(median_price(&quotes("eth", &[3000.0]), "near"), 0.0);
    }

    #[test]
    fn median_skips_non_finite_and_missing() {
        let mut results = quotes("near", &[10.0, f64::NAN, 12.0, f64::INFINITY]);
        results.push(HashMap::new());
        results.push(HashMap::from([("eth".to_string(), 3000.0)]));
        assert_eq!(median_price(&results, "near"), 11.0);
    }

    #[test]
    fn avg_price_clamps_last_into_book() {
        assert_eq!(avg_price(10.0, 11.0, 10.5), 10.5);
        assert_eq!(avg_price(10.0, 11.0, 9.0), 10.0);
        assert_eq!(avg_price(10.0, 11.0, 12.0), 11.0);
        assert_eq!(avg_price(0.0, 11.0, 10.5), 0.0);
        assert_eq!(avg_price(12.0, 11.0, 11.5), 0.0);
    }

    #[test]
    fn stablecoin_out_of_band_is_dropped() {
        let reconciler = QuoteReconciler::new(4);
        let usdt = AssetConfig {
            decimals: 6,
            stablecoin: true,
            ..Default::default()
        };
        assert!(reconciler.to_price("usdt", &usdt, 1.20).is_absent());
        assert!(reconciler.to_price("usdt", &usdt, 0.90).is_absent());
        assert_eq!(reconciler.to_price("usdt", &usdt, 1.02), Price::new(10_200, 10));
    }

    #[test]
    fn price_uses_asset_fraction_digits() {
        let reconciler = QuoteReconciler::new(4);
        let eth = AssetConfig {
            decimals: 18,
            fraction_digits: Some(2),
            ..Default::default()
        };
        assert_eq!(reconciler.to_price("aurora", &eth, 3012.346), Price::new(301_235, 20));

        let near = AssetConfig {
            decimals: 24,
            ..Default::default()
        };
        assert_eq!(reconciler.to_price("wrap.near", &near, 5.12346), Price::new(51_235, 28));
    }

    #[test]
    fn reconcile_all_covers_every_asset() {
        let reconciler = QuoteReconciler::new(4);
        let mut table = AssetTable::new();
        table.insert("wrap.near".into(), AssetConfig { decimals: 24, ..Default::default() });
        table.insert("woo".into(), AssetConfig { decimals: 18, ..Default::default() });

        let results = quotes("wrap.near", &[5.0, 5.2, 5.1]);
        let prices = reconciler.reconcile_all(&table, &results);

        assert_eq!(prices["wrap.near"], Price::new(51_000, 28));
        assert!(prices["woo"].is_absent());
    }
}
