//! Derived Asset Resolver
//!
//! Prices synthetic assets from exactly one primary dependency. Runs after
//! primary reconciliation, so every dependency is already final for the
//! cycle. Any failure leaves the derived asset without a price.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::catalog::{DerivedAssetConfig, DerivedComputation, PoolQuote, RateSource, SanityBand};
use crate::types::{AssetId, Price, ResolvedPrices};

/// Reads exchange rates and pool quotes from chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Ratio of the derived asset to its dependency
    async fn exchange_rate(&self, source: &RateSource) -> Result<Decimal>;

    /// Whole `token_out` received for one whole `token_in`
    async fn pool_quote(&self, quote: &PoolQuote) -> Result<Decimal>;
}

/// Multiply a dependency price by `ratio` and add `extra_decimals`.
///
/// `None` when the result does not fit or rounds to zero.
pub fn apply_ratio(dependency: Price, ratio: Decimal, extra_decimals: u32) -> Option<Price> {
    let multiplier = Decimal::from_u128(dependency.multiplier)?
        .checked_mul(ratio)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u128()?;
    Price::new(multiplier, dependency.decimals + extra_decimals).present()
}

pub struct DerivedAssetResolver<'a> {
    rates: &'a dyn RateProvider,
    timeout: Duration,
}

impl<'a> DerivedAssetResolver<'a> {
    pub fn new(rates: &'a dyn RateProvider, timeout: Duration) -> Self {
        Self { rates, timeout }
    }

    /// Resolve every derived asset against the primary prices of this cycle.
    /// Assets that fail are absent from the result.
    pub async fn resolve_all(
        &self,
        derived: &BTreeMap<AssetId, DerivedAssetConfig>,
        primary: &ResolvedPrices,
    ) -> ResolvedPrices {
        let pending = derived.iter().map(|(asset_id, config)| async move {
            let dependency = primary.get(&config.dependency).copied();
            (asset_id, self.resolve(asset_id, config, dependency).await)
        });

        join_all(pending)
            .await
            .into_iter()
            .filter_map(|(asset_id, price)| price.map(|p| (asset_id.clone(), p)))
            .collect()
    }

    /// Price one derived asset; `None` when it cannot be priced this cycle
    pub async fn resolve(
        &self,
        asset_id: &str,
        config: &DerivedAssetConfig,
        dependency: Option<Price>,
    ) -> Option<Price> {
        let Some(dependency) = dependency.and_then(Price::present) else {
            debug!(asset = %asset_id, dependency = %config.dependency, "Dependency has no price this cycle");
            return None;
        };

        let (ratio, band, extra_decimals) = match &config.compute {
            DerivedComputation::PassThrough => return Some(dependency),
            DerivedComputation::ExchangeRate { source, band } => {
                let ratio = self.bounded(asset_id, self.rates.exchange_rate(source)).await?;
                (ratio, Some(band), 0)
            }
            DerivedComputation::PoolQuote(quote) => {
                let ratio = self.bounded(asset_id, self.rates.pool_quote(quote)).await?;
                (ratio, quote.band.as_ref(), quote.decimals_shift())
            }
        };

        if let Some(band) = band {
            if !band_allows(asset_id, band, ratio) {
                return None;
            }
        }

        let price = apply_ratio(dependency, ratio, extra_decimals);
        if price.is_none() {
            warn!(asset = %asset_id, ratio = %ratio, "Derived price is not representable");
        }
        price
    }

    async fn bounded(
        &self,
        asset_id: &str,
        fetch: impl std::future::Future<Output = Result<Decimal>>,
    ) -> Option<Decimal> {
        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(ratio)) => Some(ratio),
            Ok(Err(e)) => {
                warn!(asset = %asset_id, error = %e, "Failed to fetch rate");
                None
            }
            Err(_) => {
                warn!(asset = %asset_id, "Rate fetch timed out");
                None
            }
        }
    }
}

fn band_allows(asset_id: &str, band: &SanityBand, ratio: Decimal) -> bool {
    if band.contains(ratio) {
        return true;
    }
    error!(
        asset = %asset_id,
        ratio = %ratio,
        min = %band.min,
        max = %band.max,
        review_by = ?band.review_by,
        "Rate outside sanity band, dropping price"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rust_decimal_macros::dec;

    fn staking_config(min: Decimal, max: Decimal) -> DerivedAssetConfig {
        DerivedAssetConfig {
            dependency: "wrap.near".into(),
            compute: DerivedComputation::ExchangeRate {
                source: RateSource::NearView {
                    contract: "meta-pool.near".into(),
                    method: "get_st_near_price".into(),
                    field: None,
                    scale_decimals: 24,
                    require_ft_decimals: None,
                },
                band: SanityBand::new(min, max),
            },
            relative_diff: None,
        }
    }

    fn usn_config() -> DerivedAssetConfig {
        DerivedAssetConfig {
            dependency: "usdt".into(),
            compute: DerivedComputation::PoolQuote(PoolQuote {
                pool_id: 3020,
                token_in: "usn".into(),
                token_in_decimals: 18,
                token_out: "usdt".into(),
                token_out_decimals: 6,
                band: None,
            }),
            relative_diff: None,
        }
    }

    #[test]
    fn apply_ratio_rounds_half_up() {
        assert_eq!(apply_ratio(Price::new(10_000, 28), dec!(1.25), 0), Some(Price::new(12_500, 28)));
        assert_eq!(apply_ratio(Price::new(5, 28), dec!(1.5), 0), Some(Price::new(8, 28)));
        assert_eq!(apply_ratio(Price::new(10_000, 10), dec!(0.99), 12), Some(Price::new(9_900, 22)));
        assert_eq!(apply_ratio(Price::new(1, 10), dec!(0.1), 0), None);
    }

    #[tokio::test]
    async fn exchange_rate_in_band_scales_dependency() {
        let mut rates = MockRateProvider::new();
        rates.expect_exchange_rate().returning(|_| Ok(dec!(1.4)));
        let resolver = DerivedAssetResolver::new(&rates, Duration::from_secs(1));

        let price = resolver
            .resolve("meta-pool.near", &staking_config(dec!(1.33), dec!(1.58)), Some(Price::new(50_000, 28)))
            .await;

        assert_eq!(price, Some(Price::new(70_000, 28)));
    }

    #[tokio::test]
    async fn rate_outside_band_is_dropped() {
        let mut rates = MockRateProvider::new();
        rates.expect_exchange_rate().returning(|_| Ok(dec!(1.6)));
        let resolver = DerivedAssetResolver::new(&rates, Duration::from_secs(1));

        let price = resolver
            .resolve("meta-pool.near", &staking_config(dec!(1.33), dec!(1.58)), Some(Price::new(50_000, 28)))
            .await;

        assert_eq!(price, None);
    }

    #[tokio::test]
    async fn absent_dependency_skips_rate_fetch() {
        let mut rates = MockRateProvider::new();
        rates.expect_exchange_rate().never();
        let resolver = DerivedAssetResolver::new(&rates, Duration::from_secs(1));
        let config = staking_config(dec!(1.33), dec!(1.58));

        assert_eq!(resolver.resolve("meta-pool.near", &config, None).await, None);
        assert_eq!(resolver.resolve("meta-pool.near", &config, Some(Price::ABSENT)).await, None);
    }

    #[tokio::test]
    async fn rate_error_leaves_asset_unpriced() {
        let mut rates = MockRateProvider::new();
        rates
            .expect_exchange_rate()
            .returning(|_| Err(anyhow!("view call failed")));
        let resolver = DerivedAssetResolver::new(&rates, Duration::from_secs(1));

        let price = resolver
            .resolve("meta-pool.near", &staking_config(dec!(1.33), dec!(1.58)), Some(Price::new(50_000, 28)))
            .await;

        assert_eq!(price, None);
    }

    #[tokio::test]
    async fn pool_quote_shifts_decimals() {
        let mut rates = MockRateProvider::new();
        rates.expect_pool_quote().returning(|_| Ok(dec!(0.998)));
        let resolver = DerivedAssetResolver::new(&rates, Duration::from_secs(1));

        let price = resolver
            .resolve("usn", &usn_config(), Some(Price::new(10_000, 10)))
            .await;

        assert_eq!(price, Some(Price::new(9_980, 22)));
    }

    #[tokio::test]
    async fn pool_quote_outside_band_is_dropped() {
        let mut config = usn_config();
        if let DerivedComputation::PoolQuote(quote) = &mut config.compute {
            quote.band = Some(SanityBand::new(dec!(0.95), dec!(1.05)));
        }
        let mut rates = MockRateProvider::new();
        rates.expect_pool_quote().times(1).returning(|_| Ok(dec!(0.90)));
        let resolver = DerivedAssetResolver::new(&rates, Duration::from_secs(1));

        let price = resolver.resolve("usn", &config, Some(Price::new(10_000, 10))).await;

        assert_eq!(price, None);
    }

    #[tokio::test]
    async fn pool_quote_inside_band_is_kept() {
        let mut config = usn_config();
        if let DerivedComputation::PoolQuote(quote) = &mut config.compute {
            quote.band = Some(SanityBand::new(dec!(0.95), dec!(1.05)));
        }
        let mut rates = MockRateProvider::new();
        rates.expect_pool_quote().returning(|_| Ok(dec!(0.998)));
        let resolver = DerivedAssetResolver::new(&rates, Duration::from_secs(1));

        let price = resolver.resolve("usn", &config, Some(Price::new(10_000, 10))).await;

        assert_eq!(price, Some(Price::new(9_980, 22)));
    }

    #[tokio::test]
    async fn resolve_all_uses_primary_prices() {
        let mut rates = MockRateProvider::new();
        rates.expect_exchange_rate().returning(|_| Ok(dec!(1.5)));
        let resolver = DerivedAssetResolver::new(&rates, Duration::from_secs(1));

        let derived = BTreeMap::from([
            ("meta-pool.near".to_string(), staking_config(dec!(1.33), dec!(1.58))),
            (
                "usdt.tether-token.near".to_string(),
                DerivedAssetConfig {
                    dependency: "usdt".into(),
                    compute: DerivedComputation::PassThrough,
                    relative_diff: None,
                },
            ),
        ]);
        let primary = ResolvedPrices::from([
            ("wrap.near".to_string(), Price::new(50_000, 28)),
            ("usdt".to_string(), Price::ABSENT),
        ]);

        let resolved = resolver.resolve_all(&derived, &primary).await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["meta-pool.near"], Price::new(75_000, 28));
    }
}
