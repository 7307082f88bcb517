//! Oracle module - Multi-source price resolution
//!
//! Feed adapters quote primary assets, the reconciler turns the quotes into
//! fixed-point prices, and the derived resolver prices synthetic assets
//! from their primary dependency.

pub mod aggregator;
mod derived;
mod rates;
pub mod sources;

pub use aggregator::{avg_price, median_price, QuoteReconciler};
pub use derived::{apply_ratio, DerivedAssetResolver, RateProvider};
pub use rates::ChainRateProvider;
pub use sources::{collect_quotes, default_adapters, FeedAdapter};

#[cfg(test)]
pub use derived::MockRateProvider;
