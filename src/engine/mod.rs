//! Update Decision Engine
//!
//! Decides per cycle which resolved prices are worth a transaction:
//! - relative-difference gate against the last published price
//! - periodic full refresh of every live asset
//! - version report cadence
//! - balance claim flag

mod cycle;

pub use cycle::{CycleReport, OracleBot};

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::catalog::AssetCatalog;
use crate::persistence::BotState;
use crate::types::{AssetId, OraclePriceSnapshot, Price, PriceUpdate, PublishPayload, ResolvedPrices};

/// Whether `new` moved far enough from `old` to publish.
///
/// Both sides are brought to the larger exponent first; the threshold is
/// relative to the old multiplier, so any positive price beats the sentinel.
pub fn is_different_enough(relative_diff: f64, old: Price, new: Price) -> bool {
    let decimals = old.decimals.max(new.decimals);
    match (normalize(old, decimals), normalize(new, decimals)) {
        (Some(old), Some(new)) => new.abs_diff(old) as f64 >= old as f64 * relative_diff,
        // one side no longer fits in u128 after rescaling
        _ => true,
    }
}

fn normalize(price: Price, decimals: u32) -> Option<u128> {
    10u128
        .checked_pow(decimals - price.decimals)
        .and_then(|factor| price.multiplier.checked_mul(factor))
}

/// Threshold of every catalog asset, primary and derived
pub fn relative_diffs(catalog: &AssetCatalog, default: f64) -> BTreeMap<AssetId, f64> {
    catalog
        .asset_ids()
        .into_iter()
        .map(|id| {
            let diff = catalog.relative_diff(&id, default);
            (id, diff)
        })
        .collect()
}

/// Outcome of one decision pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub payload: PublishPayload,
    pub full_refresh: bool,
    /// Priced assets the contract does not accept
    pub not_whitelisted: Vec<AssetId>,
}

#[derive(Debug, Clone)]
pub struct UpdateDecisionEngine {
    full_update_period_ms: i64,
    version_report_period_ms: i64,
    version: Option<String>,
}

impl UpdateDecisionEngine {
    pub fn new(full_update_period_ms: i64, version_report_period_ms: i64, version: Option<String>) -> Self {
        Self {
            full_update_period_ms,
            version_report_period_ms,
            version,
        }
    }

    /// Build this cycle's payload and advance `state`.
    ///
    /// `claim_near` is attached as is; it never makes the payload emit on
    /// its own.
    pub fn decide(
        &self,
        now_ms: i64,
        relative_diffs: &BTreeMap<AssetId, f64>,
        snapshot: &OraclePriceSnapshot,
        new_prices: &ResolvedPrices,
        state: &mut BotState,
        claim_near: bool,
    ) -> Decision {
        let mut candidates: Vec<PriceUpdate> = Vec::new();
        let mut significant: Vec<PriceUpdate> = Vec::new();
        let mut not_whitelisted = Vec::new();

        for (asset_id, relative_diff) in relative_diffs {
            let Some(new_price) = new_prices.get(asset_id).copied() else {
                continue;
            };

            if !snapshot.is_live(asset_id) {
                info!(asset = %asset_id, "Asset is not whitelisted, skipping");
                not_whitelisted.push(asset_id.clone());
                continue;
            }

            if new_price.is_absent() {
                continue;
            }

            let update = PriceUpdate {
                asset_id: asset_id.clone(),
                price: new_price,
            };
            let old_price = snapshot.price_of(asset_id);
            if is_different_enough(*relative_diff, old_price, new_price) {
                debug!(asset = %asset_id, old = %old_price, new = %new_price, "Significant change");
                significant.push(update.clone());
            }
            candidates.push(update);
        }

        let full_refresh = is_due(now_ms, state.last_full_update_timestamp, self.full_update_period_ms);
        let prices = if full_refresh {
            info!(assets = candidates.len(), "Full price refresh");
            state.last_full_update_timestamp = now_ms;
            candidates
        } else {
            significant
        };

        let mut payload = PublishPayload {
            prices,
            version: None,
            claim_near,
        };

        if !payload.prices.is_empty()
            && is_due(now_ms, state.last_version_report_timestamp, self.version_report_period_ms)
        {
            if let Some(version) = &self.version {
                payload.version = Some(version.clone());
                state.last_version_report_timestamp = now_ms;
            }
        }

        Decision {
            payload,
            full_refresh,
            not_whitelisted,
        }
    }
}

/// A timer is due once its period has elapsed. A timestamp ahead of `now_ms`
/// cannot come from this bot and also counts as due.
fn is_due(now_ms: i64, last_ms: i64, period_ms: i64) -> bool {
    last_ms > now_ms || now_ms >= last_ms.saturating_add(period_ms)
}
