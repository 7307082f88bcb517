//! One oracle cycle: fetch, reconcile, resolve derived, decide, publish, persist

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{relative_diffs, UpdateDecisionEngine};
use crate::catalog::AssetCatalog;
use crate::chain::{http_client, AgentClient, EvmClient, NearRpcClient};
use crate::config::AppConfig;
use crate::error::CycleError;
use crate::oracle::{
    collect_quotes, default_adapters, ChainRateProvider, DerivedAssetResolver, FeedAdapter,
    QuoteReconciler, RateProvider,
};
use crate::persistence::StateStore;
use crate::registry::{NearRegistry, RegistryGateway};
use crate::types::{AssetId, OraclePriceSnapshot, PublishPayload, ResolvedPrices};

const YOCTO_PER_NEAR: f64 = 1e24;

/// What one cycle did
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub published: Vec<AssetId>,
    pub version: Option<String>,
    pub claim_near: bool,
    pub full_refresh: bool,
    pub emitted: bool,
    /// Priced assets the contract does not accept yet
    pub not_whitelisted: Vec<AssetId>,
}

/// Everything a cycle needs, built once per process
pub struct OracleBot {
    config: AppConfig,
    catalog: AssetCatalog,
    adapters: Vec<Box<dyn FeedAdapter>>,
    rates: Arc<dyn RateProvider>,
    registry: Arc<dyn RegistryGateway>,
    store: StateStore,
    reconciler: QuoteReconciler,
    engine: UpdateDecisionEngine,
}

impl OracleBot {
    /// Wire production clients from configuration
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let catalog = config.catalog()?;
        let fetch_timeout = config.oracle.fetch_timeout();

        let http = http_client(fetch_timeout)?;
        let evm = Arc::new(EvmClient::new(&config.ethereum.rpc_url, fetch_timeout)?);
        let near = NearRpcClient::new(&config.node_url(), http.clone());

        let adapters = default_adapters(&config.oracle, &http, evm.clone());
        let rates = Arc::new(ChainRateProvider::new(
            near.clone(),
            evm,
            config.ref_contract_id(),
            config.oracle.min_usn_liquidity_in_pool as u128,
        ));
        let agent = AgentClient::new(&config.near.agent_url, http_client(config.oracle.report_timeout())?);
        let registry = Arc::new(NearRegistry::new(near, agent, &config.near.contract_id));

        Ok(Self::new(config, catalog, adapters, rates, registry))
    }

    pub fn new(
        config: AppConfig,
        catalog: AssetCatalog,
        adapters: Vec<Box<dyn FeedAdapter>>,
        rates: Arc<dyn RateProvider>,
        registry: Arc<dyn RegistryGateway>,
    ) -> Self {
        let store = StateStore::new(&config.persistence.state_filename);
        let reconciler = QuoteReconciler::new(config.oracle.fraction_digits);
        let engine = UpdateDecisionEngine::new(
            config.oracle.full_update_period_ms,
            config.oracle.version_report_period_ms,
            config.report_version(),
        );
        Self {
            config,
            catalog,
            adapters,
            rates,
            registry,
            store,
            reconciler,
            engine,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run one cycle now
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        self.run_cycle_at(Utc::now().timestamp_millis()).await
    }

    /// Run one cycle with an explicit clock
    pub async fn run_cycle_at(&self, now_ms: i64) -> Result<CycleReport, CycleError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", cycle_id = %cycle_id);
        self.cycle(cycle_id, now_ms).instrument(span).await
    }

    async fn cycle(&self, cycle_id: Uuid, now_ms: i64) -> Result<CycleReport, CycleError> {
        let mut state = self.store.load();

        let prices = self.resolve_prices().await;
        let diffs = relative_diffs(&self.catalog, self.config.oracle.relative_diff);

        let (snapshot, claim_near) = tokio::join!(self.read_snapshot(&diffs), self.balance_is_low());
        let snapshot = snapshot?;

        let decision = self
            .engine
            .decide(now_ms, &diffs, &snapshot, &prices, &mut state, claim_near);
        let payload = decision.payload;

        let publish_result = if payload.should_emit() {
            Some(self.publish(&payload).await)
        } else {
            info!(claim_near = payload.claim_near, "Nothing to report");
            None
        };

        self.store.save(&state);

        if let Some(Err(e)) = publish_result {
            error!(error = %e, "❌ Price report failed");
            return Err(e);
        }

        let report = CycleReport {
            cycle_id,
            published: payload.prices.iter().map(|u| u.asset_id.clone()).collect(),
            version: payload.version.clone(),
            claim_near: payload.claim_near,
            full_refresh: decision.full_refresh,
            emitted: payload.should_emit(),
            not_whitelisted: decision.not_whitelisted,
        };
        info!(
            published = report.published.len(),
            not_whitelisted = ?report.not_whitelisted,
            full_refresh = report.full_refresh,
            emitted = report.emitted,
            "✅ Cycle complete"
        );
        Ok(report)
    }

    /// Primary prices from the feeds, then derived prices on top of them
    pub async fn resolve_prices(&self) -> ResolvedPrices {
        let fetch_timeout = self.config.oracle.fetch_timeout();

        let quotes = collect_quotes(&self.adapters, &self.catalog.assets, fetch_timeout).await;
        let mut prices = self.reconciler.reconcile_all(&self.catalog.assets, &quotes);

        let derived = DerivedAssetResolver::new(self.rates.as_ref(), fetch_timeout)
            .resolve_all(&self.catalog.derived, &prices)
            .await;
        prices.extend(derived);

        prices
    }

    async fn read_snapshot(&self, diffs: &BTreeMap<AssetId, f64>) -> Result<OraclePriceSnapshot, CycleError> {
        let asset_ids: Vec<AssetId> = diffs.keys().cloned().collect();
        let (prices, whitelist) = tokio::join!(
            self.registry.get_oracle_snapshot(
                &self.config.near.account_id,
                &asset_ids,
                self.config.oracle.recency_window_secs(),
            ),
            self.registry.get_whitelisted_assets(),
        );

        Ok(OraclePriceSnapshot {
            prices: prices.map_err(CycleError::Snapshot)?,
            live_assets: whitelist
                .map_err(CycleError::Snapshot)?
                .into_iter()
                .collect::<HashSet<_>>(),
        })
    }

    /// Whether the signing account is under the claim floor. A failed
    /// balance read counts as not low.
    async fn balance_is_low(&self) -> bool {
        let account_id = &self.config.near.account_id;
        match self.registry.account_balance(account_id).await {
            Ok(yocto) => {
                let balance = yocto as f64 / YOCTO_PER_NEAR;
                let low = balance < self.config.oracle.min_claim_near_balance;
                if low {
                    info!(account = %account_id, balance, "Balance below floor, claiming NEAR");
                }
                low
            }
            Err(e) => {
                warn!(account = %account_id, error = %e, "Failed to read balance");
                false
            }
        }
    }

    async fn publish(&self, payload: &PublishPayload) -> Result<(), CycleError> {
        let timeout = self.config.oracle.report_timeout();
        let call = self.registry.publish_prices(
            &self.config.near.account_id,
            &self.config.near.contract_id,
            payload,
        );

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(CycleError::Publish(e)),
            Err(_) => Err(CycleError::Timeout(timeout.as_millis() as u64)),
        }
    }
}
