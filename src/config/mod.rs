//! Configuration management for OracleBot
//!
//! Loads defaults, optional YAML/TOML files and environment variables via .env

mod types;

pub use types::*;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::catalog::AssetCatalog;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub near: NearConfig,
    pub ethereum: EthereumConfig,
    pub oracle: OracleConfig,
    pub persistence: PersistenceConfig,
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Network the registry lives on
    pub network: Network,
    /// Version string reported on-chain; empty disables version reports
    pub version: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearConfig {
    /// Signer account reporting prices
    pub account_id: String,
    /// Price oracle contract
    pub contract_id: String,
    /// JSON-RPC endpoint; defaults per network
    pub node_url: Option<String>,
    /// Signing agent HTTP API
    pub agent_url: String,
    /// Ref Finance contract; defaults per network
    pub ref_contract_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EthereumConfig {
    pub rpc_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Default significance threshold (0.005 = 0.5%)
    pub relative_diff: f64,
    /// Default digits kept after the decimal point
    pub fraction_digits: u32,
    /// Recency window for the on-chain snapshot
    pub max_no_report_duration_ms: u64,
    /// Forced full republish period
    pub full_update_period_ms: i64,
    /// Version metadata report period
    pub version_report_period_ms: i64,
    /// Timeout for every external call
    pub fetch_timeout_ms: u64,
    /// Bound on the `report_prices` submission
    pub report_timeout_ms: u64,
    /// Balance floor (NEAR) below which `claim_near` is requested
    pub min_claim_near_balance: f64,
    /// Minimum reserve of the priced token in a Ref pool (smallest units)
    pub min_usn_liquidity_in_pool: f64,
    /// Adapters left out of the fan-out
    pub disabled_sources: Vec<String>,
    /// Replaces the built-in asset catalog
    pub assets_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Bot state file
    pub state_filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    /// Listen address of the HTTP trigger
    pub bind_addr: String,
}

impl OracleConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }

    /// Snapshot recency window in whole seconds
    pub fn recency_window_secs(&self) -> u64 {
        self.max_no_report_duration_ms / 1000
    }

    pub fn is_source_enabled(&self, name: &str) -> bool {
        !self
            .disabled_sources
            .iter()
            .any(|s| s.eq_ignore_ascii_case(name))
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("bot.network", "testnet")?
            .set_default("bot.version", env!("CARGO_PKG_VERSION"))?
            .set_default("bot.log_json", false)?
            // NEAR defaults
            .set_default("near.account_id", "account.testnet")?
            .set_default("near.contract_id", "ac-sandbox.price-oracle-bot.testnet")?
            .set_default("near.agent_url", "http://localhost:3140")?
            // Ethereum defaults
            .set_default("ethereum.rpc_url", "https://ethereum.publicnode.com")?
            // Oracle defaults
            .set_default("oracle.relative_diff", 0.005)?
            .set_default("oracle.fraction_digits", 4)?
            .set_default("oracle.max_no_report_duration_ms", 50_000)?
            .set_default("oracle.full_update_period_ms", 600_000)?
            .set_default("oracle.version_report_period_ms", 86_400_000)?
            .set_default("oracle.fetch_timeout_ms", 5_000)?
            .set_default("oracle.report_timeout_ms", 15_000)?
            .set_default("oracle.min_claim_near_balance", 10.0)?
            .set_default("oracle.min_usn_liquidity_in_pool", 10_000.0 * 1e18)?
            .set_default("oracle.disabled_sources", vec!["binance", "binance-futures"])?
            // Persistence defaults
            .set_default("persistence.state_filename", "./data/state.json")?
            // Trigger defaults
            .set_default("trigger.bind_addr", "0.0.0.0:3000")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (ORACLEBOT_*)
            .add_source(
                Environment::with_prefix("ORACLEBOT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("oracle.disabled_sources")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    pub fn node_url(&self) -> String {
        self.near
            .node_url
            .clone()
            .unwrap_or_else(|| self.bot.network.default_node_url().to_string())
    }

    pub fn ref_contract_id(&self) -> String {
        self.near
            .ref_contract_id
            .clone()
            .unwrap_or_else(|| self.bot.network.ref_contract_id().to_string())
    }

    /// Version to report, if any
    pub fn report_version(&self) -> Option<String> {
        let version = self.bot.version.trim();
        (!version.is_empty()).then(|| version.to_string())
    }

    /// Asset catalog for the configured network, or the override file
    pub fn catalog(&self) -> Result<AssetCatalog> {
        let catalog = match &self.oracle.assets_file {
            Some(path) => AssetCatalog::from_file(path)?,
            None => AssetCatalog::builtin(self.bot.network)?,
        };
        Ok(catalog)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "network={} account={} contract={} relative_diff={} full_update={}ms disabled={:?}",
            self.bot.network,
            self.near.account_id,
            self.near.contract_id,
            self.oracle.relative_diff,
            self.oracle.full_update_period_ms,
            self.oracle.disabled_sources,
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Config with the built-in defaults, independent of the environment
    pub(crate) fn test_config() -> AppConfig {
        AppConfig {
            bot: BotConfig {
                network: Network::Testnet,
                version: "0.3.0".to_string(),
                log_json: false,
            },
            near: NearConfig {
                account_id: "bot.testnet".to_string(),
                contract_id: "oracle.testnet".to_string(),
                node_url: None,
                agent_url: "http://localhost:3140".to_string(),
                ref_contract_id: None,
            },
            ethereum: EthereumConfig {
                rpc_url: "https://ethereum.publicnode.com".to_string(),
            },
            oracle: OracleConfig {
                relative_diff: 0.005,
                fraction_digits: 4,
                max_no_report_duration_ms: 50_000,
                full_update_period_ms: 600_000,
                version_report_period_ms: 86_400_000,
                fetch_timeout_ms: 5_000,
                report_timeout_ms: 15_000,
                min_claim_near_balance: 10.0,
                min_usn_liquidity_in_pool: 1e22,
                disabled_sources: vec!["binance".into(), "binance-futures".into()],
                assets_file: None,
            },
            persistence: PersistenceConfig {
                state_filename: "./data/state.json".to_string(),
            },
            trigger: TriggerConfig {
                bind_addr: "127.0.0.1:3000".to_string(),
            },
        }
    }

    #[test]
    fn defaults_resolve_per_network() {
        let mut cfg = test_config();
        assert_eq!(cfg.node_url(), "https://test.rpc.fastnear.com");
        assert_eq!(cfg.ref_contract_id(), "ref-finance-101.testnet");

        cfg.bot.network = Network::Mainnet;
        assert_eq!(cfg.node_url(), "https://rpc.mainnet.near.org");
        cfg.near.node_url = Some("http://localhost:3030".into());
        assert_eq!(cfg.node_url(), "http://localhost:3030");
    }

    #[test]
    fn disabled_sources_are_case_insensitive() {
        let cfg = test_config();
        assert!(!cfg.oracle.is_source_enabled("Binance"));
        assert!(cfg.oracle.is_source_enabled("coingecko"));
    }

    #[test]
    fn empty_version_disables_reports() {
        let mut cfg = test_config();
        assert_eq!(cfg.report_version().as_deref(), Some("0.3.0"));
        cfg.bot.version = "  ".into();
        assert_eq!(cfg.report_version(), None);
    }

    #[test]
    fn recency_window_is_whole_seconds() {
        let cfg = test_config();
        assert_eq!(cfg.oracle.recency_window_secs(), 50);
    }

    #[test]
    fn network_aliases() {
        assert_eq!(Network::from_str("production"), Some(Network::Mainnet));
        assert_eq!(Network::from_str("development"), Some(Network::Testnet));
        assert_eq!(Network::from_str("betanet"), None);
    }
}
