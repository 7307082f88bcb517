//! Registry Gateway - the on-chain price oracle contract
//!
//! Reads last-published prices and the asset whitelist; writes one
//! `report_prices` call per cycle.

mod near;

pub use near::NearRegistry;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::GatewayError;
use crate::types::{AssetId, Price, PublishPayload};

/// Method the oracle contract exposes for price reports
pub const REPORT_METHOD: &str = "report_prices";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    /// Prices this account reported within the recency window. Assets it
    /// never reported map to the zero sentinel or are missing.
    async fn get_oracle_snapshot(
        &self,
        account_id: &str,
        asset_ids: &[AssetId],
        recency_window_secs: u64,
    ) -> Result<HashMap<AssetId, Price>, GatewayError>;

    /// Assets the contract accepts reports for
    async fn get_whitelisted_assets(&self) -> Result<Vec<AssetId>, GatewayError>;

    /// Native balance of an account in yoctoNEAR
    async fn account_balance(&self, account_id: &str) -> Result<u128, GatewayError>;

    /// Submit the payload as one transaction
    async fn publish_prices(
        &self,
        signer_account_id: &str,
        contract_id: &str,
        payload: &PublishPayload,
    ) -> Result<Value, GatewayError>;
}
