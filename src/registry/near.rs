//! Registry gateway backed by NEAR JSON-RPC and the signing agent

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

use super::{RegistryGateway, REPORT_METHOD};
use crate::chain::{AgentClient, NearRpcClient};
use crate::error::GatewayError;
use crate::types::{AssetId, Price, PublishPayload};

#[derive(Debug, Deserialize)]
struct PriceData {
    #[serde(default)]
    prices: Vec<AssetOptionalPrice>,
}

#[derive(Debug, Deserialize)]
struct AssetOptionalPrice {
    asset_id: AssetId,
    price: Option<Price>,
}

fn snapshot_prices(data: PriceData) -> HashMap<AssetId, Price> {
    data.prices
        .into_iter()
        .map(|entry| (entry.asset_id, entry.price.unwrap_or(Price::ABSENT)))
        .collect()
}

/// `get_assets` returns `[[asset_id, asset], ...]`
fn whitelist_ids(raw: Vec<Value>) -> Result<Vec<AssetId>, GatewayError> {
    raw.into_iter()
        .map(|entry| {
            entry
                .get(0)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| GatewayError::decode("get_assets", format!("unexpected entry {entry}")))
        })
        .collect()
}

pub struct NearRegistry {
    rpc: NearRpcClient,
    agent: AgentClient,
    contract_id: String,
}

impl NearRegistry {
    pub fn new(rpc: NearRpcClient, agent: AgentClient, contract_id: &str) -> Self {
        Self {
            rpc,
            agent,
            contract_id: contract_id.to_string(),
        }
    }
}

#[async_trait]
impl RegistryGateway for NearRegistry {
    async fn get_oracle_snapshot(
        &self,
        account_id: &str,
        asset_ids: &[AssetId],
        recency_window_secs: u64,
    ) -> Result<HashMap<AssetId, Price>, GatewayError> {
        let data: PriceData = self
            .rpc
            .view(
                &self.contract_id,
                "get_oracle_price_data",
                &json!({
                    "account_id": account_id,
                    "asset_ids": asset_ids,
                    "recency_duration_sec": recency_window_secs,
                }),
            )
            .await?;
        Ok(snapshot_prices(data))
    }

    async fn get_whitelisted_assets(&self) -> Result<Vec<AssetId>, GatewayError> {
        let raw: Vec<Value> = self.rpc.view(&self.contract_id, "get_assets", &json!({})).await?;
        whitelist_ids(raw)
    }

    async fn account_balance(&self, account_id: &str) -> Result<u128, GatewayError> {
        self.rpc.account_balance(account_id).await
    }

    async fn publish_prices(
        &self,
        signer_account_id: &str,
        contract_id: &str,
        payload: &PublishPayload,
    ) -> Result<Value, GatewayError> {
        if contract_id != self.contract_id {
            warn!(
                configured = %self.contract_id,
                requested = %contract_id,
                "Requested contract differs from the one read from; the agent signs for its own"
            );
        }

        info!(
            signer = %signer_account_id,
            contract = %contract_id,
            prices = payload.prices.len(),
            version = ?payload.version,
            claim_near = payload.claim_near,
            "📤 Reporting prices"
        );

        self.agent.call(REPORT_METHOD, payload).await
    }
}
