//! NEAR JSON-RPC client
//!
//! Only the two `query` kinds the bot needs: contract view calls and
//! account balances.

use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::GatewayError;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CallFunctionResult {
    #[serde(default)]
    result: Vec<u8>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountView {
    amount: String,
}

/// JSON-RPC client for one NEAR node
#[derive(Debug, Clone)]
pub struct NearRpcClient {
    http: Client,
    url: String,
}

impl NearRpcClient {
    pub fn new(url: &str, http: Client) -> Self {
        Self {
            http,
            url: url.trim_end_matches('/').to_string(),
        }
    }

    async fn query(&self, label: &str, params: Value) -> Result<Value, GatewayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "dontcare",
            "method": "query",
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Rpc {
                method: label.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::RpcResponse {
                method: label.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let rpc: RpcResponse = response.json().await.map_err(|e| GatewayError::Rpc {
            method: label.to_string(),
            source: e,
        })?;

        if let Some(error) = rpc.error {
            return Err(GatewayError::RpcResponse {
                method: label.to_string(),
                message: error.to_string(),
            });
        }

        rpc.result.ok_or_else(|| GatewayError::RpcResponse {
            method: label.to_string(),
            message: "empty result".to_string(),
        })
    }

    /// Call a view method and decode its JSON return value
    pub async fn view<T: DeserializeOwned>(
        &self,
        contract_id: &str,
        method: &str,
        args: &Value,
    ) -> Result<T, GatewayError> {
        let label = format!("{contract_id}::{method}");
        let args = serde_json::to_vec(args).map_err(|e| GatewayError::decode(&label, e))?;

        let result = self
            .query(
                &label,
                json!({
                    "request_type": "call_function",
                    "finality": "final",
                    "account_id": contract_id,
                    "method_name": method,
                    "args_base64": general_purpose::STANDARD.encode(args),
                }),
            )
            .await?;

        let call: CallFunctionResult =
            serde_json::from_value(result).map_err(|e| GatewayError::decode(&label, e))?;
        if let Some(error) = call.error {
            return Err(GatewayError::RpcResponse {
                method: label,
                message: error,
            });
        }

        serde_json::from_slice(&call.result).map_err(|e| GatewayError::decode(&label, e))
    }

    /// Liquid balance of an account in yoctoNEAR
    pub async fn account_balance(&self, account_id: &str) -> Result<u128, GatewayError> {
        let label = format!("view_account({account_id})");
        let result = self
            .query(
                &label,
                json!({
                    "request_type": "view_account",
                    "finality": "final",
                    "account_id": account_id,
                }),
            )
            .await?;

        let view: AccountView =
            serde_json::from_value(result).map_err(|e| GatewayError::decode(&label, e))?;
        view.amount
            .parse::<u128>()
            .map_err(|e| GatewayError::decode(&label, e))
    }
}
