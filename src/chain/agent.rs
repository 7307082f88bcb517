//! Signing agent client
//!
//! Change-method calls go through the agent's HTTP API, which holds the
//! key, knows the target contract and signs the transaction.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::GatewayError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentCallRequest<'a, T: Serialize> {
    method_name: &'a str,
    args: &'a T,
}

#[derive(Debug, Clone)]
pub struct AgentClient {
    http: Client,
    base_url: String,
}

impl AgentClient {
    pub fn new(base_url: &str, http: Client) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Submit a signed function call and return the raw outcome
    pub async fn call<T: Serialize + Sync>(
        &self,
        method_name: &str,
        args: &T,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/api/agent/call", self.base_url);
        let request = AgentCallRequest {
            method_name,
            args,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Agent {
                method: method_name.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Agent {
                method: method_name.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let outcome: Value = response.json().await.map_err(|e| GatewayError::Agent {
            method: method_name.to_string(),
            reason: e.to_string(),
        })?;

        info!(method = %method_name, outcome = %outcome, "Agent call outcome");
        Ok(outcome)
    }
}
