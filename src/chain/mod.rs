//! Chain access: NEAR JSON-RPC, Ethereum `eth_call`, and the signing agent

mod agent;
mod evm;
mod near;

pub use agent::AgentClient;
pub use evm::{parse_address, parse_selector, EvmClient};
pub use near::NearRpcClient;

use anyhow::{Context, Result};
use std::time::Duration;

/// Shared HTTP client; every request is bounded by `timeout`
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}
