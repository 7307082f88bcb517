//! Ethereum read-only calls
//!
//! Thin wrapper over an ethers HTTP provider for `eth_call` against
//! Chainlink aggregators, the Uniswap V3 quoter and vault share prices.

use anyhow::{bail, Context, Result};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, I256, U256};
use std::time::Duration;

/// Ethereum JSON-RPC reader
#[derive(Debug, Clone)]
pub struct EvmClient {
    provider: Provider<Http>,
}

impl EvmClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let url = reqwest::Url::parse(rpc_url).context("Invalid Ethereum RPC url")?;
        Ok(Self {
            provider: Provider::new(Http::new_with_client(url, http)),
        })
    }

    /// `eth_call` at the latest block
    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.provider
            .call(&tx, None)
            .await
            .with_context(|| format!("eth_call to {:#x} failed", to))
    }

    /// `eth_call` returning a single uint256
    pub async fn call_u256(&self, to: Address, data: Bytes) -> Result<U256> {
        let raw = self.call(to, data).await?;
        first_word(&raw).map(U256::from_big_endian)
    }

    /// `eth_call` returning a single int256
    pub async fn call_i256(&self, to: Address, data: Bytes) -> Result<I256> {
        Ok(I256::from_raw(self.call_u256(to, data).await?))
    }
}

fn first_word(raw: &[u8]) -> Result<&[u8]> {
    if raw.len() < 32 {
        bail!("eth_call returned {} bytes, expected at least 32", raw.len());
    }
    Ok(&raw[..32])
}

/// Parse a `0x`-prefixed address
pub fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .with_context(|| format!("Invalid address {raw}"))
}

/// Decode a `0x`-prefixed 4-byte selector
pub fn parse_selector(raw: &str) -> Result<Bytes> {
    let bytes = hex::decode(raw.trim_start_matches("0x")).context("Invalid selector hex")?;
    if bytes.len() != 4 {
        bail!("Selector must be 4 bytes, got {}", bytes.len());
    }
    Ok(Bytes::from(bytes))
}
