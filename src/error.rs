//! Error types at the crate seams

use thiserror::Error;

/// Failures of the on-chain registry transport
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rpc request {method} failed: {source}")]
    Rpc {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rpc {method} returned error: {message}")]
    RpcResponse { method: String, message: String },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("agent call {method} failed: {reason}")]
    Agent { method: String, reason: String },
}

impl GatewayError {
    pub fn decode(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// What a cycle surfaces to its caller. Everything else is contained.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to read on-chain snapshot: {0}")]
    Snapshot(#[source] GatewayError),

    #[error("failed to publish prices: {0}")]
    Publish(#[source] GatewayError),

    #[error("price report timed out after {0} ms")]
    Timeout(u64),
}

/// Asset catalog problems detected at load time
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse asset catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to read asset catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("derived asset {asset} depends on {dependency}, which is not a primary asset")]
    UnknownDependency { asset: String, dependency: String },

    #[error("asset {0} is declared both as primary and derived")]
    Duplicate(String),

    #[error("pool quote of {asset} converts {token_in} decimals into {token_out}; token_out must not be finer")]
    PoolDecimals {
        asset: String,
        token_in: u32,
        token_out: u32,
    },

    #[error("sanity band of {asset} is empty ({min} >= {max})")]
    EmptyBand {
        asset: String,
        min: String,
        max: String,
    },
}
