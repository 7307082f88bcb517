//! Network selection and per-network endpoint defaults

use serde::{Deserialize, Serialize};
use std::fmt;

/// NEAR network the bot reports to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[serde(alias = "production")]
    Mainnet,
    #[serde(alias = "development")]
    Testnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Testnet
    }
}

impl Network {
    pub fn default_node_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://rpc.mainnet.near.org",
            Network::Testnet => "https://test.rpc.fastnear.com",
        }
    }

    /// Ref Finance exchange contract used for pool quotes
    pub fn ref_contract_id(&self) -> &'static str {
        match self {
            Network::Mainnet => "v2.ref-finance.near",
            Network::Testnet => "ref-finance-101.testnet",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "production" => Some(Network::Mainnet),
            "testnet" | "development" => Some(Network::Testnet),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}
