//! Asset catalog
//!
//! Primary assets carry one optional field per feed capability; derived
//! assets name a single primary dependency and one computation from a
//! closed set. Built-in catalogs ship as YAML under `config/assets/`.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Network;
use crate::error::CatalogError;
use crate::types::AssetId;

const MAINNET_CATALOG: &str = include_str!("../../config/assets/mainnet.yaml");
const TESTNET_CATALOG: &str = include_str!("../../config/assets/testnet.yaml");

/// Primary assets keyed by id, ordered for deterministic payloads
pub type AssetTable = BTreeMap<AssetId, AssetConfig>;

/// ERC-20 token reference used by the Uniswap quoter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenRef {
    pub address: String,
    pub decimals: u32,
}

/// Uniswap V3 pool to quote against
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UniswapV3Pool {
    pub token_in: TokenRef,
    pub token_out: TokenRef,
    /// Pool fee in hundredths of a bip (500 = 0.05%)
    pub fee: u32,
}

/// Configuration of a directly-priced asset
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetConfig {
    /// On-chain fixed-point exponent of the asset's native unit
    pub decimals: u32,
    #[serde(default)]
    pub coingecko: Option<String>,
    #[serde(default)]
    pub binance: Option<String>,
    #[serde(default)]
    pub huobi: Option<String>,
    #[serde(default)]
    pub cryptocom: Option<String>,
    #[serde(default)]
    pub kucoin: Option<String>,
    #[serde(default)]
    pub gate: Option<String>,
    /// Chainlink aggregator address on Ethereum mainnet
    #[serde(default)]
    pub chainlink: Option<String>,
    /// Pyth price feed id (hex)
    #[serde(default)]
    pub pyth: Option<String>,
    #[serde(default)]
    pub uniswap_v3: Option<UniswapV3Pool>,
    /// Expected to trade at parity; out-of-band medians are discarded
    #[serde(default)]
    pub stablecoin: bool,
    #[serde(default)]
    pub fraction_digits: Option<u32>,
    #[serde(default)]
    pub relative_diff: Option<f64>,
}

/// Inclusive range a fetched ratio must fall in.
///
/// Bands for appreciating wrappers drift out of date; `review_by` records
/// when the upper bound has to be raised.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SanityBand {
    pub min: Decimal,
    pub max: Decimal,
    #[serde(default)]
    pub review_by: Option<String>,
}

impl SanityBand {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self {
            min,
            max,
            review_by: None,
        }
    }

    pub fn contains(&self, ratio: Decimal) -> bool {
        ratio >= self.min && ratio <= self.max
    }
}

/// Where an exchange rate is read from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateSource {
    /// NEAR view call returning a string (or a JSON field holding one)
    NearView {
        contract: String,
        method: String,
        #[serde(default)]
        field: Option<String>,
        scale_decimals: u32,
        /// Reject unless `ft_metadata.decimals` matches
        #[serde(default)]
        require_ft_decimals: Option<u8>,
    },
    /// Ethereum `eth_call` returning a uint256
    EthCall {
        contract: String,
        /// 4-byte selector, hex with `0x`
        selector: String,
        scale_decimals: u32,
    },
}

/// Ref Finance stable-pool quote of one whole `token_in` into `token_out`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolQuote {
    pub pool_id: u64,
    pub token_in: String,
    pub token_in_decimals: u32,
    pub token_out: String,
    pub token_out_decimals: u32,
    #[serde(default)]
    pub band: Option<SanityBand>,
}

impl PoolQuote {
    /// Decimals added to the dependency price when the quote is multiplied in.
    /// Catalog validation rejects quotes where `token_out` has more decimals.
    pub fn decimals_shift(&self) -> u32 {
        self.token_in_decimals.saturating_sub(self.token_out_decimals)
    }
}

/// Closed set of one-hop computations
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedComputation {
    /// Same price as the dependency (bridged or re-issued token)
    PassThrough,
    /// Dependency multiplied by a bounded exchange rate; decimals unchanged
    ExchangeRate { source: RateSource, band: SanityBand },
    /// Dependency multiplied by a DEX quote; decimals additive
    PoolQuote(PoolQuote),
}

impl DerivedComputation {
    pub fn kind(&self) -> &'static str {
        match self {
            DerivedComputation::PassThrough => "pass_through",
            DerivedComputation::ExchangeRate { .. } => "exchange_rate",
            DerivedComputation::PoolQuote(_) => "pool_quote",
        }
    }

    fn band(&self) -> Option<&SanityBand> {
        match self {
            DerivedComputation::PassThrough => None,
            DerivedComputation::ExchangeRate { band, .. } => Some(band),
            DerivedComputation::PoolQuote(quote) => quote.band.as_ref(),
        }
    }
}

/// Configuration of a synthetic asset priced from one primary asset
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DerivedAssetConfig {
    pub dependency: AssetId,
    pub compute: DerivedComputation,
    #[serde(default)]
    pub relative_diff: Option<f64>,
}

/// Full catalog for one network
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetCatalog {
    #[serde(default)]
    pub assets: AssetTable,
    #[serde(default)]
    pub derived: BTreeMap<AssetId, DerivedAssetConfig>,
}

impl AssetCatalog {
    /// Built-in catalog for the network
    pub fn builtin(network: Network) -> Result<Self, CatalogError> {
        match network {
            Network::Mainnet => Self::from_yaml(MAINNET_CATALOG),
            Network::Testnet => Self::from_yaml(TESTNET_CATALOG),
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_yaml::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// One-hop graph: derived assets only depend on primary assets
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (id, derived) in &self.derived {
            if self.assets.contains_key(id) {
                return Err(CatalogError::Duplicate(id.clone()));
            }
            if !self.assets.contains_key(&derived.dependency) {
                return Err(CatalogError::UnknownDependency {
                    asset: id.clone(),
                    dependency: derived.dependency.clone(),
                });
            }
            if let DerivedComputation::PoolQuote(quote) = &derived.compute {
                if quote.token_in_decimals < quote.token_out_decimals {
                    return Err(CatalogError::PoolDecimals {
                        asset: id.clone(),
                        token_in: quote.token_in_decimals,
                        token_out: quote.token_out_decimals,
                    });
                }
            }
            if let Some(band) = derived.compute.band() {
                if band.min >= band.max {
                    return Err(CatalogError::EmptyBand {
                        asset: id.clone(),
                        min: band.min.to_string(),
                        max: band.max.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All ids, primary first, in catalog order
    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.assets
            .keys()
            .chain(self.derived.keys())
            .cloned()
            .collect()
    }

    /// Per-asset relative difference threshold, falling back to `default`
    pub fn relative_diff(&self, asset_id: &str, default: f64) -> f64 {
        self.assets
            .get(asset_id)
            .and_then(|a| a.relative_diff)
            .or_else(|| self.derived.get(asset_id).and_then(|d| d.relative_diff))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn builtin_catalogs_parse_and_validate() {
        let mainnet = AssetCatalog::builtin(Network::Mainnet).unwrap();
        assert!(mainnet.assets.contains_key("wrap.near"));
        assert_eq!(mainnet.derived["meta-pool.near"].dependency, "wrap.near");

        let testnet = AssetCatalog::builtin(Network::Testnet).unwrap();
        assert!(testnet.assets["usdt.fakes.testnet"].stablecoin);
        assert!(testnet.derived.contains_key("usdn.testnet"));
    }

    #[test]
    fn derived_kinds_deserialize() {
        let catalog = AssetCatalog::builtin(Network::Mainnet).unwrap();
        assert_eq!(catalog.derived["usdt.tether-token.near"].compute.kind(), "pass_through");
        assert_eq!(catalog.derived["usn"].compute.kind(), "pool_quote");
        match &catalog.derived["linear-protocol.near"].compute {
            DerivedComputation::ExchangeRate { source, band } => {
                assert!(matches!(source, RateSource::NearView { method, .. } if method == "ft_price"));
                assert_eq!(band.min, dec!(1.25));
            }
            other => panic!("unexpected computation {:?}", other),
        }
    }

    #[test]
    fn rejects_derived_on_derived() {
        let raw = r#"
assets:
  wrap.near: { decimals: 24, coingecko: near }
derived:
  a: { dependency: wrap.near, compute: { kind: pass_through } }
  b: { dependency: a, compute: { kind: pass_through } }
"#;
        let err = AssetCatalog::from_yaml(raw).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_empty_band() {
        let raw = r#"
assets:
  wrap.near: { decimals: 24 }
derived:
  st:
    dependency: wrap.near
    compute:
      kind: exchange_rate
      source: { type: near_view, contract: st, method: price, scale_decimals: 24 }
      band: { min: "1.5", max: "1.2" }
"#;
        let err = AssetCatalog::from_yaml(raw).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyBand { .. }));
    }

    #[test]
    fn rejects_pool_quote_into_finer_token() {
        let raw = r#"
assets:
  dai: { decimals: 18, coingecko: dai }
derived:
  usdx:
    dependency: dai
    compute:
      kind: pool_quote
      pool_id: 7
      token_in: usdx.near
      token_in_decimals: 6
      token_out: dai
      token_out_decimals: 18
"#;
        let err = AssetCatalog::from_yaml(raw).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::PoolDecimals { token_in: 6, token_out: 18, .. }
        ));
    }

    #[test]
    fn relative_diff_falls_back_to_default() {
        let catalog = AssetCatalog::builtin(Network::Mainnet).unwrap();
        assert_eq!(catalog.relative_diff("wrap.near", 0.005), 0.005);
        assert_eq!(
            catalog.relative_diff("aaaaaa20d9e0e2461697782ef11675f668207961.factory.bridge.near", 0.005),
            0.01
        );
        assert_eq!(catalog.relative_diff("meta-pool.near", 0.005), 0.005);
    }

    #[test]
    fn pool_quote_shift_is_decimal_difference() {
        let catalog = AssetCatalog::builtin(Network::Mainnet).unwrap();
        match &catalog.derived["usn"].compute {
            DerivedComputation::PoolQuote(quote) => assert_eq!(quote.decimals_shift(), 12),
            other => panic!("unexpected computation {:?}", other),
        }
    }

    #[test]
    fn band_is_inclusive() {
        let band = SanityBand::new(dec!(1.01), dec!(1.15));
        assert!(band.contains(dec!(1.01)));
        assert!(band.contains(dec!(1.15)));
        assert!(!band.contains(dec!(1.0099)));
        assert!(!band.contains(dec!(1.16)));
    }
}
