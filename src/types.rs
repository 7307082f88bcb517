//! Core types used throughout OracleBot
//!
//! Fixed-point prices, per-source quotes, the on-chain snapshot and the
//! publish payload.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Stable string key of an asset (the token account id on NEAR)
pub type AssetId = String;

/// Raw USD quotes produced by one feed adapter
pub type RawQuotes = HashMap<AssetId, f64>;

/// Prices resolved during the current cycle (primary and derived)
pub type ResolvedPrices = HashMap<AssetId, Price>;

/// Fixed-point price: `multiplier * 10^-decimals` USD per smallest unit.
///
/// `multiplier == 0` is the sentinel for "no price".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Price {
    #[serde(with = "u128_string")]
    pub multiplier: u128,
    pub decimals: u32,
}

impl Price {
    pub const ABSENT: Price = Price {
        multiplier: 0,
        decimals: 0,
    };

    pub fn new(multiplier: u128, decimals: u32) -> Self {
        Self {
            multiplier,
            decimals,
        }
    }

    /// Build a price from a float multiplier, rounding to the nearest integer.
    /// Negative or non-finite values collapse to the sentinel.
    pub fn from_f64(multiplier: f64, decimals: u32) -> Self {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Self::new(0, decimals);
        }
        Self::new(multiplier.round() as u128, decimals)
    }

    pub fn is_absent(&self) -> bool {
        self.multiplier == 0
    }

    /// Present price or `None` for the sentinel
    pub fn present(self) -> Option<Self> {
        (!self.is_absent()).then_some(self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e-{}", self.multiplier, self.decimals)
    }
}

/// One entry of the `report_prices` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub asset_id: AssetId,
    pub price: Price,
}

/// The single write sent to the registry per cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPayload {
    pub prices: Vec<PriceUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub claim_near: bool,
}

impl PublishPayload {
    /// Whether the payload warrants a transaction. A claim flag alone does not.
    pub fn should_emit(&self) -> bool {
        !self.prices.is_empty() || self.version.is_some()
    }
}

/// Last-published prices plus the set of live (whitelisted) assets
#[derive(Debug, Clone, Default)]
pub struct OraclePriceSnapshot {
    pub prices: HashMap<AssetId, Price>,
    pub live_assets: HashSet<AssetId>,
}

impl OraclePriceSnapshot {
    /// Last published price, or the zero sentinel when never published
    pub fn price_of(&self, asset_id: &str) -> Price {
        self.prices.get(asset_id).copied().unwrap_or(Price::ABSENT)
    }

    pub fn is_live(&self, asset_id: &str) -> bool {
        self.live_assets.contains(asset_id)
    }
}

/// Serializes `u128` as a decimal string; accepts strings or numbers on input
pub(crate) mod u128_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(u64),
        Float(f64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Str(s) => s.trim().parse::<u128>().map_err(de::Error::custom),
            Raw::Int(n) => Ok(n as u128),
            Raw::Float(f) if f.is_finite() && f >= 0.0 => Ok(f.round() as u128),
            Raw::Float(f) => Err(de::Error::custom(format!("invalid multiplier {f}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_rounds_to_nearest_integer() {
        assert_eq!(Price::from_f64(1234.5, 6).multiplier, 1235);
        assert_eq!(Price::from_f64(1234.49, 6).multiplier, 1234);
        assert!(Price::from_f64(-3.0, 6).is_absent());
        assert!(Price::from_f64(f64::NAN, 6).is_absent());
    }

    #[test]
    fn price_multiplier_serializes_as_string() {
        let update = PriceUpdate {
            asset_id: "wrap.near".to_string(),
            price: Price::new(31_250, 28),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["price"]["multiplier"], "31250");
        assert_eq!(json["price"]["decimals"], 28);
    }

    #[test]
    fn price_accepts_numeric_multiplier() {
        let price: Price = serde_json::from_str(r#"{"multiplier": 10000, "decimals": 10}"#).unwrap();
        assert_eq!(price, Price::new(10_000, 10));
        let price: Price =
            serde_json::from_str(r#"{"multiplier": "99990000000000000", "decimals": 22}"#).unwrap();
        assert_eq!(price.multiplier, 99_990_000_000_000_000);
    }

    #[test]
    fn payload_omits_empty_optional_fields() {
        let payload = PublishPayload::default();
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"prices":[]}"#);

        let payload = PublishPayload {
            prices: vec![],
            version: Some("0.3.0".into()),
            claim_near: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["version"], "0.3.0");
        assert_eq!(json["claim_near"], true);
    }

    #[test]
    fn claim_flag_alone_does_not_emit() {
        let payload = PublishPayload {
            claim_near: true,
            ..Default::default()
        };
        assert!(!payload.should_emit());
    }
}
