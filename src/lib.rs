//! OracleBot Library
//!
//! Price oracle validator: multi-feed median pricing, derived assets and
//! threshold-gated reporting to the NEAR price oracle contract.

pub mod catalog;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod persistence;
pub mod registry;
pub mod types;

#[cfg(feature = "trigger")]
pub mod trigger;
