//! Venue instrument descriptors.

use crate::decimal::Price;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Security type of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecType {
    /// Futures (the default: symbols like `MESM0`).
    #[default]
    #[serde(rename = "FUT")]
    Future,
    #[serde(rename = "STK")]
    Stock,
    #[serde(rename = "OPT")]
    Option,
    #[serde(rename = "CASH")]
    Forex,
}

impl fmt::Display for SecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Future => write!(f, "FUT"),
            Self::Stock => write!(f, "STK"),
            Self::Option => write!(f, "OPT"),
            Self::Forex => write!(f, "CASH"),
        }
    }
}

/// Venue-defined instrument descriptor.
///
/// A lookup descriptor only fills in what the caller knows; the resolved
/// contract returned by the venue carries `con_id` and the canonical symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Underlying symbol (e.g. "MES"). Empty on lookup descriptors.
    #[serde(default)]
    pub symbol: String,
    pub sec_type: SecType,
    pub currency: String,
    pub exchange: String,
    /// Exchange-local symbol (e.g. "MESM0").
    #[serde(default)]
    pub local_symbol: String,
    /// Venue contract id, present once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub con_id: Option<i64>,
}

impl Contract {
    /// True once the venue has assigned a contract id.
    pub fn is_resolved(&self) -> bool {
        self.con_id.is_some()
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.local_symbol.is_empty() {
            &self.symbol
        } else {
            &self.local_symbol
        };
        write!(f, "{} {}@{} ({})", self.sec_type, name, self.exchange, self.currency)
    }
}

/// Template used to turn a bare symbol into a lookup descriptor.
///
/// Defaults match CME micro futures; other products may need another
/// exchange, which is why this is configuration rather than a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTemplate {
    #[serde(default)]
    pub sec_type: SecType,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_exchange() -> String {
    "GLOBEX".to_string()
}

impl Default for ContractTemplate {
    fn default() -> Self {
        Self {
            sec_type: SecType::default(),
            currency: default_currency(),
            exchange: default_exchange(),
        }
    }
}

impl ContractTemplate {
    /// Build a lookup descriptor for an exchange-local symbol.
    pub fn lookup(&self, local_symbol: &str) -> Contract {
        Contract {
            symbol: String::new(),
            sec_type: self.sec_type,
            currency: self.currency.clone(),
            exchange: self.exchange.clone(),
            local_symbol: local_symbol.to_string(),
            con_id: None,
        }
    }
}

/// Contract details as delivered by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDetails {
    pub contract: Contract,
    #[serde(default)]
    pub market_name: String,
    #[serde(default)]
    pub long_name: String,
    /// Minimum price increment. Zero when the venue did not say.
    #[serde(default = "default_min_tick")]
    pub min_tick: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<String>,
    /// Last trade date (YYYYMMDD) for expiring products.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trade_date: Option<String>,
}

fn default_min_tick() -> Price {
    Price::ZERO
}
