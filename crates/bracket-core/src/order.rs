//! Order types and the bracket (entry + protective stop) pair.

use crate::decimal::Price;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order action: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl OrderAction {
    /// Returns the opposite action (the protective side of a bracket).
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for OrderAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(CoreError::InvalidOrder(format!("unknown action: {other}"))),
        }
    }
}

/// Order type as understood by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    #[serde(rename = "LMT")]
    Limit,
    #[serde(rename = "STP")]
    Stop,
    #[serde(rename = "STP LMT")]
    StopLimit,
    #[serde(rename = "MKT")]
    Market,
}

impl OrderType {
    /// Whether the type carries a limit price.
    pub fn has_limit(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }

    /// Whether the type carries an auxiliary (trigger) price.
    pub fn has_stop(&self) -> bool {
        matches!(self, Self::Stop | Self::StopLimit)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "LMT"),
            Self::Stop => write!(f, "STP"),
            Self::StopLimit => write!(f, "STP LMT"),
            Self::Market => write!(f, "MKT"),
        }
    }
}

impl FromStr for OrderType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalized.as_str() {
            "LMT" => Ok(Self::Limit),
            "STP" => Ok(Self::Stop),
            "STP LMT" => Ok(Self::StopLimit),
            "MKT" => Ok(Self::Market),
            _ => Err(CoreError::InvalidOrder(format!("unknown order type: {s}"))),
        }
    }
}

/// Role of an order within a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderRole {
    Entry,
    ProtectiveStop,
}

impl fmt::Display for OrderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::ProtectiveStop => write!(f, "protective stop"),
        }
    }
}

/// Reference shared by both legs of a bracket.
///
/// Format: `brk_{timestamp_ms}_{uuid_short}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BracketRef(String);

impl BracketRef {
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("brk_{ts}_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BracketRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BracketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single venue order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub action: OrderAction,
    pub order_type: OrderType,
    pub total_quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lmt_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    /// When false the venue holds the order until a later order with
    /// `transmit = true` releases it.
    pub transmit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_ref: Option<String>,
}

/// What the caller wants placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketRequest {
    pub action: OrderAction,
    pub order_type: OrderType,
    pub quantity: u32,
    /// Entry price. Ignored for market entries.
    pub price: Price,
    /// Trigger price of the protective stop.
    pub stop_price: Price,
}

impl BracketRequest {
    /// Validate the request before any order id is spent on it.
    ///
    /// The protective stop must sit on the losing side of the entry:
    /// below it for a buy, above it for a sell. Market entries have no
    /// reference price, so only the stop itself is checked.
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(CoreError::InvalidOrder("quantity must be positive".to_string()));
        }
        if !self.stop_price.is_positive() {
            return Err(CoreError::InvalidOrder(format!(
                "stop price must be positive, got {}",
                self.stop_price
            )));
        }
        if self.order_type == OrderType::Market {
            return Ok(());
        }
        if !self.price.is_positive() {
            return Err(CoreError::InvalidOrder(format!(
                "entry price must be positive, got {}",
                self.price
            )));
        }
        let stop_on_losing_side = match self.action {
            OrderAction::Buy => self.stop_price < self.price,
            OrderAction::Sell => self.stop_price > self.price,
        };
        if !stop_on_losing_side {
            return Err(CoreError::InvalidOrder(format!(
                "{} entry at {} cannot be protected by a stop at {}",
                self.action, self.price, self.stop_price
            )));
        }
        Ok(())
    }
}

/// Entry + protective stop linked by parent id.
///
/// The stop's own order id is allocated only after the entry has been
/// handed to the venue, so it is not part of this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketOrder {
    pub entry_id: u64,
    pub entry: Order,
    pub stop: Order,
    pub bracket_ref: BracketRef,
}

impl BracketOrder {
    /// Build both legs for an already allocated entry id.
    pub fn new(entry_id: u64, request: &BracketRequest, bracket_ref: BracketRef) -> Result<Self> {
        request.validate()?;

        let entry = Order {
            action: request.action,
            order_type: request.order_type,
            total_quantity: request.quantity,
            lmt_price: request.order_type.has_limit().then_some(request.price),
            aux_price: request.order_type.has_stop().then_some(request.price),
            parent_id: None,
            transmit: false,
            order_ref: Some(bracket_ref.to_string()),
        };

        let stop = Order {
            action: request.action.opposite(),
            order_type: OrderType::Stop,
            total_quantity: request.quantity,
            lmt_price: None,
            aux_price: Some(request.stop_price),
            parent_id: Some(entry_id),
            transmit: true,
            order_ref: Some(bracket_ref.to_string()),
        };

        Ok(Self {
            entry_id,
            entry,
            stop,
            bracket_ref,
        })
    }
}
