//! Venue gateway message types.
//!
//! Every frame is a JSON object tagged by `"type"`.

use bracket_core::{Contract, ContractDetails, Order, Price};
use serde::{Deserialize, Serialize};

// ============================================================================
// Error codes
// ============================================================================

/// Gateway could not reach the venue.
pub const CODE_CONNECT_FAILED: i32 = 502;
/// Gateway lost (or never had) its venue connection.
pub const CODE_NOT_CONNECTED: i32 = 504;

/// Codes that end the session.
pub const FATAL_ERROR_CODES: [i32; 2] = [CODE_CONNECT_FAILED, CODE_NOT_CONNECTED];

/// Returns true for error codes that mean the session is gone.
pub fn is_connection_lost_code(code: i32) -> bool {
    FATAL_ERROR_CODES.contains(&code)
}

/// Farm/status notices the gateway sends on every connect.
pub fn is_informational_code(code: i32) -> bool {
    (2100..2200).contains(&code)
}

/// Order message warning; the order itself stays working.
pub const CODE_ORDER_WARNING: i32 = 399;

/// Returns true for codes that annotate an order without rejecting it.
pub fn is_warning_code(code: i32) -> bool {
    code == CODE_ORDER_WARNING || is_informational_code(code)
}

// ============================================================================
// Requests (Outgoing)
// ============================================================================

/// Request sent to the venue gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VenueRequest {
    /// Session handshake.
    StartApi { client_id: u32 },
    ReqContractDetails {
        req_id: u64,
        contract: Contract,
    },
    ReqMktData {
        req_id: u64,
        contract: Contract,
        #[serde(default)]
        generic_ticks: String,
        #[serde(default)]
        snapshot: bool,
    },
    CancelMktData { req_id: u64 },
    PlaceOrder {
        order_id: u64,
        contract: Contract,
        order: Order,
    },
}

impl VenueRequest {
    /// Streaming market data subscription with no extra tick types.
    pub fn market_data(req_id: u64, contract: Contract) -> Self {
        Self::ReqMktData {
            req_id,
            contract,
            generic_ticks: String::new(),
            snapshot: false,
        }
    }

    /// Wire name of the request, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartApi { .. } => "start_api",
            Self::ReqContractDetails { .. } => "req_contract_details",
            Self::ReqMktData { .. } => "req_mkt_data",
            Self::CancelMktData { .. } => "cancel_mkt_data",
            Self::PlaceOrder { .. } => "place_order",
        }
    }
}

// ============================================================================
// Events (Incoming)
// ============================================================================

/// Tick field carried by a `tick_price` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickType {
    Bid,
    Ask,
    Last,
    High,
    Low,
    Close,
    #[serde(other)]
    Other,
}

/// Callback delivered by the venue gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VenueEvent {
    ConnectAck {
        #[serde(default)]
        server_version: Option<u32>,
    },
    /// Next order id the venue will accept; completes the handshake.
    NextValidId { order_id: u64 },
    /// `id` is the request or order id the error refers to, -1 when none.
    Error {
        #[serde(default = "no_request_id")]
        id: i64,
        code: i32,
        #[serde(default)]
        message: String,
    },
    ContractDetails {
        req_id: u64,
        details: ContractDetails,
    },
    ContractDetailsEnd { req_id: u64 },
    TickPrice {
        req_id: u64,
        tick_type: TickType,
        price: Price,
    },
    OrderStatus {
        order_id: u64,
        status: String,
        #[serde(default)]
        filled: u32,
        #[serde(default)]
        remaining: u32,
    },
    #[serde(other)]
    Unknown,
}

fn no_request_id() -> i64 {
    -1
}

impl VenueEvent {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
