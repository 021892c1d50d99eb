//! Venue gateway session for bracket order placement.
//!
//! Provides:
//! - JSON-over-WebSocket message types for the venue gateway
//! - A blocking request/response correlation registry
//! - A connection manager running the session on its own thread
//! - A cloneable write handle for issuing requests

pub mod connection;
pub mod error;
pub mod message;
pub mod registry;
pub mod session_handle;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, OrderRejection};
pub use error::{WsError, WsResult};
pub use message::{
    is_connection_lost_code, is_informational_code, is_warning_code, TickType, VenueEvent,
    VenueRequest, CODE_CONNECT_FAILED, CODE_NOT_CONNECTED, CODE_ORDER_WARNING, FATAL_ERROR_CODES,
};
pub use registry::{
    PendingRequest, PendingRequestRegistry, RequestIdSequence, WaitError, WaitLimit,
};
pub use session_handle::{SendError, SessionHandle};
