//! Executor error types.

use bracket_core::{CoreError, OrderIdError};
use bracket_ws::{SendError, WaitError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid request: {0}")]
    Invalid(#[from] CoreError),

    #[error("Order id allocation failed: {0}")]
    OrderIds(#[from] OrderIdError),

    #[error("Send failed: {0}")]
    Send(#[from] SendError),

    #[error("Waiting for {what} failed: {source}")]
    Wait {
        what: &'static str,
        #[source]
        source: WaitError,
    },

    /// The venue ended the lookup without a single match.
    #[error("No contract matches symbol {0}")]
    UnresolvedSymbol(String),

    #[error("Market data for request {req_id} ended without a qualifying price")]
    MarketDataEnded { req_id: u64 },

    /// Entry was queued but its protective stop was not.
    #[error("Partial bracket: entry {entry_id} queued without its stop: {reason}")]
    PartialBracket { entry_id: u64, reason: String },
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
