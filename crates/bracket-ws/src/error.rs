//! Venue session error types.

use crate::session_handle::SendError;
use bracket_core::OrderIdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The venue reported a fatal connectivity error code.
    #[error("Connection lost: code={code}, message={message}")]
    ConnectionLost { code: i32, message: String },

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Send failed: {0}")]
    Send(#[from] SendError),

    #[error("Order id allocation failed: {0}")]
    OrderIds(#[from] OrderIdError),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WsResult<T> = Result<T, WsError>;
