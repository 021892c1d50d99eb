//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<bracket_ws::WsError>),

    #[error("Executor error: {0}")]
    Executor(#[from] bracket_executor::ExecutorError),

    #[error("Order id error: {0}")]
    OrderIds(#[from] bracket_core::OrderIdError),

    #[error("Invalid order: {0}")]
    Core(#[from] bracket_core::CoreError),
}

pub type AppResult<T> = Result<T, AppError>;
