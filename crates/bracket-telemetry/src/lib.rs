//! Structured logging for bracket order placement.
//!
//! Logs go to stderr so that stdout carries only the run report.

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogFormat};
