//! Bracket order placement.
//!
//! Orchestrates one run of the workflow:
//! - connect to the venue gateway and seed order ids
//! - resolve the symbol into a contract
//! - optionally wait for a price trigger
//! - submit the entry + protective stop (or log it in dry-run mode)
//! - disconnect

pub mod app;
pub mod config;
pub mod error;

pub use crate::app::{derive_client_id, Application, OrderIntent, RunOutcome, Submission};
pub use crate::config::{AppConfig, ConfigOverrides, RunMode};
pub use crate::error::{AppError, AppResult};
