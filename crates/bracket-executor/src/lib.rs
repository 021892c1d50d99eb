//! Order workflow on top of a venue session.
//!
//! - `ContractResolver`: symbol to venue contract
//! - `PriceWatcher`: optional gate on last-trade price
//! - `BracketSubmitter`: entry + protective stop, entry first
//!
//! All three talk to the venue through the `VenueSender` seam and block the
//! calling thread on the session's pending request registries.

pub mod error;
pub mod price_watcher;
pub mod resolver;
pub mod session_sender;
pub mod submitter;
pub mod venue_sender;

pub use error::{ExecutorError, ExecutorResult};
pub use price_watcher::PriceWatcher;
pub use resolver::ContractResolver;
pub use session_sender::SessionSender;
pub use submitter::{BracketSubmitter, SubmittedBracket};
pub use venue_sender::{DynVenueSender, MockVenueSender, VenueSender};
