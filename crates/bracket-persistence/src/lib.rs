//! Durable state for bracket order placement.
//!
//! The only persisted state is the order id counter: a single text file
//! shared by every process that places orders on the same venue account.

pub mod order_id;

pub use order_id::FileOrderIdAllocator;
