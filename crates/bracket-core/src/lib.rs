//! Core domain types for bracket order placement.
//!
//! This crate provides the types shared by the venue session and the
//! order workflow:
//! - `Price`: precision-safe decimal price
//! - `Contract`, `ContractDetails`: venue instrument descriptors
//! - `Order`, `BracketOrder`: the entry + protective stop pair
//! - `OrderIdSource`: the seam for monotonic order id allocation

pub mod contract;
pub mod decimal;
pub mod error;
pub mod ids;
pub mod order;
pub mod trigger;

pub use contract::{Contract, ContractDetails, ContractTemplate, SecType};
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use ids::{OrderIdError, OrderIdSource, SequentialOrderIds};
pub use order::{
    BracketOrder, BracketRef, BracketRequest, Order, OrderAction, OrderRole, OrderType,
};
pub use trigger::PriceTrigger;
