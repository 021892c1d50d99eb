//! Integration tests for bracket-bot.
//!
//! These tests drive the real session stack against a mock gateway:
//! - handshake and id seeding
//! - fatal error codes and shutdown flushing
//! - end-to-end bracket placement, dry run and stop rejection

pub mod common;
