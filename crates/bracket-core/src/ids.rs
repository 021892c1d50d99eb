//! Order id allocation seam.
//!
//! Order ids must be unique for the lifetime of the venue account and
//! strictly increasing. The production source is the file-backed counter in
//! `bracket-persistence`; `SequentialOrderIds` is the in-memory equivalent.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors raised while allocating an order id.
#[derive(Debug, Error)]
pub enum OrderIdError {
    /// Another holder kept the counter lock past the acquisition bound.
    #[error("order id lock on {path} not acquired within {waited_ms}ms")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("order id counter IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of monotonic order ids.
///
/// `seed` is the venue's "next valid id": when it is ahead of the local
/// counter the counter jumps to it, otherwise it is ignored.
pub trait OrderIdSource: Send + Sync {
    fn next_id(&self, seed: Option<u64>) -> Result<u64, OrderIdError>;
}

/// In-memory monotonic id source.
///
/// Same seeding rule as the file counter, no persistence. Used for dry runs
/// and tests.
#[derive(Debug, Default)]
pub struct SequentialOrderIds {
    /// Last issued id.
    last: AtomicU64,
}

impl SequentialOrderIds {
    /// Start with `last` as the most recently issued id.
    #[must_use]
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// Last issued id (0 before the first allocation).
    #[must_use]
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

impl OrderIdSource for SequentialOrderIds {
    fn next_id(&self, seed: Option<u64>) -> Result<u64, OrderIdError> {
        loop {
            let current = self.last.load(Ordering::Acquire);
            let candidate = current.saturating_add(1);
            let next_val = match seed {
                Some(seed) if seed > candidate => seed,
                _ => candidate,
            };

            match self.last.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(next_val),
                Err(_) => continue,
            }
        }
    }
}
