//! Venue sender trait for the order workflow.
//!
//! Abstracts the session write path so resolver, watcher and submitter can
//! be driven by a mock in tests.

use bracket_core::OrderRole;
use bracket_ws::{SendError, VenueRequest};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Trait for issuing requests on a venue session.
pub trait VenueSender: Send + Sync {
    /// Queue a request. Returns once queued, not once answered.
    fn send(&self, request: VenueRequest) -> Result<(), SendError>;

    /// Check if the session accepts requests.
    fn is_connected(&self) -> bool;

    /// Ask the session to surface venue errors for `order_id`.
    fn watch_order(&self, _order_id: u64, _role: OrderRole) {}
}

/// Shared sender handle.
pub type DynVenueSender = Arc<dyn VenueSender>;

type SendHook = Box<dyn Fn(&VenueRequest) + Send + Sync>;

/// Mock venue sender for testing.
///
/// Records every accepted request. An optional hook sees each request after
/// it is recorded, which lets tests play the venue's side synchronously.
#[derive(Default)]
pub struct MockVenueSender {
    sends: Mutex<Vec<VenueRequest>>,
    watched: Mutex<Vec<(u64, OrderRole)>>,
    /// Refuse sends once this many have been accepted.
    fail_after: Mutex<Option<usize>>,
    accepted: AtomicUsize,
    disconnected: AtomicBool,
    on_send: Mutex<Option<SendHook>>,
}

impl MockVenueSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` more sends, then fail with `NotConnected`.
    pub fn fail_after(&self, count: usize) {
        *self.fail_after.lock() = Some(self.accepted.load(Ordering::SeqCst) + count);
    }

    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }

    pub fn set_on_send<F>(&self, hook: F)
    where
        F: Fn(&VenueRequest) + Send + Sync + 'static,
    {
        *self.on_send.lock() = Some(Box::new(hook));
    }

    /// Get recorded sends.
    pub fn get_sends(&self) -> Vec<VenueRequest> {
        self.sends.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }

    /// Get recorded `watch_order` calls.
    pub fn get_watched(&self) -> Vec<(u64, OrderRole)> {
        self.watched.lock().clone()
    }
}

impl VenueSender for MockVenueSender {
    fn send(&self, request: VenueRequest) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }
        if let Some(limit) = *self.fail_after.lock() {
            if self.accepted.load(Ordering::SeqCst) >= limit {
                return Err(SendError::NotConnected);
            }
        }

        self.accepted.fetch_add(1, Ordering::SeqCst);
        self.sends.lock().push(request.clone());

        if let Some(hook) = self.on_send.lock().as_ref() {
            hook(&request);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }

    fn watch_order(&self, order_id: u64, role: OrderRole) {
        self.watched.lock().push((order_id, role));
    }
}

impl std::fmt::Debug for MockVenueSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockVenueSender")
            .field("sends", &self.send_count())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_and_fails_after() {
        let sender = MockVenueSender::new();
        sender.fail_after(1);

        assert!(sender.send(VenueRequest::CancelMktData { req_id: 1 }).is_ok());
        assert_eq!(
            sender.send(VenueRequest::CancelMktData { req_id: 2 }),
            Err(SendError::NotConnected)
        );
        assert_eq!(sender.get_sends(), vec![VenueRequest::CancelMktData { req_id: 1 }]);
    }

    #[test]
    fn test_mock_disconnected_refuses() {
        let sender = MockVenueSender::new();
        sender.set_connected(false);

        assert!(sender.send(VenueRequest::CancelMktData { req_id: 1 }).is_err());
        assert_eq!(sender.send_count(), 0);
    }

    #[test]
    fn test_hook_sees_sends() {
        let sender = MockVenueSender::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        sender.set_on_send(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sender.send(VenueRequest::CancelMktData { req_id: 1 }).unwrap();
        sender.send(VenueRequest::CancelMktData { req_id: 2 }).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
