//! Production venue sender.
//!
//! Forwards requests to the live session through a `SessionHandle`.

use crate::venue_sender::VenueSender;
use bracket_core::OrderRole;
use bracket_ws::{SendError, SessionHandle, VenueRequest};
use tracing::warn;

/// Venue sender backed by the session's write handle.
///
/// `send()` only confirms the request was queued. Answers arrive through the
/// session's registries.
#[derive(Debug, Clone)]
pub struct SessionSender {
    handle: SessionHandle,
}

impl SessionSender {
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }
}

impl VenueSender for SessionSender {
    fn send(&self, request: VenueRequest) -> Result<(), SendError> {
        let kind = request.kind();
        self.handle.send(request).map_err(|e| {
            warn!(kind, %e, "Venue request refused");
            e
        })
    }

    fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    fn watch_order(&self, order_id: u64, role: OrderRole) {
        self.handle.watch_order(order_id, role);
    }
}
