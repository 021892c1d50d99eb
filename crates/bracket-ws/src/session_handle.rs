//! Caller-side write handle for the venue session.
//!
//! Requests are queued onto the session's outbound channel and written by
//! the session thread in FIFO order. Responses arrive through the
//! registries, never through this handle.

use crate::connection::{ConnectionState, SessionShared};
use crate::message::VenueRequest;
use bracket_core::OrderRole;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Error type for send operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// Handshake not complete, session lost, or shutting down.
    #[error("not connected")]
    NotConnected,
    /// Session loop has exited.
    #[error("channel closed")]
    ChannelClosed,
}

/// Cloneable handle for issuing requests on the session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<VenueRequest>,
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::Sender<VenueRequest>, shared: Arc<SessionShared>) -> Self {
        Self { tx, shared }
    }

    /// Queue a request for sending.
    ///
    /// Blocks while the outbound queue is full. Must not be called from
    /// inside an async runtime.
    ///
    /// # Errors
    ///
    /// - `SendError::NotConnected`: not in `Connected` or stop requested
    /// - `SendError::ChannelClosed`: session loop is gone
    pub fn send(&self, request: VenueRequest) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }

        let kind = request.kind();
        self.tx
            .blocking_send(request)
            .map_err(|_| SendError::ChannelClosed)?;

        debug!(kind, "Request queued for sending");
        Ok(())
    }

    /// Surface venue errors for `order_id` as rejections of `role`.
    pub fn watch_order(&self, order_id: u64, role: OrderRole) {
        self.shared.watch_order(order_id, role);
    }

    /// True when connected, accepting requests and the channel is open.
    pub fn is_connected(&self) -> bool {
        self.shared.is_accepting()
            && self.shared.state() == ConnectionState::Connected
            && !self.tx.is_closed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.shared.state())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
