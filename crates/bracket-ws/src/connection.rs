//! Venue session connection manager.
//!
//! Owns the gateway WebSocket. The read/write loop runs on a dedicated
//! `venue-session` thread with its own single-threaded runtime, so callers
//! stay fully synchronous. Inbound callbacks are demultiplexed into the
//! registries on that thread; outbound requests reach it through a bounded
//! channel.
//!
//! There is no reconnection: a fatal error code or a dropped socket moves the
//! session to `Disconnected` for good.

use crate::error::{WsError, WsResult};
use crate::message::{
    is_connection_lost_code, is_warning_code, TickType, VenueEvent, VenueRequest,
};
use crate::registry::{PendingRequestRegistry, RequestIdSequence};
use crate::session_handle::SessionHandle;
use bracket_core::{ContractDetails, OrderIdSource, OrderRole, Price};
use dashmap::DashMap;
use futures_util::{Sink, SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Gateway WebSocket URL.
    pub url: String,
    /// Session identifier presented in the handshake.
    pub client_id: u32,
    /// Bound on the wait for the handshake to complete.
    pub connect_timeout: Duration,
    /// Interval at which `connect` re-checks the handshake state.
    pub poll_interval: Duration,
    /// Outbound queue depth.
    pub outbound_capacity: usize,
}

impl ConnectionConfig {
    pub fn for_gateway(host: &str, port: u16, client_id: u32) -> Self {
        Self {
            url: format!("ws://{host}:{port}"),
            client_id,
            ..Self::default()
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:7497".to_string(),
            client_id: 0,
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            outbound_capacity: 100,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Venue error reported against a watched order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRejection {
    pub order_id: u64,
    pub role: OrderRole,
    pub code: i32,
    pub message: String,
}

// ============================================================================
// Shared session state
// ============================================================================

/// State shared between the caller thread and the session thread.
pub(crate) struct SessionShared {
    state: RwLock<ConnectionState>,
    accepting: AtomicBool,
    contracts: Arc<PendingRequestRegistry<ContractDetails>>,
    prices: Arc<PendingRequestRegistry<Price>>,
    order_ids: Arc<dyn OrderIdSource>,
    watched: DashMap<u64, OrderRole>,
    rejections: Mutex<Vec<OrderRejection>>,
    last_error: Mutex<Option<String>>,
}

impl SessionShared {
    pub(crate) fn new(order_ids: Arc<dyn OrderIdSource>) -> Self {
        let ids = Arc::new(RequestIdSequence::new());
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            accepting: AtomicBool::new(true),
            contracts: Arc::new(PendingRequestRegistry::new(Arc::clone(&ids))),
            prices: Arc::new(PendingRequestRegistry::new(ids)),
            order_ids,
            watched: DashMap::new(),
            rejections: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub(crate) fn watch_order(&self, order_id: u64, role: OrderRole) {
        self.watched.insert(order_id, role);
    }

    fn record_error(&self, reason: String) {
        *self.last_error.lock() = Some(reason);
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Venue session manager.
///
/// `Disconnected -> Connecting -> Connected -> Disconnected`. Dropping the
/// manager stops the session.
pub struct ConnectionManager {
    config: ConnectionConfig,
    shared: Arc<SessionShared>,
    outbound_tx: mpsc::Sender<VenueRequest>,
    shutdown_token: CancellationToken,
    session: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Open the session and block until the handshake completes.
    ///
    /// The handshake completes when the venue announces its next valid order
    /// id; `order_ids` is seeded with it before the state turns `Connected`.
    ///
    /// # Errors
    ///
    /// `WsError::ConnectionFailed` when the socket cannot be opened, the
    /// venue reports a fatal code, or `connect_timeout` elapses. The session
    /// thread has been joined by the time the error is returned.
    pub fn connect(config: ConnectionConfig, order_ids: Arc<dyn OrderIdSource>) -> WsResult<Self> {
        let shared = Arc::new(SessionShared::new(order_ids));
        shared.set_state(ConnectionState::Connecting);

        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let shutdown_token = CancellationToken::new();

        let session = {
            let config = config.clone();
            let shared = Arc::clone(&shared);
            let shutdown_token = shutdown_token.clone();
            thread::Builder::new()
                .name("venue-session".to_string())
                .spawn(move || run_session(config, shared, outbound_rx, shutdown_token))?
        };

        let mut manager = Self {
            config,
            shared,
            outbound_tx,
            shutdown_token,
            session: Some(session),
        };

        match manager.await_handshake() {
            Ok(()) => Ok(manager),
            Err(e) => {
                manager.stop();
                Err(e)
            }
        }
    }

    fn await_handshake(&self) -> WsResult<()> {
        let started = Instant::now();
        loop {
            match self.shared.state() {
                ConnectionState::Connected => {
                    info!(
                        url = %self.config.url,
                        client_id = self.config.client_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Connected to venue"
                    );
                    return Ok(());
                }
                ConnectionState::Disconnected => {
                    let reason = self
                        .disconnect_reason()
                        .unwrap_or_else(|| "session ended before handshake".to_string());
                    error!(url = %self.config.url, %reason, "Venue connection failed");
                    return Err(WsError::ConnectionFailed(reason));
                }
                ConnectionState::Connecting => {}
            }

            if started.elapsed() >= self.config.connect_timeout {
                error!(
                    url = %self.config.url,
                    timeout_ms = self.config.connect_timeout.as_millis() as u64,
                    "Venue handshake timed out"
                );
                return Err(WsError::ConnectionFailed(format!(
                    "no handshake within {:?}",
                    self.config.connect_timeout
                )));
            }

            thread::sleep(self.config.poll_interval);
        }
    }

    /// Get a write handle for issuing requests.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.outbound_tx.clone(), Arc::clone(&self.shared))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// True while connected and not stopping.
    pub fn is_connected(&self) -> bool {
        self.shared.is_accepting() && self.shared.state() == ConnectionState::Connected
    }

    /// Contract lookup slots, keyed by request id.
    pub fn contracts(&self) -> Arc<PendingRequestRegistry<ContractDetails>> {
        Arc::clone(&self.shared.contracts)
    }

    /// Market data slots, keyed by request id.
    pub fn prices(&self) -> Arc<PendingRequestRegistry<Price>> {
        Arc::clone(&self.shared.prices)
    }

    /// Surface venue errors for `order_id` as rejections of `role`.
    pub fn watch_order(&self, order_id: u64, role: OrderRole) {
        self.shared.watch_order(order_id, role);
    }

    /// Rejections observed so far for watched orders.
    pub fn order_rejections(&self) -> Vec<OrderRejection> {
        self.shared.rejections.lock().clone()
    }

    /// Why the session ended, if it ended abnormally.
    pub fn disconnect_reason(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Stop the session.
    ///
    /// New requests are refused first, then the session thread flushes what
    /// is already queued, closes the socket and is joined. No callback runs
    /// after this returns. Idempotent.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.shared.stop_accepting();
        info!("Stopping venue session");
        self.shutdown_token.cancel();

        if session.join().is_err() {
            error!("Venue session thread panicked");
        }

        self.shared.set_state(ConnectionState::Disconnected);
        info!("Disconnected from venue");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Session thread
// ============================================================================

fn run_session(
    config: ConnectionConfig,
    shared: Arc<SessionShared>,
    outbound_rx: mpsc::Receiver<VenueRequest>,
    shutdown_token: CancellationToken,
) {
    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(WsError::from)
        .and_then(|runtime| {
            runtime.block_on(session_loop(&config, &shared, outbound_rx, &shutdown_token))
        });

    match result {
        Ok(()) => debug!("Venue session loop exited"),
        Err(e) => {
            error!(%e, "Venue session ended");
            shared.record_error(e.to_string());
        }
    }

    shared.stop_accepting();
    shared.set_state(ConnectionState::Disconnected);
}

async fn session_loop(
    config: &ConnectionConfig,
    shared: &SessionShared,
    mut outbound_rx: mpsc::Receiver<VenueRequest>,
    shutdown_token: &CancellationToken,
) -> WsResult<()> {
    info!(url = %config.url, client_id = config.client_id, "Connecting to venue gateway");

    let (ws_stream, _response) = tokio::select! {
        () = shutdown_token.cancelled() => return Ok(()),
        connected = connect_async(config.url.as_str()) => connected?,
    };
    let (mut write, mut read) = ws_stream.split();

    send_request(
        &mut write,
        &VenueRequest::StartApi {
            client_id: config.client_id,
        },
    )
    .await?;

    loop {
        tokio::select! {
            biased;

            () = shutdown_token.cancelled() => {
                info!("Shutdown signal received in session loop");
                outbound_rx.close();
                let mut flushed = 0usize;
                while let Some(request) = outbound_rx.recv().await {
                    send_request(&mut write, &request).await?;
                    flushed += 1;
                }
                if flushed > 0 {
                    debug!(flushed, "Flushed queued requests before close");
                }
                if let Err(e) = write.send(Message::Close(None)).await {
                    warn!(?e, "Failed to send Close frame during shutdown");
                }
                return Ok(());
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text_message(&text, shared)?;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        warn!(code, %reason, "Venue gateway closed the session");
                        return Err(WsError::ConnectionClosed { code, reason });
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(?e, "Venue session read error");
                        return Err(e.into());
                    }
                    None => {
                        warn!("Venue stream ended");
                        return Err(WsError::ConnectionClosed {
                            code: 1006,
                            reason: "stream ended".to_string(),
                        });
                    }
                }
            }

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(request) => send_request(&mut write, &request).await?,
                    None => {
                        debug!("Outbound channel closed, ending session");
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn send_request<S>(write: &mut S, request: &VenueRequest) -> WsResult<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let payload = serde_json::to_string(request)?;
    write.send(Message::Text(payload)).await?;
    debug!(kind = request.kind(), "Request sent to venue");
    Ok(())
}

fn handle_text_message(text: &str, shared: &SessionShared) -> WsResult<()> {
    match VenueEvent::parse(text) {
        Ok(event) => dispatch_event(event, shared),
        Err(e) => {
            warn!(%e, frame = %text, "Malformed venue frame skipped");
            Ok(())
        }
    }
}

/// Route one venue callback.
///
/// Runs on the session thread. An `Err` ends the session.
/// Extracted as separate function for testability.
fn dispatch_event(event: VenueEvent, shared: &SessionShared) -> WsResult<()> {
    match event {
        VenueEvent::ConnectAck { server_version } => {
            info!(?server_version, "Venue acknowledged connection");
        }
        VenueEvent::NextValidId { order_id } => {
            let seeded = shared.order_ids.next_id(Some(order_id))?;
            info!(venue_next_id = order_id, seeded, "Order ids seeded from venue");
            if shared.state() == ConnectionState::Connecting {
                shared.set_state(ConnectionState::Connected);
            }
        }
        VenueEvent::Error { id, code, message } => {
            handle_venue_error(id, code, message, shared)?;
        }
        VenueEvent::ContractDetails { req_id, details } => {
            if !shared.contracts.fulfill(req_id, details) {
                debug!(req_id, "Contract details for unknown request");
            }
        }
        VenueEvent::ContractDetailsEnd { req_id } => {
            if !shared.contracts.complete_and_remove(req_id) {
                debug!(req_id, "Contract details end for unknown request");
            }
        }
        VenueEvent::TickPrice {
            req_id,
            tick_type,
            price,
        } => {
            if tick_type == TickType::Last {
                shared.prices.fulfill(req_id, price);
            } else {
                trace!(req_id, ?tick_type, %price, "Ignoring non-last tick");
            }
        }
        VenueEvent::OrderStatus {
            order_id,
            status,
            filled,
            remaining,
        } => {
            info!(order_id, %status, filled, remaining, "Order status");
        }
        VenueEvent::Unknown => {
            debug!("Ignoring unrecognized venue event");
        }
    }
    Ok(())
}

fn handle_venue_error(id: i64, code: i32, message: String, shared: &SessionShared) -> WsResult<()> {
    if is_connection_lost_code(code) {
        error!(id, code, %message, "Venue reports connection lost");
        let lost = WsError::ConnectionLost { code, message };
        // Reason must be visible before the state flips; `connect` reads it.
        shared.record_error(lost.to_string());
        shared.stop_accepting();
        shared.set_state(ConnectionState::Disconnected);
        return Err(lost);
    }

    // Warnings against an order id leave the order working.
    if is_warning_code(code) {
        debug!(id, code, %message, "Venue notice");
        return Ok(());
    }

    let watched = u64::try_from(id)
        .ok()
        .and_then(|order_id| shared.watched.get(&order_id).map(|role| (order_id, *role)));

    if let Some((order_id, role)) = watched {
        match role {
            OrderRole::ProtectiveStop => {
                error!(
                    order_id,
                    code,
                    %message,
                    "Protective stop rejected; entry may be unprotected"
                );
            }
            OrderRole::Entry => {
                warn!(order_id, code, %message, "Entry order rejected");
            }
        }
        shared.rejections.lock().push(OrderRejection {
            order_id,
            role,
            code,
            message,
        });
        return Ok(());
    }

    warn!(id, code, %message, "Venue error");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracket_core::{ContractTemplate, SequentialOrderIds};
    use rust_decimal_macros::dec;

    fn shared_with(ids: Arc<SequentialOrderIds>) -> SessionShared {
        let shared = SessionShared::new(ids);
        shared.set_state(ConnectionState::Connecting);
        shared
    }

    fn details(con_id: i64) -> ContractDetails {
        let mut contract = ContractTemplate::default().lookup("MESM0");
        contract.con_id = Some(con_id);
        ContractDetails {
            contract,
            market_name: "MES".to_string(),
            long_name: "Micro E-Mini S&P 500".to_string(),
            min_tick: Price::new(dec!(0.25)),
            multiplier: Some("5".to_string()),
            last_trade_date: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.url, "ws://127.0.0.1:7497");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));

        let config = ConnectionConfig::for_gateway("10.0.0.5", 4002, 9);
        assert_eq!(config.url, "ws://10.0.0.5:4002");
        assert_eq!(config.client_id, 9);
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    #[test]
    fn test_next_valid_id_seeds_and_connects() {
        let ids = Arc::new(SequentialOrderIds::starting_after(3));
        let shared = shared_with(ids.clone());

        dispatch_event(VenueEvent::NextValidId { order_id: 40 }, &shared).unwrap();

        assert_eq!(shared.state(), ConnectionState::Connected);
        assert_eq!(ids.last(), 40);
    }

    #[test]
    fn test_next_valid_id_behind_local_counter() {
        let ids = Arc::new(SequentialOrderIds::starting_after(100));
        let shared = shared_with(ids.clone());

        dispatch_event(VenueEvent::NextValidId { order_id: 40 }, &shared).unwrap();

        assert_eq!(ids.last(), 101);
    }

    #[test]
    fn test_fatal_error_disconnects() {
        let shared = shared_with(Arc::new(SequentialOrderIds::default()));
        shared.set_state(ConnectionState::Connected);

        let result = dispatch_event(
            VenueEvent::Error {
                id: -1,
                code: 504,
                message: "Not connected".to_string(),
            },
            &shared,
        );

        assert!(matches!(result, Err(WsError::ConnectionLost { code: 504, .. })));
        assert_eq!(shared.state(), ConnectionState::Disconnected);
        assert!(!shared.is_accepting());
        assert!(shared.last_error.lock().as_deref().is_some_and(|e| e.contains("504")));
    }

    #[test]
    fn test_non_fatal_error_is_ignored() {
        let shared = shared_with(Arc::new(SequentialOrderIds::default()));
        shared.set_state(ConnectionState::Connected);

        dispatch_event(
            VenueEvent::Error {
                id: 1001,
                code: 200,
                message: "No security definition".to_string(),
            },
            &shared,
        )
        .unwrap();

        assert_eq!(shared.state(), ConnectionState::Connected);
        assert!(shared.rejections.lock().is_empty());
    }

    // ========================================================================
    // Routing
    // ========================================================================

    #[test]
    fn test_contract_details_routing() {
        let shared = shared_with(Arc::new(SequentialOrderIds::default()));
        let slot = shared.contracts.create();
        let req_id = slot.id();

        dispatch_event(VenueEvent::ContractDetails { req_id, details: details(1) }, &shared).unwrap();
        dispatch_event(VenueEvent::ContractDetails { req_id, details: details(2) }, &shared).unwrap();
        assert!(!slot.is_ready());

        dispatch_event(VenueEvent::ContractDetailsEnd { req_id }, &shared).unwrap();

        assert!(slot.is_ready());
        assert_eq!(slot.payload().unwrap().contract.con_id, Some(2));
        assert_eq!(shared.contracts.pending_count(), 0);
    }

    #[test]
    fn test_unsolicited_details_create_nothing() {
        let shared = shared_with(Arc::new(SequentialOrderIds::default()));

        dispatch_event(
            VenueEvent::ContractDetails {
                req_id: 777,
                details: details(1),
            },
            &shared,
        )
        .unwrap();

        assert_eq!(shared.contracts.pending_count(), 0);
    }

    #[test]
    fn test_only_last_ticks_reach_price_slots() {
        let shared = shared_with(Arc::new(SequentialOrderIds::default()));
        let slot = shared.prices.create();
        let req_id = slot.id();

        dispatch_event(
            VenueEvent::TickPrice {
                req_id,
                tick_type: TickType::Bid,
                price: Price::new(dec!(99.75)),
            },
            &shared,
        )
        .unwrap();
        assert_eq!(slot.payload(), None);

        dispatch_event(
            VenueEvent::TickPrice {
                req_id,
                tick_type: TickType::Last,
                price: Price::new(dec!(100.25)),
            },
            &shared,
        )
        .unwrap();
        assert_eq!(slot.payload(), Some(Price::new(dec!(100.25))));
    }

    #[test]
    fn test_malformed_frame_keeps_session() {
        let shared = shared_with(Arc::new(SequentialOrderIds::default()));

        assert!(handle_text_message("{not json", &shared).is_ok());
        assert!(handle_text_message(r#"{"type":"managed_accounts"}"#, &shared).is_ok());
        assert_eq!(shared.state(), ConnectionState::Connecting);
    }

    // ========================================================================
    // Watched orders
    // ========================================================================

    #[test]
    fn test_stop_rejection_recorded() {
        let shared = shared_with(Arc::new(SequentialOrderIds::default()));
        shared.set_state(ConnectionState::Connected);
        shared.watch_order(41, OrderRole::Entry);
        shared.watch_order(42, OrderRole::ProtectiveStop);

        dispatch_event(
            VenueEvent::Error {
                id: 42,
                code: 201,
                message: "Order rejected".to_string(),
            },
            &shared,
        )
        .unwrap();

        let rejections = shared.rejections.lock().clone();
        assert_eq!(
            rejections,
            vec![OrderRejection {
                order_id: 42,
                role: OrderRole::ProtectiveStop,
                code: 201,
                message: "Order rejected".to_string(),
            }]
        );
        assert_eq!(shared.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_warnings_on_watched_orders_are_not_rejections() {
        let shared = shared_with(Arc::new(SequentialOrderIds::default()));
        shared.set_state(ConnectionState::Connected);
        shared.watch_order(41, OrderRole::Entry);
        shared.watch_order(42, OrderRole::ProtectiveStop);

        for (id, code, message) in [
            (42, 2109, "Order Event Warning: Outside Regular Trading Hours is ignored"),
            (42, 399, "Order Message: Warning: your order will not be placed at the exchange until trading starts"),
            (41, 2109, "Order Event Warning: Outside Regular Trading Hours is ignored"),
        ] {
            dispatch_event(
                VenueEvent::Error {
                    id,
                    code,
                    message: message.to_string(),
                },
                &shared,
            )
            .unwrap();
        }

        assert!(shared.rejections.lock().is_empty());
        assert_eq!(shared.state(), ConnectionState::Connected);
    }
}
