//! Mock venue gateway for integration tests.
//!
//! Runs a WebSocket server on its own thread and runtime so that the
//! synchronous session API can be driven from the test thread. The server:
//! - answers `start_api` with the scripted handshake (or a fatal error)
//! - answers contract lookups and market data requests from the script
//! - acknowledges or rejects orders
//! - records every frame it receives

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// First contract id handed out by lookups; further matches count up.
pub const BASE_CON_ID: i64 = 412_888_950;

/// Scripted gateway behavior.
#[derive(Debug, Clone)]
pub struct VenueScript {
    /// Announced after `start_api`.
    pub next_valid_id: u64,
    /// Sent in place of the handshake when set.
    pub handshake_error: Option<(i32, String)>,
    /// Details frames per lookup before the end marker.
    pub contract_matches: u32,
    /// Last-trade prices streamed on every market data request.
    pub last_ticks: Vec<String>,
    /// Error sent for protective stops (orders with a parent id).
    pub stop_rejection: Option<(i32, String)>,
}

impl Default for VenueScript {
    fn default() -> Self {
        Self {
            next_valid_id: 311,
            handshake_error: None,
            contract_matches: 1,
            last_ticks: Vec::new(),
            stop_rejection: None,
        }
    }
}

/// A mock venue gateway.
pub struct MockVenue {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
    inject_tx: mpsc::UnboundedSender<Value>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl MockVenue {
    /// Start a gateway on an available port.
    pub fn start(script: VenueScript) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let server = {
            let received = Arc::clone(&received);
            thread::Builder::new()
                .name("mock-venue".to_string())
                .spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .unwrap();
                    runtime.block_on(serve(listener, script, received, inject_rx, shutdown_rx));
                })
                .unwrap()
        };

        Self {
            addr,
            received,
            inject_tx,
            shutdown_tx: Some(shutdown_tx),
            server: Some(server),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Gateway WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Push an unsolicited frame to the connected client.
    pub fn push(&self, frame: Value) {
        let _ = self.inject_tx.send(frame);
    }

    /// All frames received so far.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    /// `type` of every frame received so far, in order.
    pub fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|frame| frame["type"].as_str().map(str::to_string))
            .collect()
    }

    /// Received frames of one `type`.
    pub fn frames_of(&self, kind: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|frame| frame["type"] == kind)
            .collect()
    }

    /// Poll until at least `count` frames have been received.
    pub fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.received.lock().len() >= count)
    }
}

impl Drop for MockVenue {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            let _ = server.join();
        }
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    loop {
        if condition() {
            return true;
        }
        if started.elapsed() >= timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

async fn serve(
    listener: std::net::TcpListener,
    script: VenueScript,
    received: Arc<Mutex<Vec<Value>>>,
    mut inject_rx: mpsc::UnboundedReceiver<Value>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let listener = TcpListener::from_std(listener).unwrap();

    // Connections are served one at a time.
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((stream, _)) = accepted else { continue };
                let shutdown = handle_connection(
                    stream,
                    &script,
                    &received,
                    &mut inject_rx,
                    &mut shutdown_rx,
                )
                .await;
                if shutdown {
                    break;
                }
            }
            _ = &mut shutdown_rx => break,
        }
    }
}

/// Returns true when shutdown was requested while serving.
async fn handle_connection(
    stream: TcpStream,
    script: &VenueScript,
    received: &Mutex<Vec<Value>>,
    inject_rx: &mut mpsc::UnboundedReceiver<Value>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> bool {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return false;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = &mut *shutdown_rx => return true,

            injected = inject_rx.recv() => {
                if let Some(frame) = injected {
                    let _ = write.send(Message::Text(frame.to_string())).await;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        received.lock().push(frame.clone());
                        for reply in respond(script, &frame) {
                            let _ = write.send(Message::Text(reply.to_string())).await;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return false,
                    _ => {}
                }
            }
        }
    }
}

/// Scripted replies to one client frame.
fn respond(script: &VenueScript, frame: &Value) -> Vec<Value> {
    match frame["type"].as_str() {
        Some("start_api") => match &script.handshake_error {
            Some((code, message)) => vec![json!({
                "type": "error", "id": -1, "code": code, "message": message
            })],
            None => vec![
                json!({ "type": "connect_ack", "server_version": 176 }),
                json!({
                    "type": "error", "id": -1, "code": 2104,
                    "message": "Market data farm connection is OK:usfarm"
                }),
                json!({ "type": "next_valid_id", "order_id": script.next_valid_id }),
            ],
        },
        Some("req_contract_details") => {
            let req_id = frame["req_id"].clone();
            let lookup = &frame["contract"];
            let mut replies: Vec<Value> = (0..script.contract_matches)
                .map(|i| {
                    json!({
                        "type": "contract_details",
                        "req_id": req_id,
                        "details": {
                            "contract": {
                                "symbol": "MES",
                                "sec_type": lookup["sec_type"],
                                "currency": lookup["currency"],
                                "exchange": lookup["exchange"],
                                "local_symbol": lookup["local_symbol"],
                                "con_id": BASE_CON_ID + i64::from(i)
                            },
                            "market_name": "MES",
                            "long_name": "Micro E-Mini S&P 500 Stock Price Index",
                            "min_tick": "0.25",
                            "multiplier": "5"
                        }
                    })
                })
                .collect();
            replies.push(json!({ "type": "contract_details_end", "req_id": req_id }));
            replies
        }
        Some("req_mkt_data") => {
            let req_id = frame["req_id"].clone();
            let mut replies = vec![json!({
                "type": "tick_price", "req_id": req_id, "tick_type": "bid", "price": "99999"
            })];
            replies.extend(script.last_ticks.iter().map(|price| {
                json!({ "type": "tick_price", "req_id": req_id, "tick_type": "last", "price": price })
            }));
            replies
        }
        Some("place_order") => {
            let order_id = frame["order_id"].clone();
            let is_stop = !frame["order"]["parent_id"].is_null();
            match (&script.stop_rejection, is_stop) {
                (Some((code, message)), true) => vec![json!({
                    "type": "error", "id": order_id, "code": code, "message": message
                })],
                _ => vec![json!({
                    "type": "order_status", "order_id": order_id,
                    "status": "PreSubmitted", "filled": 0,
                    "remaining": frame["order"]["total_quantity"]
                })],
            }
        }
        _ => Vec::new(),
    }
}
