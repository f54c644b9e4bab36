//! Common test utilities for LiveSockets integration tests
//!
//! - [`MockTransport`]: in-memory transport; tests drive each handle's
//!   lifecycle by hand and inspect what the manager wrote
//! - [`MockWsServer`]: a real WebSocket server on localhost for end-to-end runs

#![allow(dead_code)]

use livesockets::{EventSink, LiveSocketError, ReadyState, Transport, TransportHandle};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// One mock connection
pub struct MockHandle {
    pub url: String,
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<String>>,
    closes: Mutex<Vec<(u16, String)>>,
    events: EventSink,
}

impl MockHandle {
    /// Complete the handshake
    pub fn open(&self) {
        *self.state.lock() = ReadyState::Open;
        self.events.opened();
    }

    /// Server-initiated close
    pub fn server_close(&self, code: u16, reason: &str) {
        *self.state.lock() = ReadyState::Closed;
        self.events.closed(code, reason);
    }

    /// Socket error without a close
    pub fn fail(&self, description: &str) {
        self.events.errored(description);
    }

    /// Deliver a text frame
    pub fn receive(&self, text: &str) {
        self.events.message(text);
    }

    pub fn receive_json(&self, value: Value) {
        self.receive(&value.to_string());
    }

    /// The socket dies without any event reaching the manager
    pub fn vanish(&self) {
        *self.state.lock() = ReadyState::Closed;
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).expect("manager wrote invalid JSON"))
            .collect()
    }

    /// `type` of every frame written, in order
    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.closes.lock().clone()
    }
}

impl TransportHandle for MockHandle {
    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn send(&self, text: &str) -> livesockets::Result<()> {
        if *self.state.lock() != ReadyState::Open {
            return Err(LiveSocketError::NotConnected);
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        let mut state = self.state.lock();
        if state.is_active() {
            *state = ReadyState::Closed;
            self.closes.lock().push((code, reason.to_string()));
        }
    }
}

/// Transport that hands out [`MockHandle`]s and remembers them
#[derive(Clone, Default)]
pub struct MockTransport {
    handles: Arc<Mutex<Vec<Arc<MockHandle>>>>,
    refuse: Arc<AtomicBool>,
    attempts: Arc<Mutex<usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `open` fail immediately
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `open` calls, refused ones included
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn handle(&self, index: usize) -> Arc<MockHandle> {
        Arc::clone(&self.handles.lock()[index])
    }

    pub fn last(&self) -> Arc<MockHandle> {
        let handles = self.handles.lock();
        Arc::clone(handles.last().expect("no connection was opened"))
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str, events: EventSink) -> livesockets::Result<Arc<dyn TransportHandle>> {
        *self.attempts.lock() += 1;
        if self.refuse.load(Ordering::SeqCst) {
            return Err(LiveSocketError::WebSocket("connection refused".to_string()));
        }

        let handle = Arc::new(MockHandle {
            url: url.to_string(),
            state: Mutex::new(ReadyState::Connecting),
            sent: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
            events,
        });
        self.handles.lock().push(Arc::clone(&handle));
        Ok(handle)
    }
}

/// What the mock server saw on one connection
#[derive(Debug, Default, Clone)]
pub struct ServerLog {
    /// `Authorization` header of the handshake request
    pub authorization: Option<String>,
    pub frames: Vec<Value>,
    pub close: Option<(u16, String)>,
}

/// A mock collaboration server
///
/// Greets every connection with `{"type":"welcome","clientId":"c<n>"}`,
/// answers pings with pongs and records everything else.
pub struct MockWsServer {
    pub addr: SocketAddr,
    connections: Arc<Mutex<Vec<Arc<Mutex<ServerLog>>>>>,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let connections: Arc<Mutex<Vec<Arc<Mutex<ServerLog>>>>> = Arc::default();

        let shutdown_clone = Arc::clone(&shutdown);
        let connections_clone = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let log = Arc::new(Mutex::new(ServerLog::default()));
                                let client_number = {
                                    let mut connections = connections_clone.lock();
                                    connections.push(Arc::clone(&log));
                                    connections.len()
                                };
                                let shutdown = Arc::clone(&shutdown_clone);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, client_number, log, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            connections,
            shutdown,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        client_number: usize,
        log: Arc<Mutex<ServerLog>>,
        shutdown: Arc<Notify>,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_hdr_async;
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
        use tokio_tungstenite::tungstenite::Message;

        let handshake_log = Arc::clone(&log);
        let record_headers = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            handshake_log.lock().authorization = request
                .headers()
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            Ok(response)
        };

        let ws_stream = match accept_hdr_async(stream, record_headers).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let welcome = serde_json::json!({"type": "welcome", "clientId": format!("c{}", client_number)});
        if write.send(Message::Text(welcome.to_string())).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(value) = serde_json::from_str::<Value>(&text) else {
                                continue;
                            };
                            if value["type"] == "ping" {
                                let pong = serde_json::json!({
                                    "type": "pong",
                                    "originalTimestamp": value["timestamp"],
                                });
                                if write.send(Message::Text(pong.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            log.lock().frames.push(value);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log.lock().close = Some(match frame {
                                Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                                None => (1005, String::new()),
                            });
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn log(&self, index: usize) -> ServerLog {
        self.connections.lock()[index].lock().clone()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_for<F>(timeout: std::time::Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
