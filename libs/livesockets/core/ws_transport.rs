//! WebSocket transport over tokio-tungstenite
//!
//! Each handle owns one spawned task. The task performs the handshake,
//! then multiplexes inbound frames and outbound commands with `select!`
//! until either side closes, reporting every step through the handle's
//! [`EventSink`].

use crate::client::EventSink;
use crate::connection_state::AtomicReadyState;
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, warn};

/// Close code reported when the peer's close frame carried no code
const CLOSE_NO_STATUS: u16 = 1005;

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close(u16, String),
}

/// Production transport
#[derive(Clone, Default)]
pub struct WsTransport {
    headers: Option<Arc<dyn HeaderProvider>>,
    runtime: Option<Handle>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers added to every handshake request
    pub fn with_headers(mut self, headers: Arc<dyn HeaderProvider>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Runtime for connection tasks; defaults to the caller's runtime
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, events: EventSink) -> Result<Arc<dyn TransportHandle>> {
        let runtime = match &self.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current().map_err(|e| LiveSocketError::Runtime(e.to_string()))?,
        };

        let (tx, rx) = unbounded_channel();
        let state = Arc::new(AtomicReadyState::new(ReadyState::Connecting));

        runtime.spawn(run_connection(
            url.to_string(),
            self.headers.clone(),
            Arc::clone(&state),
            rx,
            events,
        ));

        Ok(Arc::new(WsHandle { tx, state }))
    }
}

/// Handle to one WebSocket connection task
pub struct WsHandle {
    tx: UnboundedSender<Outbound>,
    state: Arc<AtomicReadyState>,
}

impl TransportHandle for WsHandle {
    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send(&self, text: &str) -> Result<()> {
        if !self.state.is_open() {
            return Err(LiveSocketError::NotConnected);
        }
        self.tx
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| LiveSocketError::ConnectionClosed("connection task has exited".to_string()))
    }

    fn close(&self, code: u16, reason: &str) {
        let was_active = self.state.get().is_active();
        if !was_active {
            return;
        }
        self.state.set(ReadyState::Closing);
        // Task already gone means the socket is already closed
        let _ = self.tx.send(Outbound::Close(code, reason.to_string()));
    }
}

async fn connect(
    url: &str,
    headers: Option<&Arc<dyn HeaderProvider>>,
) -> std::result::Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tokio_tungstenite::tungstenite::Error,
> {
    let Some(header_provider) = headers else {
        return connect_async(url).await.map(|(stream, _)| stream);
    };

    let headers = header_provider.get_headers().await;
    let mut request = url.into_client_request()?;
    for (key, value) in headers {
        match key.parse::<http::header::HeaderName>() {
            Ok(header_name) => match value.parse::<http::header::HeaderValue>() {
                Ok(header_value) => {
                    request.headers_mut().insert(header_name, header_value);
                }
                Err(_) => warn!("Invalid header value for key '{}': {}", key, value),
            },
            Err(_) => warn!("Invalid header name: {}", key),
        }
    }

    debug!("Connecting with custom headers");
    connect_async(request).await.map(|(stream, _)| stream)
}

async fn run_connection(
    url: String,
    headers: Option<Arc<dyn HeaderProvider>>,
    state: Arc<AtomicReadyState>,
    mut commands: UnboundedReceiver<Outbound>,
    events: EventSink,
) {
    let stream = match connect(&url, headers.as_ref()).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            state.set(ReadyState::Closed);
            let description = e.to_string();
            events.errored(&description);
            events.closed(CLOSE_ABNORMAL, &description);
            return;
        }
    };

    let (mut write, mut read) = stream.split();

    if !state.transition(ReadyState::Connecting, ReadyState::Open) {
        debug!("Handle closed during handshake, dropping connection");
        let _ = write.close().await;
        state.set(ReadyState::Closed);
        return;
    }
    events.opened();

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => events.message(&text),
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            None => (CLOSE_NO_STATUS, String::new()),
                        };
                        debug!("Server closed connection ({}): {}", code, reason);
                        state.set(ReadyState::Closed);
                        events.closed(code, &reason);
                        return;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!("Ignoring {} byte binary frame", data.len());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket read error: {}", e);
                        state.set(ReadyState::Closed);
                        let description = e.to_string();
                        events.errored(&description);
                        events.closed(CLOSE_ABNORMAL, &description);
                        return;
                    }
                    None => {
                        state.set(ReadyState::Closed);
                        events.closed(CLOSE_ABNORMAL, "Connection dropped");
                        return;
                    }
                }
            }
            command = commands.recv() => {
                match command {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            error!("WebSocket write error: {}", e);
                            state.set(ReadyState::Closed);
                            let description = e.to_string();
                            events.errored(&description);
                            events.closed(CLOSE_ABNORMAL, &description);
                            return;
                        }
                    }
                    Some(Outbound::Close(code, reason)) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.clone().into(),
                        };
                        if let Err(e) = write.send(Message::Close(Some(frame))).await {
                            debug!("Close frame not delivered: {}", e);
                        }
                        state.set(ReadyState::Closed);
                        events.closed(code, &reason);
                        return;
                    }
                    None => {
                        debug!("Handle dropped, closing connection");
                        let _ = write.close().await;
                        state.set(ReadyState::Closed);
                        return;
                    }
                }
            }
        }
    }
}
