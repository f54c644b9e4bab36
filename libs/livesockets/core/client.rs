use crate::config::ConnectionOptions;
use crate::connection_state::{
    AtomicMetrics, ConnectionMetrics, ConnectionState, ConnectionStatusEvent,
};
use crate::core::dispatch::{Dispatcher, ListenerId, MessageCallback, Notification};
use crate::core::heartbeat::{HeartbeatAction, HeartbeatMonitor};
use crate::core::pong_tracker::PongTracker;
use crate::core::queue::MessageQueue;
use crate::traits::*;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Close code sent when the heartbeat declares a handle dead
pub const CLOSE_HEARTBEAT_TIMEOUT: u16 = 4000;

/// Default close reason for `disconnect()`
pub const DEFAULT_CLOSE_REASON: &str = "Client disconnected";

const SUPERSEDED_REASON: &str = "Superseded by a new connection";

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Resilient connection manager
///
/// A stable message-passing API over an unreliable transport:
/// - Exponential-backoff reconnection with a retry ceiling
/// - Heartbeat pings with a missed-beat threshold
/// - FIFO queue for messages produced while disconnected
/// - Session/presence helpers for collaborative rooms
///
/// Cloning is cheap and every clone drives the same connection. Nothing in
/// the public API returns an error: failures go to the logs and to the
/// status / error callbacks.
#[derive(Clone)]
pub struct ConnectionManager {
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    url: String,
    auto_reconnect: bool,
    rejoin_session: bool,
    strategy: Box<dyn ReconnectionStrategy>,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    pub(crate) state: Mutex<Inner>,
    dispatcher: Dispatcher,
    metrics: AtomicMetrics,
}

/// Everything mutated by transitions, behind one lock
pub(crate) struct Inner {
    status: ConnectionState,
    last_event: Option<ConnectionStatusEvent>,
    handle: Option<Arc<dyn TransportHandle>>,
    /// Identifies the current handle; events tagged with an older value are ignored
    generation: u64,
    reconnect_attempts: u32,
    reconnect_timer: Option<JoinHandle<()>>,
    reconnect_epoch: u64,
    connection_start: Option<Instant>,
    last_message_time: i64,
    queue: MessageQueue,
    heartbeat: HeartbeatMonitor,
    pong: PongTracker,
    pub(crate) token: Option<String>,
    pub(crate) client_id: Option<String>,
    pub(crate) session_id: Option<String>,
    pub(crate) session_username: Option<String>,
}

/// Where a transport reports the lifecycle of one handle
///
/// Each sink is bound to the handle it was created for; once the manager
/// has moved on to a newer handle, reports through an old sink are ignored.
#[derive(Clone)]
pub struct EventSink {
    shared: Weak<Shared>,
    generation: u64,
}

impl EventSink {
    pub fn opened(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_open(self.generation);
        }
    }

    pub fn closed(&self, code: u16, reason: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_close(self.generation, code, reason);
        }
    }

    pub fn errored(&self, description: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_error(self.generation, description);
        }
    }

    pub fn message(&self, text: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_message(self.generation, text);
        }
    }

    /// False once the manager is gone or has replaced this handle
    pub fn is_current(&self) -> bool {
        self.shared
            .upgrade()
            .map_or(false, |shared| shared.state.lock().generation == self.generation)
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("generation", &self.generation)
            .finish()
    }
}

impl ConnectionManager {
    pub(crate) fn new(
        options: ConnectionOptions,
        strategy: Box<dyn ReconnectionStrategy>,
        transport: Arc<dyn Transport>,
        callbacks: crate::core::dispatch::Callbacks,
        runtime: Handle,
    ) -> Self {
        let inner = Inner {
            status: ConnectionState::Disconnected,
            last_event: None,
            handle: None,
            generation: 0,
            reconnect_attempts: 0,
            reconnect_timer: None,
            reconnect_epoch: 0,
            connection_start: None,
            last_message_time: 0,
            queue: MessageQueue::new(),
            heartbeat: HeartbeatMonitor::new(
                options.heartbeat_interval(),
                options.max_missed_heartbeats,
            ),
            pong: PongTracker::new(),
            token: options.token.clone(),
            client_id: None,
            session_id: None,
            session_username: None,
        };

        Self {
            shared: Arc::new(Shared {
                url: options.url,
                auto_reconnect: options.auto_reconnect,
                rejoin_session: options.rejoin_session_on_reconnect,
                strategy,
                transport,
                runtime,
                state: Mutex::new(inner),
                dispatcher: Dispatcher::new(callbacks),
                metrics: AtomicMetrics::new(),
            }),
        }
    }

    /// Open a connection
    ///
    /// No-op while a handle is connecting or open. Otherwise the retry
    /// counter is reset, so this is also how a caller resumes after the
    /// retry ceiling was hit.
    pub fn connect(&self) {
        self.shared.locked(|shared, inner| shared.connect_locked(inner));
    }

    /// Close the connection and stop any pending retry
    ///
    /// Leaves the active session first. Safe to call repeatedly.
    pub fn disconnect(&self, code: Option<u16>, reason: Option<&str>) {
        let code = code.unwrap_or(CLOSE_NORMAL);
        let reason = reason.unwrap_or(DEFAULT_CLOSE_REASON);
        self.shared
            .locked(|shared, inner| shared.disconnect_locked(inner, code, reason));
    }

    /// Send now if connected, otherwise queue (and start connecting)
    pub fn send(&self, message: OutboundMessage) {
        self.shared
            .locked(|shared, inner| shared.send_locked(inner, message));
    }

    /// Set the auth token; sent immediately when connected and on every later open
    pub fn authenticate(&self, token: impl Into<String>) {
        let token = token.into();
        self.shared.locked(|shared, inner| {
            inner.token = Some(token.clone());
            if inner.status == ConnectionState::Connected {
                shared.send_locked(inner, OutboundMessage::Auth { token });
            }
        });
    }

    /// Register a listener for inbound messages of `kind`
    pub fn on<F>(&self, kind: &str, listener: F) -> ListenerId
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        let listener: MessageCallback = Arc::new(listener);
        self.shared.dispatcher.add_listener(kind, listener)
    }

    /// Remove a listener; returns false if it was not registered for `kind`
    pub fn off(&self, kind: &str, id: ListenerId) -> bool {
        self.shared.dispatcher.remove_listener(kind, id)
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.shared.dispatcher.listener_count(kind)
    }

    /// Disconnect and drop every listener
    pub fn dispose(&self) {
        self.disconnect(None, None);
        self.shared.dispatcher.clear_listeners();
    }

    pub fn is_connected(&self) -> bool {
        let inner = self.shared.state.lock();
        inner.status == ConnectionState::Connected
            && inner
                .handle
                .as_ref()
                .map_or(false, |h| h.ready_state() == ReadyState::Open)
    }

    pub fn client_id(&self) -> Option<String> {
        self.shared.state.lock().client_id.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.state.lock().session_id.clone()
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.shared.state.lock().status
    }

    pub fn connection_metrics(&self) -> ConnectionMetrics {
        let inner = self.shared.state.lock();
        let uptime = match (inner.status, inner.connection_start) {
            (ConnectionState::Connected, Some(start)) => start.elapsed(),
            _ => Duration::ZERO,
        };

        ConnectionMetrics {
            status: inner.status,
            uptime,
            reconnect_attempts: inner.reconnect_attempts,
            last_message_time: inner.last_message_time,
            queued_messages: inner.queue.len(),
            messages_sent: self.shared.metrics.messages_sent(),
            messages_received: self.shared.metrics.messages_received(),
            missed_heartbeats: inner.heartbeat.missed(),
            last_round_trip: inner.pong.last_round_trip(),
            smoothed_round_trip: inner.pong.smoothed_round_trip(),
            round_trip_samples: inner.pong.samples(),
            last_ping_time: inner.pong.last_ping_sent(),
        }
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }
}

impl Shared {
    /// Run `f` under the state lock, then deliver whatever it queued
    pub(crate) fn locked<R>(self: &Arc<Self>, f: impl FnOnce(&Arc<Self>, &mut Inner) -> R) -> R {
        let result = {
            let mut inner = self.state.lock();
            f(self, &mut *inner)
        };
        self.dispatcher.drain();
        result
    }

    fn transition(&self, inner: &mut Inner, event: ConnectionStatusEvent) {
        inner.status = event.status;

        if let Some(last) = &inner.last_event {
            if last.same_as(&event) {
                debug!("Suppressing duplicate '{}' status", event.status);
                return;
            }
        }

        debug!("Status -> {}", event.status);
        inner.last_event = Some(event.clone());
        self.dispatcher.push(Notification::Status(event));
    }

    fn handle_is_active(inner: &Inner) -> bool {
        inner
            .handle
            .as_ref()
            .map_or(false, |h| h.ready_state().is_active())
    }

    pub(crate) fn connect_locked(self: &Arc<Self>, inner: &mut Inner) {
        if Self::handle_is_active(inner) {
            debug!("connect() ignored: a connection is already in progress");
            return;
        }

        self.cancel_reconnect(inner);
        inner.reconnect_attempts = 0;
        self.open_transport(inner);
    }

    /// Open a fresh handle without touching the retry counter
    fn open_transport(self: &Arc<Self>, inner: &mut Inner) {
        // The old handle's ticker must not judge the new one
        inner.heartbeat.stop();
        inner.generation += 1;
        if let Some(stale) = inner.handle.take() {
            if stale.ready_state().is_active() {
                stale.close(CLOSE_NORMAL, SUPERSEDED_REASON);
            }
            if inner.status == ConnectionState::Connected {
                // Died without a close report; its sink is fenced off now
                info!("Abandoning a connection that stopped reporting");
                self.transition(
                    inner,
                    ConnectionStatusEvent::new(ConnectionState::Disconnected)
                        .with_close(CLOSE_ABNORMAL, SUPERSEDED_REASON),
                );
                self.dispatcher.push(Notification::Disconnected {
                    code: CLOSE_ABNORMAL,
                    reason: SUPERSEDED_REASON.to_string(),
                });
            }
        }

        inner.connection_start = Some(Instant::now());
        self.transition(inner, ConnectionStatusEvent::new(ConnectionState::Connecting));

        let sink = EventSink {
            shared: Arc::downgrade(self),
            generation: inner.generation,
        };

        info!("Connecting to {}", self.url);
        match self.transport.open(&self.url, sink) {
            Ok(handle) => inner.handle = Some(handle),
            Err(e) => {
                error!("Failed to open transport: {}", e);
                let description = e.to_string();
                self.error_locked(inner, &description);
                self.close_locked(inner, CLOSE_ABNORMAL, &description);
            }
        }
    }

    fn handle_open(self: &Arc<Self>, generation: u64) {
        self.locked(|shared, inner| {
            if generation != inner.generation || inner.handle.is_none() {
                debug!("Ignoring open from a superseded handle");
                return;
            }

            info!("Connected to {}", shared.url);
            shared.transition(inner, ConnectionStatusEvent::new(ConnectionState::Connected));
            inner.reconnect_attempts = 0;
            inner.connection_start = Some(Instant::now());
            inner.last_message_time = now_ms();
            inner.pong.reset();

            if let Some(token) = inner.token.clone() {
                shared.send_locked(inner, OutboundMessage::Auth { token });
                debug!("Sent authentication message");
            }

            shared.rejoin_session_locked(inner);

            if let Some(handle) = inner.handle.clone() {
                let written = inner.queue.flush(handle.as_ref());
                shared.metrics.add_sent(written as u64);
            }

            shared.start_heartbeat(inner);
            shared.dispatcher.push(Notification::Connected);
        });
    }

    fn handle_close(self: &Arc<Self>, generation: u64, code: u16, reason: &str) {
        self.locked(|shared, inner| {
            if generation != inner.generation || inner.handle.is_none() {
                debug!("Ignoring close {} from a superseded handle", code);
                return;
            }
            shared.close_locked(inner, code, reason);
        });
    }

    fn handle_error(self: &Arc<Self>, generation: u64, description: &str) {
        self.locked(|shared, inner| {
            if generation != inner.generation {
                debug!("Ignoring error from a superseded handle: {}", description);
                return;
            }
            shared.error_locked(inner, description);
        });
    }

    fn handle_message(self: &Arc<Self>, generation: u64, text: &str) {
        self.locked(|shared, inner| {
            if generation != inner.generation {
                return;
            }

            inner.last_message_time = now_ms();
            inner.heartbeat.reset_missed();
            shared.metrics.increment_received();

            let message = match InboundMessage::parse(text) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Dropping malformed frame: {}", e);
                    return;
                }
            };

            match &message {
                InboundMessage::Welcome { client_id } => {
                    info!("Server assigned client id {}", client_id);
                    inner.client_id = Some(client_id.clone());
                }
                InboundMessage::Pong {
                    original_timestamp: Some(original),
                } => {
                    if let Some(rtt) = inner.pong.record_pong(*original, now_ms()) {
                        debug!("Heartbeat round trip: {:?}", rtt);
                    }
                }
                _ => {}
            }

            shared.dispatcher.push(Notification::Message(message));
        });
    }

    fn error_locked(&self, inner: &mut Inner, description: &str) {
        warn!("Connection error: {}", description);
        self.transition(
            inner,
            ConnectionStatusEvent::new(ConnectionState::Error).with_reason(description),
        );
        self.dispatcher.push(Notification::Error(description.to_string()));
    }

    fn close_locked(self: &Arc<Self>, inner: &mut Inner, code: u16, reason: &str) {
        inner.heartbeat.stop();
        inner.handle = None;
        inner.connection_start = None;

        info!("Connection closed ({}): {}", code, reason);
        self.transition(
            inner,
            ConnectionStatusEvent::new(ConnectionState::Disconnected).with_close(code, reason),
        );
        self.dispatcher.push(Notification::Disconnected {
            code,
            reason: reason.to_string(),
        });

        if code != CLOSE_NORMAL && self.auto_reconnect {
            self.schedule_reconnect(inner);
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, inner: &mut Inner) {
        let attempt = inner.reconnect_attempts + 1;
        let Some(delay) = self.strategy.next_delay(attempt) else {
            error!(
                "Giving up after {} reconnection attempts; call connect() to retry",
                inner.reconnect_attempts
            );
            return;
        };

        self.cancel_reconnect(inner);
        inner.reconnect_attempts = attempt;
        self.transition(
            inner,
            ConnectionStatusEvent::new(ConnectionState::Reconnecting).with_attempt(attempt),
        );

        let epoch = inner.reconnect_epoch;
        let weak = Arc::downgrade(self);
        inner.reconnect_timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire_reconnect(epoch);
            }
        }));

        info!("Reconnecting in {:?} (attempt {})", delay, attempt);
    }

    fn fire_reconnect(self: &Arc<Self>, epoch: u64) {
        self.locked(|shared, inner| {
            if epoch != inner.reconnect_epoch {
                debug!("Ignoring superseded reconnect timer");
                return;
            }
            inner.reconnect_timer = None;

            if Self::handle_is_active(inner) {
                debug!("Reconnect timer fired while a connection is in progress");
                return;
            }
            shared.open_transport(inner);
        });
    }

    fn cancel_reconnect(&self, inner: &mut Inner) {
        inner.reconnect_epoch += 1;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
            debug!("Cancelled pending reconnect");
        }
    }

    fn start_heartbeat(self: &Arc<Self>, inner: &mut Inner) {
        let weak = Arc::downgrade(self);
        inner.heartbeat.start(&self.runtime, move |epoch| match weak.upgrade() {
            Some(shared) => shared.heartbeat_tick(epoch),
            None => false,
        });
    }

    /// Returns false when the ticker should stop
    fn heartbeat_tick(self: &Arc<Self>, epoch: u64) -> bool {
        self.locked(|shared, inner| {
            if epoch != inner.heartbeat.epoch() {
                return false;
            }

            let handle = inner.handle.clone();
            let open = handle
                .as_ref()
                .map_or(false, |h| h.ready_state() == ReadyState::Open);

            match inner.heartbeat.on_tick(open) {
                HeartbeatAction::Ping => {
                    let timestamp = now_ms();
                    let ping = OutboundMessage::Ping { timestamp };
                    if let (Some(handle), Ok(text)) = (handle, ping.encode()) {
                        match handle.send(&text) {
                            Ok(()) => {
                                inner.pong.record_ping_sent(timestamp);
                                shared.metrics.increment_sent();
                                debug!("Heartbeat ping sent");
                            }
                            Err(e) => warn!("Failed to send heartbeat ping: {}", e),
                        }
                    }
                    true
                }
                HeartbeatAction::Missed(missed) => {
                    warn!("Heartbeat missed: connection not open ({} in a row)", missed);
                    true
                }
                HeartbeatAction::Dead(missed) => {
                    warn!("Connection presumed dead after {} missed heartbeats", missed);
                    shared.force_reconnect(inner);
                    false
                }
            }
        })
    }

    /// Abandon a handle that stopped reporting open without closing
    fn force_reconnect(self: &Arc<Self>, inner: &mut Inner) {
        inner.generation += 1;
        if let Some(dead) = inner.handle.take() {
            dead.close(CLOSE_HEARTBEAT_TIMEOUT, "Heartbeat timeout");
        }
        // The dead handle's own close report is now fenced off, so run the
        // close path ourselves
        self.close_locked(inner, CLOSE_HEARTBEAT_TIMEOUT, "Heartbeat timeout");
    }

    pub(crate) fn send_locked(self: &Arc<Self>, inner: &mut Inner, message: OutboundMessage) {
        if inner.status == ConnectionState::Connected {
            if let Some(handle) = inner.handle.clone() {
                let text = match message.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Cannot encode '{}' message: {}", message.kind(), e);
                        return;
                    }
                };

                match handle.send(&text) {
                    Ok(()) => {
                        self.metrics.increment_sent();
                        return;
                    }
                    Err(e) => {
                        warn!("Send failed, queueing '{}' message: {}", message.kind(), e);
                        inner.queue.enqueue(message);
                        return;
                    }
                }
            }
        }

        debug!(
            "Not connected, queueing '{}' message ({} queued)",
            message.kind(),
            inner.queue.len() + 1
        );
        inner.queue.enqueue(message);

        let attempt_in_flight = matches!(
            inner.status,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        );
        if !attempt_in_flight {
            self.connect_locked(inner);
        }
    }

    fn rejoin_session_locked(self: &Arc<Self>, inner: &mut Inner) {
        if !self.rejoin_session {
            return;
        }
        let Some(session_id) = inner.session_id.clone() else {
            return;
        };
        let join_queued = inner
            .queue
            .iter()
            .any(|m| matches!(m, OutboundMessage::JoinSession { .. }));
        if join_queued {
            return;
        }

        info!("Rejoining session {}", session_id);
        let username = inner.session_username.clone();
        self.send_locked(
            inner,
            OutboundMessage::JoinSession {
                session_id,
                username,
            },
        );
    }

    fn disconnect_locked(self: &Arc<Self>, inner: &mut Inner, code: u16, reason: &str) {
        let idle = inner.handle.is_none()
            && inner.reconnect_timer.is_none()
            && inner.status == ConnectionState::Disconnected;

        self.cancel_reconnect(inner);
        inner.heartbeat.stop();

        if inner.session_id.is_some() {
            if inner.status == ConnectionState::Connected {
                self.send_locked(inner, OutboundMessage::LeaveSession);
            }
            inner.session_id = None;
            inner.session_username = None;
        }
        inner.client_id = None;

        let dropped = inner.queue.retain(|m| !m.is_session_scoped());
        if dropped > 0 {
            debug!("Dropped {} queued session message(s)", dropped);
        }

        if idle {
            debug!("disconnect() ignored: already disconnected");
            return;
        }

        let handle = inner.handle.take();
        inner.generation += 1;
        inner.connection_start = None;
        if let Some(handle) = &handle {
            handle.close(code, reason);
        }

        info!("Disconnected ({}): {}", code, reason);
        self.transition(
            inner,
            ConnectionStatusEvent::new(ConnectionState::Disconnected).with_close(code, reason),
        );
        if handle.is_some() {
            self.dispatcher.push(Notification::Disconnected {
                code,
                reason: reason.to_string(),
            });
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.state.get_mut();
        inner.reconnect_epoch += 1;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        inner.heartbeat.stop();
        if let Some(handle) = inner.handle.take() {
            handle.close(CLOSE_NORMAL, DEFAULT_CLOSE_REASON);
        }
    }
}
