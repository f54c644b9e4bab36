use crate::traits::ReadyState;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

/// Connection state as seen by consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification emitted on every state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatusEvent {
    pub status: ConnectionState,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Present only for `Reconnecting`
    pub attempt: Option<u32>,
    pub code: Option<u16>,
    pub reason: Option<String>,
}

impl ConnectionStatusEvent {
    pub fn new(status: ConnectionState) -> Self {
        Self {
            status,
            timestamp: chrono::Utc::now().timestamp_millis(),
            attempt: None,
            code: None,
            reason: None,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_close(mut self, code: u16, reason: impl Into<String>) -> Self {
        self.code = Some(code);
        self.reason = Some(reason.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Same notification apart from the timestamp
    pub fn same_as(&self, other: &ConnectionStatusEvent) -> bool {
        self.status == other.status
            && self.attempt == other.attempt
            && self.code == other.code
            && self.reason == other.reason
    }
}

/// Read-only snapshot computed on demand
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionMetrics {
    pub status: ConnectionState,
    /// Time since the current connection began
    pub uptime: Duration,
    pub reconnect_attempts: u32,
    /// Epoch milliseconds of the last inbound frame (or open)
    pub last_message_time: i64,
    pub queued_messages: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub missed_heartbeats: u32,
    pub last_round_trip: Option<Duration>,
    /// Moving average over every pong since the connection opened
    pub smoothed_round_trip: Option<Duration>,
    pub round_trip_samples: u64,
    /// Epoch milliseconds of the last ping written
    pub last_ping_time: Option<i64>,
}

/// Lock-free ready state for transport handles
#[derive(Debug)]
pub struct AtomicReadyState {
    state: AtomicU8,
}

impl AtomicReadyState {
    pub fn new(state: ReadyState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to`; returns false if the state was something else
    pub fn transition(&self, from: ReadyState, to: ReadyState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.get() == ReadyState::Open
    }
}

/// Frame counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_sent(&self, count: u64) {
        self.messages_sent.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }
}
