//! # LiveSockets
//!
//! A resilient connection manager for real-time collaboration over
//! WebSockets.
//!
//! ## Features
//!
//! - **Automatic reconnection**: Exponential backoff with jitter and a retry ceiling
//! - **Heartbeat**: Periodic pings and a missed-beat threshold that forces a reconnect
//! - **Offline queue**: Messages sent while disconnected are delivered in order on open
//! - **Session helpers**: Join/leave, document updates, cursor, presence and comments
//! - **Pluggable transport**: tokio-tungstenite by default, in-memory for tests

pub mod traits;
pub mod core;
pub mod session;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use core::{
    builder, client, config, connection_state, heartbeat, pong_tracker, queue, ws_transport,
    builder::{states, ConnectionManagerBuilder},
    client::{ConnectionManager, EventSink, CLOSE_HEARTBEAT_TIMEOUT},
    config::{ConfigError, ConnectionOptions},
    connection_state::{ConnectionMetrics, ConnectionState, ConnectionStatusEvent},
    ListenerId, WsTransport,
};

// Convenience function
pub use core::builder as manager_builder;

/// Type alias for Result with LiveSocketError
pub type Result<T> = std::result::Result<T, traits::LiveSocketError>;
