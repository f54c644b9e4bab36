//! # Connection manager core
//!
//! ## Example
//!
//! ```rust,ignore
//! use livesockets::{OutboundMessage, InboundMessage};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> livesockets::Result<()> {
//!     let manager = livesockets::builder()
//!         .url("wss://collab.example.com/ws")
//!         .token("secret")
//!         .heartbeat(Duration::from_secs(30), 3)
//!         .on_status_change(|event| println!("status: {}", event.status))
//!         .build()?;
//!
//!     manager.on("document_update", |message: &InboundMessage| {
//!         println!("update: {:?}", message);
//!     });
//!
//!     // Queued until the connection opens
//!     manager.join_session("doc-42", Some("ada"));
//!     manager.connect();
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub(crate) mod dispatch;
pub mod heartbeat;
pub mod pong_tracker;
pub mod queue;
pub mod ws_transport;

// Re-export main types
pub use builder::{states, ConnectionManagerBuilder};
pub use client::{ConnectionManager, EventSink, CLOSE_HEARTBEAT_TIMEOUT};
pub use config::{ConfigError, ConnectionOptions};
pub use connection_state::{
    AtomicMetrics, AtomicReadyState, ConnectionMetrics, ConnectionState, ConnectionStatusEvent,
};
pub use dispatch::{
    ConnectCallback, DisconnectCallback, ErrorCallback, ListenerId, MessageCallback,
    StatusCallback,
};
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor};
pub use pong_tracker::PongTracker;
pub use queue::MessageQueue;
pub use ws_transport::{WsHandle, WsTransport};

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new connection manager builder
pub fn builder() -> ConnectionManagerBuilder<builder::states::NoUrl> {
    ConnectionManagerBuilder::new()
}
