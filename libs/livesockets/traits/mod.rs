//! # LiveSockets Traits
//!
//! Core traits and types shared by the connection manager:
//!
//! - **Transport / TransportHandle**: the socket seam
//! - **ReconnectionStrategy**: retry delays and the attempt ceiling
//! - **HeaderProvider**: handshake headers for the WebSocket transport
//! - **OutboundMessage / InboundMessage**: the JSON wire protocol

pub mod error;
pub mod headers;
pub mod message;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{LiveSocketError, Result};
pub use headers::{HeaderProvider, Headers, NoHeaders};
pub use message::{InboundMessage, OutboundMessage};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use transport::{ReadyState, Transport, TransportHandle, CLOSE_ABNORMAL, CLOSE_NORMAL};
