use thiserror::Error;

/// Main error type for livesockets
///
/// None of these cross the public connection API: the manager funnels them
/// into logs and status callbacks. They surface only from construction and
/// from the transport seam.
#[derive(Error, Debug)]
pub enum LiveSocketError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Handle is not open for writing
    #[error("Not connected")]
    NotConnected,

    /// Message could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Inbound frame violated the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No async runtime available for timers and transport tasks
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type for livesockets operations
pub type Result<T> = std::result::Result<T, LiveSocketError>;
