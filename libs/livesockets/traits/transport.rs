//! Transport seam
//!
//! The manager never talks to a socket directly. It asks a [`Transport`]
//! for a handle and receives the handle's lifecycle through an
//! [`EventSink`], the same open / close / error / message callbacks a
//! browser socket exposes.

use crate::core::EventSink;
use crate::error::Result;
use std::sync::Arc;

/// Close code for a normal, intentional closure
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when the connection dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Readiness of a transport handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }

    /// A handle in this state still counts as a live connection attempt
    pub fn is_active(self) -> bool {
        matches!(self, ReadyState::Connecting | ReadyState::Open)
    }
}

/// One full-duplex connection
pub trait TransportHandle: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// Write a text frame; fails when the handle cannot accept it
    fn send(&self, text: &str) -> Result<()>;

    /// Start closing; the handle reports the final close through its sink
    fn close(&self, code: u16, reason: &str);
}

/// Factory for transport handles
pub trait Transport: Send + Sync {
    /// Begin opening a connection to `url`
    ///
    /// The returned handle starts in [`ReadyState::Connecting`]. Events for
    /// it must be reported through `events`, in order, and never from
    /// inside `open` itself: the manager holds its state lock across this
    /// call. An `Err` means the attempt could not even be started.
    fn open(&self, url: &str, events: EventSink) -> Result<Arc<dyn TransportHandle>>;
}
