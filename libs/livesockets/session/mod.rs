//! Session and presence helpers
//!
//! A thin protocol on top of `send()`: joining a collaborative room,
//! document updates, cursor and presence broadcasts, and comments.
//! Updates and comments require an active session and log an error
//! without one; cursor and presence broadcasts are best-effort and
//! silently dropped.

pub mod session;
