//! Outbound buffer for messages produced while disconnected

use crate::traits::{OutboundMessage, TransportHandle};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// FIFO of messages waiting for a live handle
#[derive(Debug, Default)]
pub struct MessageQueue {
    items: VecDeque<OutboundMessage>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, message: OutboundMessage) {
        self.items.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drain through `handle` in order
    ///
    /// Stops at the first item that cannot be written; that item and
    /// everything behind it stay queued. Messages that fail to encode are
    /// logged and discarded since no retry can fix them. Returns the number
    /// of frames written.
    pub fn flush(&mut self, handle: &dyn TransportHandle) -> usize {
        let mut written = 0;

        while let Some(message) = self.items.front() {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    warn!("Discarding queued '{}' message: {}", message.kind(), e);
                    self.items.pop_front();
                    continue;
                }
            };

            if let Err(e) = handle.send(&text) {
                warn!(
                    "Flush stopped with {} message(s) still queued: {}",
                    self.items.len(),
                    e
                );
                break;
            }

            self.items.pop_front();
            written += 1;
        }

        if written > 0 {
            debug!("Flushed {} queued message(s)", written);
        }
        written
    }

    /// Keep only the messages matching `keep`; returns how many were dropped
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&OutboundMessage) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|message| keep(message));
        before - self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutboundMessage> {
        self.items.iter()
    }
}
