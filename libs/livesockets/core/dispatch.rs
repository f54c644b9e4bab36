//! Ordered, re-entrant notification delivery
//!
//! Transitions happen under the manager's state lock, but user code must
//! never run under it: a callback that calls `send()` would deadlock.
//! Notifications are therefore pushed onto an unbounded crossbeam channel
//! while the lock is held (which fixes their order) and delivered after it
//! is released by whichever thread wins the `draining` flag. A callback
//! that triggers further notifications only enqueues them; the active
//! drainer delivers them once the current callback returns.

use crate::core::connection_state::ConnectionStatusEvent;
use crate::traits::InboundMessage;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

pub type StatusCallback = Arc<dyn Fn(&ConnectionStatusEvent) + Send + Sync>;
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;
pub type DisconnectCallback = Arc<dyn Fn(u16, &str) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type MessageCallback = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

/// Named lifecycle callbacks, fixed at build time
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_connect: Option<ConnectCallback>,
    pub on_disconnect: Option<DisconnectCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_message: Option<MessageCallback>,
    pub on_status_change: Option<StatusCallback>,
}

/// Token returned by `on()`, used to unregister with `off()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone)]
pub(crate) enum Notification {
    Status(ConnectionStatusEvent),
    Connected,
    Disconnected { code: u16, reason: String },
    Error(String),
    Message(InboundMessage),
}

pub(crate) struct Dispatcher {
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
    draining: AtomicBool,
    callbacks: Callbacks,
    listeners: RwLock<HashMap<String, Vec<(ListenerId, MessageCallback)>>>,
    next_listener: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn new(callbacks: Callbacks) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            draining: AtomicBool::new(false),
            callbacks,
            listeners: RwLock::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Queue a notification; call while holding the state lock
    pub(crate) fn push(&self, notification: Notification) {
        // Both ends live in self, so the channel cannot be disconnected
        let _ = self.tx.send(notification);
    }

    /// Deliver everything queued; call after releasing the state lock
    pub(crate) fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return;
            }

            while let Ok(notification) = self.rx.try_recv() {
                self.deliver(notification);
            }

            self.draining.store(false, Ordering::SeqCst);

            // Another thread may have pushed after our last try_recv but
            // before we released the flag
            if self.rx.is_empty() {
                return;
            }
        }
    }

    pub(crate) fn add_listener(&self, kind: &str, listener: MessageCallback) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(kind.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn remove_listener(&self, kind: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(registered) = listeners.get_mut(kind) else {
            return false;
        };

        let before = registered.len();
        registered.retain(|(existing, _)| *existing != id);
        let removed = registered.len() != before;
        if registered.is_empty() {
            listeners.remove(kind);
        }
        removed
    }

    pub(crate) fn clear_listeners(&self) {
        self.listeners.write().clear();
    }

    pub(crate) fn listener_count(&self, kind: &str) -> usize {
        self.listeners.read().get(kind).map_or(0, Vec::len)
    }

    fn deliver(&self, notification: Notification) {
        let result = catch_unwind(AssertUnwindSafe(|| match &notification {
            Notification::Status(event) => {
                if let Some(cb) = &self.callbacks.on_status_change {
                    cb(event);
                }
            }
            Notification::Connected => {
                if let Some(cb) = &self.callbacks.on_connect {
                    cb();
                }
            }
            Notification::Disconnected { code, reason } => {
                if let Some(cb) = &self.callbacks.on_disconnect {
                    cb(*code, reason);
                }
            }
            Notification::Error(description) => {
                if let Some(cb) = &self.callbacks.on_error {
                    cb(description);
                }
            }
            Notification::Message(message) => {
                // Snapshot so listeners may call on()/off() while running
                let listeners: Vec<MessageCallback> = self
                    .listeners
                    .read()
                    .get(message.kind())
                    .map(|registered| registered.iter().map(|(_, l)| Arc::clone(l)).collect())
                    .unwrap_or_default();

                debug!(
                    "Dispatching '{}' to {} listener(s)",
                    message.kind(),
                    listeners.len()
                );
                for listener in listeners {
                    listener(message);
                }
                if let Some(cb) = &self.callbacks.on_message {
                    cb(message);
                }
            }
        }));

        if result.is_err() {
            error!("Callback panicked while handling {:?}", notification);
        }
    }
}
