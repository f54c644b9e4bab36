use crate::client::ConnectionManager;
use crate::traits::OutboundMessage;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

fn to_payload<T: Serialize>(what: &str, value: T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Cannot serialize {} payload: {}", what, e);
            None
        }
    }
}

impl ConnectionManager {
    /// Join a room
    ///
    /// The session id is recorded immediately, before the server confirms.
    /// Queued like any other message when disconnected.
    pub fn join_session(&self, session_id: impl Into<String>, username: Option<&str>) {
        let session_id = session_id.into();
        let username = username.map(str::to_string);
        self.shared.locked(|shared, inner| {
            info!("Joining session {}", session_id);
            inner.session_id = Some(session_id.clone());
            inner.session_username = username.clone();
            shared.send_locked(
                inner,
                OutboundMessage::JoinSession {
                    session_id,
                    username,
                },
            );
        });
    }

    /// Leave the active session; no-op without one
    pub fn leave_session(&self) {
        self.shared.locked(|shared, inner| {
            let Some(session_id) = inner.session_id.take() else {
                debug!("leave_session() ignored: no active session");
                return;
            };
            info!("Leaving session {}", session_id);
            inner.session_username = None;
            shared.send_locked(inner, OutboundMessage::LeaveSession);
        });
    }

    fn session_active(&self) -> bool {
        self.shared.state.lock().session_id.is_some()
    }

    /// Broadcast a document update; requires an active session
    pub fn send_update<T: Serialize>(&self, update: T) {
        if !self.session_active() {
            error!("Cannot send update: no active session");
            return;
        }
        if let Some(update) = to_payload("update", update) {
            self.send(OutboundMessage::Update { update });
        }
    }

    /// Post a comment; requires an active session
    pub fn send_comment<T: Serialize>(&self, comment: T) {
        if !self.session_active() {
            error!("Cannot send comment: no active session");
            return;
        }
        if let Some(comment) = to_payload("comment", comment) {
            self.send(OutboundMessage::Comment { comment });
        }
    }

    /// Best-effort cursor broadcast; dropped without a session
    pub fn send_cursor_update<P, S>(&self, position: P, selection: Option<S>)
    where
        P: Serialize,
        S: Serialize,
    {
        if !self.session_active() {
            return;
        }
        let Some(position) = to_payload("cursor", position) else {
            return;
        };
        let selection = match selection {
            Some(selection) => match to_payload("selection", selection) {
                Some(selection) => Some(selection),
                None => return,
            },
            None => None,
        };
        self.send(OutboundMessage::Cursor {
            position,
            selection,
        });
    }

    /// Best-effort presence broadcast; dropped without a session
    pub fn send_presence_update<T: Serialize>(&self, state: T) {
        if !self.session_active() {
            return;
        }
        if let Some(state) = to_payload("presence", state) {
            self.send(OutboundMessage::Presence { state });
        }
    }
}
