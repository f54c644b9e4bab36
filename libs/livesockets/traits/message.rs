//! Wire messages
//!
//! Every frame is a JSON object with a string `type` discriminator. The
//! types the manager itself produces or interprets get their own variants;
//! anything else travels as an opaque passthrough.

use crate::error::{LiveSocketError, Result};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Outbound message kinds
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Heartbeat probe, stamped with epoch milliseconds
    Ping { timestamp: i64 },
    Auth { token: String },
    JoinSession {
        session_id: String,
        username: Option<String>,
    },
    LeaveSession,
    Update { update: Value },
    Cursor {
        position: Value,
        selection: Option<Value>,
    },
    Presence { state: Value },
    Comment { comment: Value },
    /// Application-defined message; `payload` fields sit next to `type`
    Custom {
        kind: String,
        payload: Map<String, Value>,
    },
}

impl OutboundMessage {
    /// Build an application message from a type and an object payload
    ///
    /// `payload` must be a JSON object or `null`.
    pub fn custom(kind: impl Into<String>, payload: Value) -> Result<Self> {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(LiveSocketError::Protocol(format!(
                    "message payload must be an object, got {}",
                    other
                )))
            }
        };
        Ok(OutboundMessage::Custom {
            kind: kind.into(),
            payload,
        })
    }

    /// Wrap an already-built `{type, ...}` object
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(LiveSocketError::Protocol("message must be a JSON object".into()));
        };
        match map.remove("type") {
            Some(Value::String(kind)) => Ok(OutboundMessage::Custom { kind, payload: map }),
            _ => Err(LiveSocketError::Protocol(
                "message is missing a string `type` field".into(),
            )),
        }
    }

    /// The `type` discriminator as it appears on the wire
    pub fn kind(&self) -> &str {
        match self {
            OutboundMessage::Ping { .. } => "ping",
            OutboundMessage::Auth { .. } => "auth",
            OutboundMessage::JoinSession { .. } => "join_session",
            OutboundMessage::LeaveSession => "leave_session",
            OutboundMessage::Update { .. } => "update",
            OutboundMessage::Cursor { .. } => "cursor",
            OutboundMessage::Presence { .. } => "presence",
            OutboundMessage::Comment { .. } => "comment",
            OutboundMessage::Custom { kind, .. } => kind,
        }
    }

    /// Only meaningful inside the session that was active when it was produced
    pub fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            OutboundMessage::JoinSession { .. }
                | OutboundMessage::LeaveSession
                | OutboundMessage::Update { .. }
                | OutboundMessage::Cursor { .. }
                | OutboundMessage::Presence { .. }
                | OutboundMessage::Comment { .. }
        )
    }

    pub fn to_value(&self) -> Value {
        match self {
            OutboundMessage::Ping { timestamp } => json!({"type": "ping", "timestamp": timestamp}),
            OutboundMessage::Auth { token } => json!({"type": "auth", "token": token}),
            OutboundMessage::JoinSession {
                session_id,
                username,
            } => {
                let mut value = json!({"type": "join_session", "sessionId": session_id});
                if let Some(username) = username {
                    value["username"] = Value::String(username.clone());
                }
                value
            }
            OutboundMessage::LeaveSession => json!({"type": "leave_session"}),
            OutboundMessage::Update { update } => json!({"type": "update", "update": update}),
            OutboundMessage::Cursor {
                position,
                selection,
            } => {
                let mut value = json!({"type": "cursor", "position": position});
                if let Some(selection) = selection {
                    value["selection"] = selection.clone();
                }
                value
            }
            OutboundMessage::Presence { state } => json!({"type": "presence", "state": state}),
            OutboundMessage::Comment { comment } => json!({"type": "comment", "comment": comment}),
            OutboundMessage::Custom { kind, payload } => {
                let mut map = Map::with_capacity(payload.len() + 1);
                map.insert("type".to_string(), Value::String(kind.clone()));
                for (key, value) in payload {
                    if key != "type" {
                        map.insert(key.clone(), value.clone());
                    }
                }
                Value::Object(map)
            }
        }
    }

    /// Serialize to a JSON text frame
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value())?)
    }
}

impl Serialize for OutboundMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Inbound message kinds
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Server greeting carrying the server-assigned client id
    Welcome { client_id: String },
    /// Heartbeat answer; echoes the ping timestamp when the server supports it
    Pong { original_timestamp: Option<i64> },
    /// Any other type, passed through uninterpreted
    Other { kind: String, body: Value },
}

impl InboundMessage {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| LiveSocketError::Protocol(format!("invalid JSON: {}", e)))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| LiveSocketError::Protocol("frame has no string `type` field".into()))?
            .to_string();

        match kind.as_str() {
            "welcome" => {
                let client_id = value
                    .get("clientId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LiveSocketError::Protocol("welcome without clientId".into()))?;
                Ok(InboundMessage::Welcome {
                    client_id: client_id.to_string(),
                })
            }
            "pong" => Ok(InboundMessage::Pong {
                original_timestamp: value.get("originalTimestamp").and_then(Value::as_i64),
            }),
            _ => Ok(InboundMessage::Other { kind, body: value }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::Welcome { .. } => "welcome",
            InboundMessage::Pong { .. } => "pong",
            InboundMessage::Other { kind, .. } => kind,
        }
    }
}
