//! Integration tests for the session and presence helpers

mod common;

use common::MockTransport;
use livesockets::{ConnectionManager, ConnectionState, FixedDelay, OutboundMessage};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

fn connected_manager(transport: &MockTransport) -> ConnectionManager {
    let manager = livesockets::builder()
        .url("ws://collab.test/ws")
        .transport(transport.clone())
        .reconnect_strategy(FixedDelay::new(Duration::from_secs(1), None))
        .build()
        .unwrap();
    manager.connect();
    transport.last().open();
    manager
}

#[derive(Serialize)]
struct Edit {
    op: &'static str,
    at: u32,
    text: &'static str,
}

#[tokio::test]
async fn test_update_without_session_never_reaches_transport() {
    verbose_println!("Testing session guard...");

    let transport = MockTransport::new();
    let manager = livesockets::builder()
        .url("ws://collab.test/ws")
        .transport(transport.clone())
        .build()
        .unwrap();

    manager.send_update("x");
    manager.send_comment(json!({"body": "hello"}));

    // Not even a lazy connect
    assert_eq!(transport.attempts(), 0);
    assert_eq!(manager.connection_metrics().queued_messages, 0);
}

#[tokio::test]
async fn test_cursor_and_presence_without_session_are_dropped() {
    let transport = MockTransport::new();
    let manager = connected_manager(&transport);

    manager.send_cursor_update(json!({"line": 1, "ch": 4}), None::<Value>);
    manager.send_presence_update(json!({"status": "idle"}));

    assert!(transport.last().sent().is_empty());
}

#[tokio::test]
async fn test_session_messages_on_the_wire() {
    let transport = MockTransport::new();
    let manager = connected_manager(&transport);
    let handle = transport.last();

    manager.join_session("room-1", Some("alice"));
    assert_eq!(manager.session_id().as_deref(), Some("room-1"));

    manager.send_update(Edit {
        op: "insert",
        at: 3,
        text: "hi",
    });
    manager.send_cursor_update(json!({"line": 2}), Some(json!({"from": 1, "to": 5})));
    manager.send_presence_update(json!({"status": "typing"}));
    manager.send_comment(json!({"body": "looks good"}));
    manager.leave_session();

    let frames = handle.sent_json();
    verbose_println!("  Frames: {:?}", frames);
    assert_eq!(
        frames,
        vec![
            json!({"type": "join_session", "sessionId": "room-1", "username": "alice"}),
            json!({"type": "update", "update": {"op": "insert", "at": 3, "text": "hi"}}),
            json!({"type": "cursor", "position": {"line": 2}, "selection": {"from": 1, "to": 5}}),
            json!({"type": "presence", "state": {"status": "typing"}}),
            json!({"type": "comment", "comment": {"body": "looks good"}}),
            json!({"type": "leave_session"}),
        ]
    );
    assert_eq!(manager.session_id(), None);
}

#[tokio::test]
async fn test_leave_without_session_is_a_no_op() {
    let transport = MockTransport::new();
    let manager = connected_manager(&transport);

    manager.leave_session();
    assert!(transport.last().sent().is_empty());
}

#[tokio::test]
async fn test_join_while_disconnected_is_queued_and_connects() {
    let transport = MockTransport::new();
    let manager = livesockets::builder()
        .url("ws://collab.test/ws")
        .transport(transport.clone())
        .build()
        .unwrap();

    manager.join_session("room-9", None);
    assert_eq!(manager.session_id().as_deref(), Some("room-9"));
    assert_eq!(transport.attempts(), 1);

    // Session is recorded optimistically, so updates queue behind the join
    manager.send_update(json!({"op": "noop"}));

    let handle = transport.last();
    handle.open();
    assert_eq!(
        handle.sent_json(),
        vec![
            json!({"type": "join_session", "sessionId": "room-9"}),
            json!({"type": "update", "update": {"op": "noop"}}),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_session_is_rejoined_after_reconnect() {
    verbose_println!("Testing session rejoin...");

    let transport = MockTransport::new();
    let manager = connected_manager(&transport);
    manager.join_session("room-1", Some("alice"));

    transport.last().server_close(1006, "network lost");
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(transport.handle_count(), 2);

    let handle = transport.last();
    handle.open();
    assert_eq!(
        handle.sent_json(),
        vec![json!({"type": "join_session", "sessionId": "room-1", "username": "alice"})]
    );
}

#[tokio::test]
async fn test_disconnect_leaves_session_and_clears_identity() {
    let transport = MockTransport::new();
    let manager = connected_manager(&transport);
    let handle = transport.last();

    handle.receive_json(json!({"type": "welcome", "clientId": "c1"}));
    manager.join_session("room-1", Some("alice"));
    manager.disconnect(None, None);

    assert_eq!(handle.sent_types(), vec!["join_session", "leave_session"]);
    assert_eq!(handle.closes(), vec![(1000, "Client disconnected".to_string())]);
    assert_eq!(manager.session_id(), None);
    assert_eq!(manager.client_id(), None);
    assert_eq!(manager.connection_status(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_disconnect_discards_queued_session_messages() {
    let transport = MockTransport::new();
    let manager = livesockets::builder()
        .url("ws://collab.test/ws")
        .transport(transport.clone())
        .build()
        .unwrap();

    manager.join_session("room-1", None);
    manager.send_update(json!({"op": "noop"}));
    manager.send(OutboundMessage::custom("chat", json!({"text": "still wanted"})).unwrap());
    assert_eq!(manager.connection_metrics().queued_messages, 3);

    manager.disconnect(None, None);
    assert_eq!(manager.session_id(), None);
    assert_eq!(manager.connection_metrics().queued_messages, 1);

    manager.connect();
    let handle = transport.last();
    handle.open();
    assert_eq!(
        handle.sent_json(),
        vec![json!({"type": "chat", "text": "still wanted"})]
    );
    assert_eq!(manager.session_id(), None);
}

