//! Integration-style client tests for the ChatBridge client.
//!
//! Uses the shared `ScriptedTransport` from `tests/common` to steer server
//! behavior from the test body and verify the full session lifecycle:
//! ready transitions, outbound queue dispatch and correlation, roster
//! maintenance, event fan-out, close semantics and reconnects.

mod common;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use chatbridge_client::client::{ChatBridgeClient, ChatBridgeHandle, SessionStatus};
use chatbridge_client::protocol::{Capability, ChatRequest, ChatRequestKind};
use chatbridge_client::ChatBridgeError;
use chatbridge_client::Frame;

use common::{
    afk_event_json, closing_json, error_json, hello_json, ingame_chat_json, join_event_json,
    players_json, success_json, test_config, unknown_event_json, MockConnector, ScriptedTransport,
};

// ════════════════════════════════════════════════════════════════════
// Harness
// ════════════════════════════════════════════════════════════════════

type RunResult = chatbridge_client::error::Result<()>;

/// Build a client over the given scripted connections, let the test
/// register subscribers, then drive `run` on a background task.
fn start_session(
    transports: Vec<ScriptedTransport>,
    configure: impl FnOnce(&mut ChatBridgeClient<MockConnector>),
) -> (
    ChatBridgeHandle,
    Arc<AtomicUsize>,
    tokio::task::JoinHandle<RunResult>,
) {
    let connector = MockConnector::new(transports);
    let connects = connector.counter();
    let mut client = ChatBridgeClient::new(connector, test_config());
    configure(&mut client);
    let handle = client.handle();
    let task = tokio::spawn(async move { client.run().await });
    (handle, connects, task)
}

/// Await a future, panicking if it takes unreasonably long (keeps a broken
/// session loop from hanging the whole suite).
async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out waiting for session activity")
}

async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    within(rx.recv()).await.expect("notification channel closed")
}

/// Subscribe a channel to the ready notification.
fn ready_channel(
    client: &mut ChatBridgeClient<MockConnector>,
) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.events().on_ready(move |hello| {
        let _ = tx.send(hello.license_owner.clone());
    });
    rx
}

// ════════════════════════════════════════════════════════════════════
// Ready transition
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn hello_marks_session_ready() {
    let (transport, server) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    server.feed_text(hello_json("alice", &["read", "say", "tell"], false));

    let owner = recv_within(&mut ready_rx).await;
    assert_eq!(owner, "alice");
    assert_eq!(handle.status(), SessionStatus::Ready);
    assert!(handle.is_running());
    assert!(!handle.is_guest());
    assert_eq!(handle.owner().await.as_deref(), Some("alice"));
    assert_eq!(
        handle.capabilities().await,
        vec![Capability::Read, Capability::Say, Capability::Tell]
    );

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn guest_hello_sets_guest_flag() {
    let (transport, server) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    server.feed_text(hello_json("", &["read"], true));
    recv_within(&mut ready_rx).await;

    assert!(handle.is_guest());
    assert_eq!(handle.capabilities().await, vec![Capability::Read]);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Roster maintenance
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn players_snapshot_replaces_roster_wholesale() {
    let (transport, server) = ScriptedTransport::pair();
    let (players_tx, mut players_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_players(move |snapshot| {
            let _ = players_tx.send(snapshot.players.len());
        });
    });

    server.feed_text(hello_json("alice", &["read"], false));
    server.feed_text(players_json(&[(1, "alice"), (2, "bob")]));
    assert_eq!(recv_within(&mut players_rx).await, 2);

    let roster = handle.players().await;
    assert_eq!(roster.len(), 2);

    // The next snapshot drops bob entirely.
    server.feed_text(players_json(&[(1, "alice"), (3, "carol")]));
    assert_eq!(recv_within(&mut players_rx).await, 2);

    let roster = handle.players().await;
    let names: Vec<&str> = roster.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "carol"]);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn afk_events_upsert_the_roster() {
    let (transport, server) = ScriptedTransport::pair();
    let (afk_tx, mut afk_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_afk(move |afk| {
            let _ = afk_tx.send(afk.user.name.clone());
        });
    });

    server.feed_text(hello_json("alice", &["read"], false));
    server.feed_text(players_json(&[(1, "alice")]));

    // AFK for a player not in the snapshot appends; for a known player it
    // replaces in place.
    server.feed_text(afk_event_json(2, "bob", true));
    assert_eq!(recv_within(&mut afk_rx).await, "bob");

    let roster = handle.players().await;
    assert_eq!(roster.len(), 2);
    let bob = roster.iter().find(|u| u.name == "bob").expect("bob upserted");
    assert_eq!(bob.afk, Some(true));

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Outbound queue: dispatch, correlation, ordering
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn say_resolves_true_on_success() {
    let (transport, mut server) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    server.feed_text(hello_json("alice", &["say"], false));
    recv_within(&mut ready_rx).await;

    let delivery = handle.say("hello");
    assert_eq!(delivery.id(), 0);

    let sent = within(server.next_sent()).await;
    let request: ChatRequest = serde_json::from_str(&sent).expect("valid request json");
    assert_eq!(request.id, 0);
    assert_eq!(request.kind, ChatRequestKind::Say);
    assert_eq!(request.text, "hello");
    assert!(request.user.is_none());

    server.feed_text(success_json(0, "message_sent"));
    assert!(within(delivery).await);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn tell_resolves_false_on_error_and_notifies() {
    let (transport, mut server) = ScriptedTransport::pair();
    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let mut ready_rx = None;
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        ready_rx = Some(ready_channel(client));
        client.events().on_error(move |notice| {
            let _ = error_tx.send((notice.error.clone(), notice.message.clone()));
        });
    });
    let mut ready_rx = ready_rx.expect("configured");

    server.feed_text(hello_json("alice", &["tell"], false));
    recv_within(&mut ready_rx).await;

    let delivery = handle.tell("alice", "hi");
    let sent = within(server.next_sent()).await;
    let request: ChatRequest = serde_json::from_str(&sent).expect("valid request json");
    assert_eq!(request.kind, ChatRequestKind::Tell);
    assert_eq!(request.user.as_deref(), Some("alice"));

    server.feed_text(error_json(Some(0), "user_not_found", "no player by that name"));

    assert!(!within(delivery).await);
    let (error, message) = recv_within(&mut error_rx).await;
    assert_eq!(error.as_deref(), Some("user_not_found"));
    assert_eq!(message.as_deref(), Some("no player by that name"));

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn sends_are_fifo_with_strictly_increasing_ids() {
    let (transport, mut server) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    server.feed_text(hello_json("alice", &["say"], false));
    recv_within(&mut ready_rx).await;

    let deliveries = vec![
        handle.say("first"),
        handle.say("second"),
        handle.say("third"),
    ];

    let mut last_id = None;
    for expected_text in ["first", "second", "third"] {
        let sent = within(server.next_sent()).await;
        let request: ChatRequest = serde_json::from_str(&sent).expect("valid request json");
        assert_eq!(request.text, expected_text);
        if let Some(last) = last_id {
            assert!(request.id > last, "ids must be strictly increasing");
        }
        last_id = Some(request.id);
        server.feed_text(success_json(request.id, "message_sent"));
    }

    for delivery in deliveries {
        assert!(within(delivery).await);
    }

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn unacknowledged_request_fails_exactly_once_on_teardown() {
    let (transport, mut server) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    server.feed_text(hello_json("alice", &["say"], false));
    recv_within(&mut ready_rx).await;

    let delivery = handle.say("never acked");
    let _sent = within(server.next_sent()).await;

    // No acknowledgment ever arrives; a deliberate close must resolve the
    // outcome to failure rather than leaving it pending forever.
    handle.close(false);
    within(task).await.unwrap().unwrap();

    assert!(!within(delivery).await);
}

#[tokio::test]
async fn success_with_unknown_id_is_ignored() {
    let (transport, server) = ScriptedTransport::pair();
    let (players_tx, mut players_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_players(move |snapshot| {
            let _ = players_tx.send(snapshot.players.len());
        });
    });

    server.feed_text(hello_json("alice", &["say"], false));
    // No request with id 40 was ever dispatched.
    server.feed_text(success_json(40, "message_sent"));
    // The session keeps processing envelopes afterwards.
    server.feed_text(players_json(&[(1, "alice")]));
    assert_eq!(recv_within(&mut players_rx).await, 1);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn uncorrelated_error_fires_no_notification() {
    let (transport, server) = ScriptedTransport::pair();
    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let (players_tx, mut players_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_error(move |notice| {
            let _ = error_tx.send(notice.clone());
        });
        client.events().on_players(move |snapshot| {
            let _ = players_tx.send(snapshot.players.len());
        });
    });

    server.feed_text(hello_json("alice", &["say"], false));
    // Connection-level error with no id: ignored, session continues.
    server.feed_text(error_json(None, "rate_limited", "slow down"));
    // Error with an id nothing is waiting on: also ignored.
    server.feed_text(error_json(Some(9), "user_not_found", "stale"));
    server.feed_text(players_json(&[(1, "alice")]));
    assert_eq!(recv_within(&mut players_rx).await, 1);

    assert!(error_rx.try_recv().is_err(), "no error notification expected");

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Protocol resilience
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unrecognized_envelope_kind_is_ignored() {
    let (transport, server) = ScriptedTransport::pair();
    let (players_tx, mut players_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_players(move |snapshot| {
            let _ = players_tx.send(snapshot.players.len());
        });
    });

    server.feed_text(hello_json("alice", &["read"], false));
    server.feed_text(r#"{"type":"telemetry","cpu":0.5}"#);
    server.feed_text(players_json(&[(1, "alice")]));
    assert_eq!(recv_within(&mut players_rx).await, 1);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_envelope_is_dropped_without_killing_the_session() {
    let (transport, server) = ScriptedTransport::pair();
    let (players_tx, mut players_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_players(move |snapshot| {
            let _ = players_tx.send(snapshot.players.len());
        });
    });

    server.feed_text(hello_json("alice", &["read"], false));
    server.feed_text("{{not valid json at all!!!");
    server.feed_text(players_json(&[(1, "alice")]));
    assert_eq!(recv_within(&mut players_rx).await, 1);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_event_sub_kind_invokes_no_subscribers() {
    let (transport, server) = ScriptedTransport::pair();
    let (join_tx, mut join_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_join(move |join| {
            let _ = join_tx.send(join.user.name.clone());
        });
    });

    server.feed_text(hello_json("alice", &["read"], false));
    server.feed_text(unknown_event_json("meteor_strike"));
    // A recognized event afterwards proves the session survived and that
    // the unknown kind invoked nothing.
    server.feed_text(join_event_json(5, "erin"));
    assert_eq!(recv_within(&mut join_rx).await, "erin");
    assert!(join_rx.try_recv().is_err());

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn chat_events_reach_their_subscribers_in_order() {
    let (transport, server) = ScriptedTransport::pair();
    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_ingame_chat(move |chat| {
            let _ = chat_tx.send(chat.text.clone());
        });
    });

    server.feed_text(hello_json("alice", &["read"], false));
    server.feed_text(ingame_chat_json(1, "alice", "one"));
    server.feed_text(ingame_chat_json(1, "alice", "two"));

    assert_eq!(recv_within(&mut chat_rx).await, "one");
    assert_eq!(recv_within(&mut chat_rx).await, "two");

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn raw_subscribers_observe_every_payload() {
    let (transport, server) = ScriptedTransport::pair();
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        client.events().on_raw(move |payload| {
            let _ = raw_tx.send(payload.to_string());
        });
    });

    let hello = hello_json("alice", &["read"], false);
    server.feed_text(hello.clone());
    server.feed_text(r#"{"type":"telemetry"}"#);

    assert_eq!(recv_within(&mut raw_rx).await, hello);
    assert_eq!(recv_within(&mut raw_rx).await, r#"{"type":"telemetry"}"#);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Frame assembly through the full stack
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn chunked_hello_is_reassembled() {
    let (transport, server) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, _connects, task) = start_session(vec![transport], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    let hello = hello_json("alice", &["read"], false);
    let (first, second) = hello.split_at(hello.len() / 2);
    server.feed_frame(Frame::Text {
        data: first.to_string(),
        end_of_message: false,
    });
    server.feed_frame(Frame::Text {
        data: second.to_string(),
        end_of_message: true,
    });

    assert_eq!(recv_within(&mut ready_rx).await, "alice");

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn close_frame_mid_accumulation_aborts_and_reconnects() {
    let (transport1, server1) = ScriptedTransport::pair();
    let (transport2, server2) = ScriptedTransport::pair();
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
    let mut ready_rx = None;
    let (handle, connects, task) = start_session(vec![transport1, transport2], |client| {
        ready_rx = Some(ready_channel(client));
        client.events().on_raw(move |payload| {
            let _ = raw_tx.send(payload.to_string());
        });
    });
    let mut ready_rx = ready_rx.expect("configured");

    server1.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;
    let _hello_raw = recv_within(&mut raw_rx).await;

    // A partial message interrupted by a close frame must never be routed.
    server1.feed_frame(Frame::Text {
        data: r#"{"type":"pla"#.to_string(),
        end_of_message: false,
    });
    server1.feed_frame(Frame::Close {
        reason: Some("going away".into()),
    });

    // Still running, so the session reconnects and greets again.
    server2.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    // The only raw payload seen since the first hello is the second hello.
    let raw = recv_within(&mut raw_rx).await;
    assert!(raw.contains("\"type\":\"hello\""), "unexpected payload: {raw}");

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Closing semantics
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn closing_kicked_stops_the_session_for_good() {
    let (transport, server) = ScriptedTransport::pair();
    let (closing_tx, mut closing_rx) = mpsc::unbounded_channel();
    let mut ready_rx = None;
    let (handle, connects, task) = start_session(vec![transport], |client| {
        ready_rx = Some(ready_channel(client));
        client.events().on_closing(move |closing| {
            let _ = closing_tx.send((closing.close_reason.clone(), closing.reason.clone()));
        });
    });
    let mut ready_rx = ready_rx.expect("configured");

    server.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;

    server.feed_text(closing_json("kicked", "banned"));
    let (close_reason, reason) = recv_within(&mut closing_rx).await;
    assert_eq!(close_reason, "kicked");
    assert_eq!(reason.as_deref(), Some("banned"));

    // The socket closes after the announcement; no reconnect follows.
    server.end_stream();
    within(task).await.unwrap().unwrap();

    assert!(!handle.is_running());
    assert_eq!(handle.status(), SessionStatus::Disconnected);
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn closing_server_stopping_keeps_running_and_reconnects() {
    let (transport1, server1) = ScriptedTransport::pair();
    let (transport2, server2) = ScriptedTransport::pair();
    let (closing_tx, mut closing_rx) = mpsc::unbounded_channel();
    let mut ready_rx = None;
    let (handle, connects, task) = start_session(vec![transport1, transport2], |client| {
        ready_rx = Some(ready_channel(client));
        client.events().on_closing(move |closing| {
            let _ = closing_tx.send(closing.close_reason.clone());
        });
    });
    let mut ready_rx = ready_rx.expect("configured");

    server1.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;

    server1.feed_text(closing_json("server_stopping", "maintenance"));
    assert_eq!(recv_within(&mut closing_rx).await, "server_stopping");
    assert!(handle.is_running(), "server_stopping must not stop the session");

    // The socket eventually closes; the run loop waits the backoff and
    // dials the second connection.
    server1.end_stream();
    server2.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn soft_close_keeps_running_and_reconnects() {
    let (transport1, server1) = ScriptedTransport::pair();
    let (transport2, server2) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, connects, task) = start_session(vec![transport1, transport2], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    server1.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;

    // Soft close: the socket goes down, the running flag survives.
    handle.close(true);

    server2.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;
    assert!(server1.was_closed());
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn transport_error_triggers_reconnect() {
    let (transport1, server1) = ScriptedTransport::pair();
    let (transport2, server2) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, connects, task) = start_session(vec![transport1, transport2], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    server1.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;

    server1.feed_error(ChatBridgeError::TransportReceive("connection reset".into()));

    server2.feed_text(hello_json("alice", &["read"], false));
    recv_within(&mut ready_rx).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Queue preservation across reconnects
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn queued_requests_survive_a_reconnect() {
    let (transport1, server1) = ScriptedTransport::pair();
    let (transport2, mut server2) = ScriptedTransport::pair();
    let mut ready_rx = None;
    let (handle, connects, task) = start_session(vec![transport1, transport2], |client| {
        ready_rx = Some(ready_channel(client));
    });
    let mut ready_rx = ready_rx.expect("configured");

    server1.feed_text(hello_json("alice", &["say"], false));
    recv_within(&mut ready_rx).await;

    // Drop the connection, then enqueue once the re-dial has happened (the
    // session is connecting, not ready, so the request stays queued).
    server1.end_stream();
    within(async {
        while connects.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;

    let delivery = handle.say("deferred");

    // Only after the fresh hello does the drain resume and dispatch it.
    server2.feed_text(hello_json("alice", &["say"], false));
    recv_within(&mut ready_rx).await;

    let sent = within(server2.next_sent()).await;
    let request: ChatRequest = serde_json::from_str(&sent).expect("valid request json");
    assert_eq!(request.text, "deferred");

    server2.feed_text(success_json(request.id, "message_sent"));
    assert!(within(delivery).await);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Standalone connect/close (no run loop)
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn connect_then_close_without_run() {
    let (transport, server) = ScriptedTransport::pair();
    let connector = MockConnector::single(transport);
    let mut client = ChatBridgeClient::new(connector, test_config());

    client.connect().await.expect("scripted connect succeeds");
    assert_eq!(client.status(), SessionStatus::Connecting);

    client.close(false).await;
    assert_eq!(client.status(), SessionStatus::Disconnected);
    assert!(!client.is_running());
    assert!(server.was_closed());
}

#[tokio::test]
async fn initial_connect_failure_surfaces_to_the_caller() {
    let connector = MockConnector::new(vec![]);
    let mut client = ChatBridgeClient::new(connector, test_config());

    let err = client.run().await.expect_err("no scripted connection");
    assert!(matches!(err, ChatBridgeError::Connect(_)));
    assert_eq!(client.status(), SessionStatus::Disconnected);
}

#[tokio::test]
async fn requests_enqueued_before_connect_dispatch_after_hello() {
    let (transport, mut server) = ScriptedTransport::pair();
    let connector = MockConnector::single(transport);
    let mut client = ChatBridgeClient::new(connector, test_config());
    let handle = client.handle();

    // Enqueue before the session has even connected.
    let delivery = handle.say("early bird");
    assert_eq!(handle.status(), SessionStatus::Disconnected);

    let task = tokio::spawn(async move { client.run().await });

    server.feed_text(hello_json("alice", &["say"], false));
    let sent = within(server.next_sent()).await;
    let request: ChatRequest = serde_json::from_str(&sent).expect("valid request json");
    assert_eq!(request.text, "early bird");
    assert_eq!(request.id, 0);

    server.feed_text(success_json(0, "message_sent"));
    assert!(within(delivery).await);

    handle.close(false);
    within(task).await.unwrap().unwrap();
}
