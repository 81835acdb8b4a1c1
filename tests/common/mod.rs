#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for ChatBridge client integration tests.
//!
//! Provides a channel-driven [`ScriptedTransport`] whose server side is
//! steered from the test body (so acknowledgments can be fed *after* the
//! client's sends are observed), a [`MockConnector`] producing a scripted
//! sequence of connections, and helpers for building wire-faithful server
//! JSON.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use chatbridge_client::client::ChatBridgeConfig;
use chatbridge_client::error::ChatBridgeError;
use chatbridge_client::frame::Frame;
use chatbridge_client::transport::{Connector, Transport};

// ── ScriptedTransport ───────────────────────────────────────────────

type Inbound = Option<Result<Frame, ChatBridgeError>>;

/// A transport whose inbound frames are fed by the test and whose outbound
/// messages are observable through a channel.
pub struct ScriptedTransport {
    incoming: mpsc::UnboundedReceiver<Inbound>,
    sent_tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

/// The test's side of a [`ScriptedTransport`].
pub struct ServerHandle {
    feed: mpsc::UnboundedSender<Inbound>,
    sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl ScriptedTransport {
    /// Create a transport plus the handle steering it.
    pub fn pair() -> (Self, ServerHandle) {
        let (feed, incoming) = mpsc::unbounded_channel();
        let (sent_tx, sent) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                incoming,
                sent_tx,
                closed: Arc::clone(&closed),
            },
            ServerHandle { feed, sent, closed },
        )
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, message: String) -> Result<(), ChatBridgeError> {
        self.sent_tx
            .send(message)
            .map_err(|_| ChatBridgeError::TransportSend("test observer dropped".into()))
    }

    async fn recv(&mut self) -> Option<Result<Frame, ChatBridgeError>> {
        match self.incoming.recv().await {
            // An explicit `None` entry (or the handle being dropped)
            // simulates the stream ending without a close frame.
            Some(item) => item,
            None => None,
        }
    }

    async fn close(&mut self) -> Result<(), ChatBridgeError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl ServerHandle {
    /// Deliver one complete text payload to the client.
    pub fn feed_text(&self, payload: impl Into<String>) {
        let _ = self.feed.send(Some(Ok(Frame::text(payload))));
    }

    /// Deliver an arbitrary frame (partial chunks, close frames).
    pub fn feed_frame(&self, frame: Frame) {
        let _ = self.feed.send(Some(Ok(frame)));
    }

    /// Deliver a transport error.
    pub fn feed_error(&self, error: ChatBridgeError) {
        let _ = self.feed.send(Some(Err(error)));
    }

    /// End the inbound stream without a close frame.
    pub fn end_stream(&self) {
        let _ = self.feed.send(None);
    }

    /// Await the next message the client sent.
    pub async fn next_sent(&mut self) -> String {
        self.sent.recv().await.expect("client send channel closed")
    }

    /// Whether the client closed this transport.
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Hands out a scripted sequence of transports; fails once exhausted.
pub struct MockConnector {
    transports: VecDeque<ScriptedTransport>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(transports: Vec<ScriptedTransport>) -> Self {
        Self {
            transports: VecDeque::from(transports),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn single(transport: ScriptedTransport) -> Self {
        Self::new(vec![transport])
    }

    /// Shared counter of `connect` calls, for asserting reconnect behavior.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connects)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = ScriptedTransport;

    async fn connect(&mut self) -> Result<ScriptedTransport, ChatBridgeError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.transports
            .pop_front()
            .ok_or_else(|| ChatBridgeError::Connect("no scripted connection left".into()))
    }
}

// ── Config helper ───────────────────────────────────────────────────

/// A config with test-friendly timings (fast drain, fast reconnect).
pub fn test_config() -> ChatBridgeConfig {
    ChatBridgeConfig::new()
        .with_send_interval(Duration::from_millis(1))
        .with_reconnect_delay(Duration::from_millis(10))
}

// ── JSON fixtures (wire-faithful server output) ─────────────────────

pub fn hello_json(owner: &str, capabilities: &[&str], guest: bool) -> String {
    serde_json::json!({
        "type": "hello",
        "guest": guest,
        "licenseOwner": owner,
        "capabilities": capabilities,
    })
    .to_string()
}

pub fn user_value(uuid: u128, name: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "ingame",
        "uuid": uuid::Uuid::from_u128(uuid).to_string(),
        "displayName": name,
        "name": name,
        "group": "default",
        "afk": false,
        "alt": false,
        "bot": false,
        "supporter": 0,
    })
}

pub fn players_json(users: &[(u128, &str)]) -> String {
    let players: Vec<serde_json::Value> =
        users.iter().map(|(id, name)| user_value(*id, name)).collect();
    serde_json::json!({
        "type": "players",
        "time": "2026-08-06T12:00:00Z",
        "players": players,
    })
    .to_string()
}

pub fn success_json(id: u64, reason: &str) -> String {
    serde_json::json!({
        "type": "success",
        "id": id,
        "reason": reason,
    })
    .to_string()
}

pub fn error_json(id: Option<u64>, error: &str, message: &str) -> String {
    let mut value = serde_json::json!({
        "type": "error",
        "error": error,
        "message": message,
    });
    if let Some(id) = id {
        value["id"] = serde_json::json!(id);
    }
    value.to_string()
}

pub fn closing_json(close_reason: &str, reason: &str) -> String {
    serde_json::json!({
        "type": "closing",
        "closeReason": close_reason,
        "reason": reason,
    })
    .to_string()
}

pub fn join_event_json(uuid: u128, name: &str) -> String {
    serde_json::json!({
        "type": "event",
        "event": "join",
        "time": "2026-08-06T12:00:00Z",
        "user": user_value(uuid, name),
    })
    .to_string()
}

pub fn afk_event_json(uuid: u128, name: &str, afk: bool) -> String {
    let mut user = user_value(uuid, name);
    user["afk"] = serde_json::json!(afk);
    serde_json::json!({
        "type": "event",
        "event": if afk { "afk" } else { "afk_return" },
        "time": "2026-08-06T12:00:00Z",
        "user": user,
    })
    .to_string()
}

pub fn ingame_chat_json(uuid: u128, name: &str, text: &str) -> String {
    serde_json::json!({
        "type": "event",
        "event": "chat_ingame",
        "time": "2026-08-06T12:00:00Z",
        "text": text,
        "rawText": text,
        "renderedText": { "text": text },
        "user": user_value(uuid, name),
    })
    .to_string()
}

pub fn unknown_event_json(kind: &str) -> String {
    serde_json::json!({
        "type": "event",
        "event": kind,
        "time": "2026-08-06T12:00:00Z",
    })
    .to_string()
}
