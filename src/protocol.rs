//! Wire-compatible protocol types for the ChatBridge relay protocol.
//!
//! Every type in this module matches the server's v2 JSON format: field
//! names in lower camelCase, enum-like fields as lowercase string tags,
//! optional outbound fields omitted entirely. Key adaptations:
//!
//! - Server datetimes → `String` (ISO 8601)
//! - User identifiers → [`uuid::Uuid`]
//!
//! Top-level envelopes are decoded discriminator-first via
//! [`decode_envelope`] so that envelope kinds introduced by newer servers
//! are skipped instead of rejected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Type aliases ────────────────────────────────────────────────────

/// Unique identifier for players.
pub type UserId = Uuid;

/// Monotonically increasing identifier for outbound chat requests.
pub type RequestId = u64;

// ── Enums ───────────────────────────────────────────────────────────

/// A permission granted to the connection by its license, reported in the
/// `hello` envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Receive chat and presence events.
    Read,
    /// Broadcast messages into the in-game chat.
    Say,
    /// Send private messages to individual players.
    Tell,
    /// Receive chatbox command events.
    Command,
    /// A capability this client version does not recognize.
    #[serde(other)]
    Unknown,
}

/// How the server renders outbound message text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormattingMode {
    /// Legacy `&`-code colour formatting.
    #[default]
    Format,
    /// Markdown rendering.
    Markdown,
}

/// Kind tag of an outbound chat request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRequestKind {
    /// Broadcast to the whole in-game chat.
    Say,
    /// Directed message to a single player.
    Tell,
}

// ── Structs ─────────────────────────────────────────────────────────

/// One known in-game participant, as reported by the server.
///
/// Identity key is [`uuid`](User::uuid); all other fields are display
/// metadata and may change between roster snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Wire tag discriminating user records (always `"ingame"` today).
    #[serde(rename = "type", default = "ingame_kind")]
    pub kind: String,
    /// Stable unique identifier.
    pub uuid: UserId,
    /// Name as shown in chat (may include nickname formatting).
    pub display_name: String,
    /// Raw account name.
    pub name: String,
    /// Group/role tag (e.g. `"default"`, `"admin"`).
    #[serde(default)]
    pub group: String,
    /// Self-reported pronouns, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronouns: Option<String>,
    /// World the player is currently in, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<String>,
    /// Whether the player is AFK. Absent when the server does not track it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afk: Option<bool>,
    /// Whether this account is registered as an alt.
    #[serde(default)]
    pub alt: bool,
    /// Whether this account is registered as a bot.
    #[serde(default)]
    pub bot: bool,
    /// Supporter tier (0 = none).
    #[serde(default)]
    pub supporter: u8,
}

fn ingame_kind() -> String {
    "ingame".to_string()
}

/// A Discord-side author attached to relayed Discord chat events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscordUser {
    /// Wire tag discriminating user records (always `"discord"`).
    #[serde(rename = "type", default = "discord_kind")]
    pub kind: String,
    /// Discord snowflake id, as a string.
    pub id: String,
    /// Account name.
    pub name: String,
    /// Server-specific display name.
    pub display_name: String,
    /// Legacy discriminator (`"0"` for migrated accounts).
    #[serde(default)]
    pub discriminator: String,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: String,
    /// Roles held in the bridged Discord server.
    #[serde(default)]
    pub roles: Vec<DiscordRole>,
}

fn discord_kind() -> String {
    "discord".to_string()
}

/// One Discord role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscordRole {
    pub id: String,
    pub name: String,
    /// Role colour as a 24-bit RGB integer.
    #[serde(default)]
    pub colour: u32,
}

/// Server-rendered rich text: a text node plus nested children.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RenderedText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<RenderedText>,
}

// ── Outbound requests ───────────────────────────────────────────────

/// One outbound chat request, exactly as serialized onto the wire:
/// `{id, type: "say"|"tell", user?, text, name?, mode?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub id: RequestId,
    #[serde(rename = "type")]
    pub kind: ChatRequestKind,
    /// Target player name or UUID; only present for `tell`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub text: String,
    /// Display name override for the chatbox label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FormattingMode>,
}

// ── Inbound envelopes ───────────────────────────────────────────────

/// Payload of the `hello` envelope, received once per connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelloEnvelope {
    /// Whether this is an unauthenticated guest connection.
    #[serde(default)]
    pub guest: bool,
    /// Identity of the license owner backing this connection.
    #[serde(default)]
    pub license_owner: String,
    /// Capabilities granted to this connection.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

/// Payload of the `players` envelope: a wholesale roster snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayersEnvelope {
    /// Server-side timestamp of the snapshot (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub players: Vec<User>,
}

/// Header of an `event` envelope. The event-specific fields live at the
/// same level and are decoded separately by sub-kind (see
/// [`ChatEvent::decode`](crate::events::ChatEvent::decode)).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    /// Sub-kind discriminator (e.g. `"chat_ingame"`, `"join"`).
    pub event: String,
    /// Server-side timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// Payload of the `success` envelope, acknowledging an outbound request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEnvelope {
    /// Id of the acknowledged request. Absent for unsolicited successes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload of the `error` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// Id of the failed request. Absent for connection-level errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Machine-readable error tag (see
    /// [`ServerErrorCode`](crate::error_codes::ServerErrorCode)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of the `closing` envelope, sent before the server closes the
/// socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClosingEnvelope {
    /// Machine-readable close category (e.g. `"server_stopping"`,
    /// `"kicked"`).
    #[serde(default)]
    pub close_reason: String,
    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A decoded top-level envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEnvelope {
    Hello(HelloEnvelope),
    Players(PlayersEnvelope),
    Event(EventHeader),
    Success(SuccessEnvelope),
    Error(ErrorEnvelope),
    Closing(ClosingEnvelope),
}

impl ServerEnvelope {
    /// The wire discriminator of this envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello(_) => "hello",
            Self::Players(_) => "players",
            Self::Event(_) => "event",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
            Self::Closing(_) => "closing",
        }
    }
}

/// Minimal probe for the top-level discriminator.
#[derive(Deserialize)]
struct Discriminator {
    #[serde(rename = "type")]
    kind: String,
}

/// Decode one complete payload into a [`ServerEnvelope`].
///
/// Returns `Ok(None)` for envelope kinds this client does not recognize
/// (forward compatibility: new server envelope kinds must not crash the
/// client). Returns `Err` when the payload is not a JSON object with a
/// `type` field, or when a recognized kind fails to decode.
pub fn decode_envelope(payload: &str) -> crate::error::Result<Option<ServerEnvelope>> {
    let probe: Discriminator = serde_json::from_str(payload)?;
    let envelope = match probe.kind.as_str() {
        "hello" => Some(ServerEnvelope::Hello(serde_json::from_str(payload)?)),
        "players" => Some(ServerEnvelope::Players(serde_json::from_str(payload)?)),
        "event" => Some(ServerEnvelope::Event(serde_json::from_str(payload)?)),
        "success" => Some(ServerEnvelope::Success(serde_json::from_str(payload)?)),
        "error" => Some(ServerEnvelope::Error(serde_json::from_str(payload)?)),
        "closing" => Some(ServerEnvelope::Closing(serde_json::from_str(payload)?)),
        _ => None,
    };
    Ok(envelope)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn decode_hello_envelope() {
        let json = r#"{"type":"hello","guest":false,"licenseOwner":"alice","capabilities":["read","say","tell","command"]}"#;
        let env = decode_envelope(json).unwrap().unwrap();
        let ServerEnvelope::Hello(hello) = env else {
            panic!("expected hello, got {env:?}");
        };
        assert!(!hello.guest);
        assert_eq!(hello.license_owner, "alice");
        assert_eq!(
            hello.capabilities,
            vec![
                Capability::Read,
                Capability::Say,
                Capability::Tell,
                Capability::Command
            ]
        );
    }

    #[test]
    fn decode_hello_with_unknown_capability() {
        let json = r#"{"type":"hello","guest":true,"licenseOwner":"","capabilities":["read","teleport"]}"#;
        let env = decode_envelope(json).unwrap().unwrap();
        let ServerEnvelope::Hello(hello) = env else {
            panic!("expected hello");
        };
        assert!(hello.guest);
        assert_eq!(
            hello.capabilities,
            vec![Capability::Read, Capability::Unknown]
        );
    }

    #[test]
    fn decode_players_envelope() {
        let json = r#"{"type":"players","time":"2026-08-06T12:00:00Z","players":[
            {"type":"ingame","uuid":"6f8f6b2c-16f9-4ea3-9d72-0ad06ab1bd2c",
             "displayName":"Alice","name":"alice","group":"default",
             "world":"minecraft:overworld","afk":false,"alt":false,"bot":false,"supporter":1}
        ]}"#;
        let env = decode_envelope(json).unwrap().unwrap();
        let ServerEnvelope::Players(players) = env else {
            panic!("expected players");
        };
        assert_eq!(players.time.as_deref(), Some("2026-08-06T12:00:00Z"));
        assert_eq!(players.players.len(), 1);
        let user = &players.players[0];
        assert_eq!(user.name, "alice");
        assert_eq!(user.display_name, "Alice");
        assert_eq!(user.supporter, 1);
        assert_eq!(user.afk, Some(false));
    }

    #[test]
    fn decode_event_header_only() {
        let json = r#"{"type":"event","event":"join","time":"2026-08-06T12:00:00Z","user":{"uuid":"6f8f6b2c-16f9-4ea3-9d72-0ad06ab1bd2c","displayName":"A","name":"a"}}"#;
        let env = decode_envelope(json).unwrap().unwrap();
        let ServerEnvelope::Event(header) = env else {
            panic!("expected event");
        };
        assert_eq!(header.event, "join");
        assert!(header.time.is_some());
    }

    #[test]
    fn decode_success_and_error_envelopes() {
        let env = decode_envelope(r#"{"type":"success","id":0,"reason":"message_sent"}"#)
            .unwrap()
            .unwrap();
        let ServerEnvelope::Success(success) = env else {
            panic!("expected success");
        };
        assert_eq!(success.id, Some(0));
        assert_eq!(success.reason.as_deref(), Some("message_sent"));

        let env = decode_envelope(
            r#"{"type":"error","id":3,"error":"user_not_found","message":"no such player"}"#,
        )
        .unwrap()
        .unwrap();
        let ServerEnvelope::Error(error) = env else {
            panic!("expected error");
        };
        assert_eq!(error.id, Some(3));
        assert_eq!(error.error.as_deref(), Some("user_not_found"));
        assert_eq!(error.message.as_deref(), Some("no such player"));
    }

    #[test]
    fn decode_error_without_id() {
        let env = decode_envelope(r#"{"type":"error","error":"rate_limited"}"#)
            .unwrap()
            .unwrap();
        let ServerEnvelope::Error(error) = env else {
            panic!("expected error");
        };
        assert!(error.id.is_none());
        assert!(error.message.is_none());
    }

    #[test]
    fn decode_closing_envelope() {
        let env = decode_envelope(
            r#"{"type":"closing","closeReason":"server_stopping","reason":"maintenance"}"#,
        )
        .unwrap()
        .unwrap();
        let ServerEnvelope::Closing(closing) = env else {
            panic!("expected closing");
        };
        assert_eq!(closing.close_reason, "server_stopping");
        assert_eq!(closing.reason.as_deref(), Some("maintenance"));
    }

    #[test]
    fn unknown_envelope_kind_is_skipped() {
        let decoded = decode_envelope(r#"{"type":"telemetry","data":{}}"#).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(decode_envelope("{{nope").is_err());
        assert!(decode_envelope(r#"{"noType":true}"#).is_err());
        // Recognized kind with a mistyped payload is also an error.
        assert!(decode_envelope(r#"{"type":"players","players":"not-a-list"}"#).is_err());
    }

    #[test]
    fn chat_request_say_serializes_minimal_fields() {
        let request = ChatRequest {
            id: 0,
            kind: ChatRequestKind::Say,
            user: None,
            text: "hello".into(),
            name: None,
            mode: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"id":0,"type":"say","text":"hello"}"#);
    }

    #[test]
    fn chat_request_tell_serializes_all_fields() {
        let request = ChatRequest {
            id: 7,
            kind: ChatRequestKind::Tell,
            user: Some("alice".into()),
            text: "hi".into(),
            name: Some("Greeter".into()),
            mode: Some(FormattingMode::Markdown),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"id":7,"type":"tell","user":"alice","text":"hi","name":"Greeter","mode":"markdown"}"#
        );
    }

    #[test]
    fn user_round_trips_with_camel_case() {
        let user = User {
            kind: "ingame".into(),
            uuid: Uuid::from_u128(9),
            display_name: "Bob".into(),
            name: "bob".into(),
            group: "admin".into(),
            pronouns: Some("they/them".into()),
            world: None,
            afk: None,
            alt: true,
            bot: false,
            supporter: 2,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"displayName\":\"Bob\""));
        assert!(json.contains("\"type\":\"ingame\""));
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn rendered_text_is_recursive() {
        let json = r#"{"text":"a","extra":[{"text":"b","extra":[{"text":"c"}]}]}"#;
        let rendered: RenderedText = serde_json::from_str(json).unwrap();
        assert_eq!(rendered.text.as_deref(), Some("a"));
        assert_eq!(rendered.extra[0].extra[0].text.as_deref(), Some("c"));
    }

    #[test]
    fn envelope_kind_names() {
        let env = decode_envelope(r#"{"type":"success"}"#).unwrap().unwrap();
        assert_eq!(env.kind(), "success");
    }
}
