//! Typed domain events decoded from `event` envelopes.
//!
//! Every inbound `event` envelope carries an `event` sub-kind discriminator
//! plus the event-specific fields at the same level. [`ChatEvent::decode`]
//! turns a complete envelope payload into the matching variant, returning
//! `Ok(None)` for sub-kinds this client does not recognize — new server
//! event kinds must never crash the client.

use serde::{Deserialize, Serialize};

use crate::protocol::{DiscordUser, RenderedText, User};

// ── Event payloads ──────────────────────────────────────────────────

/// A message spoken in the in-game chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngameChatMessage {
    pub text: String,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub rendered_text: RenderedText,
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A message relayed from the bridged Discord server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscordChatMessage {
    pub text: String,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub rendered_text: RenderedText,
    /// Snowflake id of the Discord message.
    #[serde(default)]
    pub discord_id: String,
    pub discord_user: DiscordUser,
    /// Whether this delivery reflects an edit of an earlier message.
    #[serde(default)]
    pub edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A message another chatbox client broadcast through the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatboxChatMessage {
    pub text: String,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub rendered_text: RenderedText,
    pub user: User,
    /// Chatbox label the sending client used.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub raw_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A `\command`-style chatbox command issued by a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatboxCommand {
    pub user: User,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Whether the command is visible only to the license owner.
    #[serde(default)]
    pub owner_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A player joined the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Join {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A player left the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Leave {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A player died.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Death {
    pub text: String,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub rendered_text: RenderedText,
    pub user: User,
    /// The killer, when the death was caused by another player.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A player went AFK.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Afk {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A player returned from AFK.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AfkReturn {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A player moved between worlds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorldChange {
    pub user: User,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// The server scheduled a restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerRestartScheduled {
    /// Restart category (e.g. `"automatic"`, `"manual"`).
    #[serde(default)]
    pub restart_type: String,
    /// Seconds until the restart fires.
    #[serde(default)]
    pub restart_seconds: u64,
    /// Absolute restart time (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A previously scheduled restart was cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerRestartCancelled {
    #[serde(default)]
    pub restart_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

// ── The closed variant family ───────────────────────────────────────

/// A decoded domain event. Immutable once constructed; handed to
/// subscribers by reference and then discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    IngameChat(IngameChatMessage),
    DiscordChat(DiscordChatMessage),
    ChatboxChat(ChatboxChatMessage),
    Command(ChatboxCommand),
    Join(Join),
    Leave(Leave),
    Death(Death),
    Afk(Afk),
    AfkReturn(AfkReturn),
    WorldChange(WorldChange),
    ServerRestartScheduled(ServerRestartScheduled),
    ServerRestartCancelled(ServerRestartCancelled),
}

impl ChatEvent {
    /// The wire sub-kind tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IngameChat(_) => "chat_ingame",
            Self::DiscordChat(_) => "chat_discord",
            Self::ChatboxChat(_) => "chat_chatbox",
            Self::Command(_) => "command",
            Self::Join(_) => "join",
            Self::Leave(_) => "leave",
            Self::Death(_) => "death",
            Self::Afk(_) => "afk",
            Self::AfkReturn(_) => "afk_return",
            Self::WorldChange(_) => "world_change",
            Self::ServerRestartScheduled(_) => "server_restart_scheduled",
            Self::ServerRestartCancelled(_) => "server_restart_cancelled",
        }
    }

    /// Decode the event-specific payload of an `event` envelope.
    ///
    /// `kind` is the sub-kind discriminator from the envelope header;
    /// `payload` is the complete envelope text (the event fields live at
    /// the top level). Returns `Ok(None)` for unrecognized sub-kinds.
    pub fn decode(kind: &str, payload: &str) -> crate::error::Result<Option<Self>> {
        let event = match kind {
            "chat_ingame" => Some(Self::IngameChat(serde_json::from_str(payload)?)),
            "chat_discord" => Some(Self::DiscordChat(serde_json::from_str(payload)?)),
            "chat_chatbox" => Some(Self::ChatboxChat(serde_json::from_str(payload)?)),
            "command" => Some(Self::Command(serde_json::from_str(payload)?)),
            "join" => Some(Self::Join(serde_json::from_str(payload)?)),
            "leave" => Some(Self::Leave(serde_json::from_str(payload)?)),
            "death" => Some(Self::Death(serde_json::from_str(payload)?)),
            "afk" => Some(Self::Afk(serde_json::from_str(payload)?)),
            "afk_return" => Some(Self::AfkReturn(serde_json::from_str(payload)?)),
            "world_change" => Some(Self::WorldChange(serde_json::from_str(payload)?)),
            "server_restart_scheduled" => {
                Some(Self::ServerRestartScheduled(serde_json::from_str(payload)?))
            }
            "server_restart_cancelled" => {
                Some(Self::ServerRestartCancelled(serde_json::from_str(payload)?))
            }
            _ => None,
        };
        Ok(event)
    }
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

    fn user_json(name: &str) -> String {
        format!(
            r#"{{"type":"ingame","uuid":"6f8f6b2c-16f9-4ea3-9d72-0ad06ab1bd2c",
                 "displayName":"{name}","name":"{name}","group":"default"}}"#
        )
    }

    #[test]
    fn decode_ingame_chat() {
        let payload = format!(
            r#"{{"type":"event","event":"chat_ingame","time":"2026-08-06T12:00:00Z",
                 "text":"hi","rawText":"hi","renderedText":{{"text":"hi"}},
                 "user":{}}}"#,
            user_json("alice")
        );
        let event = ChatEvent::decode("chat_ingame", &payload).unwrap().unwrap();
        let ChatEvent::IngameChat(chat) = event else {
            panic!("expected IngameChat");
        };
        assert_eq!(chat.text, "hi");
        assert_eq!(chat.user.name, "alice");
        assert_eq!(chat.time.as_deref(), Some("2026-08-06T12:00:00Z"));
    }

    #[test]
    fn decode_discord_chat() {
        let payload = r#"{"type":"event","event":"chat_discord","text":"yo",
            "rawText":"yo","discordId":"123456789",
            "discordUser":{"type":"discord","id":"42","name":"bob","displayName":"Bobby",
                           "discriminator":"0","avatar":"","roles":[{"id":"1","name":"mod","colour":16711680}]},
            "edited":true}"#;
        let event = ChatEvent::decode("chat_discord", payload).unwrap().unwrap();
        let ChatEvent::DiscordChat(chat) = event else {
            panic!("expected DiscordChat");
        };
        assert!(chat.edited);
        assert_eq!(chat.discord_user.display_name, "Bobby");
        assert_eq!(chat.discord_user.roles[0].colour, 0xFF0000);
    }

    #[test]
    fn decode_command_event() {
        let payload = format!(
            r#"{{"type":"event","event":"command","user":{},
                 "command":"warp","args":["spawn"],"ownerOnly":false}}"#,
            user_json("carol")
        );
        let event = ChatEvent::decode("command", &payload).unwrap().unwrap();
        let ChatEvent::Command(cmd) = event else {
            panic!("expected Command");
        };
        assert_eq!(cmd.command, "warp");
        assert_eq!(cmd.args, vec!["spawn"]);
        assert!(!cmd.owner_only);
    }

    #[test]
    fn decode_death_with_source() {
        let payload = format!(
            r#"{{"type":"event","event":"death","text":"alice was slain",
                 "rawText":"alice was slain","user":{},"source":{}}}"#,
            user_json("alice"),
            user_json("bob")
        );
        let event = ChatEvent::decode("death", &payload).unwrap().unwrap();
        let ChatEvent::Death(death) = event else {
            panic!("expected Death");
        };
        assert_eq!(death.user.name, "alice");
        assert_eq!(death.source.unwrap().name, "bob");
    }

    #[test]
    fn decode_world_change() {
        let payload = format!(
            r#"{{"type":"event","event":"world_change","user":{},
                 "origin":"minecraft:overworld","destination":"minecraft:the_nether"}}"#,
            user_json("dave")
        );
        let event = ChatEvent::decode("world_change", &payload).unwrap().unwrap();
        let ChatEvent::WorldChange(change) = event else {
            panic!("expected WorldChange");
        };
        assert_eq!(change.origin, "minecraft:overworld");
        assert_eq!(change.destination, "minecraft:the_nether");
    }

    #[test]
    fn decode_restart_events() {
        let scheduled = r#"{"type":"event","event":"server_restart_scheduled",
            "restartType":"automatic","restartSeconds":300,
            "restartAt":"2026-08-06T13:00:00Z"}"#;
        let event = ChatEvent::decode("server_restart_scheduled", scheduled)
            .unwrap()
            .unwrap();
        let ChatEvent::ServerRestartScheduled(restart) = event else {
            panic!("expected ServerRestartScheduled");
        };
        assert_eq!(restart.restart_seconds, 300);

        let cancelled =
            r#"{"type":"event","event":"server_restart_cancelled","restartType":"automatic"}"#;
        let event = ChatEvent::decode("server_restart_cancelled", cancelled)
            .unwrap()
            .unwrap();
        assert!(matches!(event, ChatEvent::ServerRestartCancelled(_)));
    }

    #[test]
    fn decode_presence_events() {
        for (kind, payload_kind) in [("join", "join"), ("leave", "leave"), ("afk", "afk")] {
            let payload = format!(
                r#"{{"type":"event","event":"{payload_kind}","user":{}}}"#,
                user_json("erin")
            );
            let event = ChatEvent::decode(kind, &payload).unwrap().unwrap();
            assert_eq!(event.kind(), kind);
        }
    }

    #[test]
    fn unknown_sub_kind_is_skipped() {
        let decoded = ChatEvent::decode("meteor_strike", r#"{"type":"event","event":"meteor_strike"}"#)
            .unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn recognized_sub_kind_with_bad_payload_is_an_error() {
        let result = ChatEvent::decode("join", r#"{"type":"event","event":"join"}"#);
        assert!(result.is_err(), "join without user should fail to decode");
    }

    #[test]
    fn kind_matches_wire_tags() {
        let payload = format!(r#"{{"event":"afk_return","user":{}}}"#, user_json("f"));
        let event = ChatEvent::decode("afk_return", &payload).unwrap().unwrap();
        assert_eq!(event.kind(), "afk_return");
    }
}
