//! Subscriber registry and event fan-out.
//!
//! [`EventDispatcher`] keeps an explicit list of registered callbacks per
//! [`ChatEvent`] variant plus the connection-lifecycle notifications
//! (ready, players-updated, closing, error, raw envelope). Subscribers are
//! invoked synchronously, in registration order, from the session's receive
//! path — fan-out never reorders or parallelizes event handling.
//!
//! AFK and AFK-return events additionally upsert the contained user into
//! the roster before subscribers run, independent of whether anyone is
//! subscribed.

use tracing::trace;

use crate::error_codes::ServerErrorCode;
use crate::events::{
    Afk, AfkReturn, ChatEvent, ChatboxChatMessage, ChatboxCommand, Death, DiscordChatMessage,
    IngameChatMessage, Join, Leave, ServerRestartCancelled, ServerRestartScheduled, WorldChange,
};
use crate::protocol::{ClosingEnvelope, ErrorEnvelope, HelloEnvelope, PlayersEnvelope};
use crate::roster::Roster;

/// The error notification surfaced to subscribers when the server rejects
/// a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorNotice {
    /// Machine-readable error tag, verbatim from the wire.
    pub error: Option<String>,
    /// Human-readable detail.
    pub message: Option<String>,
}

impl ErrorNotice {
    pub(crate) fn from_envelope(envelope: &ErrorEnvelope) -> Self {
        Self {
            error: envelope.error.clone(),
            message: envelope.message.clone(),
        }
    }

    /// Classify the raw tag into a [`ServerErrorCode`].
    pub fn code(&self) -> ServerErrorCode {
        self.error
            .as_deref()
            .map_or(ServerErrorCode::Unknown, ServerErrorCode::from_tag)
    }
}

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;
type RawCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Per-variant subscriber lists. Registration order is invocation order.
#[derive(Default)]
pub struct EventDispatcher {
    ingame_chat: Vec<Callback<IngameChatMessage>>,
    discord_chat: Vec<Callback<DiscordChatMessage>>,
    chatbox_chat: Vec<Callback<ChatboxChatMessage>>,
    command: Vec<Callback<ChatboxCommand>>,
    join: Vec<Callback<Join>>,
    leave: Vec<Callback<Leave>>,
    death: Vec<Callback<Death>>,
    afk: Vec<Callback<Afk>>,
    afk_return: Vec<Callback<AfkReturn>>,
    world_change: Vec<Callback<WorldChange>>,
    restart_scheduled: Vec<Callback<ServerRestartScheduled>>,
    restart_cancelled: Vec<Callback<ServerRestartCancelled>>,

    ready: Vec<Callback<HelloEnvelope>>,
    players: Vec<Callback<PlayersEnvelope>>,
    closing: Vec<Callback<ClosingEnvelope>>,
    error: Vec<Callback<ErrorNotice>>,
    raw: Vec<RawCallback>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("ingame_chat", &self.ingame_chat.len())
            .field("discord_chat", &self.discord_chat.len())
            .field("chatbox_chat", &self.chatbox_chat.len())
            .field("command", &self.command.len())
            .field("join", &self.join.len())
            .field("leave", &self.leave.len())
            .field("death", &self.death.len())
            .field("afk", &self.afk.len())
            .field("afk_return", &self.afk_return.len())
            .field("world_change", &self.world_change.len())
            .field("restart_scheduled", &self.restart_scheduled.len())
            .field("restart_cancelled", &self.restart_cancelled.len())
            .field("ready", &self.ready.len())
            .field("players", &self.players.len())
            .field("closing", &self.closing.len())
            .field("error", &self.error.len())
            .field("raw", &self.raw.len())
            .finish()
    }
}

macro_rules! subscribe {
    ($(#[$doc:meta])* $method:ident, $field:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $method(&mut self, subscriber: impl Fn(&$ty) + Send + Sync + 'static) {
            self.$field.push(Box::new(subscriber));
        }
    };
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    subscribe!(
        /// Subscribe to in-game chat messages.
        on_ingame_chat, ingame_chat, IngameChatMessage
    );
    subscribe!(
        /// Subscribe to relayed Discord chat messages.
        on_discord_chat, discord_chat, DiscordChatMessage
    );
    subscribe!(
        /// Subscribe to chatbox broadcasts from other clients.
        on_chatbox_chat, chatbox_chat, ChatboxChatMessage
    );
    subscribe!(
        /// Subscribe to chatbox command events.
        on_command, command, ChatboxCommand
    );
    subscribe!(
        /// Subscribe to player join events.
        on_join, join, Join
    );
    subscribe!(
        /// Subscribe to player leave events.
        on_leave, leave, Leave
    );
    subscribe!(
        /// Subscribe to player death events.
        on_death, death, Death
    );
    subscribe!(
        /// Subscribe to players going AFK.
        on_afk, afk, Afk
    );
    subscribe!(
        /// Subscribe to players returning from AFK.
        on_afk_return, afk_return, AfkReturn
    );
    subscribe!(
        /// Subscribe to world-change events.
        on_world_change, world_change, WorldChange
    );
    subscribe!(
        /// Subscribe to scheduled server restarts.
        on_server_restart_scheduled, restart_scheduled, ServerRestartScheduled
    );
    subscribe!(
        /// Subscribe to cancelled server restarts.
        on_server_restart_cancelled, restart_cancelled, ServerRestartCancelled
    );
    subscribe!(
        /// Subscribe to the ready notification (fired on each `hello`).
        on_ready, ready, HelloEnvelope
    );
    subscribe!(
        /// Subscribe to roster snapshot updates.
        on_players, players, PlayersEnvelope
    );
    subscribe!(
        /// Subscribe to the closing notification.
        on_closing, closing, ClosingEnvelope
    );
    subscribe!(
        /// Subscribe to error notifications for rejected requests.
        on_error, error, ErrorNotice
    );

    /// Subscribe to every inbound envelope payload, verbatim, before any
    /// routing happens.
    pub fn on_raw(&mut self, subscriber: impl Fn(&str) + Send + Sync + 'static) {
        self.raw.push(Box::new(subscriber));
    }

    /// Decode the event-specific payload of an `event` envelope, apply the
    /// AFK roster side effect, and notify the matching subscribers.
    ///
    /// Unknown sub-kinds are dropped without notifying anyone.
    pub(crate) async fn dispatch_event(
        &self,
        kind: &str,
        payload: &str,
        roster: &Roster,
    ) -> crate::error::Result<()> {
        let Some(event) = ChatEvent::decode(kind, payload)? else {
            trace!(kind, "dropping event with unrecognized sub-kind");
            return Ok(());
        };

        match &event {
            ChatEvent::Afk(afk) => roster.upsert(afk.user.clone()).await,
            ChatEvent::AfkReturn(afk_return) => roster.upsert(afk_return.user.clone()).await,
            _ => {}
        }

        self.notify(&event);
        Ok(())
    }

    /// Invoke the subscribers for one decoded event, in registration order.
    fn notify(&self, event: &ChatEvent) {
        match event {
            ChatEvent::IngameChat(e) => self.ingame_chat.iter().for_each(|s| s(e)),
            ChatEvent::DiscordChat(e) => self.discord_chat.iter().for_each(|s| s(e)),
            ChatEvent::ChatboxChat(e) => self.chatbox_chat.iter().for_each(|s| s(e)),
            ChatEvent::Command(e) => self.command.iter().for_each(|s| s(e)),
            ChatEvent::Join(e) => self.join.iter().for_each(|s| s(e)),
            ChatEvent::Leave(e) => self.leave.iter().for_each(|s| s(e)),
            ChatEvent::Death(e) => self.death.iter().for_each(|s| s(e)),
            ChatEvent::Afk(e) => self.afk.iter().for_each(|s| s(e)),
            ChatEvent::AfkReturn(e) => self.afk_return.iter().for_each(|s| s(e)),
            ChatEvent::WorldChange(e) => self.world_change.iter().for_each(|s| s(e)),
            ChatEvent::ServerRestartScheduled(e) => {
                self.restart_scheduled.iter().for_each(|s| s(e));
            }
            ChatEvent::ServerRestartCancelled(e) => {
                self.restart_cancelled.iter().for_each(|s| s(e));
            }
        }
    }

    pub(crate) fn emit_ready(&self, hello: &HelloEnvelope) {
        self.ready.iter().for_each(|s| s(hello));
    }

    pub(crate) fn emit_players(&self, players: &PlayersEnvelope) {
        self.players.iter().for_each(|s| s(players));
    }

    pub(crate) fn emit_closing(&self, closing: &ClosingEnvelope) {
        self.closing.iter().for_each(|s| s(closing));
    }

    pub(crate) fn emit_error(&self, notice: &ErrorNotice) {
        self.error.iter().for_each(|s| s(notice));
    }

    pub(crate) fn emit_raw(&self, payload: &str) {
        self.raw.iter().for_each(|s| s(payload));
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
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn join_payload() -> String {
        r#"{"type":"event","event":"join","user":{
            "uuid":"00000000-0000-0000-0000-000000000001",
            "displayName":"Alice","name":"alice"}}"#
            .to_string()
    }

    fn afk_payload() -> String {
        r#"{"type":"event","event":"afk","user":{
            "uuid":"00000000-0000-0000-0000-000000000002",
            "displayName":"Bob","name":"bob","afk":true}}"#
            .to_string()
    }

    #[tokio::test]
    async fn subscribers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        for tag in 1..=3 {
            let order = Arc::clone(&order);
            dispatcher.on_join(move |_| order.lock().unwrap().push(tag));
        }

        let roster = Roster::new();
        dispatcher
            .dispatch_event("join", &join_payload(), &roster)
            .await
            .unwrap();

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn only_matching_variant_subscribers_fire() {
        let joins = Arc::new(AtomicUsize::new(0));
        let leaves = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = EventDispatcher::new();
        {
            let joins = Arc::clone(&joins);
            dispatcher.on_join(move |_| {
                joins.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let leaves = Arc::clone(&leaves);
            dispatcher.on_leave(move |_| {
                leaves.fetch_add(1, Ordering::SeqCst);
            });
        }

        let roster = Roster::new();
        dispatcher
            .dispatch_event("join", &join_payload(), &roster)
            .await
            .unwrap();

        assert_eq!(joins.load(Ordering::SeqCst), 1);
        assert_eq!(leaves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_sub_kind_invokes_no_subscriber() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = EventDispatcher::new();
        {
            let fired = Arc::clone(&fired);
            dispatcher.on_join(move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        let roster = Roster::new();
        let result = dispatcher
            .dispatch_event(
                "meteor_strike",
                r#"{"type":"event","event":"meteor_strike"}"#,
                &roster,
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn afk_upserts_roster_without_subscribers() {
        let dispatcher = EventDispatcher::new();
        let roster = Roster::new();

        dispatcher
            .dispatch_event("afk", &afk_payload(), &roster)
            .await
            .unwrap();

        let bob = roster.get(Uuid::from_u128(2)).await.unwrap();
        assert_eq!(bob.afk, Some(true));
    }

    #[tokio::test]
    async fn afk_return_replaces_roster_entry() {
        let dispatcher = EventDispatcher::new();
        let roster = Roster::new();

        dispatcher
            .dispatch_event("afk", &afk_payload(), &roster)
            .await
            .unwrap();

        let back_payload = r#"{"type":"event","event":"afk_return","user":{
            "uuid":"00000000-0000-0000-0000-000000000002",
            "displayName":"Bob","name":"bob","afk":false}}"#;
        dispatcher
            .dispatch_event("afk_return", back_payload, &roster)
            .await
            .unwrap();

        assert_eq!(roster.len().await, 1);
        let bob = roster.get(Uuid::from_u128(2)).await.unwrap();
        assert_eq!(bob.afk, Some(false));
    }

    #[test]
    fn lifecycle_emitters_reach_their_subscribers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        {
            let seen = Arc::clone(&seen);
            dispatcher.on_ready(move |hello| {
                seen.lock().unwrap().push(format!("ready:{}", hello.license_owner));
            });
        }
        {
            let seen = Arc::clone(&seen);
            dispatcher.on_error(move |notice| {
                seen.lock()
                    .unwrap()
                    .push(format!("error:{:?}", notice.code()));
            });
        }
        {
            let seen = Arc::clone(&seen);
            dispatcher.on_raw(move |payload| {
                seen.lock().unwrap().push(format!("raw:{payload}"));
            });
        }

        dispatcher.emit_ready(&HelloEnvelope {
            guest: false,
            license_owner: "alice".into(),
            capabilities: vec![],
        });
        dispatcher.emit_error(&ErrorNotice {
            error: Some("user_not_found".into()),
            message: None,
        });
        dispatcher.emit_raw("{}");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "ready:alice".to_string(),
                "error:UserNotFound".to_string(),
                "raw:{}".to_string()
            ]
        );
    }

    #[test]
    fn error_notice_code_classification() {
        let notice = ErrorNotice {
            error: Some("rate_limited".into()),
            message: Some("slow down".into()),
        };
        assert_eq!(notice.code(), ServerErrorCode::RateLimited);

        let no_tag = ErrorNotice {
            error: None,
            message: None,
        };
        assert_eq!(no_tag.code(), ServerErrorCode::Unknown);
    }
}
