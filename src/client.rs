//! Async client for the ChatBridge relay protocol.
//!
//! [`ChatBridgeClient`] owns the connection lifecycle: a single receive loop
//! decodes inbound envelopes and performs every session state mutation, while
//! one long-lived drain task feeds the outbound queue through the connection
//! at the server's rate limit. Chat requests are correlated with their
//! `success`/`error` acknowledgments and resolved through [`Delivery`]
//! handles.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new(Some("my-license-token"));
//! let mut client = ChatBridgeClient::new(connector, ChatBridgeConfig::new());
//!
//! client.events().on_ingame_chat(|chat| {
//!     println!("<{}> {}", chat.user.display_name, chat.text);
//! });
//!
//! let handle = client.handle();
//! tokio::spawn(async move {
//!     let delivered = handle.say("Hello from Rust!").await;
//!     println!("delivered: {delivered}");
//! });
//!
//! client.run().await?;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, error, warn};

use crate::dispatch::{ErrorNotice, EventDispatcher};
use crate::error::Result;
use crate::frame::{Frame, FrameAssembler};
use crate::protocol::{
    decode_envelope, Capability, ChatRequestKind, FormattingMode, ServerEnvelope, User,
};
use crate::queue::{Delivery, OutboundQueue, PendingAcks, QueuedRequest, RequestDraft};
use crate::roster::Roster;
use crate::transport::{Connector, Transport};

/// Fixed delay between consecutive outbound sends (server rate limit).
const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(500);

/// Fixed delay before re-dialing after a dropped connection.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// The `closeReason` tag that keeps the session alive through a restart.
const CLOSE_REASON_SERVER_STOPPING: &str = "server_stopping";

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ChatBridgeClient`].
///
/// All fields have defaults; endpoint and token live on the
/// [`Connector`](crate::transport::Connector).
///
/// # Example
///
/// ```
/// use chatbridge_client::client::ChatBridgeConfig;
/// use chatbridge_client::protocol::FormattingMode;
///
/// let config = ChatBridgeConfig::new()
///     .with_default_name("AnnouncerBot")
///     .with_default_mode(FormattingMode::Markdown);
/// assert_eq!(config.default_name.as_deref(), Some("AnnouncerBot"));
/// ```
#[derive(Debug, Clone)]
pub struct ChatBridgeConfig {
    /// Chatbox label applied to outbound messages that do not override it.
    pub default_name: Option<String>,
    /// Formatting mode applied to outbound messages that do not override it.
    pub default_mode: FormattingMode,
    /// Delay between consecutive outbound sends.
    ///
    /// Defaults to **500 ms**, matching the server's rate limit. Lowering it
    /// below the server's limit gets requests rejected.
    pub send_interval: Duration,
    /// Delay before re-dialing after a dropped connection.
    ///
    /// Defaults to **60 seconds**. Applied on every reconnect, never on the
    /// very first connect.
    pub reconnect_delay: Duration,
}

impl Default for ChatBridgeConfig {
    fn default() -> Self {
        Self {
            default_name: None,
            default_mode: FormattingMode::Format,
            send_interval: DEFAULT_SEND_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ChatBridgeConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default chatbox label for outbound messages.
    #[must_use]
    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    /// Set the default formatting mode for outbound messages.
    #[must_use]
    pub fn with_default_mode(mut self, mode: FormattingMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Set the delay between consecutive outbound sends.
    #[must_use]
    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    /// Set the delay before re-dialing after a dropped connection.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

// ── Per-call message options ────────────────────────────────────────

/// Per-call overrides for `say`/`tell`.
///
/// Unset fields fall back to the [`ChatBridgeConfig`] defaults at enqueue
/// time; the resolved values are frozen into the request.
#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
    /// Chatbox label override.
    pub name: Option<String>,
    /// Formatting mode override.
    pub mode: Option<FormattingMode>,
}

impl MessageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the chatbox label for this message.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the formatting mode for this message.
    #[must_use]
    pub fn with_mode(mut self, mode: FormattingMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

// ── Session status ──────────────────────────────────────────────────

/// Connection status of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No connection, and none being established.
    Disconnected,
    /// A connection is established or being established, but the server's
    /// `hello` has not arrived yet.
    Connecting,
    /// `hello` received; outbound sends are permitted.
    Ready,
    /// The server announced a terminal close; the session is winding down.
    Closing,
}

impl SessionStatus {
    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Ready => 2,
            Self::Closing => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::Closing,
            _ => Self::Disconnected,
        }
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the client, its handles, the receive loop and the
/// drain task. Only the receive loop mutates session state; everyone else
/// reads copies.
struct Shared {
    config: ChatBridgeConfig,
    status: AtomicU8,
    running: AtomicBool,
    close_requested: AtomicBool,
    guest: AtomicBool,
    owner: Mutex<Option<String>>,
    capabilities: Mutex<Vec<Capability>>,
    roster: Roster,
    queue: OutboundQueue,
    pending: PendingAcks,
    /// Writer half of the current connection's outbound channel; replaced
    /// wholesale on reconnect.
    wire: StdMutex<Option<mpsc::UnboundedSender<String>>>,
    ready_notify: Notify,
    close_notify: Notify,
}

impl Shared {
    fn new(config: ChatBridgeConfig) -> Self {
        Self {
            config,
            status: AtomicU8::new(SessionStatus::Disconnected.as_u8()),
            running: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            guest: AtomicBool::new(false),
            owner: Mutex::new(None),
            capabilities: Mutex::new(Vec::new()),
            roster: Roster::new(),
            queue: OutboundQueue::new(),
            pending: PendingAcks::new(),
            wire: StdMutex::new(None),
            ready_notify: Notify::new(),
            close_notify: Notify::new(),
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: SessionStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
        if status == SessionStatus::Ready {
            self.ready_notify.notify_one();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Park until the session is in the ready state.
    async fn wait_ready(&self) {
        loop {
            let notified = self.ready_notify.notified();
            if self.status() == SessionStatus::Ready {
                return;
            }
            notified.await;
        }
    }

    /// Signal the session loop to close the current connection.
    fn request_close(&self, soft: bool) {
        if !soft {
            self.set_running(false);
        }
        self.close_requested.store(true, Ordering::Release);
        self.close_notify.notify_one();
    }

    /// Consume a pending close request, if any.
    fn take_close_request(&self) -> bool {
        self.close_requested.swap(false, Ordering::AcqRel)
    }

    /// Resolve once a close has been requested.
    async fn closed_signal(&self) {
        loop {
            let notified = self.close_notify.notified();
            if self.close_requested.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    fn lock_wire(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.wire.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install_wire(&self, tx: mpsc::UnboundedSender<String>) {
        *self.lock_wire() = Some(tx);
    }

    fn clear_wire(&self) {
        *self.lock_wire() = None;
    }

    /// Hand a serialized frame to the current connection's writer.
    fn wire_send(&self, json: String) -> std::result::Result<(), ()> {
        match self.lock_wire().as_ref() {
            Some(tx) => tx.send(json).map_err(|_| ()),
            None => Err(()),
        }
    }

    /// Resolve per-call options against the config defaults and enqueue.
    fn enqueue(
        &self,
        kind: ChatRequestKind,
        user: Option<String>,
        text: String,
        options: MessageOptions,
    ) -> Delivery {
        self.queue.enqueue(RequestDraft {
            kind,
            user,
            text,
            name: options.name.or_else(|| self.config.default_name.clone()),
            mode: Some(options.mode.unwrap_or(self.config.default_mode)),
        })
    }
}

// ── Cloneable handle ────────────────────────────────────────────────

/// A cheap, cloneable handle for interacting with the session from other
/// tasks (including from inside event subscribers).
///
/// Sends are queued immediately and delivered in the background; `close`
/// signals the session loop, which owns the socket.
#[derive(Clone)]
pub struct ChatBridgeHandle {
    shared: Arc<Shared>,
}

impl ChatBridgeHandle {
    /// Broadcast a message to the in-game chat.
    ///
    /// Returns immediately with a [`Delivery`] that resolves to `true` once
    /// the server acknowledges the message.
    pub fn say(&self, text: impl Into<String>) -> Delivery {
        self.say_with(text, MessageOptions::new())
    }

    /// Broadcast a message with per-call label/mode overrides.
    pub fn say_with(&self, text: impl Into<String>, options: MessageOptions) -> Delivery {
        self.shared
            .enqueue(ChatRequestKind::Say, None, text.into(), options)
    }

    /// Send a private message to one player (by name or UUID).
    ///
    /// The [`Delivery`] resolves to `false` when the player is not found.
    pub fn tell(&self, user: impl Into<String>, text: impl Into<String>) -> Delivery {
        self.tell_with(user, text, MessageOptions::new())
    }

    /// Send a private message with per-call label/mode overrides.
    pub fn tell_with(
        &self,
        user: impl Into<String>,
        text: impl Into<String>,
        options: MessageOptions,
    ) -> Delivery {
        self.shared
            .enqueue(ChatRequestKind::Tell, Some(user.into()), text.into(), options)
    }

    /// Request that the session close its connection.
    ///
    /// With `soft == false` the running flag is cleared and
    /// [`ChatBridgeClient::run`] returns once the socket is down; with
    /// `soft == true` only the socket is closed and the run loop proceeds
    /// to its normal reconnect path.
    pub fn close(&self, soft: bool) {
        self.shared.request_close(soft);
    }

    /// Whether the session considers itself running (set by `hello`,
    /// cleared by a terminal `closing` envelope or a non-soft close).
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Current connection status.
    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    /// Whether this is an unauthenticated guest session.
    pub fn is_guest(&self) -> bool {
        self.shared.guest.load(Ordering::Acquire)
    }

    /// Identity of the license owner, once a `hello` has arrived.
    pub async fn owner(&self) -> Option<String> {
        self.shared.owner.lock().await.clone()
    }

    /// Capabilities granted to this connection.
    pub async fn capabilities(&self) -> Vec<Capability> {
        self.shared.capabilities.lock().await.clone()
    }

    /// A snapshot of the current player roster.
    pub async fn players(&self) -> Vec<User> {
        self.shared.roster.snapshot().await
    }
}

impl std::fmt::Debug for ChatBridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatBridgeHandle")
            .field("status", &self.status())
            .field("running", &self.is_running())
            .finish()
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Async client for the ChatBridge relay protocol.
///
/// Construct with a [`Connector`], register subscribers through
/// [`events`](ChatBridgeClient::events), then drive the session with
/// [`run`](ChatBridgeClient::run). `run` reconnects automatically after
/// dropped connections and returns only when the session is deliberately
/// stopped.
pub struct ChatBridgeClient<C: Connector> {
    connector: C,
    shared: Arc<Shared>,
    dispatcher: EventDispatcher,
    /// A connection established by `connect` but not yet driven by `run`.
    transport: Option<C::Transport>,
}

impl<C: Connector> ChatBridgeClient<C> {
    /// Create a client over the given connector.
    pub fn new(connector: C, config: ChatBridgeConfig) -> Self {
        Self {
            connector,
            shared: Arc::new(Shared::new(config)),
            dispatcher: EventDispatcher::new(),
            transport: None,
        }
    }

    /// The subscriber registry. Register callbacks before calling
    /// [`run`](ChatBridgeClient::run).
    pub fn events(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    /// A cloneable handle for use from other tasks.
    pub fn handle(&self) -> ChatBridgeHandle {
        ChatBridgeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    // ── Public operations ───────────────────────────────────────────

    /// Establish a connection to the server.
    ///
    /// Any prior connection is closed and released first; exactly one
    /// physical socket is live per session at a time.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when the connection cannot be
    /// established; the session returns to the disconnected state.
    pub async fn connect(&mut self) -> Result<()> {
        if let Some(mut old) = self.transport.take() {
            let _ = old.close().await;
        }
        self.shared.set_status(SessionStatus::Connecting);
        match self.connector.connect().await {
            Ok(transport) => {
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => {
                self.shared.set_status(SessionStatus::Disconnected);
                Err(e)
            }
        }
    }

    /// Connect (if not already connected) and listen until the session is
    /// deliberately stopped.
    ///
    /// Dropped connections are re-dialed after the configured reconnect
    /// delay for as long as the running flag is set. On return, every
    /// queued or in-flight request has been resolved to failure.
    ///
    /// # Errors
    ///
    /// Returns an error only when the *initial* connection cannot be
    /// established. Later transport failures are handled by the reconnect
    /// path and never unwind out of `run`.
    pub async fn run(&mut self) -> Result<()> {
        if self.transport.is_none() {
            self.connect().await?;
        }

        // The single drain worker for this run; it survives reconnects and
        // parks itself whenever the session is not ready.
        let drain = tokio::spawn(drain_loop(Arc::clone(&self.shared)));

        loop {
            if let Some(transport) = self.transport.take() {
                self.listen(transport).await;
            }
            if !self.shared.is_running() {
                break;
            }

            self.wait_reconnect_delay().await;
            if !self.shared.is_running() {
                break;
            }
            if let Err(e) = self.connect().await {
                warn!("reconnect failed: {e}");
                // Still running: try again after another delay.
            }
        }

        drain.abort();
        // Wait for the abort to land so the drain task cannot register a
        // correlation concurrently with the teardown below.
        let _ = drain.await;
        self.teardown();
        debug!("session stopped");
        Ok(())
    }

    /// Close the connection.
    ///
    /// The socket is fully closed either way; `soft` only controls whether
    /// the running flag survives. `run` cannot be active concurrently (it
    /// holds the `&mut self` borrow), so this acts on the held connection
    /// directly — to stop a running session from another task, use
    /// [`ChatBridgeHandle::close`].
    pub async fn close(&mut self, soft: bool) {
        if !soft {
            self.shared.set_running(false);
        }
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.shared.set_status(SessionStatus::Disconnected);
        if !soft {
            self.teardown();
        }
    }

    /// Close the current connection and dial a new one.
    ///
    /// With `wait == true` the close is soft and the configured reconnect
    /// delay is observed before dialing; with `wait == false` the close
    /// also clears the running flag, mirroring the close semantics.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when the new connection cannot be
    /// established.
    pub async fn reconnect(&mut self, wait: bool) -> Result<()> {
        self.close(wait).await;
        if wait {
            tokio::time::sleep(self.shared.config.reconnect_delay).await;
        }
        self.connect().await
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Broadcast a message to the in-game chat. See [`ChatBridgeHandle::say`].
    pub fn say(&self, text: impl Into<String>) -> Delivery {
        self.handle().say(text)
    }

    /// Broadcast a message with per-call overrides.
    pub fn say_with(&self, text: impl Into<String>, options: MessageOptions) -> Delivery {
        self.handle().say_with(text, options)
    }

    /// Send a private message to one player. See [`ChatBridgeHandle::tell`].
    pub fn tell(&self, user: impl Into<String>, text: impl Into<String>) -> Delivery {
        self.handle().tell(user, text)
    }

    /// Send a private message with per-call overrides.
    pub fn tell_with(
        &self,
        user: impl Into<String>,
        text: impl Into<String>,
        options: MessageOptions,
    ) -> Delivery {
        self.handle().tell_with(user, text, options)
    }

    /// Whether the session considers itself running.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Current connection status.
    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    /// Whether this is an unauthenticated guest session.
    pub fn is_guest(&self) -> bool {
        self.shared.guest.load(Ordering::Acquire)
    }

    /// Identity of the license owner, once a `hello` has arrived.
    pub async fn owner(&self) -> Option<String> {
        self.shared.owner.lock().await.clone()
    }

    /// Capabilities granted to this connection.
    pub async fn capabilities(&self) -> Vec<Capability> {
        self.shared.capabilities.lock().await.clone()
    }

    /// A snapshot of the current player roster.
    pub async fn players(&self) -> Vec<User> {
        self.shared.roster.snapshot().await
    }

    // ── Session internals ───────────────────────────────────────────

    /// Drive one connection until it closes (server close, transport error,
    /// or caller-requested close). All envelope routing and session state
    /// mutation happens here, strictly in arrival order.
    async fn listen(&mut self, mut transport: C::Transport) {
        // A close requested while dialing applies to this connection.
        if self.shared.take_close_request() {
            debug!("close requested before session loop start");
            let _ = transport.close().await;
            self.shared.set_status(SessionStatus::Disconnected);
            return;
        }

        let (wire_tx, mut wire_rx) = mpsc::unbounded_channel::<String>();
        self.shared.install_wire(wire_tx);
        let mut assembler = FrameAssembler::new();
        debug!("session loop started");

        loop {
            tokio::select! {
                incoming = transport.recv() => match incoming {
                    Some(Ok(Frame::Text { data, end_of_message })) => {
                        if let Some(payload) = assembler.push(&data, end_of_message) {
                            self.route(&payload).await;
                        }
                    }
                    Some(Ok(Frame::Close { reason })) => {
                        debug!(?reason, "received close frame");
                        assembler.abort();
                        break;
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        break;
                    }
                    None => {
                        debug!("transport closed by server");
                        break;
                    }
                },

                outbound = wire_rx.recv() => {
                    // The sender lives in `shared.wire` until `clear_wire`,
                    // so `recv` cannot yield `None` inside this loop.
                    if let Some(json) = outbound {
                        if let Err(e) = transport.send(json).await {
                            error!("transport send error: {e}");
                            break;
                        }
                    }
                },

                _ = self.shared.closed_signal() => {
                    debug!("close requested by caller");
                    self.shared.take_close_request();
                    break;
                }
            }
        }

        self.shared.clear_wire();
        self.shared.set_status(SessionStatus::Disconnected);
        let _ = transport.close().await;
        debug!("session loop exited");
    }

    /// Route one complete envelope payload.
    async fn route(&self, payload: &str) {
        self.dispatcher.emit_raw(payload);

        let envelope = match decode_envelope(payload) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                debug!("ignoring envelope with unrecognized kind");
                return;
            }
            Err(e) => {
                warn!("failed to decode envelope: {e} — raw: {payload}");
                return;
            }
        };

        match envelope {
            ServerEnvelope::Hello(hello) => {
                *self.shared.owner.lock().await = Some(hello.license_owner.clone());
                *self.shared.capabilities.lock().await = hello.capabilities.clone();
                self.shared.guest.store(hello.guest, Ordering::Release);
                self.shared.set_running(true);
                self.shared.set_status(SessionStatus::Ready);
                debug!(owner = %hello.license_owner, guest = hello.guest, "session ready");
                self.dispatcher.emit_ready(&hello);
            }

            ServerEnvelope::Players(players) => {
                self.shared.roster.replace_all(players.players.clone()).await;
                self.dispatcher.emit_players(&players);
            }

            ServerEnvelope::Event(header) => {
                if let Err(e) = self
                    .dispatcher
                    .dispatch_event(&header.event, payload, &self.shared.roster)
                    .await
                {
                    warn!(kind = %header.event, "failed to decode event payload: {e}");
                }
            }

            ServerEnvelope::Success(success) => {
                if let Some(id) = success.id {
                    if !self.shared.pending.resolve(id, true) {
                        debug!(id, "success for unknown request id, ignoring");
                    }
                }
            }

            ServerEnvelope::Error(err) => {
                // Error envelopes without a matching in-flight request are a
                // benign race (already resolved, or predates this session).
                if let Some(id) = err.id {
                    if self.shared.pending.resolve(id, false) {
                        let notice = ErrorNotice::from_envelope(&err);
                        warn!(
                            id,
                            error = notice.error.as_deref().unwrap_or("unknown"),
                            "request rejected by server"
                        );
                        self.dispatcher.emit_error(&notice);
                    }
                }
            }

            ServerEnvelope::Closing(closing) => {
                debug!(
                    close_reason = %closing.close_reason,
                    "server announced connection close"
                );
                self.dispatcher.emit_closing(&closing);
                if closing.close_reason != CLOSE_REASON_SERVER_STOPPING {
                    self.shared.set_running(false);
                    self.shared.set_status(SessionStatus::Closing);
                }
            }
        }
    }

    /// Observe the reconnect backoff, waking early on a close request.
    async fn wait_reconnect_delay(&self) {
        let delay = self.shared.config.reconnect_delay;
        debug!(?delay, "waiting before reconnect");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = self.shared.closed_signal() => {
                debug!("close requested during reconnect delay");
                self.shared.take_close_request();
            }
        }
    }

    /// Resolve every queued and in-flight request to failure and mark the
    /// session disconnected.
    fn teardown(&self) {
        self.shared.queue.fail_all();
        self.shared.pending.fail_all();
        self.shared.set_status(SessionStatus::Disconnected);
        self.shared.set_running(false);
    }
}

impl<C: Connector> std::fmt::Debug for ChatBridgeClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatBridgeClient")
            .field("status", &self.status())
            .field("running", &self.is_running())
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}

// ── Drain task ──────────────────────────────────────────────────────

/// The queue drain worker: one per client run, parked while the session is
/// not ready, sending one request at a time with the configured inter-send
/// delay. A single worker for the whole run means no double-drain races
/// across reconnect cycles.
async fn drain_loop(shared: Arc<Shared>) {
    debug!("drain task started");
    loop {
        shared.wait_ready().await;
        let item = shared.queue.next().await;

        // The session may have left ready while we waited for an item.
        if shared.status() != SessionStatus::Ready {
            shared.queue.requeue_front(item);
            continue;
        }

        let QueuedRequest { request, ack } = item;
        let id = request.id;
        let json = match serde_json::to_string(&request) {
            Ok(json) => json,
            Err(e) => {
                error!(id, "failed to serialize chat request: {e}");
                let _ = ack.send(false);
                continue;
            }
        };

        // Register before handing the frame over so an acknowledgment can
        // never race ahead of its correlation entry.
        shared.pending.register(id, ack);
        if shared.wire_send(json).is_err() {
            // The connection went away between the ready check and the
            // send: reclaim the slot and retry on the next ready session.
            if let Some(ack) = shared.pending.take(id) {
                shared.queue.requeue_front(QueuedRequest { request, ack });
            }
            continue;
        }

        debug!(id, "chat request dispatched");
        tokio::time::sleep(shared.config.send_interval).await;
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::protocol::ChatRequest;

    #[test]
    fn config_defaults() {
        let config = ChatBridgeConfig::new();
        assert!(config.default_name.is_none());
        assert_eq!(config.default_mode, FormattingMode::Format);
        assert_eq!(config.send_interval, Duration::from_millis(500));
        assert_eq!(config.reconnect_delay, Duration::from_secs(60));
    }

    #[test]
    fn config_builder_methods() {
        let config = ChatBridgeConfig::new()
            .with_default_name("Bot")
            .with_default_mode(FormattingMode::Markdown)
            .with_send_interval(Duration::from_millis(10))
            .with_reconnect_delay(Duration::from_millis(20));
        assert_eq!(config.default_name.as_deref(), Some("Bot"));
        assert_eq!(config.default_mode, FormattingMode::Markdown);
        assert_eq!(config.send_interval, Duration::from_millis(10));
        assert_eq!(config.reconnect_delay, Duration::from_millis(20));
    }

    #[test]
    fn message_options_builder() {
        let options = MessageOptions::new()
            .with_name("Greeter")
            .with_mode(FormattingMode::Markdown);
        assert_eq!(options.name.as_deref(), Some("Greeter"));
        assert_eq!(options.mode, Some(FormattingMode::Markdown));
    }

    #[test]
    fn session_status_round_trips() {
        for status in [
            SessionStatus::Disconnected,
            SessionStatus::Connecting,
            SessionStatus::Ready,
            SessionStatus::Closing,
        ] {
            assert_eq!(SessionStatus::from_u8(status.as_u8()), status);
        }
        assert_eq!(SessionStatus::from_u8(200), SessionStatus::Disconnected);
    }

    #[test]
    fn enqueue_resolves_defaults_from_config() {
        let shared = Shared::new(ChatBridgeConfig::new().with_default_name("HouseBot"));
        let _delivery = shared.enqueue(
            ChatRequestKind::Say,
            None,
            "hello".into(),
            MessageOptions::new(),
        );

        let item = shared.queue.pop().unwrap();
        assert_eq!(item.request.name.as_deref(), Some("HouseBot"));
        assert_eq!(item.request.mode, Some(FormattingMode::Format));
    }

    #[test]
    fn enqueue_per_call_overrides_win() {
        let shared = Shared::new(ChatBridgeConfig::new().with_default_name("HouseBot"));
        let _delivery = shared.enqueue(
            ChatRequestKind::Tell,
            Some("alice".into()),
            "hi".into(),
            MessageOptions::new()
                .with_name("Override")
                .with_mode(FormattingMode::Markdown),
        );

        let item = shared.queue.pop().unwrap();
        assert_eq!(item.request.user.as_deref(), Some("alice"));
        assert_eq!(item.request.name.as_deref(), Some("Override"));
        assert_eq!(item.request.mode, Some(FormattingMode::Markdown));
    }

    #[test]
    fn enqueued_request_serializes_to_wire_schema() {
        let shared = Shared::new(ChatBridgeConfig::new());
        let _delivery = shared.enqueue(
            ChatRequestKind::Say,
            None,
            "hello world".into(),
            MessageOptions::new(),
        );
        let item = shared.queue.pop().unwrap();
        let json = serde_json::to_string(&item.request).unwrap();
        let parsed: ChatRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, 0);
        assert_eq!(parsed.kind, ChatRequestKind::Say);
        assert_eq!(parsed.text, "hello world");
        assert!(parsed.user.is_none());
    }

    #[tokio::test]
    async fn wait_ready_parks_until_ready_status() {
        let shared = Arc::new(Shared::new(ChatBridgeConfig::new()));
        let waiter = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                shared.wait_ready().await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        shared.set_status(SessionStatus::Ready);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn closed_signal_resolves_after_request_close() {
        let shared = Arc::new(Shared::new(ChatBridgeConfig::new()));
        shared.set_running(true);

        shared.request_close(false);
        // Permit is stored, so a waiter arriving later still resolves.
        shared.closed_signal().await;
        assert!(!shared.is_running());
        assert!(shared.take_close_request());
        assert!(!shared.take_close_request());
    }

    #[tokio::test]
    async fn soft_close_request_preserves_running_flag() {
        let shared = Shared::new(ChatBridgeConfig::new());
        shared.set_running(true);
        shared.request_close(true);
        assert!(shared.is_running());
    }

    #[test]
    fn wire_send_without_connection_fails() {
        let shared = Shared::new(ChatBridgeConfig::new());
        assert!(shared.wire_send("{}".into()).is_err());

        let (tx, mut rx) = mpsc::unbounded_channel();
        shared.install_wire(tx);
        assert!(shared.wire_send("{}".into()).is_ok());
        assert_eq!(rx.try_recv().unwrap(), "{}");

        shared.clear_wire();
        assert!(shared.wire_send("{}".into()).is_err());
    }
}
