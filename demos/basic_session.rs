//! # Basic Session Example
//!
//! Demonstrates a complete ChatBridge client lifecycle:
//!
//! 1. Connect to a relay via WebSocket (license token or guest)
//! 2. React to the ready notification and chat events
//! 3. Send a broadcast and a private message, awaiting their outcomes
//! 4. Shut down gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! CHATBRIDGE_TOKEN=your-license-token cargo run --example basic_session
//!
//! # Override the relay endpoint:
//! CHATBRIDGE_URL=ws://localhost:3553/v2/ cargo run --example basic_session
//! ```

use chatbridge_client::{
    ChatBridgeClient, ChatBridgeConfig, FormattingMode, MessageOptions, WebSocketConnector,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    // Without a token the relay accepts the connection as a read-only guest.
    let connector = match std::env::var("CHATBRIDGE_TOKEN") {
        Ok(token) => WebSocketConnector::new(token),
        Err(_) => {
            tracing::warn!("CHATBRIDGE_TOKEN not set, connecting as guest");
            WebSocketConnector::guest()
        }
    };
    let connector = match std::env::var("CHATBRIDGE_URL") {
        Ok(url) => connector.with_endpoint(url),
        Err(_) => connector,
    };

    let config = ChatBridgeConfig::new().with_default_name("RustDemo");
    let mut client = ChatBridgeClient::new(connector, config);

    // ── Subscriptions ───────────────────────────────────────────────
    client.events().on_ready(|hello| {
        tracing::info!(
            "session ready — license owner: {}, capabilities: {:?}",
            hello.license_owner,
            hello.capabilities
        );
    });

    client.events().on_players(|snapshot| {
        tracing::info!("{} player(s) online", snapshot.players.len());
    });

    client.events().on_ingame_chat(|chat| {
        tracing::info!("<{}> {}", chat.user.display_name, chat.text);
    });

    client.events().on_join(|join| {
        tracing::info!("{} joined the game", join.user.display_name);
    });

    client.events().on_leave(|leave| {
        tracing::info!("{} left the game", leave.user.display_name);
    });

    client.events().on_error(|notice| {
        tracing::warn!("request rejected: {}", notice.code());
    });

    client.events().on_closing(|closing| {
        tracing::warn!(
            "server is closing the connection: {} ({})",
            closing.close_reason,
            closing.reason.as_deref().unwrap_or("no detail")
        );
    });

    // ── Background chatter ──────────────────────────────────────────
    // Handles are cheap clones; sends queue immediately and resolve once
    // the server acknowledges them.
    let chatter = client.handle();
    tokio::spawn(async move {
        let delivered = chatter.say("Hello from the Rust client!").await;
        tracing::info!("broadcast delivered: {delivered}");

        if let Some(owner) = chatter.owner().await {
            let delivered = chatter
                .tell_with(
                    owner,
                    "*whispers* it works",
                    MessageOptions::new().with_mode(FormattingMode::Markdown),
                )
                .await;
            tracing::info!("tell delivered: {delivered}");
        }
    });

    // ── Graceful shutdown on Ctrl+C ─────────────────────────────────
    let closer = client.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, closing session");
            closer.close(false);
        }
    });

    // ── Run ─────────────────────────────────────────────────────────
    // Listens forever, reconnecting after drops, until deliberately
    // stopped (Ctrl+C above or a terminal closing envelope).
    client.run().await?;
    tracing::info!("session stopped");
    Ok(())
}
