//! # ChatBridge Client
//!
//! Transport-agnostic Rust client for the ChatBridge real-time chat relay
//! protocol.
//!
//! This crate provides a high-level async client that maintains a persistent
//! connection to a ChatBridge relay, decodes inbound JSON envelopes into
//! typed domain events, and drains outbound chat requests through a
//! rate-limited, correlation-tracked send queue.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] and
//!   [`Connector`](transport::Connector) traits for any backend
//! - **WebSocket built-in** — the default `transport-websocket` feature
//!   provides [`WebSocketTransport`] and [`WebSocketConnector`]
//! - **Typed events** — subscribe per [`ChatEvent`] variant and for
//!   connection lifecycle notifications
//! - **Reconnect-safe sends** — requests queued before a disconnect are
//!   retried after the next successful `hello`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chatbridge_client::{ChatBridgeClient, ChatBridgeConfig, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new("my-license-token");
//! let mut client = ChatBridgeClient::new(connector, ChatBridgeConfig::new());
//!
//! client.events().on_ingame_chat(|chat| {
//!     println!("<{}> {}", chat.user.display_name, chat.text);
//! });
//!
//! client.run().await?;
//! ```

pub mod client;
pub mod dispatch;
pub mod error;
pub mod error_codes;
pub mod events;
pub mod frame;
pub mod protocol;
pub mod queue;
pub mod roster;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{ChatBridgeClient, ChatBridgeConfig, ChatBridgeHandle, MessageOptions, SessionStatus};
pub use dispatch::{ErrorNotice, EventDispatcher};
pub use error::ChatBridgeError;
pub use error_codes::ServerErrorCode;
pub use events::ChatEvent;
pub use frame::Frame;
pub use protocol::{Capability, ChatRequest, FormattingMode, User};
pub use queue::Delivery;
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
