//! Transport implementations for the ChatBridge relay protocol.
//!
//! This module provides concrete [`Transport`](crate::Transport) and
//! [`Connector`](crate::transport::Connector) implementations behind feature
//! gates. Enable the corresponding Cargo feature to pull in a transport:
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), chatbridge_client::ChatBridgeError> {
//! use chatbridge_client::{Transport, WebSocketTransport};
//!
//! let mut ws = WebSocketTransport::connect("ws://localhost:3553/v2/token").await?;
//! ws.send(r#"{"id":0,"type":"say","text":"ping"}"#.to_string()).await?;
//!
//! if let Some(Ok(frame)) = ws.recv().await {
//!     println!("server said: {frame:?}");
//! }
//!
//! ws.close().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
