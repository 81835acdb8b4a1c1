//! Transport abstraction for the ChatBridge protocol.
//!
//! The [`Transport`] trait defines a bidirectional text frame channel between
//! the client and server. The protocol itself is single-line JSON envelopes,
//! but the trait hands chunks up as [`Frame`]s so that transports which split
//! a logical message across several reads (continuation frames, bounded read
//! buffers) compose with the session's [`FrameAssembler`](crate::frame::FrameAssembler).
//!
//! # Connection Setup
//!
//! Dialing is separated into the [`Connector`] trait: the session needs to
//! re-dial after a dropped connection, and different transports have
//! fundamentally different connection parameters (URLs plus auth token for
//! WebSocket, host:port for TCP, scripted transports in tests). A
//! [`Connector`] produces one connected [`Transport`] per call.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use chatbridge_client::error::ChatBridgeError;
//! use chatbridge_client::frame::Frame;
//! use chatbridge_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ChatBridgeError> {
//!         // Send one complete JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<Frame, ChatBridgeError>> {
//!         // Receive the next frame; return None when the connection is
//!         // closed cleanly without a close frame
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ChatBridgeError> {
//!         // Gracefully shut down the connection
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::frame::Frame;

/// A bidirectional text frame transport for the ChatBridge protocol.
///
/// Implementors shuttle serialized JSON between the client and server. Each
/// call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns the next [`Frame`], which
/// may be a partial chunk of a logical message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is
/// used inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose data. Channel-based implementations (e.g.,
/// wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one complete JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ChatBridgeError::TransportSend`](crate::error::ChatBridgeError::TransportSend)
    /// if the message could not be sent (e.g., connection broken, write
    /// buffer full).
    async fn send(&mut self, message: String) -> Result<()>;

    /// Receive the next frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(frame))` — a text chunk or a close frame was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection ended without a close handshake
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<Frame>>;

    /// Close the transport connection gracefully.
    ///
    /// Idempotent: closing an already-closed transport succeeds. After
    /// calling this method, subsequent calls to [`send`](Transport::send)
    /// and [`recv`](Transport::recv) may return errors or `None`.
    async fn close(&mut self) -> Result<()>;
}

/// Dials new [`Transport`] connections on behalf of the session.
///
/// The session owns exactly one live transport at a time; the previous
/// connection is always closed and dropped before [`connect`](Connector::connect)
/// is called again.
#[async_trait]
pub trait Connector: Send + 'static {
    /// The transport type this connector produces.
    type Transport: Transport;

    /// Establish a new connection to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ChatBridgeError::Connect`](crate::error::ChatBridgeError::Connect)
    /// when the connection cannot be established or does not reach the open
    /// state; the message carries the server-reported close description when
    /// one is available.
    async fn connect(&mut self) -> Result<Self::Transport>;
}
