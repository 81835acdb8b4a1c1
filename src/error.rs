//! Error types for the ChatBridge client.

use thiserror::Error;

/// Errors that can occur when using the ChatBridge client.
#[derive(Debug, Error)]
pub enum ChatBridgeError {
    /// The connection could not be established or did not reach the open
    /// state. Carries the server-reported close/handshake description when
    /// one is available.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol envelope.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the
    /// client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for ChatBridge client operations.
pub type Result<T> = std::result::Result<T, ChatBridgeError>;
