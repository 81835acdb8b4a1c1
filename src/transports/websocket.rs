//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! This module provides [`WebSocketTransport`], a [`Transport`]
//! implementation that communicates over a WebSocket connection, and
//! [`WebSocketConnector`], which dials the ChatBridge endpoint with the
//! client's auth token appended as the final path segment. Both `ws://` and
//! `wss://` URLs are supported — TLS is handled transparently via
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is
//! enabled (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), chatbridge_client::ChatBridgeError> {
//! use chatbridge_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:3553/v2/token").await?;
//! transport.send(r#"{"id":0,"type":"say","text":"hi"}"#.to_string()).await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("received: {frame:?}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::ChatBridgeError;
use crate::frame::Frame;
use crate::transport::{Connector, Transport};

/// Default ChatBridge relay endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://relay.chatbridge.dev/v2/";

/// Type alias for the underlying WebSocket stream.
///
/// Made public so that callers can construct a [`WebSocketTransport`] from an
/// existing stream via [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] implementation backed by a WebSocket connection.
///
/// Wraps a `tokio-tungstenite` [`WebSocketStream`](tokio_tungstenite::WebSocketStream)
/// and translates between ChatBridge [`Frame`]s and WebSocket messages.
/// Tungstenite reassembles fragmented messages internally, so every text
/// frame this transport yields is already a complete logical message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method is cancel-safe. Dropping the future
/// returned by `recv` before it completes will not consume or lose any
/// messages, making it safe to use inside `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a new WebSocket connection to the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`ChatBridgeError::Connect`] if the URL is invalid or the
    /// connection does not reach the open state; the message carries the
    /// handshake failure description reported by the server when available.
    pub async fn connect(url: &str) -> Result<Self, ChatBridgeError> {
        tracing::debug!(url = %url, "connecting to ChatBridge server");

        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ChatBridgeError::Connect(e.to_string()))?;

        tracing::info!(url = %url, "WebSocket connection established");

        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Create a [`WebSocketTransport`] from an already-established WebSocket
    /// stream.
    ///
    /// This is useful when you need custom TLS configuration, proxy headers,
    /// or any other connection setup that [`connect`](Self::connect) does not
    /// expose.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Establish a new WebSocket connection with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ChatBridgeError::Timeout`] if the deadline elapses, or any
    /// error that [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, ChatBridgeError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| ChatBridgeError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ChatBridgeError> {
        if self.closed {
            return Err(ChatBridgeError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ChatBridgeError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<Frame, ChatBridgeError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(ChatBridgeError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                // `Utf8Bytes::to_string()` copies the payload into a new `String`
                // because `Utf8Bytes` does not expose the inner buffer by value.
                Message::Text(text) => {
                    // Tungstenite only yields whole messages.
                    return Some(Ok(Frame::Text {
                        data: text.to_string(),
                        end_of_message: true,
                    }));
                }
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    let reason = frame.map(|f| f.reason.to_string());
                    return Some(Ok(Frame::Close { reason }));
                }
                Message::Ping(_) => {
                    tracing::debug!("received WebSocket ping (auto-pong handled by tungstenite)");
                    // tungstenite auto-queues a Pong reply; no manual response needed.
                }
                Message::Pong(_) => {
                    tracing::debug!("received WebSocket pong (ignored)");
                    // Continue the loop.
                }
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                    // Continue the loop.
                }
                Message::Frame(_) => {
                    // This variant is never produced by the read half of the stream;
                    // it exists only for exhaustiveness against future `Message`
                    // variants. We keep the arm to satisfy exhaustiveness checks.
                    tracing::debug!("received raw WebSocket frame, skipping");
                    // Continue the loop.
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ChatBridgeError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| ChatBridgeError::TransportSend(e.to_string()))
    }
}

// ── Connector ───────────────────────────────────────────────────────

/// Dials the ChatBridge relay, appending the auth token as the final path
/// segment of the base endpoint. Without a token the connection is a guest
/// session (read-only on most deployments).
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: String,
    token: Option<String>,
}

impl WebSocketConnector {
    /// Connector for an authenticated session against the default endpoint.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: Some(token.into()),
        }
    }

    /// Connector for an unauthenticated guest session.
    pub fn guest() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
        }
    }

    /// Override the base endpoint (e.g. a self-hosted relay).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The full URL this connector dials.
    pub fn url(&self) -> String {
        match &self.token {
            Some(token) => {
                let base = self.endpoint.trim_end_matches('/');
                format!("{base}/{token}")
            }
            None => self.endpoint.clone(),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&mut self) -> Result<WebSocketTransport, ChatBridgeError> {
        WebSocketTransport::connect(&self.url()).await
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[test]
    fn websocket_transport_is_debug() {
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_debug::<WebSocketTransport>();
    }

    #[test]
    fn connector_appends_token_as_path_segment() {
        let connector = WebSocketConnector::new("my-token");
        assert_eq!(connector.url(), "wss://relay.chatbridge.dev/v2/my-token");

        let custom = WebSocketConnector::new("tok").with_endpoint("ws://localhost:3553/v2/");
        assert_eq!(custom.url(), "ws://localhost:3553/v2/tok");

        // Missing trailing slash on the endpoint is tolerated.
        let no_slash = WebSocketConnector::new("tok").with_endpoint("ws://localhost:3553/v2");
        assert_eq!(no_slash.url(), "ws://localhost:3553/v2/tok");
    }

    #[test]
    fn guest_connector_dials_bare_endpoint() {
        let connector = WebSocketConnector::guest().with_endpoint("ws://localhost:3553/v2/");
        assert_eq!(connector.url(), "ws://localhost:3553/v2/");
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let result = WebSocketTransport::connect("not-a-valid-url").await;
        let err = result.unwrap_err();
        assert!(matches!(err, ChatBridgeError::Connect(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let result = WebSocketTransport::connect("ws://127.0.0.1:1").await;
        let err = result.unwrap_err();
        assert!(matches!(err, ChatBridgeError::Connect(_)));
    }

    // ── Mock-stream helpers ──────────────────────────────────────────────

    use tokio::net::TcpListener;

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    // ── Mock-stream tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn recv_yields_complete_text_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.send(Message::Text("world".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();

        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Text {
                data: "hello".into(),
                end_of_message: true
            }
        );

        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Text {
                data: "world".into(),
                end_of_message: true
            }
        );
    }

    #[tokio::test]
    async fn recv_surfaces_close_frame() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let frame = transport.recv().await.unwrap().unwrap();
        assert!(matches!(frame, Frame::Close { .. }));
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();

        // The binary frame should be silently skipped.
        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Text {
                data: "after_binary".into(),
                end_of_message: true
            }
        );
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(|mut ws| async move {
            // Read until the client closes.
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("oops".to_string()).await.unwrap_err();
        assert!(matches!(err, ChatBridgeError::TransportClosed));
    }

    #[tokio::test]
    async fn double_close_is_idempotent() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        // Second close should also succeed.
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // Use a non-routable address to guarantee a timeout.
        let result = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1",
            std::time::Duration::from_millis(50),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, ChatBridgeError::Timeout));
    }

    #[tokio::test]
    async fn from_stream_constructor_works() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("from_stream_msg".into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        // Connect the raw stream ourselves, then wrap it.
        let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let mut transport = WebSocketTransport::from_stream(ws_stream);

        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Text {
                data: "from_stream_msg".into(),
                end_of_message: true
            }
        );
    }

    #[tokio::test]
    async fn send_round_trip() {
        let url = start_mock_server(|mut ws| async move {
            // Read one message and echo it back.
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.send("ping_echo".to_string()).await.unwrap();

        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Text {
                data: "ping_echo".into(),
                end_of_message: true
            }
        );
    }

    #[tokio::test]
    async fn recv_after_close_returns_none_or_error() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();

        // After closing, recv must not hang — close frame, stream end or a
        // transport error are all acceptable.
        let result = transport.recv().await;
        match result {
            None => {}
            Some(Ok(Frame::Close { .. })) => {}
            Some(Err(_)) => {}
            Some(Ok(frame)) => panic!("expected close/end/error after close, got {frame:?}"),
        }
    }
}
