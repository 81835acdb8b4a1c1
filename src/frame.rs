//! Frame assembly for the ChatBridge protocol.
//!
//! The server speaks single-line JSON envelopes over text-mode WebSocket
//! messages. A transport may deliver one logical message in several chunks
//! (continuation frames, length-limited reads), so the session feeds every
//! received [`Frame`] through a [`FrameAssembler`] which buffers until the
//! transport marks the end of the logical message.

/// One unit received from a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text chunk. `end_of_message` is `true` when this chunk completes
    /// the logical message.
    Text {
        data: String,
        end_of_message: bool,
    },
    /// The peer initiated a close handshake. Carries the close description
    /// when the peer supplied one.
    Close { reason: Option<String> },
}

impl Frame {
    /// Convenience constructor for a complete single-chunk text message.
    pub fn text(data: impl Into<String>) -> Self {
        Self::Text {
            data: data.into(),
            end_of_message: true,
        }
    }
}

/// Accumulates text chunks into complete logical payloads.
///
/// The internal buffer is cleared every time a complete message is yielded,
/// and must be explicitly [`abort`](FrameAssembler::abort)ed when a close
/// frame interrupts an in-flight message.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: String,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk; returns the complete payload once the chunk that
    /// carries the end-of-message marker arrives.
    pub fn push(&mut self, data: &str, end_of_message: bool) -> Option<String> {
        self.buf.push_str(data);
        if end_of_message {
            Some(std::mem::take(&mut self.buf))
        } else {
            None
        }
    }

    /// Discard any partially accumulated message.
    pub fn abort(&mut self) {
        self.buf.clear();
    }

    /// Whether a partial message is currently buffered.
    pub fn is_mid_message(&self) -> bool {
        !self.buf.is_empty()
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

    #[test]
    fn single_chunk_message_yields_immediately() {
        let mut asm = FrameAssembler::new();
        let payload = asm.push(r#"{"type":"hello"}"#, true);
        assert_eq!(payload.as_deref(), Some(r#"{"type":"hello"}"#));
        assert!(!asm.is_mid_message());
    }

    #[test]
    fn chunked_message_is_reassembled() {
        let mut asm = FrameAssembler::new();
        assert!(asm.push(r#"{"type":"pla"#, false).is_none());
        assert!(asm.is_mid_message());
        assert!(asm.push(r#"yers","pl"#, false).is_none());
        let payload = asm.push(r#"ayers":[]}"#, true);
        assert_eq!(payload.as_deref(), Some(r#"{"type":"players","players":[]}"#));
    }

    #[test]
    fn buffer_is_cleared_between_messages() {
        let mut asm = FrameAssembler::new();
        assert_eq!(asm.push("first", true).as_deref(), Some("first"));
        assert_eq!(asm.push("second", true).as_deref(), Some("second"));
    }

    #[test]
    fn abort_discards_partial_message() {
        let mut asm = FrameAssembler::new();
        assert!(asm.push("{\"type\":", false).is_none());
        asm.abort();
        assert!(!asm.is_mid_message());
        assert_eq!(asm.push("fresh", true).as_deref(), Some("fresh"));
    }

    #[test]
    fn frame_text_helper_marks_end_of_message() {
        let frame = Frame::text("x");
        assert_eq!(
            frame,
            Frame::Text {
                data: "x".into(),
                end_of_message: true
            }
        );
    }
}
