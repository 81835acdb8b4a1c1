//! Error codes for structured error handling in the ChatBridge protocol.
//!
//! The server reports request failures through `error` envelopes whose
//! `error` field carries a `snake_case` tag (e.g., `"user_not_found"`).
//! [`ServerErrorCode`] classifies the tags the current server emits; tags
//! introduced by newer servers fall back to [`ServerErrorCode::Unknown`]
//! so the client never rejects an error envelope it has not seen before.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes returned by the ChatBridge server.
///
/// Use [`description()`](ServerErrorCode::description) for a human-readable
/// explanation, or keep the raw tag from the error notification when exact
/// wire fidelity matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerErrorCode {
    // Authentication / license errors
    Unauthenticated,
    GuestRestricted,
    MissingCapability,

    // Validation errors
    MissingText,
    TextTooLong,
    InvalidMode,
    UserNotFound,

    // Rate limiting
    RateLimited,

    // Server errors
    InternalError,
    UnknownError,

    /// A tag this client version does not recognize.
    #[serde(other)]
    Unknown,
}

impl ServerErrorCode {
    /// Classify a raw wire tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "unauthenticated" => Self::Unauthenticated,
            "guest_restricted" => Self::GuestRestricted,
            "missing_capability" => Self::MissingCapability,
            "missing_text" => Self::MissingText,
            "text_too_long" => Self::TextTooLong,
            "invalid_mode" => Self::InvalidMode,
            "user_not_found" => Self::UserNotFound,
            "rate_limited" => Self::RateLimited,
            "internal_error" => Self::InternalError,
            "unknown_error" => Self::UnknownError,
            _ => Self::Unknown,
        }
    }

    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unauthenticated => {
                "The connection is not authenticated. Supply a valid license token."
            }
            Self::GuestRestricted => {
                "Guest connections cannot perform this action. Connect with a license token."
            }
            Self::MissingCapability => {
                "The license backing this connection does not grant the required capability."
            }
            Self::MissingText => "The request did not include any message text.",
            Self::TextTooLong => "The message text exceeds the server's length limit.",
            Self::InvalidMode => {
                "The requested formatting mode is not supported. Use \"format\" or \"markdown\"."
            }
            Self::UserNotFound => {
                "No online player matches the requested recipient name or UUID."
            }
            Self::RateLimited => {
                "Too many requests in a short time. Slow down and try again later."
            }
            Self::InternalError => {
                "An internal server error occurred. Try again or contact the operators."
            }
            Self::UnknownError => "The server reported an unclassified error.",
            Self::Unknown => "The server reported an error tag this client does not recognize.",
        }
    }
}

impl fmt::Display for ServerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
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
    fn known_tags_classify() {
        assert_eq!(
            ServerErrorCode::from_tag("user_not_found"),
            ServerErrorCode::UserNotFound
        );
        assert_eq!(
            ServerErrorCode::from_tag("rate_limited"),
            ServerErrorCode::RateLimited
        );
    }

    #[test]
    fn unknown_tag_falls_back() {
        assert_eq!(
            ServerErrorCode::from_tag("brand_new_failure"),
            ServerErrorCode::Unknown
        );
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ServerErrorCode::UserNotFound).unwrap();
        assert_eq!(json, "\"user_not_found\"");
        let back: ServerErrorCode = serde_json::from_str("\"rate_limited\"").unwrap();
        assert_eq!(back, ServerErrorCode::RateLimited);
    }

    #[test]
    fn serde_unknown_tag_deserializes() {
        let back: ServerErrorCode = serde_json::from_str("\"not_a_real_tag\"").unwrap();
        assert_eq!(back, ServerErrorCode::Unknown);
    }

    #[test]
    fn descriptions_are_nonempty() {
        for code in [
            ServerErrorCode::Unauthenticated,
            ServerErrorCode::GuestRestricted,
            ServerErrorCode::MissingCapability,
            ServerErrorCode::MissingText,
            ServerErrorCode::TextTooLong,
            ServerErrorCode::InvalidMode,
            ServerErrorCode::UserNotFound,
            ServerErrorCode::RateLimited,
            ServerErrorCode::InternalError,
            ServerErrorCode::UnknownError,
            ServerErrorCode::Unknown,
        ] {
            assert!(!code.description().is_empty());
            assert_eq!(format!("{code}"), code.description());
        }
    }
}
