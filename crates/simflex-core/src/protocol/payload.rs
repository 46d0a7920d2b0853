//! Wire payloads and receive-side normalization.
//!
//! The protocol carries two kinds of frames: single-line textual commands and
//! replies, and opaque binary artifacts (instance documents, result archives).
//! Textual frames are trimmed and lowercased once on receipt so that reply
//! matching is case-insensitive everywhere; binary frames pass through
//! untouched.

use bytes::Bytes;

/// Maximum number of characters quoted when logging a textual payload.
const PREVIEW_LIMIT: usize = 120;

/// A frame sent to or received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A textual frame (commands, status replies, instance lists).
    Text(String),
    /// An opaque binary frame (result archives, fetched documents).
    Binary(Bytes),
}

impl Payload {
    /// Create a textual payload.
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    /// Create a binary payload.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Payload::Binary(data.into())
    }

    /// Apply the receive-side normalization rule: textual payloads are
    /// trimmed and lowercased, binary payloads are returned unchanged.
    pub fn normalized(self) -> Self {
        match self {
            Payload::Text(text) => Payload::Text(text.trim().to_lowercase()),
            binary @ Payload::Binary(_) => binary,
        }
    }

    /// The textual content, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text.as_str()),
            Payload::Binary(_) => None,
        }
    }

    /// The binary content, if this is a binary frame.
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Payload::Text(_) => None,
            Payload::Binary(data) => Some(data),
        }
    }

    /// A short human-readable form for log output.
    pub fn preview(&self) -> String {
        match self {
            Payload::Text(text) => {
                if text.chars().count() <= PREVIEW_LIMIT {
                    text.clone()
                } else {
                    let cut: String = text.chars().take(PREVIEW_LIMIT).collect();
                    format!("{cut}...")
                }
            }
            Payload::Binary(data) => format!("<binary payload, {} bytes>", data.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_normalization_trims_and_lowercases() {
        let payload = Payload::text("  OK Instance Generated \"AB12CD34\" \n");
        assert_eq!(
            payload.normalized(),
            Payload::text("ok instance generated \"ab12cd34\"")
        );
    }

    #[test]
    fn test_binary_normalization_is_identity() {
        let payload = Payload::binary(vec![0x50, 0x4b, 0x03, 0x04]);
        assert_eq!(payload.clone().normalized(), payload);
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let payload = Payload::text("x".repeat(500));
        let preview = payload.preview();
        assert!(preview.ends_with("..."));
        assert!(preview.chars().count() < 500);
    }

    #[test]
    fn test_preview_reports_binary_length() {
        let payload = Payload::binary(vec![0u8; 42]);
        assert_eq!(payload.preview(), "<binary payload, 42 bytes>");
    }
}
