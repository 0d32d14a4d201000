//! Errors surfaced by the note flows (save, list, open).
//!
//! Each variant's `Display` is the human-readable message shown to the user
//! at the top of the failing flow.

use std::sync::Arc;
use thiserror::Error;

/// Longest body excerpt carried in a transport error.
pub const ERROR_SNIPPET_CHARS: usize = 200;

pub type Result<T> = std::result::Result<T, NoteError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoteError {
    /// A required input is missing or empty
    #[error("{0}")]
    Validation(Arc<str>),

    /// No owner identity could be resolved
    #[error("{0}")]
    Identity(Arc<str>),

    /// The broker refused the key for this owner
    #[error("{0}")]
    Authorization(Arc<str>),

    /// Non-success status from the broker or storage, or a network failure
    #[error("{message}")]
    Transport { status: Option<u16>, message: Arc<str> },

    /// A note file name did not match the save-time pattern
    #[error("unrecognised note file name: {0}")]
    Parse(Arc<str>),
}

impl NoteError {
    #[inline]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(Arc::from(msg.into()))
    }

    #[inline]
    pub fn identity(msg: impl Into<String>) -> Self {
        Self::Identity(Arc::from(msg.into()))
    }

    #[inline]
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(Arc::from(msg.into()))
    }

    /// Network-level failure with no HTTP status.
    #[inline]
    pub fn network(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            status: None,
            message: Arc::from(format!("{context} failed: {err}")),
        }
    }

    /// Builds the error for a non-success response, keeping a truncated
    /// excerpt of the body when there is one.
    pub fn from_status(context: &str, status: u16, body: &str) -> Self {
        let mut message = format!("{context} failed ({status})");
        let snippet = truncate_chars(body.trim(), ERROR_SNIPPET_CHARS);
        if !snippet.is_empty() {
            message.push_str(": ");
            message.push_str(snippet);
        }
        if status == 403 {
            Self::Authorization(Arc::from(message))
        } else {
            Self::Transport {
                status: Some(status),
                message: Arc::from(message),
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::Authorization(_) => Some(403),
            _ => None,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_carry_truncated_body() {
        let body = "é".repeat(500);
        let err = NoteError::from_status("upload", 500, &body);
        assert_eq!(err.status(), Some(500));
        let message = err.to_string();
        assert!(message.starts_with("upload failed (500): "));
        assert_eq!(
            message.trim_start_matches("upload failed (500): ").chars().count(),
            ERROR_SNIPPET_CHARS
        );
    }

    #[test]
    fn forbidden_maps_to_authorization() {
        let err = NoteError::from_status("download url request", 403, "{\"error\":\"Forbidden\"}");
        assert!(matches!(err, NoteError::Authorization(_)));
        assert_eq!(
            err.to_string(),
            "download url request failed (403): {\"error\":\"Forbidden\"}"
        );
    }

    #[test]
    fn empty_body_is_omitted() {
        let err = NoteError::from_status("list request", 502, "  ");
        assert_eq!(err.to_string(), "list request failed (502)");
    }
}
