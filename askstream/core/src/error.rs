//! Error Types
//!
//! Every failure a session can hit maps onto one of four [`ErrorKind`]s, which
//! is what surfaces see on the terminal [`DeliveryEvent`](crate::DeliveryEvent).
//! The richer enums below keep the detail for logs and error messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of characters of a response body kept in error messages
pub const MAX_ERROR_BODY_CHARS: usize = 150;

/// Coarse classification of a session failure, carried on terminal events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request could not be opened (non-2xx, connection failure)
    TransportError,
    /// The body failed after data had started arriving
    ReadError,
    /// The body arrived but its framing was malformed
    DecodeError,
    /// The session was cancelled or superseded
    UserCancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransportError => write!(f, "transport error"),
            Self::ReadError => write!(f, "read error"),
            Self::DecodeError => write!(f, "decode error"),
            Self::UserCancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure to open a response stream; no fragment has been produced
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with a non-success status
    #[error("HTTP error! status: {status}, message: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The server rejected our credentials
    #[error("Unauthorized (401)")]
    Unauthorized,

    /// The connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The HTTP client could not be built or the request was invalid
    #[error("Invalid request: {0}")]
    Request(String),
}

/// Failure while reading a response body that had already started
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    /// The underlying connection failed mid-body
    #[error("Stream read failed: {0}")]
    Network(String),

    /// No bytes arrived within the configured read timeout
    #[error("Stream stalled: no data for {after_ms}ms")]
    Stalled {
        /// Read timeout that elapsed
        after_ms: u64,
    },
}

/// Malformed framing in an otherwise readable body
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// An event-stream line that is neither a known field nor a comment
    #[error("Unrecognized event-stream line: {line:?}")]
    UnrecognizedLine {
        /// The offending line (truncated)
        line: String,
    },

    /// A record grew past the configured limit without terminating
    #[error("Record size {size} exceeds maximum {max}")]
    RecordTooLarge {
        /// Bytes buffered for the unfinished record
        size: usize,
        /// Configured maximum
        max: usize,
    },
}

/// Any failure that terminates a session
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// Opening the stream failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reading the stream failed
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Decoding the stream failed
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The session was cancelled
    #[error("Cancelled")]
    Cancelled,
}

impl StreamError {
    /// The kind reported to surfaces
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::TransportError,
            Self::Read(_) => ErrorKind::ReadError,
            Self::Decode(_) => ErrorKind::DecodeError,
            Self::Cancelled => ErrorKind::UserCancelled,
        }
    }
}

/// Illegal use of the accumulator
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AccumulatorError {
    /// A commit tried to move the committed watermark backwards
    #[error("Commit would move backwards: committed {committed}, requested {requested}")]
    Backward {
        /// Current committed length
        committed: usize,
        /// Requested length
        requested: usize,
    },
}

/// A question that could not be submitted
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// Nothing to ask after trimming whitespace
    #[error("Question is empty")]
    EmptyQuestion,
}

/// Truncate `text` to at most `max_chars` characters
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
