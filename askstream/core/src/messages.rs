//! Engine Messages
//!
//! Values that flow out of the engine towards UI surfaces. Surfaces never see
//! the transport or the decoder; they see [`DeliveryEvent`]s carrying the
//! full committed text of one session, plus an optional process channel for
//! raw-framed preambles.
//!
//! Each event carries the *whole* committed text rather than a diff, so a
//! surface applies it by replacement and can drop or reorder nothing.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Unique identifier of one streaming session
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a random (UUID v4) session ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One decoded piece of answer text, in arrival order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFragment {
    /// Arrival sequence number within the session, starting at 0
    pub seq: u64,
    /// Decoded text
    pub text: String,
}

/// One observable update for a surface
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    /// Session this update belongs to
    pub session_id: SessionId,
    /// Full committed text so far (replace, don't append)
    pub text: String,
    /// Whether this is the session's single terminal event
    pub terminal: bool,
    /// Failure classification for terminal events that did not complete
    pub error: Option<ErrorKind>,
    /// Human-readable failure detail
    pub error_message: Option<String>,
}

impl DeliveryEvent {
    /// A non-terminal progress update
    #[must_use]
    pub fn delta(session_id: SessionId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            text: text.into(),
            terminal: false,
            error: None,
            error_message: None,
        }
    }

    /// Successful terminal event
    #[must_use]
    pub fn completed(session_id: SessionId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            text: text.into(),
            terminal: true,
            error: None,
            error_message: None,
        }
    }

    /// Terminal event for a failed or cancelled session
    #[must_use]
    pub fn failed(
        session_id: SessionId,
        text: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            text: text.into(),
            terminal: true,
            error: Some(kind),
            error_message: Some(message.into()),
        }
    }

    /// Whether this terminal event reports a successful completion
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.terminal && self.error.is_none()
    }
}

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, nothing requested yet
    Idle,
    /// Request sent, waiting for the response to open
    Connecting,
    /// Fragments are arriving
    Streaming,
    /// Producer finished, pacing still releasing pending text
    Draining,
    /// All text delivered
    Completed,
    /// Ended with an error
    Failed,
    /// Cancelled or superseded
    Cancelled,
}

impl SessionState {
    /// Whether no further transitions can happen
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}
