//! Chat Bubble
//!
//! The visible AI message for the current turn. It is bound to one session at
//! a time; events from any other session are ignored, so a superseded
//! session can never overwrite the newer answer.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::DeliverySink;
use crate::error::{truncate_chars, ErrorKind, MAX_ERROR_BODY_CHARS};
use crate::messages::{DeliveryEvent, SessionId};

/// Where the bubble is in its lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BubbleStatus {
    /// Waiting for the first committed text
    #[default]
    Loading,
    /// Text is arriving
    Streaming,
    /// Answer complete
    Complete,
    /// Session failed; `error` holds the message
    Failed,
    /// Session cancelled or superseded
    Cancelled,
}

/// Snapshot of the bubble's state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BubbleView {
    /// Session the bubble is bound to
    pub session_id: Option<SessionId>,
    /// Committed answer text
    pub text: String,
    /// Preamble ("process") text, raw framing only
    pub process: String,
    /// Whether the preamble has ended
    pub process_closed: bool,
    /// Lifecycle status
    pub status: BubbleStatus,
    /// Failure message for [`BubbleStatus::Failed`]
    pub error: Option<String>,
}

impl BubbleView {
    /// Text to display
    ///
    /// Failed bubbles show `Error: <message>...` with the message cut to 150
    /// characters; everything else shows the committed text.
    #[must_use]
    pub fn render(&self) -> String {
        match (&self.status, &self.error) {
            (BubbleStatus::Failed, Some(message)) => {
                format!("Error: {}...", truncate_chars(message, MAX_ERROR_BODY_CHARS))
            }
            _ => self.text.clone(),
        }
    }

    /// Whether the bound session has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            BubbleStatus::Complete | BubbleStatus::Failed | BubbleStatus::Cancelled
        )
    }
}

/// The one AI message bubble of a conversation
#[derive(Debug, Default)]
pub struct ChatBubble {
    view: Mutex<BubbleView>,
}

impl ChatBubble {
    /// Create an unbound bubble
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `session_id`, clearing the previous answer
    pub fn bind(&self, session_id: &SessionId) {
        *self.view.lock() = BubbleView {
            session_id: Some(session_id.clone()),
            ..BubbleView::default()
        };
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> BubbleView {
        self.view.lock().clone()
    }

    /// Text to display
    #[must_use]
    pub fn render(&self) -> String {
        self.view.lock().render()
    }

    /// Committed answer text
    #[must_use]
    pub fn text(&self) -> String {
        self.view.lock().text.clone()
    }

    /// Lifecycle status
    #[must_use]
    pub fn status(&self) -> BubbleStatus {
        self.view.lock().status
    }
}

impl DeliverySink for ChatBubble {
    fn on_session_start(&self, session_id: &SessionId) {
        self.bind(session_id);
    }

    fn on_delta(&self, event: &DeliveryEvent) {
        let mut view = self.view.lock();
        if view.session_id.as_ref() != Some(&event.session_id) {
            trace!(session_id = %event.session_id, "Ignoring event for unbound session");
            return;
        }

        view.text.clone_from(&event.text);
        view.status = if !event.terminal {
            BubbleStatus::Streaming
        } else {
            match event.error {
                None => BubbleStatus::Complete,
                Some(ErrorKind::UserCancelled) => BubbleStatus::Cancelled,
                Some(_) => BubbleStatus::Failed,
            }
        };
        if view.status == BubbleStatus::Failed {
            view.error.clone_from(&event.error_message);
        }
    }

    fn on_process(&self, session_id: &SessionId, text: &str, closed: bool) {
        let mut view = self.view.lock();
        if view.session_id.as_ref() != Some(session_id) {
            return;
        }
        text.clone_into(&mut view.process);
        view.process_closed = closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replacement_semantics() {
        let bubble = ChatBubble::new();
        let id = SessionId::new();
        bubble.bind(&id);
        assert_eq!(bubble.status(), BubbleStatus::Loading);

        bubble.on_delta(&DeliveryEvent::delta(id.clone(), "Hel"));
        bubble.on_delta(&DeliveryEvent::delta(id.clone(), "Hello"));
        assert_eq!(bubble.text(), "Hello");
        assert_eq!(bubble.status(), BubbleStatus::Streaming);

        bubble.on_delta(&DeliveryEvent::completed(id, "Hello!"));
        assert_eq!(bubble.render(), "Hello!");
        assert!(bubble.snapshot().is_finished());
    }

    #[test]
    fn test_ignores_other_sessions() {
        let bubble = ChatBubble::new();
        let old = SessionId::new();
        let current = SessionId::new();
        bubble.bind(&current);

        bubble.on_delta(&DeliveryEvent::delta(old.clone(), "stale"));
        bubble.on_process(&old, "thinking", false);
        let view = bubble.snapshot();
        assert_eq!(view.text, "");
        assert_eq!(view.process, "");
        assert_eq!(view.session_id, Some(current));
    }

    #[test]
    fn test_failure_rendering_truncates() {
        let bubble = ChatBubble::new();
        let id = SessionId::new();
        bubble.bind(&id);

        let message = "x".repeat(400);
        bubble.on_delta(&DeliveryEvent::failed(
            id,
            "partial",
            ErrorKind::ReadError,
            message,
        ));
        assert_eq!(bubble.status(), BubbleStatus::Failed);
        assert_eq!(bubble.text(), "partial");
        assert_eq!(bubble.render(), format!("Error: {}...", "x".repeat(150)));
    }

    #[test]
    fn test_cancel_renders_last_text() {
        let bubble = ChatBubble::new();
        let id = SessionId::new();
        bubble.bind(&id);
        bubble.on_delta(&DeliveryEvent::failed(
            id,
            "so far",
            ErrorKind::UserCancelled,
            "cancelled",
        ));
        assert_eq!(bubble.status(), BubbleStatus::Cancelled);
        assert_eq!(bubble.render(), "so far");
        assert_eq!(bubble.snapshot().error, None);
    }

    #[test]
    fn test_process_channel() {
        let bubble = ChatBubble::new();
        let id = SessionId::new();
        bubble.on_session_start(&id);

        bubble.on_process(&id, "I will", false);
        bubble.on_process(&id, "I will think", true);
        let view = bubble.snapshot();
        assert_eq!(view.process, "I will think");
        assert!(view.process_closed);
    }

    #[test]
    fn test_rebind_clears_previous_answer() {
        let bubble = ChatBubble::new();
        let first = SessionId::new();
        bubble.bind(&first);
        bubble.on_delta(&DeliveryEvent::completed(first, "one"));

        let second = SessionId::new();
        bubble.bind(&second);
        assert_eq!(bubble.text(), "");
        assert_eq!(bubble.status(), BubbleStatus::Loading);
    }
}
