//! Delivery Sinks
//!
//! A sink is whatever UI state model consumes a session's output. Every
//! [`DeliveryEvent`] carries the full committed text, so sinks apply updates by
//! replacement. The engine guarantees per session: deltas only grow, exactly
//! one terminal event, and nothing at all after it.
//!
//! # Provided sinks
//!
//! - [`ChatBubble`]: the single visible AI message
//! - [`ChannelSink`]: forwards events into a tokio channel
//! - [`CallbackSink`]: adapts closures (`on_delta` / `on_terminal`)

mod bubble;
mod callback;
mod channel;

use std::sync::Arc;

use crate::messages::{DeliveryEvent, SessionId};

pub use bubble::{BubbleStatus, BubbleView, ChatBubble};
pub use callback::CallbackSink;
pub use channel::{ChannelSink, ProcessUpdate};

/// Consumer of one or more sessions' delivery events
///
/// Callbacks may run on the caller's thread inside `cancel` or `submit`, so
/// they may call back into the engine but must not block on it.
pub trait DeliverySink: Send + Sync {
    /// A session is about to start delivering to this sink
    fn on_session_start(&self, _session_id: &SessionId) {}

    /// Committed text changed, or the session ended (`event.terminal`)
    fn on_delta(&self, event: &DeliveryEvent);

    /// Raw-framed preamble text so far; `closed` once the marker was seen
    fn on_process(&self, _session_id: &SessionId, _text: &str, _closed: bool) {}
}

impl<T: DeliverySink + ?Sized> DeliverySink for Arc<T> {
    fn on_session_start(&self, session_id: &SessionId) {
        (**self).on_session_start(session_id);
    }

    fn on_delta(&self, event: &DeliveryEvent) {
        (**self).on_delta(event);
    }

    fn on_process(&self, session_id: &SessionId, text: &str, closed: bool) {
        (**self).on_process(session_id, text, closed);
    }
}
