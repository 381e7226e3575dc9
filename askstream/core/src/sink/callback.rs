//! Closure-backed sink.

use super::DeliverySink;
use crate::messages::{DeliveryEvent, SessionId};

type EventFn = Box<dyn Fn(&DeliveryEvent) + Send + Sync>;
type ProcessFn = Box<dyn Fn(&SessionId, &str, bool) + Send + Sync>;

/// Sink built from callbacks
///
/// Non-terminal events go to the delta callback, the terminal event to the
/// terminal callback (called exactly once per session).
///
/// ```
/// use askstream_core::CallbackSink;
///
/// let sink = CallbackSink::new()
///     .with_delta(|event| println!("{}", event.text))
///     .with_terminal(|event| println!("done: {:?}", event.error));
/// # drop(sink);
/// ```
#[derive(Default)]
pub struct CallbackSink {
    on_delta: Option<EventFn>,
    on_terminal: Option<EventFn>,
    on_process: Option<ProcessFn>,
}

impl CallbackSink {
    /// Create a sink with no callbacks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for every non-terminal update
    #[must_use]
    pub fn with_delta(mut self, callback: impl Fn(&DeliveryEvent) + Send + Sync + 'static) -> Self {
        self.on_delta = Some(Box::new(callback));
        self
    }

    /// Called once with the terminal event
    #[must_use]
    pub fn with_terminal(
        mut self,
        callback: impl Fn(&DeliveryEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_terminal = Some(Box::new(callback));
        self
    }

    /// Called for preamble updates
    #[must_use]
    pub fn with_process(
        mut self,
        callback: impl Fn(&SessionId, &str, bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_process = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSink")
            .field("on_delta", &self.on_delta.is_some())
            .field("on_terminal", &self.on_terminal.is_some())
            .field("on_process", &self.on_process.is_some())
            .finish()
    }
}

impl DeliverySink for CallbackSink {
    fn on_delta(&self, event: &DeliveryEvent) {
        let callback = if event.terminal {
            &self.on_terminal
        } else {
            &self.on_delta
        };
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn on_process(&self, session_id: &SessionId, text: &str, closed: bool) {
        if let Some(callback) = &self.on_process {
            callback(session_id, text, closed);
        }
    }
}
