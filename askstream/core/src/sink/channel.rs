//! Channel-backed sink for event-loop driven surfaces.

use tokio::sync::mpsc;

use super::DeliverySink;
use crate::messages::{DeliveryEvent, SessionId};

/// Preamble update forwarded by [`ChannelSink`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessUpdate {
    /// Session the preamble belongs to
    pub session_id: SessionId,
    /// Preamble text so far
    pub text: String,
    /// Whether the marker has been seen
    pub closed: bool,
}

/// Forwards every event into an unbounded channel
///
/// Unbounded so delivery never blocks the session and never drops an event.
/// A closed receiver is ignored.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    events: mpsc::UnboundedSender<DeliveryEvent>,
    process: Option<mpsc::UnboundedSender<ProcessUpdate>>,
}

impl ChannelSink {
    /// Create a sink and the receiver for its events
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeliveryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                events: tx,
                process: None,
            },
            rx,
        )
    }

    /// Also forward preamble updates; returns their receiver
    #[must_use]
    pub fn with_process(mut self) -> (Self, mpsc::UnboundedReceiver<ProcessUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.process = Some(tx);
        (self, rx)
    }
}

impl DeliverySink for ChannelSink {
    fn on_delta(&self, event: &DeliveryEvent) {
        let _ = self.events.send(event.clone());
    }

    fn on_process(&self, session_id: &SessionId, text: &str, closed: bool) {
        if let Some(process) = &self.process {
            let _ = process.send(ProcessUpdate {
                session_id: session_id.clone(),
                text: text.to_string(),
                closed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forwards_events_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        let id = SessionId::new();
        sink.on_delta(&DeliveryEvent::delta(id.clone(), "a"));
        sink.on_delta(&DeliveryEvent::completed(id.clone(), "ab"));

        assert_eq!(rx.recv().await.unwrap().text, "a");
        let last = rx.recv().await.unwrap();
        assert!(last.terminal);
        assert_eq!(last.session_id, id);
    }

    #[tokio::test]
    async fn test_process_updates_optional() {
        let (sink, _events) = ChannelSink::new();
        // No process receiver: silently ignored
        sink.on_process(&SessionId::new(), "x", false);

        let (sink, mut process) = sink.with_process();
        let id = SessionId::new();
        sink.on_process(&id, "thinking", true);
        assert_eq!(
            process.recv().await,
            Some(ProcessUpdate {
                session_id: id,
                text: "thinking".to_string(),
                closed: true,
            })
        );
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_delta(&DeliveryEvent::delta(SessionId::new(), "a"));
    }
}
