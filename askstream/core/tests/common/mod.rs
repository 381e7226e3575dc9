//! Shared helpers for askstream-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use askstream_core::{
    AskRequest, DeliveryEvent, DeliverySink, FragmentSource, ReadError, SessionId, Transport,
    TransportError,
};
use async_trait::async_trait;
use parking_lot::Mutex;

/// One step of a scripted response body
#[derive(Clone, Debug)]
pub enum Step {
    /// Deliver a physical read
    Chunk(String),
    /// Wait before the next step
    Pause(Duration),
    /// Fail the body
    Fail(ReadError),
}

/// Shorthand for a list of chunks
pub fn chunks(parts: &[&str]) -> Vec<Step> {
    parts.iter().map(|p| Step::Chunk((*p).to_string())).collect()
}

/// Event-stream body with one `data:` record per fragment
pub fn sse_records(fragments: &[&str]) -> Vec<Step> {
    fragments
        .iter()
        .map(|f| Step::Chunk(format!("data:{f}\n\n")))
        .collect()
}

/// In-memory transport replaying a fixed script for every request
pub struct ScriptedTransport {
    content_type: Option<String>,
    open_error: Option<TransportError>,
    steps: Vec<Step>,
    requests: Mutex<Vec<AskRequest>>,
}

impl ScriptedTransport {
    pub fn new(content_type: &str, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            content_type: Some(content_type.to_string()),
            open_error: None,
            steps,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: TransportError) -> Arc<Self> {
        Arc::new(Self {
            content_type: None,
            open_error: Some(error),
            steps: Vec::new(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<AskRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, request: &AskRequest) -> Result<FragmentSource, TransportError> {
        self.requests.lock().push(request.clone());
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let steps = self.steps.clone();
        let reader = tokio::spawn(async move {
            for step in steps {
                match step {
                    Step::Chunk(text) => {
                        if tx.send(Ok(text)).await.is_err() {
                            return;
                        }
                    }
                    Step::Pause(duration) => tokio::time::sleep(duration).await,
                    Step::Fail(error) => {
                        let _ = tx.send(Err(error)).await;
                        return;
                    }
                }
            }
        });
        Ok(FragmentSource::new(self.content_type.clone(), rx, Some(reader)))
    }
}

/// Everything a sink was told, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recorded {
    Delta(DeliveryEvent),
    Process { text: String, closed: bool },
}

/// Sink recording every call
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<Recorded>>,
    started: Mutex<Vec<SessionId>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Recorded::Delta(e) => Some(e.clone()),
                Recorded::Process { .. } => None,
            })
            .collect()
    }

    /// Texts of non-terminal events
    pub fn delta_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| !e.terminal)
            .map(|e| e.text)
            .collect()
    }

    pub fn terminals(&self) -> Vec<DeliveryEvent> {
        self.events().into_iter().filter(|e| e.terminal).collect()
    }

    pub fn process(&self) -> Vec<(String, bool)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Recorded::Process { text, closed } => Some((text.clone(), *closed)),
                Recorded::Delta(_) => None,
            })
            .collect()
    }

    pub fn started(&self) -> Vec<SessionId> {
        self.started.lock().clone()
    }
}

impl DeliverySink for RecordingSink {
    fn on_session_start(&self, session_id: &SessionId) {
        self.started.lock().push(session_id.clone());
    }

    fn on_delta(&self, event: &DeliveryEvent) {
        self.calls.lock().push(Recorded::Delta(event.clone()));
    }

    fn on_process(&self, _session_id: &SessionId, text: &str, closed: bool) {
        self.calls.lock().push(Recorded::Process {
            text: text.to_string(),
            closed,
        });
    }
}
