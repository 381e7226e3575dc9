//! Transport Traits
//!
//! A transport opens one request and hands back a [`FragmentSource`]: an
//! arrival-ordered, finite stream of decoded text fragments. End of body is
//! the stream ending, not an error.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::ReceiverStream;

use crate::decoder::Framing;
use crate::error::{ReadError, TransportError};

/// Fragments buffered between the reader task and the session
pub const FRAGMENT_CHANNEL_CAPACITY: usize = 64;

/// One question to ask the backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AskRequest {
    /// The user's question
    pub question: String,
    /// Conversation key the backend correlates turns by
    pub session_key: String,
    /// Framing to request via `Accept`
    pub framing: Framing,
}

/// JSON body sent to the ask endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskBody<'a> {
    /// The user's question
    pub question: &'a str,
    /// Conversation key
    pub session_key: &'a str,
}

impl AskRequest {
    /// Create a request with the default framing
    pub fn new(question: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_key: session_key.into(),
            framing: Framing::default(),
        }
    }

    /// Set the requested framing
    #[must_use]
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Wire body
    #[must_use]
    pub fn body(&self) -> AskBody<'_> {
        AskBody {
            question: &self.question,
            session_key: &self.session_key,
        }
    }
}

/// Stream of decoded text fragments for one response
///
/// Dropping the source (or calling [`abort`](Self::abort)) stops the reader
/// task; any pending read then resolves to end-of-stream.
#[derive(Debug)]
pub struct FragmentSource {
    content_type: Option<String>,
    stream: ReceiverStream<Result<String, ReadError>>,
    reader: Option<JoinHandle<()>>,
}

impl FragmentSource {
    /// Wrap a fragment receiver, optionally owning the task that feeds it
    #[must_use]
    pub fn new(
        content_type: Option<String>,
        rx: mpsc::Receiver<Result<String, ReadError>>,
        reader: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            content_type,
            stream: ReceiverStream::new(rx),
            reader,
        }
    }

    /// Create a source fed through the returned sender
    #[must_use]
    pub fn channel(
        content_type: Option<String>,
    ) -> (mpsc::Sender<Result<String, ReadError>>, Self) {
        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        (tx, Self::new(content_type, rx, None))
    }

    /// Response content type, if the transport knows it
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Handle that aborts the reader task from elsewhere
    #[must_use]
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        self.reader.as_ref().map(JoinHandle::abort_handle)
    }

    /// Stop reading; the stream ends after already-buffered fragments
    pub fn abort(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.stream.close();
    }
}

impl Stream for FragmentSource {
    type Item = Result<String, ReadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}

impl Drop for FragmentSource {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Something that can open ask requests
///
/// Implement this to plug in a different backend or an in-memory fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Open the request; fails before any fragment on non-success responses
    async fn open(&self, request: &AskRequest) -> Result<FragmentSource, TransportError>;
}
