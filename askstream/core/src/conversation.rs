//! Conversation
//!
//! One logical conversation with the ask endpoint. It owns the transport,
//! the scheduler, the per-session settings and the conversation key, and
//! keeps at most one session active: submitting a new question cancels the
//! previous one before the new session starts, so the superseded session can
//! never deliver into the new answer.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::controller::{start_session, SessionSettings};
use crate::error::{SubmitError, TransportError};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::session::SessionHandle;
use crate::sink::DeliverySink;
use crate::transport::{AskRequest, HttpTransport, Transport};

/// A conversation with at most one in-flight question
pub struct Conversation {
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    settings: SessionSettings,
    session_key: String,
    active: Mutex<Option<SessionHandle>>,
}

impl Conversation {
    /// Create a conversation with a freshly generated session key
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            transport,
            scheduler,
            settings,
            session_key: uuid::Uuid::new_v4().to_string(),
            active: Mutex::new(None),
        }
    }

    /// Create an HTTP conversation paced by real timers
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the HTTP client cannot be built.
    pub fn from_config(config: &EngineConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::from_config(config)?;
        let conversation = Self::new(
            Arc::new(transport),
            Arc::new(TokioScheduler::new()),
            config.session_settings(),
        );
        Ok(match &config.session_key {
            Some(key) => conversation.with_session_key(key.clone()),
            None => conversation,
        })
    }

    /// Use a fixed session key
    #[must_use]
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    /// Key sent with every question of this conversation
    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Settings applied to each new session
    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Ask a question, superseding any active session
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::EmptyQuestion`] for blank input; no session is
    /// created and the active one keeps running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn submit(
        &self,
        question: &str,
        sink: Arc<dyn DeliverySink>,
    ) -> Result<SessionHandle, SubmitError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SubmitError::EmptyQuestion);
        }

        // The active lock is never held across a cancel: cancelling calls the
        // sink, and a sink may call back into this conversation.
        let previous = self.active.lock().take();
        if let Some(previous) = previous {
            if previous.cancel() {
                info!(session_id = %previous.id(), "Superseded by new question");
            }
        }

        let request = AskRequest::new(question, self.session_key.clone())
            .with_framing(self.settings.framing);
        let handle = start_session(
            Arc::clone(&self.transport),
            Arc::clone(&self.scheduler),
            request,
            self.settings.clone(),
            sink,
        );
        debug!(session_id = %handle.id(), "Question submitted");

        let raced = self.active.lock().replace(handle.clone());
        if let Some(raced) = raced {
            // A concurrent submit landed in between; newest wins
            raced.cancel();
        }
        Ok(handle)
    }

    /// The most recently submitted session, if any
    #[must_use]
    pub fn active(&self) -> Option<SessionHandle> {
        self.active.lock().clone()
    }

    /// Cancel the active session; `false` if nothing was running
    pub fn cancel(&self) -> bool {
        let active = self.active.lock().clone();
        active.is_some_and(|handle| handle.cancel())
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("transport", &self.transport.name())
            .field("settings", &self.settings)
            .field("session_key", &self.session_key)
            .finish_non_exhaustive()
    }
}
