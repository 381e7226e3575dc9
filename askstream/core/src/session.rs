//! Session Handles
//!
//! A [`SessionHandle`] is what the caller holds for one in-flight question:
//! it exposes the session's state, waits for its terminal event, and cancels
//! it. All delivery for the session goes through one [`DeliveryGate`] shared
//! by the handle and the session task.
//!
//! # Exactly one terminal event
//!
//! The session task and `cancel()` race to end the session. The gate decides
//! under a single lock which of them wins; the loser's event is dropped, as is
//! every delta after the terminal event. Holding the lock across the sink call
//! means that once `cancel()` returns, the sink will not hear from the
//! session again. The lock is re-entrant so a sink may cancel from inside its
//! own callback.

use std::cell::RefCell;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::ErrorKind;
use crate::messages::{DeliveryEvent, SessionId, SessionState};
use crate::sink::DeliverySink;

/// Message carried by terminal events of cancelled sessions
pub const CANCELLED_MESSAGE: &str = "Request cancelled";

#[derive(Debug, Default)]
struct GateState {
    terminal_fired: bool,
    last_text: String,
}

/// Serialises all sink calls of one session
pub(crate) struct DeliveryGate {
    session_id: SessionId,
    started_at: DateTime<Utc>,
    sink: Arc<dyn DeliverySink>,
    inner: ReentrantMutex<RefCell<GateState>>,
    state: watch::Sender<SessionState>,
    terminal: watch::Sender<Option<DeliveryEvent>>,
}

impl DeliveryGate {
    pub(crate) fn new(session_id: SessionId, sink: Arc<dyn DeliverySink>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (terminal, _) = watch::channel(None);
        Self {
            session_id,
            started_at: Utc::now(),
            sink,
            inner: ReentrantMutex::new(RefCell::new(GateState::default())),
            state,
            terminal,
        }
    }

    pub(crate) fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub(crate) fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Move to a non-terminal state; ignored once the session has ended
    pub(crate) fn transition(&self, next: SessionState) {
        let changed = self.state.send_if_modified(|state| {
            if state.is_terminal() || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(session_id = %self.session_id, state = ?next, "Session state changed");
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.inner.lock().borrow().terminal_fired
    }

    /// Deliver committed text; `false` if the session already ended
    pub(crate) fn deliver_delta(&self, text: &str) -> bool {
        let guard = self.inner.lock();
        {
            let mut gate = guard.borrow_mut();
            if gate.terminal_fired {
                trace!(session_id = %self.session_id, "Dropping delta after terminal");
                return false;
            }
            text.clone_into(&mut gate.last_text);
        }
        self.sink
            .on_delta(&DeliveryEvent::delta(self.session_id.clone(), text));
        true
    }

    /// Forward preamble text; `false` if the session already ended
    pub(crate) fn deliver_process(&self, text: &str, closed: bool) -> bool {
        let guard = self.inner.lock();
        if guard.borrow().terminal_fired {
            return false;
        }
        self.sink.on_process(&self.session_id, text, closed);
        true
    }

    /// Deliver the session's terminal event; `false` if one already fired
    pub(crate) fn deliver_terminal(&self, event: DeliveryEvent) -> bool {
        let guard = self.inner.lock();
        {
            let mut gate = guard.borrow_mut();
            if gate.terminal_fired {
                trace!(session_id = %self.session_id, "Terminal already delivered");
                return false;
            }
            gate.terminal_fired = true;
            gate.last_text.clone_from(&event.text);
        }

        self.sink.on_delta(&event);

        let final_state = match event.error {
            None => SessionState::Completed,
            Some(ErrorKind::UserCancelled) => SessionState::Cancelled,
            Some(_) => SessionState::Failed,
        };
        self.state.send_replace(final_state);
        debug!(session_id = %self.session_id, state = ?final_state, "Session finished");
        self.terminal.send_replace(Some(event));
        true
    }

    /// End the session as cancelled, carrying the last delivered text
    pub(crate) fn cancel(&self) -> bool {
        let guard = self.inner.lock();
        let text = {
            let gate = guard.borrow();
            if gate.terminal_fired {
                return false;
            }
            gate.last_text.clone()
        };
        self.deliver_terminal(DeliveryEvent::failed(
            self.session_id.clone(),
            text,
            ErrorKind::UserCancelled,
            CANCELLED_MESSAGE,
        ))
    }

    fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn subscribe_terminal(&self) -> watch::Receiver<Option<DeliveryEvent>> {
        self.terminal.subscribe()
    }
}

impl std::fmt::Debug for DeliveryGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryGate")
            .field("session_id", &self.session_id)
            .field("started_at", &self.started_at)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Caller's handle on one session
///
/// Dropping the handle does not cancel the session; call [`cancel`](Self::cancel).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    gate: Arc<DeliveryGate>,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    pub(crate) fn new(gate: Arc<DeliveryGate>, cancel_tx: watch::Sender<bool>) -> Self {
        Self {
            gate,
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &SessionId {
        self.gate.session_id()
    }

    /// When the question was submitted
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.gate.started_at()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.gate.state()
    }

    /// Receiver that observes every state change
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.gate.subscribe_state()
    }

    /// Whether the terminal event has been delivered
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.gate.is_terminal()
    }

    /// Cancel the session
    ///
    /// The cancelled terminal event is delivered before this returns (unless
    /// the session already ended); network teardown happens in the background.
    /// Calling it again is a no-op. Returns whether this call ended the session.
    pub fn cancel(&self) -> bool {
        let cancelled = self.gate.cancel();
        if cancelled {
            debug!(session_id = %self.id(), "Session cancelled");
        }
        self.cancel_tx.send_replace(true);
        cancelled
    }

    /// Wait for the terminal event
    pub async fn wait(&self) -> DeliveryEvent {
        let mut terminal = self.gate.subscribe_terminal();
        let event = terminal
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|event| event.clone());
        event.unwrap_or_else(|| {
            DeliveryEvent::failed(
                self.id().clone(),
                String::new(),
                ErrorKind::UserCancelled,
                CANCELLED_MESSAGE,
            )
        })
    }
}
