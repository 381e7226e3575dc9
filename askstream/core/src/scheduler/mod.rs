//! Tick Scheduling
//!
//! Timer-driven pacing policies do not own timers directly. They ask a
//! [`Scheduler`] for a [`Ticker`], which lets production code use real tokio
//! intervals ([`TokioScheduler`]) and tests drive ticks by hand
//! ([`ManualScheduler`]).
//!
//! # Overlap safety
//!
//! Every ticker is guarded by a [`TickGate`]. A tick is only handed to the
//! session once the previous one has been settled; a timer firing while the
//! gate is busy is dropped instead of queued, so a slow consumer never builds
//! up a backlog of ticks.

mod manual;
mod tokio_timer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

pub use manual::ManualScheduler;
pub use tokio_timer::TokioScheduler;

/// Source of periodic tickers
pub trait Scheduler: Send + Sync + 'static {
    /// Start a ticker firing every `period`
    fn start(&self, period: Duration) -> Ticker;
}

#[derive(Debug, Default)]
struct GateInner {
    busy: AtomicBool,
    settled: Notify,
}

/// Busy flag shared by a timer and the session consuming its ticks
#[derive(Clone, Debug, Default)]
pub struct TickGate {
    inner: Arc<GateInner>,
}

impl TickGate {
    /// Create an idle gate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate for a new tick; `false` if the previous one is unsettled
    pub fn try_begin(&self) -> bool {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark the current tick's work as finished
    pub fn settle(&self) {
        self.inner.busy.store(false, Ordering::Release);
        self.inner.settled.notify_waiters();
    }

    /// Whether a tick is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Wait until no tick is in flight
    pub async fn wait_settled(&self) {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_busy() {
                return;
            }
            notified.await;
        }
    }
}

/// Receiving end of a periodic timer
///
/// Dropping the ticker stops its timer.
#[derive(Debug)]
pub struct Ticker {
    rx: mpsc::Receiver<()>,
    gate: TickGate,
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Assemble a ticker from its parts
    #[must_use]
    pub fn new(
        rx: mpsc::Receiver<()>,
        gate: TickGate,
        period: Duration,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            rx,
            gate,
            period,
            task,
        }
    }

    /// Wait for the next tick; `None` once the timer has stopped
    pub async fn tick(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Release the gate after handling a tick
    pub fn settle(&self) {
        self.gate.settle();
    }

    /// Timer period
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop the timer; pending and future ticks are discarded
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx.close();
        self.gate.settle();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Hand one tick to a ticker's session, honouring its gate
///
/// Returns `true` if the tick was delivered, `false` if it was skipped
/// because the previous tick is still unsettled or the session is gone.
pub(crate) fn offer_tick(tx: &mpsc::Sender<()>, gate: &TickGate) -> bool {
    if !gate.try_begin() {
        tracing::trace!("Previous tick still busy, skipping");
        return false;
    }
    if tx.try_send(()).is_err() {
        gate.settle();
        return false;
    }
    true
}
