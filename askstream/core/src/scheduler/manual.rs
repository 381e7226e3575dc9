//! Hand-driven scheduler for deterministic tests and replays.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{offer_tick, Scheduler, TickGate, Ticker};

#[derive(Debug)]
struct Registration {
    tx: mpsc::Sender<()>,
    gate: TickGate,
    period: Duration,
}

/// Scheduler whose ticks only happen when [`fire`](Self::fire) is called
///
/// Acts as a virtual clock: the period requested by a session is recorded but
/// no real time passes. Ticks go to the most recently started ticker that is
/// still alive.
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    tickers: Arc<Mutex<Vec<Registration>>>,
}

impl ManualScheduler {
    /// Create a scheduler with no tickers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire one tick; `false` if skipped (busy gate or no live ticker)
    pub fn fire(&self) -> bool {
        self.live()
            .is_some_and(|(tx, gate)| offer_tick(&tx, &gate))
    }

    /// Fire one tick and wait until the session has finished handling it
    pub async fn fire_and_settle(&self) -> bool {
        let Some((tx, gate)) = self.live() else {
            return false;
        };
        if !offer_tick(&tx, &gate) {
            return false;
        }
        gate.wait_settled().await;
        true
    }

    /// Whether a live ticker is registered
    #[must_use]
    pub fn has_ticker(&self) -> bool {
        self.live().is_some()
    }

    /// Period requested by the live ticker
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        let mut tickers = self.tickers.lock();
        tickers.retain(|r| !r.tx.is_closed());
        tickers.last().map(|r| r.period)
    }

    fn live(&self) -> Option<(mpsc::Sender<()>, TickGate)> {
        let mut tickers = self.tickers.lock();
        tickers.retain(|r| !r.tx.is_closed());
        tickers.last().map(|r| (r.tx.clone(), r.gate.clone()))
    }
}

impl Scheduler for ManualScheduler {
    fn start(&self, period: Duration) -> Ticker {
        let (tx, rx) = mpsc::channel(1);
        let gate = TickGate::new();
        self.tickers.lock().push(Registration {
            tx,
            gate: gate.clone(),
            period,
        });
        Ticker::new(rx, gate, period, None)
    }
}
