//! Real-time scheduler backed by tokio intervals.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{offer_tick, Scheduler, TickGate, Ticker};

/// Scheduler using `tokio::time::interval`
///
/// Must be used from within a tokio runtime. Missed ticks are skipped, not
/// bursted, so a stalled runtime never produces a catch-up storm.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    /// Create a scheduler
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn start(&self, period: Duration) -> Ticker {
        let (tx, rx) = mpsc::channel(1);
        let gate = TickGate::new();
        let timer_gate = gate.clone();

        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }
                offer_tick(&tx, &timer_gate);
            }
        });

        Ticker::new(rx, gate, period, Some(task))
    }
}
