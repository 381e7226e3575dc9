//! Per-session pacing state machine.

use crate::accumulator::Accumulator;

use super::PacingPolicy;

/// What the controller should do once the producer reports done
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Stop ticking and commit everything that is left
    Finish,
    /// Keep ticking until nothing is pending
    Drain,
}

/// Pacing state for one session
///
/// The pacer never touches the accumulator itself: it answers "commit up to
/// which byte?" and the controller applies the commit.
#[derive(Clone, Debug)]
pub struct Pacer {
    policy: PacingPolicy,
    fragments_since_commit: u32,
    producer_done: bool,
}

impl Pacer {
    /// Create a pacer for `policy`
    #[must_use]
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            fragments_since_commit: 0,
            producer_done: false,
        }
    }

    /// Policy being applied
    #[must_use]
    pub fn policy(&self) -> PacingPolicy {
        self.policy
    }

    /// A fragment was appended to `acc`
    pub fn on_fragment(&mut self, acc: &Accumulator) -> Option<usize> {
        match self.policy {
            PacingPolicy::Immediate => Some(acc.text().len()),
            PacingPolicy::ChunkThreshold { n } => {
                self.fragments_since_commit += 1;
                if self.fragments_since_commit >= n {
                    self.fragments_since_commit = 0;
                    Some(acc.text().len())
                } else {
                    None
                }
            }
            PacingPolicy::Interval { .. } | PacingPolicy::CharRate { .. } => None,
        }
    }

    /// The policy's timer fired
    pub fn on_tick(&mut self, acc: &Accumulator) -> Option<usize> {
        if !acc.has_pending() {
            return None;
        }
        match self.policy {
            PacingPolicy::Immediate | PacingPolicy::ChunkThreshold { .. } => None,
            PacingPolicy::Interval { .. } => Some(acc.text().len()),
            PacingPolicy::CharRate { chars, .. } => {
                Some(acc.advance_by_chars(chars as usize))
            }
        }
    }

    /// The producer delivered its last fragment
    pub fn on_producer_done(&mut self, acc: &Accumulator) -> Completion {
        self.producer_done = true;
        match self.policy {
            PacingPolicy::CharRate { .. } if acc.has_pending() => Completion::Drain,
            _ => Completion::Finish,
        }
    }

    /// Whether the producer is done and nothing remains to reveal
    #[must_use]
    pub fn is_drained(&self, acc: &Accumulator) -> bool {
        self.producer_done && !acc.has_pending()
    }
}
