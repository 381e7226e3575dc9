//! Accumulator
//!
//! All answer text decoded so far for one session, plus the watermark of how
//! much of it has been handed to the surface. Both only ever grow.

use crate::error::AccumulatorError;
use crate::messages::RawFragment;

/// Accumulated and committed text for one session
#[derive(Clone, Debug, Default)]
pub struct Accumulator {
    /// Everything decoded so far
    text: String,
    /// Byte length of the committed prefix (always on a char boundary)
    committed: usize,
    /// Sequence number expected for the next fragment
    next_seq: u64,
    /// Fragments appended
    fragments: u64,
}

impl Accumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment
    pub fn append(&mut self, fragment: &RawFragment) {
        debug_assert_eq!(fragment.seq, self.next_seq, "fragments must arrive in order");
        self.next_seq = fragment.seq + 1;
        self.fragments += 1;
        self.text.push_str(&fragment.text);
    }

    /// Append plain text as the next fragment
    pub fn append_text(&mut self, text: &str) -> RawFragment {
        let fragment = RawFragment {
            seq: self.next_seq,
            text: text.to_string(),
        };
        self.append(&fragment);
        fragment
    }

    /// Advance the committed watermark to `up_to` bytes
    ///
    /// The target is clamped to the accumulated length and rounded down to a
    /// char boundary. Returns whether the watermark moved.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::Backward`] if `up_to` is below the current
    /// watermark.
    pub fn commit(&mut self, up_to: usize) -> Result<bool, AccumulatorError> {
        if up_to < self.committed {
            return Err(AccumulatorError::Backward {
                committed: self.committed,
                requested: up_to,
            });
        }
        let mut target = up_to.min(self.text.len());
        while !self.text.is_char_boundary(target) {
            target -= 1;
        }
        let moved = target > self.committed;
        self.committed = self.committed.max(target);
        Ok(moved)
    }

    /// Commit everything accumulated so far
    pub fn commit_all(&mut self) -> bool {
        let moved = self.text.len() > self.committed;
        self.committed = self.text.len();
        moved
    }

    /// Byte offset reached by revealing `chars` more characters of pending text
    #[must_use]
    pub fn advance_by_chars(&self, chars: usize) -> usize {
        let pending = self.pending();
        match pending.char_indices().nth(chars) {
            Some((idx, _)) => self.committed + idx,
            None => self.text.len(),
        }
    }

    /// Full accumulated text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Committed prefix
    #[must_use]
    pub fn committed_text(&self) -> &str {
        &self.text[..self.committed]
    }

    /// Byte length of the committed prefix
    #[must_use]
    pub fn committed_len(&self) -> usize {
        self.committed
    }

    /// Accumulated text not yet committed
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.text[self.committed..]
    }

    /// Whether any text is waiting to be committed
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.committed < self.text.len()
    }

    /// Number of fragments appended
    #[must_use]
    pub fn fragment_count(&self) -> u64 {
        self.fragments
    }
}
