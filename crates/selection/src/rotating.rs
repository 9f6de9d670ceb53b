//! Round-robin selection with a lock-free shared counter.
//!
//! One strategy instance may be shared across many conversations (e.g. a
//! worker pool load-balancing over the same agent roster). Each selection is
//! a single atomic read-increment, so concurrent callers never observe the
//! same pre-increment counter value and the index sequence over serialized
//! calls is exactly `0, 1, 2, … mod len`.

use std::sync::atomic::{AtomicU64, Ordering};

use conclave_core::{AgentRegistration, ConversationMessage, SelectionError};
use conclave_store::VariableStore;

use crate::{active, SelectionStrategy};

/// Concurrency-safe rotating (round-robin) strategy.
#[derive(Debug, Default)]
pub struct RotatingStrategy {
    counter: AtomicU64,
}

impl RotatingStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next rotation slot for a candidate set of size `len`.
    ///
    /// The counter wraps at the largest multiple of `len` that fits in a
    /// `u64`, so the modular index sequence stays gapless across wraparound
    /// instead of relying on integer overflow.
    fn next_index(&self, len: usize) -> usize {
        let len = len as u64;
        let wrap_at = (u64::MAX / len) * len;
        let prev = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                Some((c + 1) % wrap_at)
            })
            .unwrap_or_else(|c| c); // closure never returns None
        (prev % len) as usize
    }

    /// Return the counter to zero; the next selection yields index 0.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::SeqCst);
    }

    /// The counter's value reduced modulo `candidate_count`, for inspection.
    pub fn current_counter(&self, candidate_count: usize) -> usize {
        if candidate_count == 0 {
            return 0;
        }
        (self.counter.load(Ordering::SeqCst) % candidate_count as u64) as usize
    }

    #[cfg(test)]
    fn set_raw(&self, value: u64) {
        self.counter.store(value, Ordering::SeqCst);
    }
}

impl SelectionStrategy for RotatingStrategy {
    fn name(&self) -> &str {
        "rotating"
    }

    fn select_next(
        &self,
        candidates: &[AgentRegistration],
        _history: &[ConversationMessage],
        _store: &VariableStore,
    ) -> Result<String, SelectionError> {
        let active = active(candidates);
        if active.is_empty() {
            return Err(SelectionError::NoActiveCandidates);
        }
        let idx = self.next_index(active.len());
        Ok(active[idx].name.clone())
    }
}
