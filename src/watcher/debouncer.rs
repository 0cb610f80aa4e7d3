//! Batching of file change events.
//!
//! An upload produces a handful of events (staging file, rename, lock file)
//! and a busy channel produces many more. The indexer only needs to know that
//! *something* changed, so events are folded into one batch that fires once
//! the directory has been quiet for the debounce duration.

use std::time::{Duration, Instant};

/// Collapses a stream of change events into batches.
///
/// A batch is ready once no event arrived for `duration`, or once `max_delay`
/// passed since its first event so a steady trickle cannot postpone indexing
/// forever.
#[derive(Debug)]
pub struct Debouncer {
    /// Arrival of the first event in the current batch.
    first_change: Option<Instant>,
    /// Arrival of the most recent event.
    last_change: Option<Instant>,
    /// Events folded into the current batch.
    pending: usize,
    /// How long the directory must be quiet before the batch fires.
    duration: Duration,
    /// Upper bound on how long a batch may be held back.
    max_delay: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given duration in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self::with_max_delay(debounce_ms, debounce_ms.saturating_mul(10))
    }

    pub fn with_max_delay(debounce_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            first_change: None,
            last_change: None,
            pending: 0,
            duration: Duration::from_millis(debounce_ms),
            max_delay: Duration::from_millis(max_delay_ms.max(debounce_ms)),
        }
    }

    /// Record a change event.
    ///
    /// Resets the quiet timer.
    pub fn record(&mut self) {
        let now = Instant::now();
        self.first_change.get_or_insert(now);
        self.last_change = Some(now);
        self.pending += 1;
    }

    /// Take the current batch if it is ready.
    ///
    /// Returns the number of events folded into it.
    pub fn take_ready(&mut self) -> Option<usize> {
        let (first, last) = (self.first_change?, self.last_change?);
        let now = Instant::now();

        let quiet = now.duration_since(last) >= self.duration;
        let overdue = now.duration_since(first) >= self.max_delay;
        if !quiet && !overdue {
            return None;
        }

        self.first_change = None;
        self.last_change = None;
        Some(std::mem::take(&mut self.pending))
    }

    /// Check if there are any pending changes.
    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }

    /// Get the number of pending changes.
    pub fn pending_count(&self) -> usize {
        self.pending
    }
}
