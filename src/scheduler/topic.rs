//! Per-topic registry state for the best-effort class.

use std::time::{Duration, Instant};

/// Registry entry for one best-effort topic: policy, pending slot, and the
/// deficit accumulator used by priority-weighted round-robin selection.
///
/// Created lazily on first enqueue and never removed for the process
/// lifetime (topic cardinality is assumed bounded by configuration).
#[derive(Debug)]
pub struct TopicState {
    pub priority: f64,
    pub rate_limit: Duration,
    pub pending: Option<Vec<u8>>,
    pub last_release: Option<Instant>,
    pub deficit: f64,
}

impl TopicState {
    pub fn new(priority: f64, rate_limit: Duration) -> Self {
        Self {
            priority,
            rate_limit,
            pending: None,
            last_release: None,
            deficit: 0.0,
        }
    }

    /// A topic is eligible this round if it has a pending message and its
    /// rate limit has elapsed since the last release (never-released
    /// topics are always eligible).
    pub fn eligible(&self, now: Instant) -> bool {
        self.pending.is_some()
            && self
                .last_release
                .map_or(true, |t| now.duration_since(t) >= self.rate_limit)
    }
}
