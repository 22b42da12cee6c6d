//! Retry delays for failed host reconciliations
//!
//! A reconcile error that can succeed on a later pass (a missing secret, a
//! failed script, a store conflict) requeues the host record after a delay
//! taken from that record's own Fibonacci sequence, from 5s up to 300s.
//! The sequence restarts at 5s once a pass on the record succeeds. Errors that
//! need an operator do not use it; they wait for the record to change.
//!
//! Delays: 5s, 5s, 10s, 15s, 25s, 40s, ... 300s.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Minimum retry delay in seconds
pub const MIN_BACKOFF_SECS: u64 = 5;

/// Maximum retry delay in seconds
pub const MAX_BACKOFF_SECS: u64 = 300;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at the maximum.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in seconds (for reset)
    min_secs: u64,
    /// Previous backoff value in seconds
    prev_secs: u64,
    /// Current backoff value in seconds
    current_secs: u64,
    /// Maximum backoff value in seconds
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with minimum and maximum values in seconds
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;
        let next = self.prev_secs + self.current_secs;
        self.prev_secs = self.current_secs;
        self.current_secs = std::cmp::min(next, self.max_secs);
        Duration::from_secs(result)
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(MIN_BACKOFF_SECS, MAX_BACKOFF_SECS)
    }
}

/// Backoff state per host record (namespace/name -> FibonacciBackoff)
#[derive(Debug, Default)]
pub struct BackoffStates {
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffStates {
    /// Next retry delay for a record, advancing its sequence
    pub fn next_for(&self, resource_key: &str) -> Duration {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states
            .entry(resource_key.to_string())
            .or_default()
            .next_backoff()
    }

    /// Forget the failure history of a record after a successful pass
    pub fn reset(&self, resource_key: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get_mut(resource_key) {
            state.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::default();

        let secs: Vec<u64> = (0..8).map(|_| backoff.next_backoff().as_secs()).collect();
        assert_eq!(secs, vec![5, 5, 10, 15, 25, 40, 65, 105]);
    }

    #[test]
    fn test_fibonacci_backoff_max_cap() {
        let mut backoff = FibonacciBackoff::new(5, 20);

        assert_eq!(backoff.next_backoff().as_secs(), 5);
        assert_eq!(backoff.next_backoff().as_secs(), 5);
        assert_eq!(backoff.next_backoff().as_secs(), 10);
        assert_eq!(backoff.next_backoff().as_secs(), 15);
        // Next would be 25 (15+10), capped at 20
        assert_eq!(backoff.next_backoff().as_secs(), 20);
        assert_eq!(backoff.next_backoff().as_secs(), 20);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::default();

        backoff.next_backoff();
        backoff.next_backoff();
        assert_eq!(backoff.next_backoff().as_secs(), 10);

        backoff.reset();

        // Should restart from beginning after success
        assert_eq!(backoff.next_backoff().as_secs(), 5);
        assert_eq!(backoff.next_backoff().as_secs(), 5);
    }

    #[test]
    fn test_backoff_states_are_per_record() {
        let states = BackoffStates::default();

        assert_eq!(states.next_for("default/a").as_secs(), 5);
        assert_eq!(states.next_for("default/a").as_secs(), 5);
        assert_eq!(states.next_for("default/a").as_secs(), 10);
        assert_eq!(states.next_for("default/b").as_secs(), 5);

        states.reset("default/a");
        assert_eq!(states.next_for("default/a").as_secs(), 5);
    }
}
