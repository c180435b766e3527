//! # Fibonacci Backoff
//!
//! Retry delays for hard reconciliation errors (binding load or status write
//! failures). Federation failures never reach this path: they are reported in
//! status and retried on the fallback interval.
//!
//! The sequence is kept in minutes and handed out in seconds:
//! 1m, 1m, 2m, 3m, 5m, 8m, then capped at the configured maximum.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Current delay in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let seconds = self.current_minutes * 60;
        let next = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next.min(self.max_minutes);
        seconds
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }
}

/// Tracker key for a binding
pub fn backoff_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Per-binding backoff state, keyed by `namespace/name`
#[derive(Debug)]
pub struct BackoffTracker {
    min_minutes: u64,
    max_minutes: u64,
    states: Mutex<HashMap<String, BackoffState>>,
}

#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffTracker {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure and return the delay before the next attempt
    /// together with the consecutive error count.
    pub fn record_failure(&self, key: &str) -> (Duration, u32) {
        match self.states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(|| BackoffState {
                    backoff: FibonacciBackoff::new(self.min_minutes, self.max_minutes),
                    error_count: 0,
                });
                state.error_count += 1;
                (state.backoff.next_backoff(), state.error_count)
            }
            // Poisoned lock: fall back to the floor
            Err(_) => (Duration::from_secs(self.min_minutes * 60), 0),
        }
    }

    /// Number of bindings with a failure history
    pub fn tracked(&self) -> usize {
        self.states.lock().map_or(0, |states| states.len())
    }

    /// Forget the failure history of a binding that reconciled or no longer exists
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }
}
