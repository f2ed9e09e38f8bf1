//! Metrics recorder implementations

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::traits::MetricsRecorder;

/// Recorder that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn order_submitted(&self, _tag: &str) {}
}

#[derive(Debug, Default)]
struct Counters {
    submitted: HashMap<String, u64>,
    failed: HashMap<String, u64>,
    rebalances: u64,
    last_held: usize,
}

/// In-memory recorder keyed by order tag
///
/// Useful in tests and in the replay binary's summary.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<Counters>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders submitted under a tag
    pub fn submitted(&self, tag: &str) -> u64 {
        self.with(|c| c.submitted.get(tag).copied().unwrap_or_default())
    }

    /// Orders submitted across all tags
    pub fn total_submitted(&self) -> u64 {
        self.with(|c| c.submitted.values().sum())
    }

    /// Orders refused under a tag
    pub fn failed(&self, tag: &str) -> u64 {
        self.with(|c| c.failed.get(tag).copied().unwrap_or_default())
    }

    /// Number of completed rotation rebalances
    pub fn rebalances(&self) -> u64 {
        self.with(|c| c.rebalances)
    }

    /// Positions held after the most recent rebalance
    pub fn last_held(&self) -> usize {
        self.with(|c| c.last_held)
    }

    /// Snapshot of submitted counters, sorted by tag
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut out: Vec<(String, u64)> =
            self.with(|c| c.submitted.iter().map(|(k, v)| (k.clone(), *v)).collect());
        out.sort();
        out
    }

    fn with<T>(&self, f: impl FnOnce(&mut Counters) -> T) -> T {
        let mut guard = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl MetricsRecorder for InMemoryMetrics {
    fn order_submitted(&self, tag: &str) {
        self.with(|c| *c.submitted.entry(tag.to_string()).or_default() += 1);
    }

    fn order_failed(&self, tag: &str) {
        self.with(|c| *c.failed.entry(tag.to_string()).or_default() += 1);
    }

    fn rebalanced(&self, held: usize) {
        self.with(|c| {
            c.rebalances += 1;
            c.last_held = held;
        });
    }
}
