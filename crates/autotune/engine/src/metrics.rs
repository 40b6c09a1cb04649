use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters, shared by the orchestrator, the consumer and the
/// monitoring tasks.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    cycles_run: AtomicU64,
    cycles_failed: AtomicU64,
    batches_processed: AtomicU64,
    events_processed: AtomicU64,
    events_failed: AtomicU64,
    patterns_detected: AtomicU64,
    detector_failures: AtomicU64,
    strategies_generated: AtomicU64,
    strategies_executed: AtomicU64,
    strategies_rejected: AtomicU64,
    strategies_rolled_back: AtomicU64,
    validations_passed: AtomicU64,
    validations_failed: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMetricsSnapshot {
    pub cycles_run: u64,
    pub cycles_failed: u64,
    pub batches_processed: u64,
    pub events_processed: u64,
    pub events_failed: u64,
    pub patterns_detected: u64,
    pub detector_failures: u64,
    pub strategies_generated: u64,
    pub strategies_executed: u64,
    pub strategies_rejected: u64,
    pub strategies_rolled_back: u64,
    pub validations_passed: u64,
    pub validations_failed: u64,
}

fn add(counter: &AtomicU64, n: usize) {
    counter.fetch_add(n as u64, Ordering::Relaxed);
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, failed: bool) {
        add(&self.cycles_run, 1);
        if failed {
            add(&self.cycles_failed, 1);
        }
    }

    pub fn record_batch(&self, events: usize) {
        add(&self.batches_processed, 1);
        add(&self.events_processed, events);
    }

    pub fn record_failed_events(&self, n: usize) {
        add(&self.events_failed, n);
    }

    pub fn record_detection(&self, patterns: usize, failures: usize) {
        add(&self.patterns_detected, patterns);
        add(&self.detector_failures, failures);
    }

    pub fn record_generated(&self, n: usize) {
        add(&self.strategies_generated, n);
    }

    pub fn record_executed(&self) {
        add(&self.strategies_executed, 1);
    }

    pub fn record_rejected(&self) {
        add(&self.strategies_rejected, 1);
    }

    pub fn record_rollback(&self) {
        add(&self.strategies_rolled_back, 1);
    }

    pub fn record_validation(&self, passed: bool) {
        if passed {
            add(&self.validations_passed, 1);
        } else {
            add(&self.validations_failed, 1);
        }
    }

    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        EngineMetricsSnapshot {
            cycles_run: get(&self.cycles_run),
            cycles_failed: get(&self.cycles_failed),
            batches_processed: get(&self.batches_processed),
            events_processed: get(&self.events_processed),
            events_failed: get(&self.events_failed),
            patterns_detected: get(&self.patterns_detected),
            detector_failures: get(&self.detector_failures),
            strategies_generated: get(&self.strategies_generated),
            strategies_executed: get(&self.strategies_executed),
            strategies_rejected: get(&self.strategies_rejected),
            strategies_rolled_back: get(&self.strategies_rolled_back),
            validations_passed: get(&self.validations_passed),
            validations_failed: get(&self.validations_failed),
        }
    }
}

impl EngineMetricsSnapshot {
    /// Share of validations that passed, 1.0 before any ran.
    pub fn validation_pass_rate(&self) -> f64 {
        let total = self.validations_passed + self.validations_failed;
        if total == 0 {
            return 1.0;
        }
        self.validations_passed as f64 / total as f64
    }
}
