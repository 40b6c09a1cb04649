//! Simulated metrics backend for tests and the demo.
//!
//! Holds a current snapshot that scripted snapshots replace one per
//! [`collect_snapshot`](MetricsProvider::collect_snapshot) call, so a test can
//! describe how the service behaves across a validation window.

use crate::error::{MetricsError, MetricsResult};
use crate::provider::{MetricRecord, MetricsProvider};
use async_trait::async_trait;
use autotune_types::PerformanceMetrics;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct SimulatedMetrics {
    current: Mutex<PerformanceMetrics>,
    script: Mutex<VecDeque<PerformanceMetrics>>,
    recorded: Mutex<Vec<MetricRecord>>,
    unavailable: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedMetrics {
    pub fn new(current: PerformanceMetrics) -> Self {
        Self {
            current: Mutex::new(current),
            ..Self::default()
        }
    }

    /// Queue snapshots returned by the following collections, in order. The
    /// last one stays current once the queue drains.
    pub fn with_script(self, snapshots: impl IntoIterator<Item = PerformanceMetrics>) -> Self {
        lock(&self.script).extend(snapshots);
        self
    }

    pub fn set_current(&self, metrics: PerformanceMetrics) {
        *lock(&self.current) = metrics;
    }

    pub fn push_script(&self, metrics: PerformanceMetrics) {
        lock(&self.script).push_back(metrics);
    }

    /// Make every read fail until turned back on.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<MetricRecord> {
        lock(&self.recorded).clone()
    }

    fn read(&self, name: &str, f: impl FnOnce(&PerformanceMetrics) -> f64) -> MetricsResult<f64> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MetricsError::Unavailable(name.to_string()));
        }
        Ok(f(&lock(&self.current)))
    }
}

#[async_trait]
impl MetricsProvider for SimulatedMetrics {
    async fn average_latency(&self) -> MetricsResult<f64> {
        self.read("latency", |m| m.latency)
    }

    async fn throughput(&self) -> MetricsResult<f64> {
        self.read("throughput", |m| m.throughput)
    }

    async fn error_rate(&self) -> MetricsResult<f64> {
        self.read("error_rate", |m| m.error_rate)
    }

    async fn cpu_usage(&self) -> MetricsResult<f64> {
        self.read("cpu_usage", |m| m.cpu_usage)
    }

    async fn memory_usage(&self) -> MetricsResult<f64> {
        self.read("memory_usage", |m| m.memory_usage)
    }

    async fn record_metric(&self, record: MetricRecord) -> MetricsResult<()> {
        record.validate()?;
        lock(&self.recorded).push(record);
        Ok(())
    }

    async fn collect_snapshot(&self) -> MetricsResult<PerformanceMetrics> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MetricsError::Unavailable("snapshot".to_string()));
        }
        let next = lock(&self.script).pop_front();
        let mut current = lock(&self.current);
        if let Some(next) = next {
            *current = next;
        }
        Ok(*current)
    }
}
