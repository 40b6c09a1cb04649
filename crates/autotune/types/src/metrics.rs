use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five performance metrics the metrics collaborator exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Latency,
    Throughput,
    ErrorRate,
    CpuUsage,
    MemoryUsage,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Latency,
        MetricKind::Throughput,
        MetricKind::ErrorRate,
        MetricKind::CpuUsage,
        MetricKind::MemoryUsage,
    ];

    /// Throughput is the only metric where a larger value is an improvement.
    pub fn lower_is_better(&self) -> bool {
        !matches!(self, Self::Throughput)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latency => "latency",
            Self::Throughput => "throughput",
            Self::ErrorRate => "error_rate",
            Self::CpuUsage => "cpu_usage",
            Self::MemoryUsage => "memory_usage",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time performance snapshot of the tuned search service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Average query latency in milliseconds.
    pub latency: f64,
    /// Queries per second.
    pub throughput: f64,
    /// Fraction of failed queries.
    pub error_rate: f64,
    /// CPU utilisation fraction.
    pub cpu_usage: f64,
    /// Memory utilisation fraction.
    pub memory_usage: f64,
}

impl PerformanceMetrics {
    pub fn new(latency: f64, throughput: f64, error_rate: f64) -> Self {
        Self {
            latency,
            throughput,
            error_rate,
            cpu_usage: 0.0,
            memory_usage: 0.0,
        }
    }

    pub fn with_resources(mut self, cpu_usage: f64, memory_usage: f64) -> Self {
        self.cpu_usage = cpu_usage;
        self.memory_usage = memory_usage;
        self
    }

    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Latency => self.latency,
            MetricKind::Throughput => self.throughput,
            MetricKind::ErrorRate => self.error_rate,
            MetricKind::CpuUsage => self.cpu_usage,
            MetricKind::MemoryUsage => self.memory_usage,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: f64) {
        match kind {
            MetricKind::Latency => self.latency = value,
            MetricKind::Throughput => self.throughput = value,
            MetricKind::ErrorRate => self.error_rate = value,
            MetricKind::CpuUsage => self.cpu_usage = value,
            MetricKind::MemoryUsage => self.memory_usage = value,
        }
    }

    pub fn resource_utilization(&self) -> f64 {
        (self.cpu_usage + self.memory_usage) / 2.0
    }

    /// Element-wise mean of a set of samples, `None` when empty.
    pub fn average(samples: &[PerformanceMetrics]) -> Option<PerformanceMetrics> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mut avg = PerformanceMetrics::default();
        for kind in MetricKind::ALL {
            let sum: f64 = samples.iter().map(|s| s.get(kind)).sum();
            avg.set(kind, sum / n);
        }
        Some(avg)
    }
}
