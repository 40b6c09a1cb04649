use crate::error::{MetricsError, MetricsResult};
use async_trait::async_trait;
use autotune_types::{MetadataMap, PerformanceMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named observation written back to the metrics backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: MetadataMap,
    pub recorded_at: DateTime<Utc>,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, value: f64, confidence: f64) -> Self {
        Self {
            name: name.into(),
            value,
            confidence: autotune_types::clamp_unit(confidence),
            metadata: MetadataMap::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub(crate) fn validate(&self) -> MetricsResult<()> {
        if self.name.is_empty() || !self.value.is_finite() {
            return Err(MetricsError::InvalidValue {
                name: self.name.clone(),
                value: self.value,
            });
        }
        Ok(())
    }
}

/// Read/write contract of the metrics collaborator.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Average query latency in milliseconds.
    async fn average_latency(&self) -> MetricsResult<f64>;

    /// Queries per second.
    async fn throughput(&self) -> MetricsResult<f64>;

    async fn error_rate(&self) -> MetricsResult<f64>;

    async fn cpu_usage(&self) -> MetricsResult<f64>;

    async fn memory_usage(&self) -> MetricsResult<f64>;

    async fn record_metric(&self, record: MetricRecord) -> MetricsResult<()>;

    /// Read all five figures concurrently into one snapshot.
    async fn collect_snapshot(&self) -> MetricsResult<PerformanceMetrics> {
        let (latency, throughput, error_rate, cpu_usage, memory_usage) = futures::try_join!(
            self.average_latency(),
            self.throughput(),
            self.error_rate(),
            self.cpu_usage(),
            self.memory_usage(),
        )?;
        Ok(PerformanceMetrics {
            latency,
            throughput,
            error_rate,
            cpu_usage,
            memory_usage,
        })
    }
}
