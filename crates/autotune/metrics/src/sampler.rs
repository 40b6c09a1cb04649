use crate::error::MetricsResult;
use crate::provider::{MetricRecord, MetricsProvider};
use rand::Rng;
use std::sync::Arc;

/// Forwards a fraction of records to a provider.
///
/// Each record is kept with probability `sample_rate`; dropped records are
/// reported as `Ok(false)`.
pub struct SampledRecorder {
    provider: Arc<dyn MetricsProvider>,
    sample_rate: f64,
}

impl SampledRecorder {
    pub fn new(provider: Arc<dyn MetricsProvider>, sample_rate: f64) -> Self {
        Self {
            provider,
            sample_rate: autotune_types::clamp_unit(sample_rate),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub async fn record(&self, record: MetricRecord) -> MetricsResult<bool> {
        if !self.should_sample() {
            tracing::trace!(metric = %record.name, "metric dropped by sampling");
            return Ok(false);
        }
        record.validate()?;
        self.provider.record_metric(record).await?;
        Ok(true)
    }

    fn should_sample(&self) -> bool {
        if self.sample_rate >= 1.0 {
            return true;
        }
        if self.sample_rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.sample_rate
    }
}
