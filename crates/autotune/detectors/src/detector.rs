use crate::error::{DetectorError, DetectorResult};
use async_trait::async_trait;
use autotune_types::{LearningEvent, LearningPattern};

/// Turns a batch of events into zero or more patterns.
///
/// Implementations only read their inputs and, optionally, stored events.
#[async_trait]
pub trait PatternDetector: Send + Sync {
    /// Stable name, recorded as the pattern source.
    fn name(&self) -> &'static str;

    async fn analyze(&self, events: &[LearningEvent]) -> DetectorResult<Vec<LearningPattern>>;
}

/// Detector that always fails, for exercising isolation of detector errors.
pub struct FailingDetector;

#[async_trait]
impl PatternDetector for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn analyze(&self, _events: &[LearningEvent]) -> DetectorResult<Vec<LearningPattern>> {
        Err(DetectorError::Failed("simulated detector failure".into()))
    }
}
