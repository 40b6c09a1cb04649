use crate::detector::PatternDetector;
use crate::feedback::FeedbackDetector;
use crate::performance::PerformanceDetector;
use crate::search_relevance::SearchRelevanceDetector;
use crate::time_window::TimeWindowDetector;
use autotune_storage::LearningEventStore;
use autotune_types::{LearningEvent, LearningPattern};
use futures::future::join_all;
use std::sync::Arc;

/// One detector's failure within a detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorFailure {
    pub detector: &'static str,
    pub error: String,
}

/// Patterns from every detector that succeeded, plus the failures.
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    pub patterns: Vec<LearningPattern>,
    pub failures: Vec<DetectorFailure>,
}

/// Runs a set of detectors concurrently over the same batch.
///
/// A failing detector only loses its own patterns.
#[derive(Clone, Default)]
pub struct DetectorSet {
    detectors: Vec<Arc<dyn PatternDetector>>,
}

impl DetectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four standard detectors. Feedback cross-references `store` when
    /// one is given.
    pub fn standard(store: Option<Arc<dyn LearningEventStore>>) -> Self {
        let feedback = match store {
            Some(store) => FeedbackDetector::new().with_store(store),
            None => FeedbackDetector::new(),
        };
        Self::new()
            .with_detector(Arc::new(feedback))
            .with_detector(Arc::new(PerformanceDetector::new()))
            .with_detector(Arc::new(TimeWindowDetector::new()))
            .with_detector(Arc::new(SearchRelevanceDetector::new()))
    }

    pub fn with_detector(mut self, detector: Arc<dyn PatternDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    pub async fn analyze(&self, events: &[LearningEvent]) -> DetectionOutcome {
        let runs = self.detectors.iter().map(|detector| async move {
            (detector.name(), detector.analyze(events).await)
        });

        let mut outcome = DetectionOutcome::default();
        for (name, result) in join_all(runs).await {
            match result {
                Ok(patterns) => {
                    tracing::debug!(detector = name, count = patterns.len(), "detector finished");
                    outcome.patterns.extend(patterns);
                }
                Err(e) => {
                    tracing::warn!(detector = name, error = %e, "detector failed");
                    outcome.failures.push(DetectorFailure {
                        detector: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        outcome
    }
}
