use crate::detector::PatternDetector;
use crate::error::DetectorResult;
use async_trait::async_trait;
use autotune_types::{
    pattern_types, LearningEvent, LearningEventType, LearningPattern, PatternMetrics,
};

/// Relevance ratio above which a search is reported as highly relevant.
pub const HIGH_RELEVANCE_RATIO: f64 = 0.8;

/// Reports searches whose relevant-hit ratio is high, with the ratio as the
/// pattern confidence.
#[derive(Debug, Default)]
pub struct SearchRelevanceDetector;

impl SearchRelevanceDetector {
    pub const NAME: &'static str = "search_relevance";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PatternDetector for SearchRelevanceDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn analyze(&self, events: &[LearningEvent]) -> DetectorResult<Vec<LearningPattern>> {
        let mut patterns = Vec::new();
        for event in events
            .iter()
            .filter(|e| e.event_type == LearningEventType::SearchPattern)
        {
            let (Some(relevant), Some(total)) = (
                event.metadata_f64("relevantHits"),
                event.metadata_f64("totalHits"),
            ) else {
                continue;
            };
            if total <= 0.0 {
                continue;
            }
            let ratio = relevant / total;
            if ratio <= HIGH_RELEVANCE_RATIO {
                continue;
            }

            let took = event.metadata_f64("took");
            let mut pattern =
                LearningPattern::new(pattern_types::HIGH_RELEVANCE_SEARCH, ratio, Self::NAME)
                    .with_feature("relevantHits", relevant)
                    .with_feature("totalHits", total)
                    .with_feature("relevanceRatio", ratio)
                    .with_metrics(PatternMetrics {
                        latency: took,
                        ..Default::default()
                    })
                    .with_metadata("eventId", event.id.as_str());
            if let Some(took) = took {
                pattern = pattern.with_feature("took", took);
            }
            if let Some(search_type) = event.metadata_str("searchType") {
                pattern = pattern.with_feature("searchType", search_type);
            }
            if let Some(pattern_name) = event.metadata_str("searchPattern") {
                pattern = pattern.with_feature("searchPattern", pattern_name);
            }
            patterns.push(pattern);
        }
        Ok(patterns)
    }
}
