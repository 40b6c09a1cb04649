//! Synthetic search traffic for the demo.
//!
//! Produces the kinds of events a search front end would publish: search
//! executions, user feedback on results and latency threshold alerts. The
//! generator is seeded so a run is reproducible.

use autotune_types::{LearningEvent, LearningEventType, PerformanceMetrics};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEARCH_TYPES: [&str; 3] = ["keyword", "semantic", "hybrid"];
const SEARCH_PATTERNS: [&str; 4] = ["product_lookup", "docs", "troubleshooting", "*"];
const FEEDBACK_TYPES: [&str; 3] = ["click", "like", "dislike"];

pub struct SearchWorkload {
    rng: StdRng,
    sessions: usize,
}

impl SearchWorkload {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sessions: 8,
        }
    }

    /// `n` events, roughly 70% searches, 20% feedback and 10% alerts.
    pub fn generate(&mut self, n: usize) -> Vec<LearningEvent> {
        (0..n)
            .map(|i| match self.rng.gen_range(0..10) {
                0..=6 => self.search(i),
                7 | 8 => self.feedback(i),
                _ => self.latency_alert(),
            })
            .collect()
    }

    fn session(&mut self) -> String {
        format!("session-{}", self.rng.gen_range(0..self.sessions))
    }

    pub fn search(&mut self, i: usize) -> LearningEvent {
        let total: u32 = self.rng.gen_range(200..3_000);
        let relevance: f64 = self.rng.gen_range(0.6..0.99);
        let relevant = (f64::from(total) * relevance).round();
        let took: u32 = self.rng.gen_range(20..800);
        let search_type = SEARCH_TYPES[self.rng.gen_range(0..SEARCH_TYPES.len())];
        let pattern = SEARCH_PATTERNS[self.rng.gen_range(0..SEARCH_PATTERNS.len())];
        let session = self.session();
        LearningEvent::new(LearningEventType::SearchPattern)
            .with_metadata("searchId", format!("search-{i}"))
            .with_metadata("relevantHits", relevant)
            .with_metadata("totalHits", total)
            .with_metadata("took", took)
            .with_metadata("searchType", search_type)
            .with_metadata("searchPattern", pattern)
            .with_correlation_id(format!("search-{i}"))
            .with_session_id(session)
    }

    pub fn feedback(&mut self, i: usize) -> LearningEvent {
        let feedback = FEEDBACK_TYPES[self.rng.gen_range(0..FEEDBACK_TYPES.len())];
        let score: f64 = self.rng.gen_range(0.0..1.0);
        let target = i.saturating_sub(1);
        let session = self.session();
        LearningEvent::new(LearningEventType::UserFeedback)
            .with_metadata("feedbackType", feedback)
            .with_metadata("score", score)
            .with_metadata("searchId", format!("search-{target}"))
            .with_correlation_id(format!("search-{target}"))
            .with_session_id(session)
    }

    pub fn latency_alert(&mut self) -> LearningEvent {
        let value: f64 = self.rng.gen_range(80.0..400.0);
        LearningEvent::new(LearningEventType::MetricThreshold)
            .with_metadata("metricName", "latency")
            .with_metadata("value", value)
            .with_metadata("threshold", 200.0)
    }
}

/// Cluster metrics before any tuning.
pub fn untuned_metrics() -> PerformanceMetrics {
    PerformanceMetrics::new(180.0, 900.0, 0.02).with_resources(0.55, 0.6)
}

/// Cluster metrics once tuning has taken effect.
pub fn tuned_metrics() -> PerformanceMetrics {
    PerformanceMetrics::new(120.0, 1_150.0, 0.015).with_resources(0.5, 0.58)
}
