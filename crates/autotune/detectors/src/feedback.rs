use crate::detector::PatternDetector;
use crate::error::DetectorResult;
use async_trait::async_trait;
use autotune_storage::{EventQuery, LearningEventStore};
use autotune_types::{pattern_types, EventId, LearningEvent, LearningEventType, LearningPattern};
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;

/// Emits one `user_feedback` pattern per feedback event, scored by how many
/// related events surround it.
///
/// Related events share the feedback's correlation id (or, lacking one, its
/// session id) and fall within the correlation window on either side.
pub struct FeedbackDetector {
    store: Option<Arc<dyn LearningEventStore>>,
    correlation_window: Duration,
}

impl FeedbackDetector {
    pub const NAME: &'static str = "feedback";

    pub fn new() -> Self {
        Self {
            store: None,
            correlation_window: Duration::minutes(5),
        }
    }

    /// Also cross-reference previously stored events.
    pub fn with_store(mut self, store: Arc<dyn LearningEventStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_correlation_window(mut self, window: Duration) -> Self {
        self.correlation_window = window;
        self
    }

    async fn related_count(
        &self,
        feedback: &LearningEvent,
        batch: &[LearningEvent],
    ) -> DetectorResult<usize> {
        let key = match (&feedback.correlation_id, &feedback.session_id) {
            (Some(c), _) => Link::Correlation(c.as_str()),
            (None, Some(s)) => Link::Session(s.as_str()),
            (None, None) => return Ok(0),
        };
        let since = feedback.timestamp - self.correlation_window;
        let until = feedback.timestamp + self.correlation_window;

        let mut seen: HashSet<EventId> = HashSet::new();
        for event in batch {
            if event.id != feedback.id
                && key.matches(event)
                && event.timestamp >= since
                && event.timestamp <= until
            {
                seen.insert(event.id.clone());
            }
        }

        if let Some(store) = &self.store {
            let query = match key {
                Link::Correlation(c) => EventQuery::default().correlated(c),
                Link::Session(s) => EventQuery::default().in_session(s),
            }
            .between(since, until);
            for event in store.query_events(query).await? {
                if event.id != feedback.id {
                    seen.insert(event.id);
                }
            }
        }
        Ok(seen.len())
    }
}

impl Default for FeedbackDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum Link<'a> {
    Correlation(&'a str),
    Session(&'a str),
}

impl Link<'_> {
    fn matches(&self, event: &LearningEvent) -> bool {
        match self {
            Link::Correlation(c) => event.correlation_id.as_deref() == Some(*c),
            Link::Session(s) => event.session_id.as_deref() == Some(*s),
        }
    }
}

#[async_trait]
impl PatternDetector for FeedbackDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn analyze(&self, events: &[LearningEvent]) -> DetectorResult<Vec<LearningPattern>> {
        let mut patterns = Vec::new();
        for event in events
            .iter()
            .filter(|e| e.event_type == LearningEventType::UserFeedback)
        {
            let Some(feedback_type) = event.metadata_str("feedbackType") else {
                tracing::debug!(event_id = %event.id, "feedback event without feedbackType");
                continue;
            };
            let related = self.related_count(event, events).await?;
            let confidence = (0.6 + 0.1 * related as f64).min(0.95);

            let mut pattern =
                LearningPattern::new(pattern_types::USER_FEEDBACK, confidence, Self::NAME)
                    .with_feature("feedbackType", feedback_type)
                    .with_feature("relatedEvents", related as u64)
                    .with_metadata("eventId", event.id.as_str());
            if let Some(score) = event.metadata_f64("score") {
                pattern = pattern.with_feature("score", score);
            }
            if let Some(search_id) = event.metadata_str("searchId") {
                pattern = pattern.with_feature("searchId", search_id);
            }
            patterns.push(pattern);
        }
        Ok(patterns)
    }
}
