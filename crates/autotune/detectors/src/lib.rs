#![deny(unsafe_code)]
//! # autotune-detectors
//!
//! Rule-based pattern detection. Each detector turns a batch of learning
//! events into patterns with its own heuristic:
//!
//! - [`FeedbackDetector`]: user feedback scored by surrounding activity
//! - [`PerformanceDetector`]: latest metric sample against its threshold
//! - [`TimeWindowDetector`]: hourly series classified as anomaly, trend,
//!   seasonal or plain time-based
//! - [`SearchRelevanceDetector`]: searches with a high relevant-hit ratio
//!
//! [`DetectorSet`] runs them concurrently and isolates failures.

pub mod detector;
pub mod error;
pub mod feedback;
pub mod performance;
pub mod search_relevance;
pub mod set;
pub mod time_window;

pub use detector::{FailingDetector, PatternDetector};
pub use error::{DetectorError, DetectorResult};
pub use feedback::FeedbackDetector;
pub use performance::PerformanceDetector;
pub use search_relevance::SearchRelevanceDetector;
pub use set::{DetectionOutcome, DetectorFailure, DetectorSet};
pub use time_window::TimeWindowDetector;
