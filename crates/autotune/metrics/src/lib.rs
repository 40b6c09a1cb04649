#![deny(unsafe_code)]
//! # autotune-metrics
//!
//! Boundary to the metrics backend of the tuned search service. The engine
//! only ever reads five figures and writes named observations, so the
//! contract stays that small.

pub mod error;
pub mod provider;
pub mod sampler;
pub mod simulated;

pub use error::{MetricsError, MetricsResult};
pub use provider::{MetricRecord, MetricsProvider};
pub use sampler::SampledRecorder;
pub use simulated::SimulatedMetrics;
