#![deny(unsafe_code)]
//! # autotune-engine
//!
//! Wires detection, strategy generation, execution and validation into the
//! autonomous learning loop.
//!
//! - [`LearningOrchestrator`] runs batches and periodic learning cycles.
//! - [`StreamConsumer`] feeds it from the event stream.
//! - [`StateTracker`] owns the engine state and the operations in flight.
//! - [`EngineConfig`] is loaded from defaults, a file and the environment.

pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod state;

pub use config::{
    CycleSettings, EngineConfig, EngineSettings, LoggingConfig, StreamSettings, ENV_PREFIX,
};
pub use consumer::{StreamConsumer, DERIVED_TAG};
pub use error::{EngineError, EngineResult};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
pub use orchestrator::{
    AppliedStrategies, BatchOutcome, LearningCycleReport, LearningOrchestrator, StrategyFailure,
    ValidationOutcome,
};
pub use state::StateTracker;
