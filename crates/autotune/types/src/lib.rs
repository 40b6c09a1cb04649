#![deny(unsafe_code)]
//! # autotune-types
//!
//! Shared data model for the autotune closed-loop search optimizer.
//!
//! The loop moves one direction per cycle:
//! events -> patterns -> strategies -> execution -> validation -> keep | rollback.
//! Every record that crosses a crate boundary lives here so detectors,
//! generator, executor and validator agree on one vocabulary.

pub mod error;
pub mod event;
pub mod ids;
pub mod metrics;
pub mod operation;
pub mod pattern;
pub mod result;
pub mod state;
pub mod strategy;

pub use error::TypesError;
pub use event::{EventPriority, EventStatus, LearningEvent, LearningEventType, MetadataMap};
pub use ids::{EngineStateId, EventId, LearningResultId, OperationId, PatternId, StrategyId};
pub use metrics::{MetricKind, PerformanceMetrics};
pub use operation::{EngineOperation, OperationStatus, OperationType};
pub use pattern::{pattern_types, LearningPattern, PatternMetadata, PatternMetrics};
pub use result::{AnnotationKind, EngineLearningResult, PerformanceAnnotation, PerformanceBlock};
pub use state::{EngineState, EngineStateMetadata, EngineStatus, RiskTolerance};
pub use strategy::{
    OptimizationStrategy, RiskLevel, StrategyAction, StrategyKind, StrategyMetadata,
};

/// Clamp a score into `[0.0, 1.0]`, mapping NaN to `0.0`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
