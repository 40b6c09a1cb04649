#![deny(unsafe_code)]
//! # autotune-validator
//!
//! Decides whether an executed strategy earned its keep.
//!
//! Two checks exist. [`ImpactValidator::validate_impact`] compares realized
//! against projected improvement after one window. [`ImpactValidator::monitor`]
//! samples metrics across a window and checks the average of every target
//! metric against the strategy's expected improvement. In-flight windows are
//! visible through the [`ValidationRegistry`].

pub mod error;
pub mod impact;
pub mod registry;
pub mod settings;
pub mod validator;

pub use error::{ValidatorError, ValidatorResult};
pub use impact::{
    calculate_strategy_impact, confidence_multiplier, historical_success_rate, load_factor,
    pattern_strength, projected_impact, realized_impact, significance, ImpactMetric,
    StrategyImpact,
};
pub use registry::{ValidationContext, ValidationGuard, ValidationPhase, ValidationRegistry};
pub use settings::ValidationSettings;
pub use validator::{
    expected_value, within_tolerance, ImpactReport, ImpactValidator, MetricCheck, MonitorOutcome,
};
