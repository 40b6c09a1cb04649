#![deny(unsafe_code)]
//! # autotune-executor
//!
//! Applies optimization strategies to the versioned configuration table and
//! undoes them. Execution is gated by the engine's risk tolerance and every
//! read-modify-write of a configuration key runs under a per-key lock.

pub mod error;
pub mod executor;
pub mod locks;
pub mod weights;

pub use error::{ExecutorError, ExecutorResult, WeightsPhase};
pub use executor::{
    config_key, ExecutionRecord, RollbackRecord, RuleRecord, StrategyExecutor, DEFAULT_PATTERN,
    WEIGHTS_KEY,
};
pub use locks::ResourceLocks;
pub use weights::{SearchWeights, WeightsRecord};
