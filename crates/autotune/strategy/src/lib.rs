#![deny(unsafe_code)]
//! # autotune-strategy
//!
//! Maps detected patterns to typed optimization strategies and decides which
//! of them may run without an operator.
//!
//! Generation is a pure function of the pattern. Pattern types without a rule
//! produce nothing.

pub mod gate;
pub mod generator;

pub use gate::AutonomyGate;
pub use generator::{GeneratorRules, StrategyGenerator};
