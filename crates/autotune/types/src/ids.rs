//! Strongly-typed identifiers for autotune records.
//!
//! Event ids come from upstream producers and may be any string, so every id
//! wraps a `String`; locally generated ids are UUID v4.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a [`LearningEvent`](crate::LearningEvent).
    EventId,
    "event"
);
string_id!(
    /// Identifier of a [`LearningPattern`](crate::LearningPattern).
    PatternId,
    "pattern"
);
string_id!(
    /// Identifier of an [`OptimizationStrategy`](crate::OptimizationStrategy).
    StrategyId,
    "strategy"
);
string_id!(
    /// Identifier of an [`EngineOperation`](crate::EngineOperation).
    OperationId,
    "op"
);
string_id!(
    /// Identifier of an [`EngineLearningResult`](crate::EngineLearningResult).
    LearningResultId,
    "result"
);
string_id!(
    /// Identifier of an [`EngineState`](crate::EngineState) row.
    EngineStateId,
    "engine"
);
