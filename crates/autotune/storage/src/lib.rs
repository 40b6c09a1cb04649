//! Autotune storage abstractions.
//!
//! This crate defines the persistence contract of the learning engine:
//! - engine state snapshots (most-recently-active is current)
//! - tracked operations
//! - learning-cycle results and their performance annotations
//! - ingested learning events with checked status transitions
//! - a versioned configuration table for the tuned search settings
//!
//! Only the in-memory reference adapter ships here. Durable backends implement
//! the same traits.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryAutotuneStorage;
pub use model::{ConfigEntry, EventQuery};
pub use traits::{
    AutotuneStorage, ConfigStore, EngineStateStore, LearningEventStore, LearningResultStore,
    OperationStore, QueryWindow,
};
