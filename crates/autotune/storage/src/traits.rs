use crate::model::{ConfigEntry, EventQuery};
use crate::StorageResult;
use async_trait::async_trait;
use autotune_types::{
    EngineLearningResult, EngineOperation, EngineState, EventId, EventStatus, LearningEvent,
    LearningResultId, OperationId, PerformanceAnnotation, PerformanceBlock,
};
use serde_json::Value;

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

/// Storage interface for engine state snapshots.
#[async_trait]
pub trait EngineStateStore: Send + Sync {
    /// Insert or replace the snapshot with the same id.
    async fn save_state(&self, state: EngineState) -> StorageResult<()>;

    /// The most recently active snapshot, if any was ever saved.
    async fn current_state(&self) -> StorageResult<Option<EngineState>>;
}

/// Storage interface for tracked operations.
#[async_trait]
pub trait OperationStore: Send + Sync {
    async fn create_operation(&self, operation: EngineOperation) -> StorageResult<()>;

    /// Replace an existing operation. Terminal records are frozen.
    async fn update_operation(&self, operation: EngineOperation) -> StorageResult<()>;

    async fn get_operation(&self, id: &OperationId) -> StorageResult<Option<EngineOperation>>;

    /// List operations newest-first.
    async fn list_operations(&self, window: QueryWindow) -> StorageResult<Vec<EngineOperation>>;
}

/// Storage interface for learning-cycle records.
#[async_trait]
pub trait LearningResultStore: Send + Sync {
    async fn create_result(&self, result: EngineLearningResult) -> StorageResult<()>;

    async fn get_result(&self, id: &LearningResultId)
        -> StorageResult<Option<EngineLearningResult>>;

    async fn update_result(&self, result: EngineLearningResult) -> StorageResult<()>;

    async fn append_annotation(
        &self,
        id: &LearningResultId,
        annotation: PerformanceAnnotation,
    ) -> StorageResult<()>;

    /// Set how many of the result's strategies were executed, leaving the
    /// other fields alone.
    async fn set_executed_count(&self, id: &LearningResultId, executed: usize)
        -> StorageResult<()>;

    async fn set_performance(
        &self,
        id: &LearningResultId,
        performance: PerformanceBlock,
    ) -> StorageResult<()>;

    /// List results newest-first.
    async fn list_results(&self, window: QueryWindow)
        -> StorageResult<Vec<EngineLearningResult>>;
}

/// Storage interface for ingested learning events.
#[async_trait]
pub trait LearningEventStore: Send + Sync {
    async fn append_event(&self, event: LearningEvent) -> StorageResult<()>;

    async fn get_event(&self, id: &EventId) -> StorageResult<Option<LearningEvent>>;

    /// Move an event from `expected_from` to `to`, failing on a stale view or
    /// an illegal transition.
    async fn transition_event(
        &self,
        id: &EventId,
        expected_from: EventStatus,
        to: EventStatus,
    ) -> StorageResult<()>;

    async fn query_events(&self, query: EventQuery) -> StorageResult<Vec<LearningEvent>>;
}

/// Versioned flat configuration table: weights, cache rules, query-transform
/// rules and index settings.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn active_config(&self, key: &str) -> StorageResult<Option<ConfigEntry>>;

    /// All versions of `key`, oldest first.
    async fn config_versions(&self, key: &str) -> StorageResult<Vec<ConfigEntry>>;

    /// Deactivate the current version of `key` and store `value` as the new
    /// active one.
    ///
    /// With `expected_version = Some(v)` the write only happens while `v` is
    /// the active version; otherwise it fails with
    /// [`StorageError::Conflict`](crate::StorageError::Conflict).
    async fn activate_config(
        &self,
        key: &str,
        value: Value,
        expected_version: Option<u64>,
    ) -> StorageResult<ConfigEntry>;

    /// Deactivate the active version of `key`, returning it.
    async fn deactivate_config(&self, key: &str) -> StorageResult<Option<ConfigEntry>>;
}

/// Unified storage bundle used by the engine.
pub trait AutotuneStorage:
    EngineStateStore + OperationStore + LearningResultStore + LearningEventStore + ConfigStore + Send + Sync
{
}

impl<T> AutotuneStorage for T where
    T: EngineStateStore
        + OperationStore
        + LearningResultStore
        + LearningEventStore
        + ConfigStore
        + Send
        + Sync
{
}
