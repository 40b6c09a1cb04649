//! In-memory reference implementation for autotune storage traits.
//!
//! This adapter is deterministic and test-friendly. Every write takes the
//! relevant map's write lock for its whole read-check-write, so conditional
//! writes are atomic with respect to each other.

use crate::model::{ConfigEntry, EventQuery};
use crate::traits::{
    ConfigStore, EngineStateStore, LearningEventStore, LearningResultStore, OperationStore,
    QueryWindow,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use autotune_types::{
    EngineLearningResult, EngineOperation, EngineState, EngineStateId, EventId, EventStatus,
    LearningEvent, LearningResultId, OperationId, PerformanceAnnotation, PerformanceBlock,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory autotune storage adapter.
#[derive(Default)]
pub struct InMemoryAutotuneStorage {
    states: RwLock<HashMap<EngineStateId, EngineState>>,
    operations: RwLock<HashMap<OperationId, EngineOperation>>,
    results: RwLock<HashMap<LearningResultId, EngineLearningResult>>,
    events: RwLock<HashMap<EventId, LearningEvent>>,
    configs: RwLock<HashMap<String, Vec<ConfigEntry>>>,
}

impl InMemoryAutotuneStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify_result(
        &self,
        id: &LearningResultId,
        f: impl FnOnce(&mut EngineLearningResult),
    ) -> StorageResult<()> {
        let mut guard = self.results.write().map_err(|_| poisoned("result"))?;
        let record = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("learning result {id} not found")))?;
        f(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

fn poisoned(what: &str) -> StorageError {
    StorageError::Backend(format!("{what} lock poisoned"))
}

#[async_trait]
impl EngineStateStore for InMemoryAutotuneStorage {
    async fn save_state(&self, state: EngineState) -> StorageResult<()> {
        let mut guard = self.states.write().map_err(|_| poisoned("state"))?;
        guard.insert(state.id.clone(), state);
        Ok(())
    }

    async fn current_state(&self) -> StorageResult<Option<EngineState>> {
        let guard = self.states.read().map_err(|_| poisoned("state"))?;
        Ok(guard.values().max_by_key(|s| s.last_active).cloned())
    }
}

#[async_trait]
impl OperationStore for InMemoryAutotuneStorage {
    async fn create_operation(&self, operation: EngineOperation) -> StorageResult<()> {
        let mut guard = self.operations.write().map_err(|_| poisoned("operation"))?;
        if guard.contains_key(&operation.id) {
            return Err(StorageError::Conflict(format!(
                "operation {} already exists",
                operation.id
            )));
        }
        guard.insert(operation.id.clone(), operation);
        Ok(())
    }

    async fn update_operation(&self, operation: EngineOperation) -> StorageResult<()> {
        let mut guard = self.operations.write().map_err(|_| poisoned("operation"))?;
        let existing = guard
            .get(&operation.id)
            .ok_or_else(|| StorageError::NotFound(format!("operation {} not found", operation.id)))?;
        if existing.status.is_terminal() && existing != &operation {
            return Err(StorageError::InvariantViolation(format!(
                "operation {} is {} and cannot change",
                operation.id, existing.status
            )));
        }
        guard.insert(operation.id.clone(), operation);
        Ok(())
    }

    async fn get_operation(&self, id: &OperationId) -> StorageResult<Option<EngineOperation>> {
        let guard = self.operations.read().map_err(|_| poisoned("operation"))?;
        Ok(guard.get(id).cloned())
    }

    async fn list_operations(&self, window: QueryWindow) -> StorageResult<Vec<EngineOperation>> {
        let guard = self.operations.read().map_err(|_| poisoned("operation"))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl LearningResultStore for InMemoryAutotuneStorage {
    async fn create_result(&self, result: EngineLearningResult) -> StorageResult<()> {
        let mut guard = self.results.write().map_err(|_| poisoned("result"))?;
        if guard.contains_key(&result.id) {
            return Err(StorageError::Conflict(format!(
                "learning result {} already exists",
                result.id
            )));
        }
        guard.insert(result.id.clone(), result);
        Ok(())
    }

    async fn get_result(
        &self,
        id: &LearningResultId,
    ) -> StorageResult<Option<EngineLearningResult>> {
        let guard = self.results.read().map_err(|_| poisoned("result"))?;
        Ok(guard.get(id).cloned())
    }

    async fn update_result(&self, result: EngineLearningResult) -> StorageResult<()> {
        let mut guard = self.results.write().map_err(|_| poisoned("result"))?;
        if !guard.contains_key(&result.id) {
            return Err(StorageError::NotFound(format!(
                "learning result {} not found",
                result.id
            )));
        }
        guard.insert(result.id.clone(), result);
        Ok(())
    }

    async fn append_annotation(
        &self,
        id: &LearningResultId,
        annotation: PerformanceAnnotation,
    ) -> StorageResult<()> {
        self.modify_result(id, |record| record.annotations.push(annotation))
    }

    async fn set_executed_count(
        &self,
        id: &LearningResultId,
        executed: usize,
    ) -> StorageResult<()> {
        self.modify_result(id, |record| record.executed_count = executed)
    }

    async fn set_performance(
        &self,
        id: &LearningResultId,
        performance: PerformanceBlock,
    ) -> StorageResult<()> {
        self.modify_result(id, |record| record.performance = Some(performance))
    }

    async fn list_results(
        &self,
        window: QueryWindow,
    ) -> StorageResult<Vec<EngineLearningResult>> {
        let guard = self.results.read().map_err(|_| poisoned("result"))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl LearningEventStore for InMemoryAutotuneStorage {
    async fn append_event(&self, event: LearningEvent) -> StorageResult<()> {
        let mut guard = self.events.write().map_err(|_| poisoned("event"))?;
        if guard.contains_key(&event.id) {
            return Err(StorageError::Conflict(format!("event {} already exists", event.id)));
        }
        guard.insert(event.id.clone(), event);
        Ok(())
    }

    async fn get_event(&self, id: &EventId) -> StorageResult<Option<LearningEvent>> {
        let guard = self.events.read().map_err(|_| poisoned("event"))?;
        Ok(guard.get(id).cloned())
    }

    async fn transition_event(
        &self,
        id: &EventId,
        expected_from: EventStatus,
        to: EventStatus,
    ) -> StorageResult<()> {
        let mut guard = self.events.write().map_err(|_| poisoned("event"))?;
        let event = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("event {id} not found")))?;
        if event.status != expected_from {
            return Err(StorageError::Conflict(format!(
                "event {id}: expected {expected_from}, found {}",
                event.status
            )));
        }
        event
            .transition(to)
            .map_err(|e| StorageError::InvariantViolation(e.to_string()))
    }

    async fn query_events(&self, query: EventQuery) -> StorageResult<Vec<LearningEvent>> {
        let guard = self.events.read().map_err(|_| poisoned("event"))?;
        let mut values = guard
            .values()
            .filter(|e| query.status.map_or(true, |s| e.status == s))
            .filter(|e| query.since.map_or(true, |t| e.timestamp >= t))
            .filter(|e| query.until.map_or(true, |t| e.timestamp <= t))
            .filter(|e| {
                query
                    .correlation_id
                    .as_deref()
                    .map_or(true, |c| e.correlation_id.as_deref() == Some(c))
            })
            .filter(|e| {
                query
                    .session_id
                    .as_deref()
                    .map_or(true, |s| e.session_id.as_deref() == Some(s))
            })
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(apply_window(values, QueryWindow::first(query.limit)))
    }
}

#[async_trait]
impl ConfigStore for InMemoryAutotuneStorage {
    async fn active_config(&self, key: &str) -> StorageResult<Option<ConfigEntry>> {
        let guard = self.configs.read().map_err(|_| poisoned("config"))?;
        Ok(guard
            .get(key)
            .and_then(|versions| versions.iter().find(|v| v.active))
            .cloned())
    }

    async fn config_versions(&self, key: &str) -> StorageResult<Vec<ConfigEntry>> {
        let guard = self.configs.read().map_err(|_| poisoned("config"))?;
        Ok(guard.get(key).cloned().unwrap_or_default())
    }

    async fn activate_config(
        &self,
        key: &str,
        value: Value,
        expected_version: Option<u64>,
    ) -> StorageResult<ConfigEntry> {
        if key.is_empty() {
            return Err(StorageError::InvalidInput("config key must not be empty".to_string()));
        }
        let mut guard = self.configs.write().map_err(|_| poisoned("config"))?;
        let versions = guard.entry(key.to_string()).or_default();
        let active_version = versions.iter().find(|v| v.active).map(|v| v.version);

        if let Some(expected) = expected_version {
            if active_version != Some(expected) {
                return Err(StorageError::Conflict(format!(
                    "{key}: expected active v{expected}, found {}",
                    active_version.map_or_else(|| "none".to_string(), |v| format!("v{v}"))
                )));
            }
        }

        let now = Utc::now();
        for entry in versions.iter_mut().filter(|v| v.active) {
            entry.active = false;
            entry.updated_at = now;
        }
        let entry = ConfigEntry {
            key: key.to_string(),
            version: versions.last().map_or(1, |v| v.version + 1),
            value,
            active: true,
            created_at: now,
            updated_at: now,
        };
        versions.push(entry.clone());
        Ok(entry)
    }

    async fn deactivate_config(&self, key: &str) -> StorageResult<Option<ConfigEntry>> {
        let mut guard = self.configs.write().map_err(|_| poisoned("config"))?;
        let Some(versions) = guard.get_mut(key) else {
            return Ok(None);
        };
        let Some(entry) = versions.iter_mut().find(|v| v.active) else {
            return Ok(None);
        };
        entry.active = false;
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
