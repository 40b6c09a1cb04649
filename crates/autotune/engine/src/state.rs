use crate::error::{EngineError, EngineResult};
use autotune_storage::AutotuneStorage;
use autotune_types::{
    EngineOperation, EngineState, EngineStatus, OperationId, OperationType, RiskTolerance,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Owns the current [`EngineState`] snapshot and the operations in flight.
///
/// Every transition builds a new snapshot, persists it, then swaps it in.
/// Transitions are serialized so two tasks never persist from the same base.
pub struct StateTracker {
    storage: Arc<dyn AutotuneStorage>,
    current: RwLock<EngineState>,
    in_flight: Mutex<HashMap<OperationId, OperationType>>,
    transitions: tokio::sync::Mutex<()>,
}

impl StateTracker {
    /// Resume from the persisted state, or start a fresh READY engine.
    ///
    /// A state left mid-phase by a previous process is brought back to READY
    /// since nothing is in flight any more.
    pub async fn load(
        storage: Arc<dyn AutotuneStorage>,
        default_tolerance: RiskTolerance,
    ) -> EngineResult<Self> {
        let state = match storage.current_state().await? {
            Some(state) => match state.status {
                EngineStatus::Initializing | EngineStatus::Learning | EngineStatus::Optimizing => {
                    let ready = state.with_status(EngineStatus::Ready, None)?;
                    storage.save_state(ready.clone()).await?;
                    ready
                }
                _ => state,
            },
            None => {
                let ready = EngineState::initializing(default_tolerance)
                    .with_status(EngineStatus::Ready, None)?;
                storage.save_state(ready.clone()).await?;
                ready
            }
        };
        tracing::info!(status = %state.status, tolerance = %state.risk_tolerance(), "engine state loaded");
        Ok(Self {
            storage,
            current: RwLock::new(state),
            in_flight: Mutex::new(HashMap::new()),
            transitions: tokio::sync::Mutex::new(()),
        })
    }

    pub fn state(&self) -> EngineState {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn status(&self) -> EngineStatus {
        self.state().status
    }

    pub fn is_paused(&self) -> bool {
        self.status() == EngineStatus::Paused
    }

    pub fn in_flight(&self) -> usize {
        self.operations().len()
    }

    fn operations(&self) -> MutexGuard<'_, HashMap<OperationId, OperationType>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `f` to the current snapshot, persist the result and swap it in.
    async fn transition<F>(&self, f: F) -> EngineResult<EngineState>
    where
        F: FnOnce(&EngineState) -> EngineResult<Option<EngineState>>,
    {
        let _serial = self.transitions.lock().await;
        let current = self.state();
        let Some(next) = f(&current)? else {
            return Ok(current);
        };
        self.storage.save_state(next.clone()).await?;
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next.clone();
        if current.status != next.status {
            tracing::debug!(from = %current.status, to = %next.status, "engine status changed");
        }
        Ok(next)
    }

    /// Create, start and persist an operation. The engine enters the status
    /// of the operation's phase unless it is paused.
    pub async fn start_operation(&self, op_type: OperationType) -> EngineResult<EngineOperation> {
        let mut operation = EngineOperation::new(op_type);
        operation.start()?;
        self.storage.create_operation(operation.clone()).await?;
        self.operations().insert(operation.id.clone(), op_type);

        let phase_status = EngineStatus::for_phase(op_type);
        self.transition(|state| {
            if state.status == EngineStatus::Paused || state.status == phase_status {
                return Ok(None);
            }
            Ok(Some(state.with_status(phase_status, Some(op_type))?))
        })
        .await?;
        Ok(operation)
    }

    pub async fn complete_operation(
        &self,
        operation: &mut EngineOperation,
        metrics: BTreeMap<String, f64>,
    ) -> EngineResult<()> {
        operation.complete(metrics)?;
        self.finish(operation).await?;
        self.settle().await
    }

    /// Record the failure and move the engine to ERROR.
    pub async fn fail_operation(
        &self,
        operation: &mut EngineOperation,
        error: impl Into<String>,
    ) -> EngineResult<()> {
        operation.fail(error)?;
        self.finish(operation).await?;
        self.transition(|state| {
            if state.status == EngineStatus::Error {
                return Ok(None);
            }
            Ok(Some(state.with_status(EngineStatus::Error, None)?))
        })
        .await?;
        Ok(())
    }

    pub async fn cancel_operation(&self, operation: &mut EngineOperation) -> EngineResult<()> {
        operation.cancel()?;
        self.finish(operation).await?;
        self.settle().await
    }

    async fn finish(&self, operation: &EngineOperation) -> EngineResult<()> {
        self.storage.update_operation(operation.clone()).await?;
        if self.operations().remove(&operation.id).is_none() {
            return Err(EngineError::UnknownOperation(operation.id.to_string()));
        }
        Ok(())
    }

    /// Back to READY once the last operation of an active phase ends.
    async fn settle(&self) -> EngineResult<()> {
        if self.in_flight() > 0 {
            return Ok(());
        }
        self.transition(|state| match state.status {
            EngineStatus::Learning | EngineStatus::Optimizing => {
                Ok(Some(state.with_status(EngineStatus::Ready, None)?))
            }
            _ => Ok(None),
        })
        .await?;
        Ok(())
    }

    pub async fn pause(&self) -> EngineResult<EngineState> {
        let state = self
            .transition(|state| Ok(Some(state.with_status(EngineStatus::Paused, None)?)))
            .await?;
        tracing::info!("engine paused");
        Ok(state)
    }

    /// Leave PAUSED. A no-op for an engine that is not paused.
    pub async fn resume(&self) -> EngineResult<EngineState> {
        self.transition(|state| {
            if state.status != EngineStatus::Paused {
                return Ok(None);
            }
            tracing::info!("engine resumed");
            Ok(Some(state.with_status(EngineStatus::Ready, None)?))
        })
        .await
    }

    pub async fn set_risk_tolerance(&self, tolerance: RiskTolerance) -> EngineResult<EngineState> {
        self.transition(|state| Ok(Some(state.with_risk_tolerance(tolerance))))
            .await
    }

    pub async fn set_confidence(&self, confidence: f64) -> EngineResult<EngineState> {
        self.transition(|state| Ok(Some(state.with_confidence(confidence))))
            .await
    }
}
