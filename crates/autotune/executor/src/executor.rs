//! Strategy execution and type-symmetric rollback.
//!
//! Weight adjustments version the `search_weights` key: each execution writes
//! a new active version carrying the weights it replaced, and rollback writes
//! those weights back as another new version. Rule-style strategies upsert a
//! key scoped to their search pattern and rollback deactivates it.

use crate::error::{ExecutorError, ExecutorResult, WeightsPhase};
use crate::locks::ResourceLocks;
use crate::weights::{SearchWeights, WeightsRecord};
use autotune_storage::{AutotuneStorage, ConfigEntry, StorageError};
use autotune_types::{
    AnnotationKind, OptimizationStrategy, PerformanceAnnotation, RiskTolerance, StrategyAction,
    StrategyId, StrategyKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const WEIGHTS_KEY: &str = "search_weights";
pub const DEFAULT_PATTERN: &str = "*";

/// Configuration key a strategy writes to.
pub fn config_key(strategy: &OptimizationStrategy) -> String {
    let pattern = strategy
        .metadata
        .search_pattern
        .as_deref()
        .unwrap_or(DEFAULT_PATTERN);
    match strategy.kind() {
        StrategyKind::WeightAdjustment => WEIGHTS_KEY.to_string(),
        StrategyKind::CacheStrategy => format!("cache_rules:{pattern}"),
        StrategyKind::QueryTransformation => format!("query_transform_rules:{pattern}"),
        StrategyKind::IndexOptimization => format!("index_settings:{pattern}"),
        StrategyKind::FeedbackLoop => format!("feedback_loop_rules:{pattern}"),
    }
}

/// Stored value of a rule-style configuration key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub action: StrategyAction,
    pub strategy_id: StrategyId,
}

/// What an execution wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub strategy_id: StrategyId,
    pub key: String,
    pub version: u64,
    pub replaced_version: Option<u64>,
}

/// What a rollback changed. `version` is `None` when there was nothing to undo.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackRecord {
    pub strategy_id: StrategyId,
    pub key: String,
    pub version: Option<u64>,
}

pub struct StrategyExecutor {
    storage: Arc<dyn AutotuneStorage>,
    locks: ResourceLocks,
}

impl StrategyExecutor {
    pub fn new(storage: Arc<dyn AutotuneStorage>) -> Self {
        Self {
            storage,
            locks: ResourceLocks::new(),
        }
    }

    /// Tolerance of the current engine state, LOW when none was saved yet.
    pub async fn risk_tolerance(&self) -> ExecutorResult<RiskTolerance> {
        Ok(self
            .storage
            .current_state()
            .await?
            .map(|s| s.risk_tolerance())
            .unwrap_or_default())
    }

    /// Install `weights` as the active weight configuration.
    pub async fn seed_weights(&self, weights: SearchWeights) -> ExecutorResult<ConfigEntry> {
        let _guard = self.locks.acquire(WEIGHTS_KEY).await;
        let value = to_value(WEIGHTS_KEY, &WeightsRecord::seed(weights))?;
        Ok(self.storage.activate_config(WEIGHTS_KEY, value, None).await?)
    }

    pub async fn active_weights(&self) -> ExecutorResult<Option<SearchWeights>> {
        match self.storage.active_config(WEIGHTS_KEY).await? {
            Some(entry) => Ok(Some(weights_record(&entry)?.weights)),
            None => Ok(None),
        }
    }

    pub async fn execute(&self, strategy: &OptimizationStrategy) -> ExecutorResult<ExecutionRecord> {
        let tolerance = self.risk_tolerance().await?;
        if !tolerance.permits(strategy.risk_level()) {
            tracing::warn!(
                strategy_id = %strategy.id,
                risk = %strategy.risk_level(),
                tolerance = %tolerance,
                "strategy rejected by risk tolerance"
            );
            return Err(ExecutorError::RiskRejected {
                strategy: strategy.id.clone(),
                risk: strategy.risk_level(),
                tolerance,
            });
        }

        let result_id = match &strategy.learning_result_id {
            Some(id) if self.storage.get_result(id).await?.is_some() => id.clone(),
            _ => return Err(ExecutorError::OrphanStrategy(strategy.id.clone())),
        };

        let record = match &strategy.action {
            StrategyAction::WeightAdjustment {
                title_factor,
                tag_factor,
            } => self.adjust_weights(strategy, *title_factor, *tag_factor).await?,
            _ => self.upsert_rules(strategy).await?,
        };

        self.storage
            .append_annotation(
                &result_id,
                PerformanceAnnotation::new(AnnotationKind::StrategyExecuted, strategy.id.clone())
                    .with_detail(format!("{} v{}", record.key, record.version)),
            )
            .await?;

        tracing::info!(
            strategy_id = %strategy.id,
            kind = %strategy.kind(),
            key = %record.key,
            version = record.version,
            "strategy executed"
        );
        Ok(record)
    }

    pub async fn rollback(&self, strategy: &OptimizationStrategy) -> ExecutorResult<RollbackRecord> {
        let record = match strategy.kind() {
            StrategyKind::WeightAdjustment => self.restore_weights(strategy).await?,
            _ => self.remove_rules(strategy).await?,
        };

        if let Some(result_id) = &strategy.learning_result_id {
            let annotation =
                PerformanceAnnotation::new(AnnotationKind::StrategyRolledBack, strategy.id.clone());
            if let Err(e) = self.storage.append_annotation(result_id, annotation).await {
                tracing::warn!(strategy_id = %strategy.id, error = %e, "rollback annotation not recorded");
            }
        }

        tracing::warn!(
            strategy_id = %strategy.id,
            kind = %strategy.kind(),
            key = %record.key,
            "strategy rolled back"
        );
        Ok(record)
    }

    async fn adjust_weights(
        &self,
        strategy: &OptimizationStrategy,
        title_factor: f64,
        tag_factor: f64,
    ) -> ExecutorResult<ExecutionRecord> {
        let _guard = self.locks.acquire(WEIGHTS_KEY).await;
        let active = self
            .storage
            .active_config(WEIGHTS_KEY)
            .await?
            .ok_or(ExecutorError::NoActiveWeights(WeightsPhase::Execute))?;
        let current = weights_record(&active)?.weights;
        let next = WeightsRecord::applied(
            current.scaled(title_factor, tag_factor),
            current,
            strategy.id.clone(),
        );

        let entry = self
            .storage
            .activate_config(WEIGHTS_KEY, to_value(WEIGHTS_KEY, &next)?, Some(active.version))
            .await?;
        Ok(ExecutionRecord {
            strategy_id: strategy.id.clone(),
            key: WEIGHTS_KEY.to_string(),
            version: entry.version,
            replaced_version: Some(active.version),
        })
    }

    async fn upsert_rules(&self, strategy: &OptimizationStrategy) -> ExecutorResult<ExecutionRecord> {
        let key = config_key(strategy);
        let _guard = self.locks.acquire(&key).await;
        let replaced = self.storage.active_config(&key).await?.map(|e| e.version);
        let value = to_value(
            &key,
            &RuleRecord {
                action: strategy.action.clone(),
                strategy_id: strategy.id.clone(),
            },
        )?;
        let entry = self.storage.activate_config(&key, value, replaced).await?;
        Ok(ExecutionRecord {
            strategy_id: strategy.id.clone(),
            key,
            version: entry.version,
            replaced_version: replaced,
        })
    }

    async fn restore_weights(&self, strategy: &OptimizationStrategy) -> ExecutorResult<RollbackRecord> {
        let _guard = self.locks.acquire(WEIGHTS_KEY).await;
        let active = self
            .storage
            .active_config(WEIGHTS_KEY)
            .await?
            .ok_or(ExecutorError::NoActiveWeights(WeightsPhase::Rollback))?;
        let active_record = weights_record(&active)?;
        if active_record.rolled_back.as_ref() == Some(&strategy.id) {
            tracing::debug!(strategy_id = %strategy.id, "weights already rolled back");
            return Ok(RollbackRecord {
                strategy_id: strategy.id.clone(),
                key: WEIGHTS_KEY.to_string(),
                version: None,
            });
        }

        let versions = self.storage.config_versions(WEIGHTS_KEY).await?;
        let mut created = None;
        for entry in versions.iter().rev() {
            let record = weights_record(entry)?;
            if record.strategy_id.as_ref() == Some(&strategy.id) {
                created = Some((entry.version, record));
                break;
            }
        }
        let (created_version, record) =
            created.ok_or(ExecutorError::NoActiveWeights(WeightsPhase::Rollback))?;
        let previous = record
            .previous
            .ok_or(ExecutorError::NoActiveWeights(WeightsPhase::Rollback))?;

        if active.version != created_version {
            // Restoring over a newer version drops that version's change.
            tracing::warn!(
                strategy_id = %strategy.id,
                created_version,
                active_version = active.version,
                "newer weights are active; restoring this strategy's snapshot anyway"
            );
        }

        let restored = WeightsRecord::restored(previous, strategy.id.clone());
        let entry = self
            .storage
            .activate_config(
                WEIGHTS_KEY,
                to_value(WEIGHTS_KEY, &restored)?,
                Some(active.version),
            )
            .await?;
        Ok(RollbackRecord {
            strategy_id: strategy.id.clone(),
            key: WEIGHTS_KEY.to_string(),
            version: Some(entry.version),
        })
    }

    async fn remove_rules(&self, strategy: &OptimizationStrategy) -> ExecutorResult<RollbackRecord> {
        let key = config_key(strategy);
        let _guard = self.locks.acquire(&key).await;
        if let Some(active) = self.storage.active_config(&key).await? {
            match serde_json::from_value::<RuleRecord>(active.value) {
                Ok(rule) if rule.strategy_id != strategy.id => {
                    // Removal takes the newer strategy's rules with it.
                    tracing::warn!(
                        strategy_id = %strategy.id,
                        active_strategy_id = %rule.strategy_id,
                        key = %key,
                        version = active.version,
                        "newer rules are active; removing them anyway"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "active rules carry no strategy id");
                }
            }
        }
        let removed = self.storage.deactivate_config(&key).await?;
        if removed.is_none() {
            tracing::debug!(strategy_id = %strategy.id, key = %key, "no active rules to remove");
        }
        Ok(RollbackRecord {
            strategy_id: strategy.id.clone(),
            key,
            version: removed.map(|e| e.version),
        })
    }
}

fn weights_record(entry: &ConfigEntry) -> ExecutorResult<WeightsRecord> {
    serde_json::from_value(entry.value.clone()).map_err(|e| ExecutorError::InvalidConfig {
        key: entry.key.clone(),
        reason: e.to_string(),
    })
}

fn to_value<T: Serialize>(key: &str, value: &T) -> ExecutorResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| ExecutorError::Storage(StorageError::Serialization(format!("{key}: {e}"))))
}
