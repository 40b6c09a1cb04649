use crate::impact::ImpactMetric;
use autotune_types::{PerformanceMetrics, StrategyId, StrategyKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPhase {
    Impact,
    Monitor,
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Impact => f.write_str("impact"),
            Self::Monitor => f.write_str("monitor"),
        }
    }
}

/// One in-flight validation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    pub strategy_id: StrategyId,
    pub kind: StrategyKind,
    pub phase: ValidationPhase,
    pub started_at: DateTime<Utc>,
    /// Set once the first snapshot of the window is taken.
    pub baseline: Option<PerformanceMetrics>,
    #[serde(default)]
    pub projected: BTreeMap<ImpactMetric, Option<f64>>,
    /// Searches attributed to the strategy while the window is open.
    #[serde(default)]
    pub sampled_queries: BTreeSet<String>,
}

impl ValidationContext {
    pub fn new(strategy_id: StrategyId, kind: StrategyKind, phase: ValidationPhase) -> Self {
        Self {
            strategy_id,
            kind,
            phase,
            started_at: Utc::now(),
            baseline: None,
            projected: BTreeMap::new(),
            sampled_queries: BTreeSet::new(),
        }
    }

    pub fn with_baseline(mut self, baseline: PerformanceMetrics) -> Self {
        self.baseline = Some(baseline);
        self
    }
}

/// Observability map of validations in progress, keyed by strategy id.
///
/// Entries are only ever removed by dropping the [`ValidationGuard`] returned
/// from [`begin`](Self::begin). It does not serialize anything.
#[derive(Debug, Default)]
pub struct ValidationRegistry {
    active: Mutex<HashMap<StrategyId, ValidationContext>>,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<StrategyId, ValidationContext>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn begin(self: &Arc<Self>, context: ValidationContext) -> ValidationGuard {
        let strategy_id = context.strategy_id.clone();
        if self.entries().insert(strategy_id.clone(), context).is_some() {
            tracing::debug!(strategy_id = %strategy_id, "validation restarted for strategy");
        }
        ValidationGuard {
            registry: Arc::clone(self),
            strategy_id,
        }
    }

    pub fn contains(&self, strategy_id: &StrategyId) -> bool {
        self.entries().contains_key(strategy_id)
    }

    pub fn get(&self, strategy_id: &StrategyId) -> Option<ValidationContext> {
        self.entries().get(strategy_id).cloned()
    }

    /// Snapshot of the in-flight validations, oldest first.
    pub fn in_flight(&self) -> Vec<ValidationContext> {
        let mut contexts: Vec<_> = self.entries().values().cloned().collect();
        contexts.sort_by_key(|c| c.started_at);
        contexts
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its strategy from the registry when dropped.
#[must_use = "the validation is unregistered as soon as the guard is dropped"]
pub struct ValidationGuard {
    registry: Arc<ValidationRegistry>,
    strategy_id: StrategyId,
}

impl ValidationGuard {
    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    fn update(&self, f: impl FnOnce(&mut ValidationContext)) {
        if let Some(ctx) = self.registry.entries().get_mut(&self.strategy_id) {
            f(ctx);
        }
    }

    /// Move the entry to another phase.
    pub fn advance(&self, phase: ValidationPhase) {
        self.update(|ctx| ctx.phase = phase);
    }

    pub fn set_baseline(&self, baseline: PerformanceMetrics) {
        self.update(|ctx| ctx.baseline = Some(baseline));
    }

    pub fn set_projected(&self, projected: BTreeMap<ImpactMetric, Option<f64>>) {
        self.update(|ctx| ctx.projected = projected);
    }

    pub fn sample_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.update(|ctx| {
            ctx.sampled_queries.insert(query);
        });
    }
}

impl Drop for ValidationGuard {
    fn drop(&mut self) {
        self.registry.entries().remove(&self.strategy_id);
    }
}
