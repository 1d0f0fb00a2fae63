use crate::types::TaskKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Metrics tracked per task kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindMetrics {
    /// Tasks handed to the invoker.
    pub dispatched: u32,
    /// Tasks that completed.
    pub completed: u32,
    /// Tasks that failed.
    pub failed: u32,
    /// Summed invocation time of settled tasks.
    pub duration_ms: u64,
}

/// Snapshot of one task kind: metrics plus the tasks currently in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindState {
    /// The kind described.
    pub kind: TaskKind,
    /// Dispatched tasks that have not settled yet.
    pub in_flight: Vec<Uuid>,
    /// Counters since the monitor was created.
    pub metrics: KindMetrics,
}

/// Tracks dispatch and outcome metrics for every task kind in a workflow.
pub struct WorkflowMonitor {
    states: Arc<RwLock<HashMap<TaskKind, KindState>>>,
}

impl WorkflowMonitor {
    /// Monitor with zeroed metrics for every kind.
    pub fn new() -> Self {
        let states = TaskKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    KindState {
                        kind,
                        in_flight: Vec::new(),
                        metrics: KindMetrics::default(),
                    },
                )
            })
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
        }
    }

    /// Record that a task of `kind` was dispatched.
    pub async fn start_task(&self, kind: TaskKind, task_id: Uuid) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&kind) {
            state.in_flight.push(task_id);
            state.metrics.dispatched += 1;
        }
    }

    /// Record a successful completion.
    pub async fn record_completed(&self, kind: TaskKind, task_id: Uuid, duration_ms: u64) {
        self.finish(kind, task_id, duration_ms, true).await;
    }

    /// Record a failure (invoker error, timeout or panic).
    pub async fn record_failed(&self, kind: TaskKind, task_id: Uuid, duration_ms: u64) {
        self.finish(kind, task_id, duration_ms, false).await;
    }

    async fn finish(&self, kind: TaskKind, task_id: Uuid, duration_ms: u64, ok: bool) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&kind) {
            state.in_flight.retain(|id| *id != task_id);
            state.metrics.duration_ms += duration_ms;
            if ok {
                state.metrics.completed += 1;
            } else {
                state.metrics.failed += 1;
            }
        }
    }

    /// Get a snapshot of all kinds.
    pub async fn snapshot(&self) -> Vec<KindState> {
        let states = self.states.read().await;
        let mut snapshot: Vec<KindState> = states.values().cloned().collect();
        snapshot.sort_by_key(|s| TaskKind::ALL.iter().position(|k| *k == s.kind));
        snapshot
    }

    /// Get the state of a specific kind.
    pub async fn get_state(&self, kind: TaskKind) -> Option<KindState> {
        let states = self.states.read().await;
        states.get(&kind).cloned()
    }

    /// Number of tasks currently in flight across all kinds.
    pub async fn in_flight_count(&self) -> usize {
        let states = self.states.read().await;
        states.values().map(|s| s.in_flight.len()).sum()
    }

    /// Get aggregate metrics across all kinds.
    pub async fn aggregate_metrics(&self) -> KindMetrics {
        let states = self.states.read().await;
        let mut total = KindMetrics::default();
        for state in states.values() {
            total.dispatched += state.metrics.dispatched;
            total.completed += state.metrics.completed;
            total.failed += state.metrics.failed;
            total.duration_ms += state.metrics.duration_ms;
        }
        total
    }

    /// Serialize the current state as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        let kinds = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        serde_json::json!({
            "kinds": kinds,
            "aggregate": aggregate,
        })
    }
}

impl Default for WorkflowMonitor {
    fn default() -> Self {
        Self::new()
    }
}
