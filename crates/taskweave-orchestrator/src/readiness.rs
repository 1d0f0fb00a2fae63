//! Per-round readiness evaluation.
//!
//! A task is ready when it is pending and every dependency has completed.
//! A dependency that failed never completes, so its dependents stay pending
//! for the rest of the run and the driver reports a stall.

use crate::registry::TaskRegistry;
use crate::types::TaskStatus;
use uuid::Uuid;

/// Ids of all ready tasks, in insertion order.
///
/// Pure function of the registry state: calling it twice without a status
/// change returns the same ids.
pub fn ready_tasks(registry: &TaskRegistry) -> Vec<Uuid> {
    let completed = registry.completed_ids();
    registry
        .all_tasks()
        .iter()
        .filter(|t| t.is_ready(&completed))
        .map(|t| t.id)
        .collect()
}

/// Pending tasks with at least one failed direct dependency.
pub fn blocked_by_failure(registry: &TaskRegistry) -> Vec<Uuid> {
    registry
        .all_tasks()
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| {
            t.dependencies.iter().any(|dep| {
                registry
                    .get(*dep)
                    .is_some_and(|d| matches!(d.status, TaskStatus::Failed { .. }))
            })
        })
        .map(|t| t.id)
        .collect()
}

/// Every task that is neither completed nor failed.
pub fn stuck_tasks(registry: &TaskRegistry) -> Vec<Uuid> {
    registry
        .all_tasks()
        .iter()
        .filter(|t| !t.status.is_terminal())
        .map(|t| t.id)
        .collect()
}
