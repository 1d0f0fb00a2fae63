use crate::invoker::TaskInvoker;
use crate::monitor::WorkflowMonitor;
use crate::registry::TaskRegistry;
use crate::types::{Task, TaskKind, TaskOutput, TaskStatus};
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskweave_core::{TaskweaveError, TaskweaveResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened to one dispatched batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Ids dispatched, in admission order.
    pub dispatched: Vec<Uuid>,
    /// Ids that completed.
    pub completed: Vec<Uuid>,
    /// Ids that failed (invoker error, timeout or panic).
    pub failed: Vec<Uuid>,
    /// Wall-clock time from dispatch until the slowest member settled.
    pub duration: Duration,
}

/// Runs a bounded batch of ready tasks concurrently and records the results.
///
/// The registry is only touched before the spawn (`in_progress`) and after
/// the whole batch has joined (terminal status), so spawned invocations never
/// race on it.
pub struct BatchExecutor {
    invoker: Arc<dyn TaskInvoker>,
    monitor: Arc<WorkflowMonitor>,
    task_timeout: Option<Duration>,
}

impl BatchExecutor {
    /// Executor without a per-task timeout.
    pub fn new(invoker: Arc<dyn TaskInvoker>, monitor: Arc<WorkflowMonitor>) -> Self {
        Self {
            invoker,
            monitor,
            task_timeout: None,
        }
    }

    /// Fail any invocation that runs longer than `timeout`.
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Pick at most `width` ids from `ready`: highest priority first, then
    /// insertion order.
    pub fn select_batch(registry: &TaskRegistry, ready: &[Uuid], width: usize) -> Vec<Uuid> {
        let mut candidates: Vec<(&Task, usize)> = ready
            .iter()
            .filter_map(|id| Some((registry.get(*id)?, registry.position(*id)?)))
            .collect();
        candidates.sort_by(|(a, a_pos), (b, b_pos)| {
            b.priority.cmp(&a.priority).then(a_pos.cmp(b_pos))
        });
        candidates
            .into_iter()
            .take(width)
            .map(|(task, _)| task.id)
            .collect()
    }

    /// Dispatch every task in `batch` concurrently and wait for all of them.
    ///
    /// A failing, timed-out or panicking invocation marks only its own task
    /// as failed. Errors returned from here are internal (a batch member that
    /// is missing, listed twice or not pending) and leave the registry
    /// untouched.
    pub async fn execute(
        &self,
        registry: &mut TaskRegistry,
        batch: &[Uuid],
    ) -> TaskweaveResult<BatchOutcome> {
        let mut seen = HashSet::with_capacity(batch.len());
        for &id in batch {
            if !seen.insert(id) {
                return Err(TaskweaveError::DuplicateTask(id.to_string()));
            }
            let task = registry.get(id).ok_or(TaskweaveError::TaskNotFound(id))?;
            if task.status != TaskStatus::Pending {
                return Err(TaskweaveError::InvalidTransition {
                    task: id,
                    from: task.status.label().to_string(),
                    to: TaskStatus::InProgress.label().to_string(),
                });
            }
        }

        let start = Instant::now();
        let mut dispatched = Vec::with_capacity(batch.len());
        for &id in batch {
            if let Some(task) = registry.get_mut(id) {
                if task.assigned_worker.is_none() {
                    task.assigned_worker = Some(self.invoker.worker_for(task.kind));
                }
            }
            registry.mark_in_progress(id)?;
            let task = registry
                .get(id)
                .cloned()
                .ok_or(TaskweaveError::TaskNotFound(id))?;
            debug!(
                task_id = %id,
                name = %task.name,
                kind = %task.kind,
                priority = %task.priority,
                worker = task.assigned_worker.as_deref().unwrap_or_default(),
                "Dispatching task"
            );
            self.monitor.start_task(task.kind, id).await;
            dispatched.push(task);
        }

        let mut meta: Vec<(Uuid, TaskKind)> = Vec::with_capacity(dispatched.len());
        let mut handles = Vec::with_capacity(dispatched.len());
        for task in dispatched {
            meta.push((task.id, task.kind));
            let invoker = Arc::clone(&self.invoker);
            let timeout = self.task_timeout;
            handles.push(tokio::spawn(invoke_one(invoker, task, timeout)));
        }

        let results = join_all(handles).await;

        let mut outcome = BatchOutcome {
            dispatched: batch.to_vec(),
            ..BatchOutcome::default()
        };
        for ((id, kind), joined) in meta.into_iter().zip(results) {
            let (result, elapsed_ms) = match joined {
                Ok(settled) => settled,
                Err(join_error) => (
                    Err(TaskweaveError::TaskExecution(format!(
                        "Worker terminated abnormally: {join_error}"
                    ))),
                    start.elapsed().as_millis() as u64,
                ),
            };
            match result {
                Ok(output) => {
                    registry.mark_completed(id, output)?;
                    self.monitor.record_completed(kind, id, elapsed_ms).await;
                    info!(task_id = %id, kind = %kind, duration_ms = elapsed_ms, "Task completed");
                    outcome.completed.push(id);
                }
                Err(e) => {
                    registry.mark_failed(id, e.to_string())?;
                    self.monitor.record_failed(kind, id, elapsed_ms).await;
                    warn!(task_id = %id, kind = %kind, error = %e, "Task failed");
                    outcome.failed.push(id);
                }
            }
        }
        outcome.duration = start.elapsed();

        Ok(outcome)
    }
}

async fn invoke_one(
    invoker: Arc<dyn TaskInvoker>,
    task: Task,
    timeout: Option<Duration>,
) -> (TaskweaveResult<TaskOutput>, u64) {
    let start = Instant::now();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, invoker.invoke(&task)).await {
            Ok(result) => result,
            Err(_) => Err(TaskweaveError::Timeout {
                task: task.id,
                timeout_ms: limit.as_millis() as u64,
            }),
        },
        None => invoker.invoke(&task).await,
    };
    (result, start.elapsed().as_millis() as u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::invoker::EchoInvoker;
    use crate::types::{Priority, TaskKind};
    use async_trait::async_trait;

    struct PickyInvoker;

    #[async_trait]
    impl TaskInvoker for PickyInvoker {
        fn worker_for(&self, kind: TaskKind) -> String {
            format!("picky-{kind}")
        }

        async fn invoke(&self, task: &Task) -> TaskweaveResult<TaskOutput> {
            match task.kind {
                TaskKind::Debug => Err(TaskweaveError::TaskExecution("cannot debug".into())),
                TaskKind::Explain => panic!("explain is not supported"),
                TaskKind::Refactor => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(TaskOutput::new("too late"))
                }
                _ => Ok(TaskOutput::new(format!("done: {}", task.name))),
            }
        }
    }

    fn executor(invoker: Arc<dyn TaskInvoker>) -> BatchExecutor {
        BatchExecutor::new(invoker, Arc::new(WorkflowMonitor::new()))
    }

    #[test]
    fn test_select_batch_priority_then_insertion() {
        let low = Task::new("low", "", TaskKind::Analyze).with_priority(Priority::Low);
        let med_a = Task::new("med_a", "", TaskKind::Analyze);
        let crit = Task::new("crit", "", TaskKind::Analyze).with_priority(Priority::Critical);
        let med_b = Task::new("med_b", "", TaskKind::Analyze);
        let ids = [low.id, med_a.id, crit.id, med_b.id];
        let registry = TaskRegistry::with_tasks(vec![low, med_a, crit, med_b]).unwrap();

        let batch = BatchExecutor::select_batch(&registry, &ids, 3);
        assert_eq!(batch, vec![ids[2], ids[1], ids[3]]);

        let batch = BatchExecutor::select_batch(&registry, &ids, 10);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[3], ids[0]);
    }

    #[test]
    fn test_select_batch_empty() {
        let registry = TaskRegistry::new();
        assert!(BatchExecutor::select_batch(&registry, &[], 4).is_empty());
    }

    #[tokio::test]
    async fn test_execute_records_outputs_and_workers() {
        let a = Task::new("a", "first", TaskKind::Generate);
        let b = Task::new("b", "second", TaskKind::Analyze).with_worker("reviewer");
        let (a_id, b_id) = (a.id, b.id);
        let mut registry = TaskRegistry::with_tasks(vec![a, b]).unwrap();

        let exec = executor(Arc::new(EchoInvoker::default()));
        let outcome = exec.execute(&mut registry, &[a_id, b_id]).await.unwrap();

        assert_eq!(outcome.completed, vec![a_id, b_id]);
        assert!(outcome.failed.is_empty());
        let a = registry.get(a_id).unwrap();
        assert_eq!(a.status, TaskStatus::Completed);
        assert_eq!(a.assigned_worker.as_deref(), Some("echo-generate"));
        assert_eq!(a.output.as_ref().unwrap().content, "[generate] first");
        // explicit assignment is kept
        let b = registry.get(b_id).unwrap();
        assert_eq!(b.assigned_worker.as_deref(), Some("reviewer"));
    }

    #[tokio::test]
    async fn test_failure_isolated_within_batch() {
        let ok = Task::new("ok", "", TaskKind::Generate);
        let bad = Task::new("bad", "", TaskKind::Debug);
        let boom = Task::new("boom", "", TaskKind::Explain);
        let (ok_id, bad_id, boom_id) = (ok.id, bad.id, boom.id);
        let mut registry = TaskRegistry::with_tasks(vec![ok, bad, boom]).unwrap();

        let exec = executor(Arc::new(PickyInvoker));
        let outcome = exec
            .execute(&mut registry, &[ok_id, bad_id, boom_id])
            .await
            .unwrap();

        assert_eq!(outcome.completed, vec![ok_id]);
        assert_eq!(outcome.failed, vec![bad_id, boom_id]);
        assert_eq!(registry.get(ok_id).unwrap().status, TaskStatus::Completed);
        assert!(registry
            .get(bad_id)
            .unwrap()
            .failure_reason()
            .unwrap()
            .contains("cannot debug"));
        assert!(registry
            .get(boom_id)
            .unwrap()
            .failure_reason()
            .unwrap()
            .contains("terminated abnormally"));
    }

    #[tokio::test]
    async fn test_timeout_marks_failed() {
        let slow = Task::new("slow", "", TaskKind::Refactor);
        let fast = Task::new("fast", "", TaskKind::Generate);
        let (slow_id, fast_id) = (slow.id, fast.id);
        let mut registry = TaskRegistry::with_tasks(vec![slow, fast]).unwrap();

        let exec = executor(Arc::new(PickyInvoker))
            .with_task_timeout(Some(Duration::from_millis(50)));
        let outcome = exec
            .execute(&mut registry, &[slow_id, fast_id])
            .await
            .unwrap();

        assert_eq!(outcome.failed, vec![slow_id]);
        assert_eq!(outcome.completed, vec![fast_id]);
        assert!(registry
            .get(slow_id)
            .unwrap()
            .failure_reason()
            .unwrap()
            .contains("timed out after 50ms"));
    }

    #[tokio::test]
    async fn test_non_pending_member_rejected_without_side_effects() {
        let a = Task::new("a", "", TaskKind::Generate);
        let b = Task::new("b", "", TaskKind::Generate);
        let (a_id, b_id) = (a.id, b.id);
        let mut registry = TaskRegistry::with_tasks(vec![a, b]).unwrap();
        registry.mark_in_progress(b_id).unwrap();

        let exec = executor(Arc::new(EchoInvoker::default()));
        let err = exec.execute(&mut registry, &[a_id, b_id]).await.unwrap_err();
        assert!(matches!(err, TaskweaveError::InvalidTransition { .. }));
        assert_eq!(registry.get(a_id).unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_repeated_member_rejected_without_side_effects() {
        let monitor = Arc::new(WorkflowMonitor::new());
        let exec = BatchExecutor::new(Arc::new(EchoInvoker::default()), Arc::clone(&monitor));
        let a = Task::new("a", "", TaskKind::Generate);
        let a_id = a.id;
        let mut registry = TaskRegistry::with_tasks(vec![a]).unwrap();

        let err = exec.execute(&mut registry, &[a_id, a_id]).await.unwrap_err();
        assert!(matches!(err, TaskweaveError::DuplicateTask(_)));
        let a = registry.get(a_id).unwrap();
        assert_eq!(a.status, TaskStatus::Pending);
        assert!(a.assigned_worker.is_none());
        assert_eq!(monitor.in_flight_count().await, 0);

        // the task is still dispatchable afterwards
        let outcome = exec.execute(&mut registry, &[a_id]).await.unwrap();
        assert_eq!(outcome.completed, vec![a_id]);
    }

    #[tokio::test]
    async fn test_panicked_worker_keeps_elapsed_time() {
        let monitor = Arc::new(WorkflowMonitor::new());
        let exec = BatchExecutor::new(Arc::new(PickyInvoker), Arc::clone(&monitor))
            .with_task_timeout(Some(Duration::from_millis(30)));
        let slow = Task::new("slow", "", TaskKind::Refactor);
        let boom = Task::new("boom", "", TaskKind::Explain);
        let ids = [slow.id, boom.id];
        let mut registry = TaskRegistry::with_tasks(vec![slow, boom]).unwrap();

        let outcome = exec.execute(&mut registry, &ids).await.unwrap();
        assert_eq!(outcome.failed, vec![ids[0], ids[1]]);

        // the panic is only observed once the 30ms timeout of its sibling has settled
        let explain = monitor.get_state(TaskKind::Explain).await.unwrap();
        assert_eq!(explain.metrics.failed, 1);
        assert!(explain.metrics.duration_ms >= 30);
    }

    #[tokio::test]
    async fn test_monitor_tracks_batch() {
        let monitor = Arc::new(WorkflowMonitor::new());
        let exec = BatchExecutor::new(Arc::new(PickyInvoker), Arc::clone(&monitor));
        let ok = Task::new("ok", "", TaskKind::Generate);
        let bad = Task::new("bad", "", TaskKind::Debug);
        let ids = [ok.id, bad.id];
        let mut registry = TaskRegistry::with_tasks(vec![ok, bad]).unwrap();

        exec.execute(&mut registry, &ids).await.unwrap();

        let agg = monitor.aggregate_metrics().await;
        assert_eq!(agg.dispatched, 2);
        assert_eq!(agg.completed, 1);
        assert_eq!(agg.failed, 1);
        assert_eq!(monitor.in_flight_count().await, 0);
    }
}
