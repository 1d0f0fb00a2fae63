use crate::config::WorkflowConfig;
use crate::executor::BatchExecutor;
use crate::invoker::TaskInvoker;
use crate::monitor::WorkflowMonitor;
use crate::readiness;
use crate::registry::TaskRegistry;
use crate::types::{RunStatus, Task, TaskOutput, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskweave_core::{TaskweaveError, TaskweaveResult};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One execution of a task set, from initialization to completion or failure.
///
/// Owns its tasks exclusively; nothing survives the run.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    id: Uuid,
    registry: TaskRegistry,
    max_parallel_width: usize,
    status: RunStatus,
    created_at: DateTime<Utc>,
}

impl WorkflowRun {
    /// Validate `tasks` and build a run ready to be driven.
    ///
    /// Fails on a zero width, duplicate ids, unknown dependencies or a
    /// dependency cycle.
    pub fn new(tasks: Vec<Task>, max_parallel_width: usize) -> TaskweaveResult<Self> {
        Self::from_registry(TaskRegistry::with_tasks(tasks)?, max_parallel_width)
    }

    /// Like [`new`](Self::new), for an already populated registry.
    pub fn from_registry(registry: TaskRegistry, max_parallel_width: usize) -> TaskweaveResult<Self> {
        if max_parallel_width == 0 {
            return Err(TaskweaveError::Config(
                "max_parallel_width must be at least 1".to_string(),
            ));
        }
        registry.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            registry,
            max_parallel_width,
            status: RunStatus::Initialized,
            created_at: Utc::now(),
        })
    }

    /// Run id, unique per run.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The run's tasks.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Current aggregate status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Upper bound on tasks per batch.
    pub fn max_parallel_width(&self) -> usize {
        self.max_parallel_width
    }

    /// When the run was validated.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A failed task as reported at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    /// The failed task.
    pub task_id: Uuid,
    /// Its name.
    pub name: String,
    /// Error recorded on the task.
    pub reason: String,
}

/// Output of a completed task, keyed by task name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedOutput {
    /// The completed task.
    pub task_id: Uuid,
    /// Its name.
    pub name: String,
    /// What the invoker returned.
    pub output: TaskOutput,
}

/// Result of a workflow run that reached a terminal state without stalling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// Id of the run reported on.
    pub run_id: Uuid,
    /// Final status: `completed` or `failed`.
    pub status: RunStatus,
    /// One-line human summary.
    pub summary: String,
    /// Number of batches dispatched.
    pub rounds: usize,
    /// Tasks in the run.
    pub total_tasks: usize,
    /// Tasks that completed.
    pub completed_tasks: usize,
    /// Tasks that failed.
    pub failed_tasks: usize,
    /// Failed tasks with their reasons, in insertion order.
    pub failures: Vec<TaskFailure>,
    /// Outputs of completed tasks, in insertion order.
    pub outputs: Vec<NamedOutput>,
    /// Wall-clock time of the whole run.
    pub duration_ms: u64,
}

impl WorkflowReport {
    fn from_run(run: &WorkflowRun, rounds: usize, duration: Duration) -> Self {
        let tasks = run.registry.all_tasks();

        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        for task in tasks {
            match &task.status {
                TaskStatus::Completed => {
                    if let Some(output) = &task.output {
                        outputs.push(NamedOutput {
                            task_id: task.id,
                            name: task.name.clone(),
                            output: output.clone(),
                        });
                    }
                }
                TaskStatus::Failed { reason } => failures.push(TaskFailure {
                    task_id: task.id,
                    name: task.name.clone(),
                    reason: reason.clone(),
                }),
                _ => {}
            }
        }

        let completed = run.registry.completed_count();
        let summary = format!(
            "Workflow {}: {}/{} tasks completed, {} failed, {} round(s)",
            run.status,
            completed,
            tasks.len(),
            failures.len(),
            rounds
        );

        Self {
            run_id: run.id,
            status: run.status,
            summary,
            rounds,
            total_tasks: tasks.len(),
            completed_tasks: completed,
            failed_tasks: failures.len(),
            failures,
            outputs,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Drives a [`WorkflowRun`] round by round.
///
/// Each round evaluates readiness, admits a bounded batch and waits for the
/// whole batch to settle before looking at readiness again. Constructed
/// explicitly with its invoker; share nothing between runs unless the caller
/// chooses to.
pub struct WorkflowDriver {
    executor: BatchExecutor,
    monitor: Arc<WorkflowMonitor>,
    config: WorkflowConfig,
}

impl WorkflowDriver {
    /// Create a driver with a fresh monitor.
    pub fn new(invoker: Arc<dyn TaskInvoker>, config: WorkflowConfig) -> TaskweaveResult<Self> {
        Self::with_monitor(invoker, config, Arc::new(WorkflowMonitor::new()))
    }

    /// Create a driver that reports into an existing monitor.
    pub fn with_monitor(
        invoker: Arc<dyn TaskInvoker>,
        config: WorkflowConfig,
        monitor: Arc<WorkflowMonitor>,
    ) -> TaskweaveResult<Self> {
        config.validate()?;
        let executor = BatchExecutor::new(invoker, Arc::clone(&monitor))
            .with_task_timeout(config.task_timeout());
        Ok(Self {
            executor,
            monitor,
            config,
        })
    }

    /// Get a reference to the monitor.
    pub fn monitor(&self) -> &Arc<WorkflowMonitor> {
        &self.monitor
    }

    /// The configuration the driver was built with.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Build a validated run using the configured parallel width.
    pub fn prepare(&self, tasks: Vec<Task>) -> TaskweaveResult<WorkflowRun> {
        WorkflowRun::new(tasks, self.config.max_parallel_width)
    }

    /// Drive `run` until every task is terminal or no progress is possible.
    ///
    /// Returns the report when the run ends with every task terminal; its
    /// status is `completed` only if every task completed. A stall (nothing
    /// ready, something unfinished) marks the run `failed` and returns
    /// [`TaskweaveError::Stall`] listing the unfinished tasks.
    pub async fn run(&self, run: &mut WorkflowRun) -> TaskweaveResult<WorkflowReport> {
        if run.status != RunStatus::Initialized {
            return Err(TaskweaveError::InvalidTransition {
                task: run.id,
                from: run.status.to_string(),
                to: RunStatus::Running.to_string(),
            });
        }

        let start = Instant::now();
        run.status = RunStatus::Running;
        info!(
            run_id = %run.id,
            tasks = run.registry.total_count(),
            width = run.max_parallel_width,
            "Workflow: starting"
        );

        let mut rounds = 0;
        loop {
            let ready = readiness::ready_tasks(&run.registry);

            if ready.is_empty() {
                if run.registry.is_done() {
                    break;
                }
                let stuck = readiness::stuck_tasks(&run.registry);
                let blocked = readiness::blocked_by_failure(&run.registry);
                run.status = RunStatus::Failed;
                warn!(
                    run_id = %run.id,
                    rounds,
                    stuck = stuck.len(),
                    blocked_by_failure = blocked.len(),
                    "Workflow: stalled, no task is ready"
                );
                return Err(TaskweaveError::Stall { stuck });
            }

            rounds += 1;
            let batch = BatchExecutor::select_batch(&run.registry, &ready, run.max_parallel_width);
            debug!(
                run_id = %run.id,
                round = rounds,
                ready = ready.len(),
                batch_size = batch.len(),
                "Workflow: dispatching batch"
            );

            let outcome = match self.executor.execute(&mut run.registry, &batch).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    run.status = RunStatus::Failed;
                    error!(run_id = %run.id, round = rounds, error = %e, "Workflow: batch aborted");
                    return Err(e);
                }
            };

            info!(
                run_id = %run.id,
                round = rounds,
                completed = outcome.completed.len(),
                failed = outcome.failed.len(),
                duration_ms = outcome.duration.as_millis() as u64,
                "Workflow: round settled"
            );
        }

        run.status = if run.registry.all_completed() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };

        let report = WorkflowReport::from_run(run, rounds, start.elapsed());
        info!(
            run_id = %run.id,
            status = %report.status,
            rounds,
            duration_ms = report.duration_ms,
            "Workflow: finished"
        );
        Ok(report)
    }
}
