//! Core error definitions for the Taskweave workflow scheduler.
//!
//! This crate provides the error type shared across all Taskweave crates.
//! Run-level failures (invalid dependency graphs, stalls, configuration) and
//! task-level failures (invocation errors, timeouts) share one enum so that
//! invokers, the scheduler and the CLI speak the same language.
//!
//! # Main types
//!
//! - [`TaskweaveError`] — Unified error enum for all Taskweave subsystems.
//! - [`TaskweaveResult`] — Convenience alias for `Result<T, TaskweaveError>`.

use uuid::Uuid;

// --- Error types ---

/// Top-level error type for the Taskweave workspace.
///
/// Construction-time variants ([`InvalidDependency`](Self::InvalidDependency),
/// [`CyclicDependency`](Self::CyclicDependency), ...) prevent a run from
/// starting. [`TaskExecution`](Self::TaskExecution) and
/// [`Timeout`](Self::Timeout) are recorded on the failing task and never
/// abort its siblings. [`Stall`](Self::Stall) ends a run that can no longer
/// make progress.
#[derive(Debug, thiserror::Error)]
pub enum TaskweaveError {
    /// A task references a dependency id that is not part of the same run.
    #[error("Invalid dependency: task {task} depends on unknown task {dependency}")]
    InvalidDependency {
        /// The task declaring the dependency.
        task: Uuid,
        /// The dependency id that could not be resolved.
        dependency: Uuid,
    },

    /// A plan file names a dependency that no task in the plan carries.
    #[error("Unknown dependency: task '{task}' depends on undefined task '{name}'")]
    UnknownDependency {
        /// Name of the task declaring the dependency.
        task: String,
        /// The unresolved dependency name.
        name: String,
    },

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle detected between tasks: {}", join_ids(.tasks))]
    CyclicDependency {
        /// Ids of the tasks along the detected cycle.
        tasks: Vec<Uuid>,
    },

    /// A task id or name was registered twice.
    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    /// No task with the given id exists in the registry.
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// A status change violated the forward-only task lifecycle.
    #[error("Invalid transition for {task}: {from} -> {to}")]
    InvalidTransition {
        /// The task (or run) whose status was being changed.
        task: Uuid,
        /// Status before the attempted change.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A task invocation failed.
    #[error("Task execution error: {0}")]
    TaskExecution(String),

    /// A task invocation exceeded the configured per-task timeout.
    #[error("Task {task} timed out after {timeout_ms}ms")]
    Timeout {
        /// The task that timed out.
        task: Uuid,
        /// The timeout that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The workflow cannot make progress: nothing is ready but not every
    /// task is terminal.
    #[error("Workflow stalled with {} unfinished task(s): {}", .stuck.len(), join_ids(.stuck))]
    Stall {
        /// Ids of every task that is neither completed nor failed.
        stuck: Vec<Uuid>,
    },

    /// An error in configuration or plan parsing and validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskweaveError {
    /// Returns `true` for errors that are captured on a single task rather
    /// than ending the whole run.
    pub fn is_task_level(&self) -> bool {
        matches!(self, Self::TaskExecution(_) | Self::Timeout { .. })
    }
}

/// A convenience `Result` alias using [`TaskweaveError`].
pub type TaskweaveResult<T> = Result<T, TaskweaveError>;

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
