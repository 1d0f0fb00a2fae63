use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use taskweave_core::TaskweaveError;
use uuid::Uuid;

/// Category of work a task represents.
///
/// Purely descriptive for the scheduler: readiness and batching never look at
/// it. The [`InvokerTable`](crate::invoker::InvokerTable) uses it to route a
/// task to the invoker that handles its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Produce new code or content.
    Generate,
    /// Inspect requirements or existing code.
    Analyze,
    /// Restructure existing code without changing behaviour.
    Refactor,
    /// Locate and fix a defect.
    Debug,
    /// Describe how something works.
    Explain,
    /// Combine the outputs of earlier tasks.
    Synthesize,
}

impl TaskKind {
    /// Every kind, in declaration order.
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Generate,
        TaskKind::Analyze,
        TaskKind::Refactor,
        TaskKind::Debug,
        TaskKind::Explain,
        TaskKind::Synthesize,
    ];

    /// Lowercase name used in plan files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Generate => "generate",
            TaskKind::Analyze => "analyze",
            TaskKind::Refactor => "refactor",
            TaskKind::Debug => "debug",
            TaskKind::Explain => "explain",
            TaskKind::Synthesize => "synthesize",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = TaskweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| TaskweaveError::Config(format!("Unknown task kind '{s}'")))
    }
}

/// Admission priority of a ready task.
///
/// Only consulted when more tasks are ready than the batch width allows.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Admitted last.
    Low,
    /// The default priority.
    #[default]
    Medium,
    /// Admitted before medium and low.
    High,
    /// Admitted first.
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Priority {
    type Err = TaskweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(TaskweaveError::Config(format!("Unknown priority '{other}'"))),
        }
    }
}

/// Status of a task within a workflow run.
///
/// Transitions are forward-only: `Pending -> InProgress -> Completed | Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for dependencies or for a batch slot.
    Pending,
    /// Dispatched in the current batch.
    InProgress,
    /// Finished successfully; dependents may now run.
    Completed,
    /// Finished with an error; dependents stay blocked.
    Failed {
        /// Error message captured from the invoker.
        reason: String,
    },
}

impl TaskStatus {
    /// Completed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed { .. })
    }

    /// Short snake_case label, without the failure reason.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Output recorded on a task once its invocation succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Text produced by the invoker.
    pub content: String,
    /// Free-form invoker metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the invocation returned.
    pub produced_at: DateTime<Utc>,
}

impl TaskOutput {
    /// Output with the given content and no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
            produced_at: Utc::now(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A unit of work inside one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id, assigned at creation.
    pub id: Uuid,
    /// Human label; plan files reference dependencies by it.
    pub name: String,
    /// The work request handed to the invoker.
    pub description: String,
    /// Category of work, used for routing.
    pub kind: TaskKind,
    /// Tasks that must be completed before this one may start.
    pub dependencies: Vec<Uuid>,
    /// Tie-break when more tasks are ready than the batch width.
    #[serde(default)]
    pub priority: Priority,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Name of the worker handling the task. Filled at dispatch when empty.
    #[serde(default)]
    pub assigned_worker: Option<String>,
    /// Set once the task completes.
    #[serde(default)]
    pub output: Option<TaskOutput>,
    /// When the task was built.
    pub created_at: DateTime<Utc>,
    /// When the task was dispatched.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Time from dispatch to terminal status.
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl Task {
    /// A pending task with a fresh id, no dependencies and medium priority.
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            kind,
            dependencies: Vec::new(),
            priority: Priority::default(),
            status: TaskStatus::Pending,
            assigned_worker: None,
            output: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Replace the dependency list.
    pub fn with_dependencies(mut self, deps: Vec<Uuid>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Add a single dependency.
    pub fn depends_on(mut self, dep: Uuid) -> Self {
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
        self
    }

    /// Set the admission priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Pre-assign a worker; dispatch keeps it instead of asking the invoker.
    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.assigned_worker = Some(worker.into());
        self
    }

    /// Pending, and every dependency is in `completed_ids`.
    pub fn is_ready(&self, completed_ids: &HashSet<Uuid>) -> bool {
        self.status == TaskStatus::Pending
            && self
                .dependencies
                .iter()
                .all(|dep| completed_ids.contains(dep))
    }

    /// The recorded failure reason, if the task failed.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Aggregate status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Validated, not yet driven.
    Initialized,
    /// Batches are being dispatched.
    Running,
    /// Every task completed.
    Completed,
    /// Stopped with at least one task not completed.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Initialized => write!(f, "initialized"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}
