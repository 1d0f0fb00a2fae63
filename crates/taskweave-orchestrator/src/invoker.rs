use crate::types::{Task, TaskKind, TaskOutput};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskweave_core::{TaskweaveError, TaskweaveResult};
use tracing::debug;

/// Capability that performs the work a task represents.
///
/// The scheduler only sees the result: what happens inside (a model call, an
/// analysis pass, a shell command) is up to the implementation. Errors are
/// recorded on the task and never abort other tasks in the same batch.
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    /// Name of the worker that handles tasks of `kind`.
    ///
    /// Used to fill [`Task::assigned_worker`] at dispatch time when the task
    /// carries no explicit assignment.
    fn worker_for(&self, kind: TaskKind) -> String;

    /// Perform the task. May take arbitrary wall-clock time.
    async fn invoke(&self, task: &Task) -> TaskweaveResult<TaskOutput>;
}

/// Table-driven dispatcher routing each [`TaskKind`] to its invoker.
///
/// Kinds without a route go to the fallback, if one is set; otherwise the
/// invocation fails with [`TaskweaveError::TaskExecution`].
#[derive(Clone, Default)]
pub struct InvokerTable {
    routes: HashMap<TaskKind, Arc<dyn TaskInvoker>>,
    fallback: Option<Arc<dyn TaskInvoker>>,
}

impl InvokerTable {
    /// Empty table without a fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `kind` to `invoker`, replacing any previous route.
    pub fn route(mut self, kind: TaskKind, invoker: Arc<dyn TaskInvoker>) -> Self {
        self.register(kind, invoker);
        self
    }

    /// In-place variant of [`route`](Self::route).
    pub fn register(&mut self, kind: TaskKind, invoker: Arc<dyn TaskInvoker>) {
        self.routes.insert(kind, invoker);
    }

    /// Invoker used for kinds that have no explicit route.
    pub fn with_fallback(mut self, invoker: Arc<dyn TaskInvoker>) -> Self {
        self.fallback = Some(invoker);
        self
    }

    /// The invoker that handles `kind`, if any.
    pub fn resolve(&self, kind: TaskKind) -> Option<&Arc<dyn TaskInvoker>> {
        self.routes.get(&kind).or(self.fallback.as_ref())
    }

    /// Number of explicit routes (the fallback is not counted).
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[async_trait]
impl TaskInvoker for InvokerTable {
    fn worker_for(&self, kind: TaskKind) -> String {
        self.resolve(kind)
            .map(|invoker| invoker.worker_for(kind))
            .unwrap_or_else(|| "unrouted".to_string())
    }

    async fn invoke(&self, task: &Task) -> TaskweaveResult<TaskOutput> {
        let invoker = self.resolve(task.kind).ok_or_else(|| {
            TaskweaveError::TaskExecution(format!(
                "No invoker registered for task kind '{}'",
                task.kind
            ))
        })?;
        invoker.invoke(task).await
    }
}

/// Local invoker that echoes the task description back as its output.
///
/// Never calls a model. Useful for dry runs of a plan and for tests; the
/// optional latency makes batch overlap observable.
#[derive(Debug, Clone)]
pub struct EchoInvoker {
    name: String,
    latency: Duration,
}

impl EchoInvoker {
    /// Echo invoker with zero latency; `name` prefixes its worker names.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: Duration::ZERO,
        }
    }

    /// Simulated time each invocation takes.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for EchoInvoker {
    fn default() -> Self {
        Self::new("echo")
    }
}

#[async_trait]
impl TaskInvoker for EchoInvoker {
    fn worker_for(&self, kind: TaskKind) -> String {
        format!("{}-{kind}", self.name)
    }

    async fn invoke(&self, task: &Task) -> TaskweaveResult<TaskOutput> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        debug!(task_id = %task.id, kind = %task.kind, worker = %self.name, "Echo invocation");
        Ok(
            TaskOutput::new(format!("[{}] {}", task.kind, task.description))
                .with_metadata("task", serde_json::json!(task.name)),
        )
    }
}
