//! Dependency-aware workflow scheduling for multi-step AI coding tasks.
//!
//! A workflow is a set of tasks with declared dependencies. The driver runs
//! it in rounds: evaluate which pending tasks have all dependencies
//! completed, admit up to `max_parallel_width` of them (highest priority
//! first), run that batch concurrently through an injected [`TaskInvoker`],
//! wait for the whole batch to settle, repeat. A run ends `completed` when
//! every task completed, `failed` when some task failed, and with a
//! [`Stall`](taskweave_core::TaskweaveError::Stall) error when nothing is
//! ready but work remains.
//!
//! # Main types
//!
//! - [`WorkflowDriver`] — Round-based driver for a [`WorkflowRun`].
//! - [`TaskRegistry`] — Insertion-ordered task store with graph validation.
//! - [`BatchExecutor`] — Bounded, concurrent batch dispatch.
//! - [`TaskInvoker`] — Capability that performs a task's work.
//! - [`InvokerTable`] — Routes each [`TaskKind`] to its invoker.
//! - [`WorkflowMonitor`] — Per-kind dispatch and outcome metrics.
//! - [`WorkflowPlan`] — TOML plan files naming tasks and dependencies.

/// Scheduler configuration.
pub mod config;
/// Workflow runs and the round-based driver.
pub mod engine;
/// Concurrent batch execution.
pub mod executor;
/// Task operation invokers and the kind dispatcher.
pub mod invoker;
/// Per-kind metrics monitoring.
pub mod monitor;
/// TOML workflow plans.
pub mod plan;
pub mod readiness;
/// Task registry and dependency graph validation.
pub mod registry;
/// Shared task types (Task, TaskKind, TaskStatus, etc.).
pub mod types;

pub use config::WorkflowConfig;
pub use engine::{NamedOutput, TaskFailure, WorkflowDriver, WorkflowReport, WorkflowRun};
pub use executor::{BatchExecutor, BatchOutcome};
pub use invoker::{EchoInvoker, InvokerTable, TaskInvoker};
pub use monitor::{KindMetrics, KindState, WorkflowMonitor};
pub use plan::{PlannedTask, WorkflowPlan};
pub use registry::TaskRegistry;
pub use types::{Priority, RunStatus, Task, TaskKind, TaskOutput, TaskStatus};
