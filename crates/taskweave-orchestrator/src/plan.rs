//! Workflow plan files.
//!
//! A plan is a TOML document with one `[[tasks]]` entry per task. Tasks refer
//! to their dependencies by name; names are resolved to ids when the plan is
//! turned into a [`WorkflowRun`].
//!
//! ```toml
//! [[tasks]]
//! name = "spec"
//! kind = "analyze"
//! description = "Analyze the request"
//! priority = "high"
//!
//! [[tasks]]
//! name = "code"
//! kind = "generate"
//! depends_on = ["spec"]
//! ```

use crate::engine::WorkflowRun;
use crate::types::{Priority, Task, TaskKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use taskweave_core::{TaskweaveError, TaskweaveResult};
use uuid::Uuid;

/// One `[[tasks]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    /// Unique name within the plan.
    pub name: String,
    /// Category of work.
    pub kind: TaskKind,
    /// Defaults to the task name when omitted.
    #[serde(default)]
    pub description: String,
    /// Admission priority, `medium` when omitted.
    #[serde(default)]
    pub priority: Priority,
    /// Names of tasks that must complete first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Explicit worker assignment.
    #[serde(default)]
    pub worker: Option<String>,
}

/// A parsed plan file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowPlan {
    /// Tasks in declaration order.
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
}

impl WorkflowPlan {
    /// Parse a plan from TOML text.
    pub fn from_toml_str(input: &str) -> TaskweaveResult<Self> {
        toml::from_str(input).map_err(|e| TaskweaveError::Config(format!("Invalid plan: {e}")))
    }

    /// Read and parse a plan file.
    pub fn from_file(path: &Path) -> TaskweaveResult<Self> {
        let input = std::fs::read_to_string(path).map_err(|e| {
            TaskweaveError::Config(format!("Failed to read plan '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&input)
    }

    /// Resolve dependency names and build the tasks, in plan order.
    pub fn into_tasks(self) -> TaskweaveResult<Vec<Task>> {
        let mut ids: HashMap<String, Uuid> = HashMap::with_capacity(self.tasks.len());
        let mut tasks = Vec::with_capacity(self.tasks.len());

        for planned in &self.tasks {
            if planned.name.trim().is_empty() {
                return Err(TaskweaveError::Config("Task name must not be empty".to_string()));
            }
            let description = if planned.description.is_empty() {
                planned.name.clone()
            } else {
                planned.description.clone()
            };
            let mut task = Task::new(planned.name.clone(), description, planned.kind)
                .with_priority(planned.priority);
            if let Some(worker) = &planned.worker {
                task = task.with_worker(worker.clone());
            }
            if ids.insert(planned.name.clone(), task.id).is_some() {
                return Err(TaskweaveError::DuplicateTask(planned.name.clone()));
            }
            tasks.push(task);
        }

        for (task, planned) in tasks.iter_mut().zip(&self.tasks) {
            for dep in &planned.depends_on {
                let id = ids
                    .get(dep)
                    .ok_or_else(|| TaskweaveError::UnknownDependency {
                        task: planned.name.clone(),
                        name: dep.clone(),
                    })?;
                if !task.dependencies.contains(id) {
                    task.dependencies.push(*id);
                }
            }
        }

        Ok(tasks)
    }

    /// Build a validated run from this plan.
    pub fn into_run(self, max_parallel_width: usize) -> TaskweaveResult<WorkflowRun> {
        WorkflowRun::new(self.into_tasks()?, max_parallel_width)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const PIPELINE: &str = r#"
        [[tasks]]
        name = "spec"
        kind = "analyze"
        description = "Analyze the request"
        priority = "high"

        [[tasks]]
        name = "code"
        kind = "generate"
        depends_on = ["spec"]
        worker = "coder"

        [[tasks]]
        name = "review"
        kind = "synthesize"
        depends_on = ["spec", "code", "code"]
    "#;

    #[test]
    fn test_parse_and_resolve() {
        let plan = WorkflowPlan::from_toml_str(PIPELINE).unwrap();
        assert_eq!(plan.tasks.len(), 3);

        let tasks = plan.into_tasks().unwrap();
        let (spec, code, review) = (&tasks[0], &tasks[1], &tasks[2]);
        assert_eq!(spec.priority, Priority::High);
        assert_eq!(spec.description, "Analyze the request");
        assert_eq!(code.description, "code");
        assert_eq!(code.assigned_worker.as_deref(), Some("coder"));
        assert_eq!(code.dependencies, vec![spec.id]);
        assert_eq!(review.dependencies, vec![spec.id, code.id]);
        assert_eq!(review.priority, Priority::Medium);
    }

    #[test]
    fn test_into_run() {
        let run = WorkflowPlan::from_toml_str(PIPELINE)
            .unwrap()
            .into_run(2)
            .unwrap();
        assert_eq!(run.registry().total_count(), 3);
        assert_eq!(run.max_parallel_width(), 2);
    }

    #[test]
    fn test_unknown_dependency() {
        let plan = WorkflowPlan::from_toml_str(
            r#"
            [[tasks]]
            name = "review"
            kind = "explain"
            depends_on = ["tests"]
            "#,
        )
        .unwrap();
        let err = plan.into_tasks().unwrap_err();
        assert!(matches!(
            err,
            TaskweaveError::UnknownDependency { ref name, .. } if name == "tests"
        ));
    }

    #[test]
    fn test_duplicate_names() {
        let plan = WorkflowPlan::from_toml_str(
            r#"
            [[tasks]]
            name = "a"
            kind = "debug"

            [[tasks]]
            name = "a"
            kind = "debug"
            "#,
        )
        .unwrap();
        assert!(matches!(
            plan.into_tasks(),
            Err(TaskweaveError::DuplicateTask(_))
        ));
    }

    #[test]
    fn test_cyclic_plan_rejected() {
        let plan = WorkflowPlan::from_toml_str(
            r#"
            [[tasks]]
            name = "a"
            kind = "refactor"
            depends_on = ["b"]

            [[tasks]]
            name = "b"
            kind = "refactor"
            depends_on = ["a"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            plan.into_run(1),
            Err(TaskweaveError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = WorkflowPlan::from_toml_str("[[tasks]]\nname = \"x\"\nkind = \"deploy\"\n")
            .unwrap_err();
        assert!(matches!(err, TaskweaveError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PIPELINE.as_bytes()).unwrap();
        let plan = WorkflowPlan::from_file(file.path()).unwrap();
        assert_eq!(plan.tasks[2].name, "review");
    }
}
