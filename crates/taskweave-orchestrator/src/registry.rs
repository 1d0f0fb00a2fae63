use crate::types::{Task, TaskOutput, TaskStatus};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use taskweave_core::{TaskweaveError, TaskweaveResult};
use uuid::Uuid;

/// Authoritative, insertion-ordered task list for one workflow run.
///
/// Insertion order is kept because it is the final tie-break when admitting
/// ready tasks into a bounded batch.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    index: HashMap<Uuid, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

impl TaskRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `tasks` and validate the dependency graph.
    pub fn with_tasks(tasks: Vec<Task>) -> TaskweaveResult<Self> {
        let mut registry = Self::new();
        for task in tasks {
            registry.insert(task)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Add a task. Dependencies are not checked until [`validate`](Self::validate).
    pub fn insert(&mut self, task: Task) -> TaskweaveResult<Uuid> {
        let id = task.id;
        if self.index.contains_key(&id) {
            return Err(TaskweaveError::DuplicateTask(id.to_string()));
        }
        self.index.insert(id, self.tasks.len());
        self.tasks.push(task);
        Ok(id)
    }

    /// Look up a task by id.
    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.index.get(&id).map(|&i| &self.tasks[i])
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        match self.index.get(&id) {
            Some(&i) => self.tasks.get_mut(i),
            None => None,
        }
    }

    /// Look a task up by its human-readable name.
    pub fn find_by_name(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Position of the task in insertion order.
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// All tasks in insertion order.
    pub fn all_tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// All task ids in insertion order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.tasks.iter().map(|t| t.id).collect()
    }

    /// Check that every dependency resolves and that the graph is acyclic.
    pub fn validate(&self) -> TaskweaveResult<()> {
        for task in &self.tasks {
            if let Some(missing) = task
                .dependencies
                .iter()
                .find(|dep| !self.index.contains_key(dep))
            {
                return Err(TaskweaveError::InvalidDependency {
                    task: task.id,
                    dependency: *missing,
                });
            }
        }
        if let Some(tasks) = self.find_cycle() {
            return Err(TaskweaveError::CyclicDependency { tasks });
        }
        Ok(())
    }

    /// Return the ids along the first dependency cycle found, if any.
    pub fn find_cycle(&self) -> Option<Vec<Uuid>> {
        let mut visited = HashMap::new();
        let mut path = Vec::new();
        for task in &self.tasks {
            if let Some(cycle) = self.dfs_cycle(task.id, &mut visited, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        id: Uuid,
        visited: &mut HashMap<Uuid, Visit>,
        path: &mut Vec<Uuid>,
    ) -> Option<Vec<Uuid>> {
        match visited.get(&id) {
            // back edge
            Some(Visit::InProgress) => {
                let start = path.iter().position(|p| *p == id).unwrap_or(0);
                return Some(path[start..].to_vec());
            }
            Some(Visit::Done) => return None,
            None => {}
        }
        visited.insert(id, Visit::InProgress);
        path.push(id);
        if let Some(task) = self.get(id) {
            for dep in &task.dependencies {
                if let Some(cycle) = self.dfs_cycle(*dep, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        visited.insert(id, Visit::Done);
        None
    }

    /// Group tasks into dependency layers.
    ///
    /// Layer 0 holds tasks without dependencies; layer `k` holds tasks whose
    /// dependencies all sit in earlier layers. With unbounded width and no
    /// failures this is exactly the sequence of batches a run dispatches.
    pub fn topological_layers(&self) -> TaskweaveResult<Vec<Vec<Uuid>>> {
        self.validate()?;

        let mut placed: HashSet<Uuid> = HashSet::with_capacity(self.tasks.len());
        let mut layers = Vec::new();
        while placed.len() < self.tasks.len() {
            let layer: Vec<Uuid> = self
                .tasks
                .iter()
                .filter(|t| !placed.contains(&t.id))
                .filter(|t| t.dependencies.iter().all(|d| placed.contains(d)))
                .map(|t| t.id)
                .collect();
            if layer.is_empty() {
                break;
            }
            placed.extend(layer.iter().copied());
            layers.push(layer);
        }
        Ok(layers)
    }

    fn transition(&mut self, id: Uuid, to: TaskStatus) -> TaskweaveResult<&mut Task> {
        let task = self.get_mut(id).ok_or(TaskweaveError::TaskNotFound(id))?;
        let allowed = matches!(
            (&task.status, &to),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed { .. })
        );
        if !allowed {
            return Err(TaskweaveError::InvalidTransition {
                task: id,
                from: task.status.label().to_string(),
                to: to.label().to_string(),
            });
        }
        task.status = to;
        Ok(task)
    }

    /// Mark a pending task as dispatched.
    pub fn mark_in_progress(&mut self, id: Uuid) -> TaskweaveResult<()> {
        let task = self.transition(id, TaskStatus::InProgress)?;
        task.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark an in-progress task as completed and record its output.
    pub fn mark_completed(&mut self, id: Uuid, output: TaskOutput) -> TaskweaveResult<()> {
        let task = self.transition(id, TaskStatus::Completed)?;
        task.output = Some(output);
        finish(task);
        Ok(())
    }

    /// Mark an in-progress task as failed.
    pub fn mark_failed(&mut self, id: Uuid, reason: impl Into<String>) -> TaskweaveResult<()> {
        let task = self.transition(
            id,
            TaskStatus::Failed {
                reason: reason.into(),
            },
        )?;
        finish(task);
        Ok(())
    }

    /// Ids of every completed task.
    pub fn completed_ids(&self) -> HashSet<Uuid> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id)
            .collect()
    }

    /// Total number of tasks.
    pub fn total_count(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks still waiting to be dispatched.
    pub fn pending_count(&self) -> usize {
        self.count(|s| *s == TaskStatus::Pending)
    }

    /// Tasks dispatched and not yet settled.
    pub fn in_progress_count(&self) -> usize {
        self.count(|s| *s == TaskStatus::InProgress)
    }

    /// Tasks that completed.
    pub fn completed_count(&self) -> usize {
        self.count(|s| *s == TaskStatus::Completed)
    }

    /// Tasks that failed.
    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, TaskStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&TaskStatus) -> bool) -> usize {
        self.tasks.iter().filter(|t| pred(&t.status)).count()
    }

    /// Check if every task is terminal (completed or failed).
    pub fn is_done(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal())
    }

    /// Check if every task completed successfully.
    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }
}

fn finish(task: &mut Task) {
    let now = Utc::now();
    task.completed_at = Some(now);
    if let Some(started) = task.started_at {
        task.duration_ms = Some((now - started).num_milliseconds().max(0) as u64);
    }
}
