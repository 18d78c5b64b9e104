//! Named tasks with dependencies.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use thiserror::Error;

use super::result::{Invocation, TaskOutput, TaskRun};
use crate::build::format_duration;

/// Error returned by a task action.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Body of a task.
pub type TaskAction = Arc<dyn Fn() -> Result<TaskOutput, ActionError> + Send + Sync>;

/// Dependency list for tasks without dependencies.
pub const NO_DEPS: [&str; 0] = [];

/// A named unit of work.
#[derive(Clone)]
pub struct Task {
    pub name: String,
    /// Tasks run to completion, in order, before this one
    pub dependencies: Vec<String>,
    /// `None` for aggregate tasks
    pub action: Option<TaskAction>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("aggregate", &self.action.is_none())
            .finish()
    }
}

/// Error invoking a task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// No task registered under this name
    #[error("Task '{0}' is not registered")]
    UnknownTask(String),
    /// Dependencies loop back on themselves
    #[error("Cyclic task dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    /// The task's own action failed
    #[error("Task '{task}' failed: {source}")]
    Action {
        task: String,
        #[source]
        source: ActionError,
    },
    /// A dependency failed, so the task did not run
    #[error("Task '{task}' aborted: {source}")]
    Dependency {
        task: String,
        #[source]
        source: Box<TaskError>,
    },
}

impl TaskError {
    /// The innermost error of a dependency chain.
    pub fn root_cause(&self) -> &TaskError {
        match self {
            TaskError::Dependency { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Per-invocation bookkeeping.
#[derive(Default)]
struct InvocationState {
    /// Tasks currently being resolved, outermost first
    visiting: Vec<String>,
    completed: HashSet<String>,
    runs: Vec<TaskRun>,
}

/// Registry of named tasks.
///
/// Dependencies are resolved by name when a task is invoked, so tasks may be
/// registered in any order. Registering an existing name replaces the
/// previous task. `invoke` only takes a read lock and keeps its state local,
/// so it can be called from several threads at once.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<Task>>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with an action.
    ///
    /// Returns `true` if a task with the same name was replaced.
    pub fn register<I, S, F>(&self, name: impl Into<String>, dependencies: I, action: F) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn() -> Result<TaskOutput, ActionError> + Send + Sync + 'static,
    {
        self.insert(Task {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            action: Some(Arc::new(action)),
        })
    }

    /// Register a task that only runs its dependencies.
    pub fn register_aggregate<I, S>(&self, name: impl Into<String>, dependencies: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(Task {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            action: None,
        })
    }

    /// Register a prepared task.
    pub fn insert(&self, task: Task) -> bool {
        let name = task.name.clone();
        let replaced = self.write().insert(name.clone(), Arc::new(task)).is_some();
        if replaced {
            tracing::debug!("Task '{}' replaced", name);
        }
        replaced
    }

    /// Look up a task by name.
    pub fn get(&self, name: &str) -> Option<Arc<Task>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered task names, sorted.
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a task after its dependencies.
    ///
    /// Dependencies run depth-first in listed order; within one invocation
    /// each task runs at most once.
    pub fn invoke(&self, name: &str) -> Result<Invocation, TaskError> {
        let start = Instant::now();
        let mut state = InvocationState::default();
        self.run(name, &mut state)?;
        Ok(Invocation { target: name.to_string(), runs: state.runs, duration: start.elapsed() })
    }

    fn run(&self, name: &str, state: &mut InvocationState) -> Result<(), TaskError> {
        if state.completed.contains(name) {
            return Ok(());
        }
        if let Some(pos) = state.visiting.iter().position(|n| n == name) {
            let mut cycle = state.visiting[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(TaskError::CyclicDependency(cycle));
        }

        let task = self.get(name).ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;

        state.visiting.push(name.to_string());
        for dep in &task.dependencies {
            match self.run(dep, state) {
                Ok(()) => {}
                Err(cycle @ TaskError::CyclicDependency(_)) => return Err(cycle),
                Err(e) => {
                    return Err(TaskError::Dependency { task: name.to_string(), source: Box::new(e) })
                }
            }
        }

        let start = Instant::now();
        let output = match &task.action {
            Some(action) => {
                tracing::info!("Starting '{}'...", name);
                action().map_err(|source| TaskError::Action { task: name.to_string(), source })?
            }
            None => TaskOutput::empty(),
        };
        let duration = start.elapsed();
        if task.action.is_some() {
            tracing::info!("Finished '{}' after {}", name, format_duration(duration));
        }

        state.visiting.pop();
        state.completed.insert(name.to_string());
        state.runs.push(TaskRun { name: name.to_string(), duration, output });
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Task>>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Task>>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry").field("tasks", &self.task_names()).finish()
    }
}
