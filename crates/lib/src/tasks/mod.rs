//! Deferred tasks.
//!
//! Rules queue tasks on the run's [`TaskScheduler`]; the pipeline runs them
//! only after the tree is committed, in the order they were scheduled. A
//! failed run drops its queue without running anything.

pub mod install;

pub use install::{InstallOptions, PackageManager, ProcessExecutor};

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while running a task.
#[derive(Debug, Error)]
pub enum TaskError {
  #[error("task requires a project directory but the host has none")]
  NoRoot,

  #[error("failed to spawn {program}: {source}")]
  Spawn { program: String, source: io::Error },

  #[error("command failed with exit code {code:?}: {command}")]
  Failed { command: String, code: Option<i32> },

  #[error("unknown package manager: {0}")]
  UnknownPackageManager(String),
}

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskSpec {
  /// Install the project's dependencies with its package manager.
  NodePackageInstall(InstallOptions),
}

impl fmt::Display for TaskSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskSpec::NodePackageInstall(_) => f.write_str("install project dependencies"),
    }
  }
}

/// Position of a task in its scheduler's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// FIFO queue of tasks for one pipeline run.
///
/// Scheduling a task equal to one already queued returns the existing id
/// instead of queueing it twice.
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
  queue: Vec<TaskSpec>,
}

impl TaskScheduler {
  pub fn schedule(&mut self, task: TaskSpec) -> TaskId {
    if let Some(pos) = self.queue.iter().position(|t| *t == task) {
      return TaskId(pos);
    }
    self.queue.push(task);
    TaskId(self.queue.len() - 1)
  }

  pub fn len(&self) -> usize {
    self.queue.len()
  }

  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (TaskId, &TaskSpec)> {
    self.queue.iter().enumerate().map(|(i, t)| (TaskId(i), t))
  }
}

/// Runs tasks once the tree has been committed.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
  /// `root` is the committed project directory, when the host has one.
  async fn execute(&self, task: &TaskSpec, root: Option<&Path>) -> Result<(), TaskError>;
}

/// How a task run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus {
  /// Scheduled but not run, as in a dry run.
  Pending,
  Succeeded,
  Failed { error: String },
  /// Not run because an earlier task failed.
  Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRun {
  pub id: TaskId,
  pub task: TaskSpec,
  #[serde(flatten)]
  pub status: TaskStatus,
}

impl TaskRun {
  pub fn is_success(&self) -> bool {
    self.status == TaskStatus::Succeeded
  }
}

/// Run every scheduled task in order. After the first failure the
/// remaining tasks are reported as skipped.
pub async fn run_tasks(scheduler: TaskScheduler, executor: &dyn TaskExecutor, root: Option<&Path>) -> Vec<TaskRun> {
  let mut runs = Vec::with_capacity(scheduler.len());
  let mut failed = false;

  for (index, task) in scheduler.queue.into_iter().enumerate() {
    let id = TaskId(index);

    if failed {
      runs.push(TaskRun {
        id,
        task,
        status: TaskStatus::Skipped,
      });
      continue;
    }

    info!(task = %id, "running {}", task);
    let status = match executor.execute(&task, root).await {
      Ok(()) => TaskStatus::Succeeded,
      Err(e) => {
        warn!(task = %id, error = %e, "task failed");
        failed = true;
        TaskStatus::Failed { error: e.to_string() }
      }
    };
    runs.push(TaskRun { id, task, status });
  }

  runs
}

/// Executor that records tasks instead of running them.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
  executed: Mutex<Vec<TaskSpec>>,
}

impl RecordingExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Tasks seen so far, in execution order.
  pub fn executed(&self) -> Vec<TaskSpec> {
    self.executed.lock().map(|e| e.clone()).unwrap_or_default()
  }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
  async fn execute(&self, task: &TaskSpec, _root: Option<&Path>) -> Result<(), TaskError> {
    if let Ok(mut executed) = self.executed.lock() {
      executed.push(task.clone());
    }
    Ok(())
  }
}
