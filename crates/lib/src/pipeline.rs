//! The pipeline driver.
//!
//! Applies a sequence of rules to a fresh [`Tree`] over a host. Any rule
//! failure aborts the run before anything is committed and drops every
//! scheduled task. On success the tree is committed and the scheduled tasks
//! run in order.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::delegate::DelegateRegistry;
use crate::rule::{Rule, RuleContext, RuleError, run_rule};
use crate::tasks::{TaskExecutor, TaskRun, TaskStatus, run_tasks};
use crate::tree::{Action, ActionKind, Host, Tree, TreeError};

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("{rule}: {source}")]
  Rule {
    rule: String,
    #[source]
    source: RuleError,
  },

  #[error("failed to commit changes: {0}")]
  Commit(#[from] TreeError),
}

/// Options for [`Pipeline::run`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  /// Compute the changes without committing them or running tasks.
  pub dry_run: bool,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
  /// Changes applied, or that would be applied in a dry run.
  pub actions: Vec<Action>,
  pub tasks: Vec<TaskRun>,
  pub committed: bool,
}

impl PipelineReport {
  /// Number of actions of the given kind.
  pub fn count(&self, kind: ActionKind) -> usize {
    self.actions.iter().filter(|a| a.kind == kind).count()
  }

  /// True when no task failed.
  pub fn tasks_succeeded(&self) -> bool {
    !self
      .tasks
      .iter()
      .any(|t| matches!(t.status, TaskStatus::Failed { .. }))
  }
}

/// An ordered list of rules applied as one transaction.
pub struct Pipeline {
  rules: Vec<Box<dyn Rule>>,
  delegates: Arc<DelegateRegistry>,
}

impl fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipeline")
      .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
      .field("delegates", &self.delegates)
      .finish()
  }
}

impl Default for Pipeline {
  fn default() -> Self {
    Self::new()
  }
}

impl Pipeline {
  /// An empty pipeline with the built-in delegates registered.
  pub fn new() -> Self {
    Self {
      rules: Vec::new(),
      delegates: Arc::new(DelegateRegistry::with_builtins()),
    }
  }

  /// Replace the delegate registry.
  pub fn with_delegates(mut self, delegates: DelegateRegistry) -> Self {
    self.delegates = Arc::new(delegates);
    self
  }

  /// Append a rule.
  pub fn rule(mut self, rule: impl Rule + 'static) -> Self {
    self.rules.push(Box::new(rule));
    self
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  /// Apply every rule, then commit and run the scheduled tasks.
  pub async fn run(
    &self,
    host: Arc<dyn Host>,
    executor: &dyn TaskExecutor,
    options: &RunOptions,
  ) -> Result<PipelineReport, PipelineError> {
    let root = host.root().map(Path::to_path_buf);
    let mut tree = Tree::new(host);
    let mut ctx = RuleContext::new(self.delegates.clone());

    info!(rules = self.rules.len(), dry_run = options.dry_run, "running pipeline");

    for rule in &self.rules {
      if let Err(source) = run_rule(rule.as_ref(), &mut tree, &mut ctx).await {
        warn!(rule = rule.name(), error = %source, "rule failed; nothing committed");
        return Err(PipelineError::Rule {
          rule: rule.name().to_string(),
          source,
        });
      }
    }

    let scheduled = ctx.into_tasks();

    if options.dry_run {
      let actions = tree.actions()?;
      info!(actions = actions.len(), tasks = scheduled.len(), "dry run complete");
      let tasks = scheduled
        .iter()
        .map(|(id, task)| TaskRun {
          id,
          task: task.clone(),
          status: TaskStatus::Pending,
        })
        .collect();
      return Ok(PipelineReport {
        actions,
        tasks,
        committed: false,
      });
    }

    let actions = tree.commit()?;
    let tasks = run_tasks(scheduled, executor, root.as_deref()).await;

    info!(actions = actions.len(), tasks = tasks.len(), "pipeline complete");
    Ok(PipelineReport {
      actions,
      tasks,
      committed: true,
    })
  }
}
