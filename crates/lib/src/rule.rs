//! Composable tree transformations.
//!
//! A [`Rule`] mutates a [`Tree`] and either finishes or hands back a further
//! rule to apply before the next rule in sequence runs. Rules run strictly
//! one after another; a rule always observes every effect of the rules
//! before it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::delegate::{DelegateError, DelegateRegistry};
use crate::manifest::ManifestError;
use crate::tasks::{TaskId, TaskScheduler, TaskSpec};
use crate::template::TemplateError;
use crate::tree::{Tree, TreeError};
use crate::workspace::WorkspaceError;

/// Errors a rule can fail with. Every variant aborts the pipeline run.
#[derive(Debug, Error)]
pub enum RuleError {
  /// The target project or its configuration could not be resolved.
  #[error("configuration error: {0}")]
  Config(#[from] WorkspaceError),

  /// The dependency manifest is missing or corrupt.
  #[error("manifest error: {0}")]
  Manifest(#[from] ManifestError),

  /// A template could not be read or expanded.
  #[error("template error: {0}")]
  Template(#[from] TemplateError),

  /// The upstream delegate failed.
  #[error(transparent)]
  Delegate(#[from] DelegateError),

  #[error(transparent)]
  Tree(#[from] TreeError),

  /// Options could not be serialized for forwarding.
  #[error("invalid options: {0}")]
  Options(#[from] serde_json::Error),

  /// Failure raised by a custom rule.
  #[error("rule '{rule}' failed: {message}")]
  Failed { rule: String, message: String },
}

/// What a rule asks the driver to do next.
pub enum Outcome {
  /// The rule is complete.
  Done,

  /// Apply this rule to the resulting tree before moving on.
  Then(Box<dyn Rule>),
}

impl std::fmt::Debug for Outcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Outcome::Done => f.write_str("Done"),
      Outcome::Then(rule) => write!(f, "Then({})", rule.name()),
    }
  }
}

/// State shared by the rules of one pipeline run.
#[derive(Debug, Default)]
pub struct RuleContext {
  tasks: TaskScheduler,
  delegates: Arc<DelegateRegistry>,
}

impl RuleContext {
  pub fn new(delegates: Arc<DelegateRegistry>) -> Self {
    Self {
      tasks: TaskScheduler::default(),
      delegates,
    }
  }

  /// Queue a task to run after the tree is committed.
  pub fn schedule(&mut self, task: TaskSpec) -> TaskId {
    self.tasks.schedule(task)
  }

  pub fn tasks(&self) -> &TaskScheduler {
    &self.tasks
  }

  pub fn delegates(&self) -> &DelegateRegistry {
    &self.delegates
  }

  pub(crate) fn into_tasks(self) -> TaskScheduler {
    self.tasks
  }
}

/// A transformation of the virtual tree.
#[async_trait]
pub trait Rule: Send + Sync {
  /// Short name used in logs.
  fn name(&self) -> &str;

  async fn apply(&self, tree: &mut Tree, ctx: &mut RuleContext) -> Result<Outcome, RuleError>;
}

/// Apply a rule and every rule it hands back, in order.
pub async fn run_rule(rule: &dyn Rule, tree: &mut Tree, ctx: &mut RuleContext) -> Result<(), RuleError> {
  debug!(rule = rule.name(), "applying rule");
  let mut next = rule.apply(tree, ctx).await?;

  while let Outcome::Then(follow) = next {
    debug!(rule = follow.name(), "applying returned rule");
    next = follow.apply(tree, ctx).await?;
  }

  Ok(())
}

/// Rules applied in sequence, each against the result of the previous one.
pub struct Chain {
  name: String,
  rules: Vec<Box<dyn Rule>>,
}

impl Chain {
  pub fn new(name: impl Into<String>, rules: Vec<Box<dyn Rule>>) -> Self {
    Self {
      name: name.into(),
      rules,
    }
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }
}

#[async_trait]
impl Rule for Chain {
  fn name(&self) -> &str {
    &self.name
  }

  async fn apply(&self, tree: &mut Tree, ctx: &mut RuleContext) -> Result<Outcome, RuleError> {
    for rule in &self.rules {
      run_rule(rule.as_ref(), tree, ctx).await?;
    }
    Ok(Outcome::Done)
  }
}

/// A rule backed by a synchronous closure.
pub struct FnRule<F> {
  name: String,
  f: F,
}

/// Wrap a closure as a [`Rule`].
pub fn rule_fn<F>(name: impl Into<String>, f: F) -> FnRule<F>
where
  F: Fn(&mut Tree, &mut RuleContext) -> Result<(), RuleError> + Send + Sync,
{
  FnRule { name: name.into(), f }
}

#[async_trait]
impl<F> Rule for FnRule<F>
where
  F: Fn(&mut Tree, &mut RuleContext) -> Result<(), RuleError> + Send + Sync,
{
  fn name(&self) -> &str {
    &self.name
  }

  async fn apply(&self, tree: &mut Tree, ctx: &mut RuleContext) -> Result<Outcome, RuleError> {
    (self.f)(tree, ctx)?;
    Ok(Outcome::Done)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tree::MemoryHost;

  fn empty_tree() -> Tree {
    Tree::new(Arc::new(MemoryHost::new()))
  }

  fn append(path: &'static str, text: &'static str) -> Box<dyn Rule> {
    Box::new(rule_fn(format!("append {text}"), move |tree: &mut Tree, _: &mut RuleContext| {
      let mut current = tree.read_to_string(path)?.unwrap_or_default();
      current.push_str(text);
      tree.write(path, current)?;
      Ok(())
    }))
  }

  struct Then {
    next: std::sync::Mutex<Option<Box<dyn Rule>>>,
  }

  #[async_trait]
  impl Rule for Then {
    fn name(&self) -> &str {
      "then"
    }

    async fn apply(&self, tree: &mut Tree, _ctx: &mut RuleContext) -> Result<Outcome, RuleError> {
      tree.write("/log", "then;")?;
      let next = self.next.lock().unwrap().take();
      Ok(next.map(Outcome::Then).unwrap_or(Outcome::Done))
    }
  }

  #[tokio::test]
  async fn chain_threads_tree_in_order() {
    let chain = Chain::new("abc", vec![append("/log", "a"), append("/log", "b"), append("/log", "c")]);
    let mut tree = empty_tree();
    let mut ctx = RuleContext::default();

    run_rule(&chain, &mut tree, &mut ctx).await.unwrap();
    assert_eq!(tree.read_to_string("/log").unwrap().as_deref(), Some("abc"));
  }

  #[tokio::test]
  async fn chains_compose_associatively() {
    let left = Chain::new(
      "left",
      vec![
        Box::new(Chain::new("ab", vec![append("/log", "a"), append("/log", "b")])),
        append("/log", "c"),
      ],
    );
    let right = Chain::new(
      "right",
      vec![
        append("/log", "a"),
        Box::new(Chain::new("bc", vec![append("/log", "b"), append("/log", "c")])),
      ],
    );

    let mut l = empty_tree();
    let mut r = empty_tree();
    run_rule(&left, &mut l, &mut RuleContext::default()).await.unwrap();
    run_rule(&right, &mut r, &mut RuleContext::default()).await.unwrap();

    assert_eq!(l.actions().unwrap(), r.actions().unwrap());
  }

  #[tokio::test]
  async fn returned_rule_runs_before_next_in_chain() {
    let then = Then {
      next: std::sync::Mutex::new(Some(append("/log", "inner;"))),
    };
    let chain = Chain::new("outer", vec![Box::new(then), append("/log", "after;")]);
    let mut tree = empty_tree();

    run_rule(&chain, &mut tree, &mut RuleContext::default()).await.unwrap();
    assert_eq!(
      tree.read_to_string("/log").unwrap().as_deref(),
      Some("then;inner;after;")
    );
  }

  #[tokio::test]
  async fn failure_stops_the_chain() {
    let fail: Box<dyn Rule> = Box::new(rule_fn("fail", |_: &mut Tree, _: &mut RuleContext| {
      Err(RuleError::Failed {
        rule: "fail".to_string(),
        message: "boom".to_string(),
      })
    }));
    let chain = Chain::new("x", vec![append("/log", "a"), fail, append("/log", "b")]);
    let mut tree = empty_tree();

    let err = run_rule(&chain, &mut tree, &mut RuleContext::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "rule 'fail' failed: boom");
    assert_eq!(tree.read_to_string("/log").unwrap().as_deref(), Some("a"));
  }
}
