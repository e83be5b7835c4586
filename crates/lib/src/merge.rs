//! Merge stage: applies rendered template output onto a tree.
//!
//! Conflict policy: a path that does not exist is created; a path that
//! already exists is overwritten with the rendered content. Re-running a
//! merge therefore reproduces the same files instead of failing. Hand edits
//! made to a generated file since a previous run are replaced.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::rule::{Outcome, Rule, RuleContext, RuleError};
use crate::template::{FileEntry, TemplateSet, VarContext};
use crate::tree::{Tree, TreeError, TreePath};

/// Which paths a merge created and which it replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
  pub created: Vec<TreePath>,
  pub overwritten: Vec<TreePath>,
}

/// Apply entries to the tree under the create-or-overwrite policy.
///
/// Each path is resolved independently, so the order of `entries` does not
/// affect the resulting tree.
pub fn merge_entries<I>(tree: &mut Tree, entries: I) -> Result<MergeSummary, TreeError>
where
  I: IntoIterator<Item = FileEntry>,
{
  let mut summary = MergeSummary::default();

  for entry in entries {
    if tree.exists(&entry.path)? {
      debug!(path = %entry.path, "overwriting existing file");
      tree.overwrite(&entry.path, entry.content)?;
      summary.overwritten.push(entry.path);
    } else {
      tree.create(&entry.path, entry.content)?;
      summary.created.push(entry.path);
    }
  }

  Ok(summary)
}

/// Rule that renders a template set and merges the output.
///
/// The context is produced lazily from the tree the rule runs against, so
/// values resolved from project configuration reflect earlier rules.
pub struct MergeTemplates<F> {
  name: String,
  templates: TemplateSet,
  context: F,
}

impl<F> MergeTemplates<F>
where
  F: Fn(&Tree) -> Result<VarContext, RuleError> + Send + Sync,
{
  pub fn new(name: impl Into<String>, templates: TemplateSet, context: F) -> Self {
    Self {
      name: name.into(),
      templates,
      context,
    }
  }
}

#[async_trait]
impl<F> Rule for MergeTemplates<F>
where
  F: Fn(&Tree) -> Result<VarContext, RuleError> + Send + Sync,
{
  fn name(&self) -> &str {
    &self.name
  }

  async fn apply(&self, tree: &mut Tree, _ctx: &mut RuleContext) -> Result<Outcome, RuleError> {
    let context = (self.context)(tree)?;
    // Render everything before touching the tree.
    let entries = self.templates.render(&context)?;
    let summary = merge_entries(tree, entries)?;

    info!(
      created = summary.created.len(),
      overwritten = summary.overwritten.len(),
      "templates merged"
    );
    Ok(Outcome::Done)
  }
}
