//! Upstream delegates.
//!
//! A delegate is an independently maintained integration routine, addressed
//! by a `(package, rule)` pair and invoked as an opaque step. Its internal
//! mutations are not inspected: it runs against a staged copy of the tree
//! and only its resulting tree is adopted, and only if it succeeds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::rule::{Outcome, Rule, RuleContext, RuleError};
use crate::tree::Tree;

#[derive(Debug, Error)]
pub enum DelegateError {
  #[error("no delegate registered for {package}:{rule}")]
  NotFound { package: String, rule: String },

  /// The delegate's own error, displayed verbatim.
  #[error("{error}")]
  Failed {
    package: String,
    rule: String,
    error: Box<RuleError>,
  },
}

/// An external integration routine.
#[async_trait]
pub trait Delegate: Send + Sync {
  /// Transform `tree`. `options` are the caller's options, unmodified.
  async fn run(&self, tree: &mut Tree, options: &Value) -> Result<(), RuleError>;
}

/// Delegates addressable by `(package, rule)`.
#[derive(Default, Clone)]
pub struct DelegateRegistry {
  delegates: BTreeMap<(String, String), Arc<dyn Delegate>>,
}

impl fmt::Debug for DelegateRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.names()).finish()
  }
}

impl DelegateRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding the delegates shipped with this crate.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register(
      crate::ssr::SSR_BASE_PACKAGE,
      crate::ssr::SSR_BASE_RULE,
      Arc::new(crate::ssr::SsrBaseDelegate),
    );
    registry
  }

  /// Register a delegate, replacing any previous one for the same pair.
  pub fn register(&mut self, package: impl Into<String>, rule: impl Into<String>, delegate: Arc<dyn Delegate>) {
    self.delegates.insert((package.into(), rule.into()), delegate);
  }

  pub fn get(&self, package: &str, rule: &str) -> Option<Arc<dyn Delegate>> {
    self.delegates.get(&(package.to_string(), rule.to_string())).cloned()
  }

  /// Registered pairs as `package:rule`.
  pub fn names(&self) -> Vec<String> {
    self
      .delegates
      .keys()
      .map(|(package, rule)| format!("{package}:{rule}"))
      .collect()
  }
}

/// Rule that invokes a registered delegate by name.
#[derive(Debug, Clone)]
pub struct ExternalRule {
  package: String,
  rule: String,
  options: Value,
}

impl ExternalRule {
  /// Build the rule, forwarding `options` as-is.
  pub fn new<T: Serialize>(package: impl Into<String>, rule: impl Into<String>, options: &T) -> Result<Self, serde_json::Error> {
    Ok(Self {
      package: package.into(),
      rule: rule.into(),
      options: serde_json::to_value(options)?,
    })
  }

  pub fn options(&self) -> &Value {
    &self.options
  }
}

#[async_trait]
impl Rule for ExternalRule {
  fn name(&self) -> &str {
    &self.rule
  }

  async fn apply(&self, tree: &mut Tree, ctx: &mut RuleContext) -> Result<Outcome, RuleError> {
    let delegate = ctx
      .delegates()
      .get(&self.package, &self.rule)
      .ok_or_else(|| DelegateError::NotFound {
        package: self.package.clone(),
        rule: self.rule.clone(),
      })?;

    info!(package = %self.package, rule = %self.rule, "invoking delegate");

    let mut staged = tree.clone();
    if let Err(error) = delegate.run(&mut staged, &self.options).await {
      warn!(package = %self.package, rule = %self.rule, error = %error, "delegate failed");
      return Err(
        DelegateError::Failed {
          package: self.package.clone(),
          rule: self.rule.clone(),
          error: Box::new(error),
        }
        .into(),
      );
    }

    *tree = staged;
    Ok(Outcome::Done)
  }
}
