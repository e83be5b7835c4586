//! Variable context for template expansion.

use std::collections::BTreeMap;

use serde::Serialize;

/// Immutable mapping from template variable name to its resolved value.
///
/// Built once per pipeline run with [`VarContext::builder`]; there are no
/// mutators after [`VarContextBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VarContext {
  vars: BTreeMap<String, String>,
}

impl VarContext {
  pub fn builder() -> VarContextBuilder {
    VarContextBuilder::default()
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.vars.get(name).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

#[derive(Debug, Default)]
pub struct VarContextBuilder {
  vars: BTreeMap<String, String>,
}

impl VarContextBuilder {
  /// Set a variable, replacing any earlier value.
  pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.vars.insert(name.into(), value.into());
    self
  }

  /// Spread the top-level scalar fields of a serializable options struct
  /// into the context. Strings are taken as-is, numbers and booleans use
  /// their JSON rendering; nulls, arrays and objects are skipped.
  pub fn options<T: Serialize>(mut self, options: &T) -> Result<Self, serde_json::Error> {
    if let serde_json::Value::Object(map) = serde_json::to_value(options)? {
      for (key, value) in map {
        let rendered = match value {
          serde_json::Value::String(s) => s,
          serde_json::Value::Bool(b) => b.to_string(),
          serde_json::Value::Number(n) => n.to_string(),
          _ => continue,
        };
        self.vars.insert(key, rendered);
      }
    }
    Ok(self)
  }

  pub fn build(self) -> VarContext {
    VarContext { vars: self.vars }
  }
}
