use std::fmt;

use serde::{Deserialize, Serialize};

/// Dependency groups of a package manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
  /// `dependencies`
  Default,
  /// `devDependencies`
  Dev,
  /// `peerDependencies`
  Peer,
  /// `optionalDependencies`
  Optional,
}

impl DependencyKind {
  /// Key of the group in the manifest document.
  pub fn key(self) -> &'static str {
    match self {
      DependencyKind::Default => "dependencies",
      DependencyKind::Dev => "devDependencies",
      DependencyKind::Peer => "peerDependencies",
      DependencyKind::Optional => "optionalDependencies",
    }
  }
}

impl fmt::Display for DependencyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.key())
  }
}

/// A dependency declaration to add to a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDependency {
  pub kind: DependencyKind,
  pub name: String,
  /// Version range, e.g. `^10.0.0`.
  pub version: String,
}

impl NodeDependency {
  pub fn new(kind: DependencyKind, name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      kind,
      name: name.into(),
      version: version.into(),
    }
  }
}
