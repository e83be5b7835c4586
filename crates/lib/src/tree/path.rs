//! Normalized, root-anchored paths inside a virtual tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TreeError;

/// A normalized path relative to the project root, always rendered with a
/// leading `/` (e.g. `/src/main.ts`).
///
/// Normalization:
/// - `\` is treated as a separator
/// - empty and `.` segments are dropped
/// - `..` pops the previous segment; popping past the root is an error
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath(String);

impl TreePath {
  /// Parse and normalize a path.
  pub fn new(raw: &str) -> Result<Self, TreeError> {
    let mut segments: Vec<&str> = Vec::new();

    for segment in raw.split(['/', '\\']) {
      match segment {
        "" | "." => {}
        ".." => {
          if segments.pop().is_none() {
            return Err(TreeError::InvalidPath(raw.to_string()));
          }
        }
        s => segments.push(s),
      }
    }

    if segments.is_empty() {
      return Err(TreeError::InvalidPath(raw.to_string()));
    }

    Ok(Self(format!("/{}", segments.join("/"))))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The path without its leading `/`, suitable for joining onto a directory.
  pub fn relative(&self) -> &str {
    &self.0[1..]
  }

  /// Final segment of the path.
  pub fn file_name(&self) -> &str {
    self.0.rsplit('/').next().unwrap_or_default()
  }

  /// Join a relative path onto this one.
  pub fn join(&self, child: &str) -> Result<Self, TreeError> {
    Self::new(&format!("{}/{}", self.0, child))
  }
}

impl fmt::Display for TreePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for TreePath {
  type Error = TreeError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::new(&value)
  }
}

impl From<TreePath> for String {
  fn from(value: TreePath) -> Self {
    value.0
  }
}

impl AsRef<str> for TreePath {
  fn as_ref(&self) -> &str {
    &self.0
  }
}
