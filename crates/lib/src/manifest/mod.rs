//! Package manifest mutation.
//!
//! The manifest is a JSON document (`/package.json`) read from and written
//! back to the virtual tree; nothing here touches the disk. Key order is
//! preserved, so unrelated entries keep their positions, and serialization is
//! deterministic: the same logical document always yields the same bytes.

mod types;

pub use types::*;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::consts::MANIFEST_PATH;
use crate::tree::{Tree, TreeError, TreePath};

/// Key of the named script group.
const SCRIPTS_KEY: &str = "scripts";

/// Errors from reading or mutating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("could not find {0}")]
  Missing(TreePath),

  #[error("{path} is corrupt: {reason}")]
  Corrupt { path: TreePath, reason: String },

  #[error("failed to serialize {path}: {source}")]
  Serialize {
    path: TreePath,
    #[source]
    source: serde_json::Error,
  },

  #[error(transparent)]
  Tree(#[from] TreeError),
}

/// A parsed package manifest bound to its path in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
  path: TreePath,
  doc: Map<String, Value>,
}

impl PackageManifest {
  /// Parse the manifest at `path`.
  ///
  /// # Errors
  ///
  /// - [`ManifestError::Missing`] if the file does not exist
  /// - [`ManifestError::Corrupt`] if it is not a JSON object
  pub fn read(tree: &Tree, path: &str) -> Result<Self, ManifestError> {
    let path = TreePath::new(path)?;
    let bytes = tree.read(&path)?.ok_or_else(|| ManifestError::Missing(path.clone()))?;

    let value: Value = serde_json::from_slice(&bytes).map_err(|e| ManifestError::Corrupt {
      path: path.clone(),
      reason: e.to_string(),
    })?;

    match value {
      Value::Object(doc) => Ok(Self { path, doc }),
      _ => Err(ManifestError::Corrupt {
        path,
        reason: "top-level value is not an object".to_string(),
      }),
    }
  }

  pub fn path(&self) -> &TreePath {
    &self.path
  }

  fn group_mut(&mut self, key: &str) -> Result<&mut Map<String, Value>, ManifestError> {
    let path = self.path.clone();
    let group = self
      .doc
      .entry(key.to_string())
      .or_insert_with(|| Value::Object(Map::new()));

    group.as_object_mut().ok_or_else(|| ManifestError::Corrupt {
      path,
      reason: format!("'{key}' is not an object"),
    })
  }

  /// Add `name@version` to the group `kind`.
  ///
  /// An existing entry keeps its position and gets the new version. A new
  /// entry is inserted before the first entry that sorts after it. A missing
  /// group is appended to the document.
  pub fn add_dependency(&mut self, kind: DependencyKind, name: &str, version: &str) -> Result<(), ManifestError> {
    let group = self.group_mut(kind.key())?;
    let value = Value::String(version.to_string());

    if group.contains_key(name) {
      group.insert(name.to_string(), value);
    } else {
      let index = group.keys().position(|k| k.as_str() > name).unwrap_or(group.len());
      let mut entries: Vec<(String, Value)> = std::mem::take(group).into_iter().collect();
      entries.insert(index, (name.to_string(), value));
      *group = entries.into_iter().collect();
    }

    debug!(kind = %kind, name, version, "dependency set");
    Ok(())
  }

  /// Set a named script. Existing scripts keep their positions; new ones are appended.
  pub fn add_script(&mut self, name: &str, command: &str) -> Result<(), ManifestError> {
    let scripts = self.group_mut(SCRIPTS_KEY)?;
    scripts.insert(name.to_string(), Value::String(command.to_string()));
    debug!(name, command, "script set");
    Ok(())
  }

  /// Version range of a dependency, if declared.
  pub fn dependency(&self, kind: DependencyKind, name: &str) -> Option<&str> {
    self.doc.get(kind.key())?.get(name)?.as_str()
  }

  /// Command of a named script, if declared.
  pub fn script(&self, name: &str) -> Option<&str> {
    self.doc.get(SCRIPTS_KEY)?.get(name)?.as_str()
  }

  /// The document as a JSON value.
  pub fn as_value(&self) -> Value {
    Value::Object(self.doc.clone())
  }

  /// Serialize with two-space indentation and a trailing newline.
  pub fn to_bytes(&self) -> Result<Vec<u8>, ManifestError> {
    let mut bytes = serde_json::to_vec_pretty(&self.doc).map_err(|source| ManifestError::Serialize {
      path: self.path.clone(),
      source,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
  }

  /// Write the manifest back to its path in the tree.
  pub fn write(&self, tree: &mut Tree) -> Result<(), ManifestError> {
    tree.write(&self.path, self.to_bytes()?)?;
    Ok(())
  }
}

/// Read-modify-write a single dependency in `/package.json`.
pub fn add_package_json_dependency(tree: &mut Tree, dependency: &NodeDependency) -> Result<(), ManifestError> {
  let mut manifest = PackageManifest::read(tree, MANIFEST_PATH)?;
  manifest.add_dependency(dependency.kind, &dependency.name, &dependency.version)?;
  manifest.write(tree)
}

/// Read-modify-write a single script in `/package.json`.
pub fn add_package_json_script(tree: &mut Tree, name: &str, command: &str) -> Result<(), ManifestError> {
  let mut manifest = PackageManifest::read(tree, MANIFEST_PATH)?;
  manifest.add_script(name, command)?;
  manifest.write(tree)
}
