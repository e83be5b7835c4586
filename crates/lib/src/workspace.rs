//! Workspace configuration lookup.
//!
//! Resolves a named project inside the workspace configuration file
//! (`angular.json`) and reads the values the pipeline needs from it, such as
//! a target's build output directory.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::consts::WORKSPACE_CONFIG_PATHS;
use crate::tree::{Tree, TreeError, TreePath};

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error("workspace configuration not found (looked for {})", WORKSPACE_CONFIG_PATHS.join(", "))]
  NotFound,

  #[error("{path} is not a valid workspace configuration: {reason}")]
  Invalid { path: TreePath, reason: String },

  #[error("project '{0}' is not defined in this workspace")]
  ProjectNotFound(String),

  #[error("no project given and the workspace has {0} projects and no default project")]
  AmbiguousProject(usize),

  #[error("project '{project}' has no '{target}' target")]
  TargetNotFound { project: String, target: String },

  #[error("project '{project}' target '{target}' does not define an outputPath")]
  OutputPathMissing { project: String, target: String },

  #[error(transparent)]
  Tree(#[from] TreeError),
}

/// Parsed workspace configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
  path: TreePath,
  doc: Map<String, Value>,
}

impl Workspace {
  /// Locate and parse the workspace configuration in `tree`.
  pub fn load(tree: &Tree) -> Result<Self, WorkspaceError> {
    for candidate in WORKSPACE_CONFIG_PATHS {
      let path = TreePath::new(candidate)?;
      let Some(bytes) = tree.read(&path)? else {
        continue;
      };

      let doc = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(doc)) => doc,
        Ok(_) => {
          return Err(WorkspaceError::Invalid {
            path,
            reason: "top-level value is not an object".to_string(),
          });
        }
        Err(e) => {
          return Err(WorkspaceError::Invalid {
            path,
            reason: e.to_string(),
          });
        }
      };

      debug!(path = %path, "loaded workspace configuration");
      return Ok(Self { path, doc });
    }

    Err(WorkspaceError::NotFound)
  }

  pub fn path(&self) -> &TreePath {
    &self.path
  }

  fn projects(&self) -> Option<&Map<String, Value>> {
    self.doc.get("projects")?.as_object()
  }

  /// Names of every project, in document order.
  pub fn project_names(&self) -> Vec<&str> {
    self
      .projects()
      .map(|p| p.keys().map(String::as_str).collect())
      .unwrap_or_default()
  }

  /// Resolve the project to operate on.
  ///
  /// An explicit name must exist. Without one, `defaultProject` is used if
  /// set, otherwise the only project of the workspace.
  pub fn resolve_project(&self, requested: Option<&str>) -> Result<String, WorkspaceError> {
    if let Some(name) = requested {
      self.project(name)?;
      return Ok(name.to_string());
    }

    if let Some(default) = self.doc.get("defaultProject").and_then(Value::as_str) {
      self.project(default)?;
      return Ok(default.to_string());
    }

    match self.project_names().as_slice() {
      [only] => Ok((*only).to_string()),
      names => Err(WorkspaceError::AmbiguousProject(names.len())),
    }
  }

  fn project(&self, name: &str) -> Result<&Map<String, Value>, WorkspaceError> {
    self
      .projects()
      .and_then(|p| p.get(name))
      .and_then(Value::as_object)
      .ok_or_else(|| WorkspaceError::ProjectNotFound(name.to_string()))
  }

  fn target(&self, project: &str, target: &str) -> Result<&Map<String, Value>, WorkspaceError> {
    let def = self.project(project)?;
    def
      .get("architect")
      .or_else(|| def.get("targets"))
      .and_then(|targets| targets.get(target))
      .and_then(Value::as_object)
      .ok_or_else(|| WorkspaceError::TargetNotFound {
        project: project.to_string(),
        target: target.to_string(),
      })
  }

  /// Output directory of `project`'s `target`.
  ///
  /// Accepts both the plain string form of `outputPath` and the object form
  /// `{ "base": ..., "browser": ... }`, where `browser` defaults to
  /// `browser` and an empty `browser` means the base directory itself.
  pub fn output_path(&self, project: &str, target: &str) -> Result<String, WorkspaceError> {
    let missing = || WorkspaceError::OutputPathMissing {
      project: project.to_string(),
      target: target.to_string(),
    };

    let output = self
      .target(project, target)?
      .get("options")
      .and_then(|o| o.get("outputPath"))
      .ok_or_else(missing)?;

    match output {
      Value::String(path) => Ok(path.clone()),
      Value::Object(parts) => {
        let base = parts.get("base").and_then(Value::as_str).ok_or_else(missing)?;
        let browser = parts.get("browser").and_then(Value::as_str).unwrap_or("browser");
        if browser.is_empty() {
          Ok(base.to_string())
        } else {
          Ok(format!("{}/{}", base.trim_end_matches('/'), browser))
        }
      }
      _ => Err(missing()),
    }
  }

  /// Value of `options.<key>` on a project's target, if set.
  pub fn target_option(&self, project: &str, target: &str, key: &str) -> Result<Option<&Value>, WorkspaceError> {
    Ok(self.target(project, target)?.get("options").and_then(|o| o.get(key)))
  }

  /// Source directory of a project (`sourceRoot`, else `<root>/src`).
  pub fn source_root(&self, project: &str) -> Result<String, WorkspaceError> {
    let def = self.project(project)?;
    if let Some(source_root) = def.get("sourceRoot").and_then(Value::as_str) {
      return Ok(source_root.to_string());
    }
    let root = def.get("root").and_then(Value::as_str).unwrap_or("");
    Ok(if root.is_empty() {
      "src".to_string()
    } else {
      format!("{}/src", root.trim_end_matches('/'))
    })
  }

  /// Set `options.<key>` on a project's target.
  pub fn set_target_option(&mut self, project: &str, target: &str, key: &str, value: Value) -> Result<(), WorkspaceError> {
    // Validate through the read path first so errors match lookups.
    self.target(project, target)?;

    let targets_key = if self.project(project)?.contains_key("architect") {
      "architect"
    } else {
      "targets"
    };

    let options = self
      .doc
      .get_mut("projects")
      .and_then(|p| p.get_mut(project))
      .and_then(|p| p.get_mut(targets_key))
      .and_then(|t| t.get_mut(target))
      .and_then(Value::as_object_mut)
      .map(|t| t.entry("options").or_insert_with(|| Value::Object(Map::new())))
      .and_then(Value::as_object_mut)
      .ok_or_else(|| WorkspaceError::Invalid {
        path: self.path.clone(),
        reason: format!("'{project}.{target}.options' is not an object"),
      })?;

    options.insert(key.to_string(), value);
    Ok(())
  }

  /// Write the configuration back to the tree.
  pub fn write(&self, tree: &mut Tree) -> Result<(), WorkspaceError> {
    let mut bytes = serde_json::to_vec_pretty(&self.doc).map_err(|e| WorkspaceError::Invalid {
      path: self.path.clone(),
      reason: e.to_string(),
    })?;
    bytes.push(b'\n');
    tree.write(&self.path, bytes)?;
    Ok(())
  }
}
