//! Virtual project tree.
//!
//! A [`Tree`] is a copy-on-write overlay on top of a [`Host`]. Rules mutate
//! the overlay only; persistent storage is touched once, by [`Tree::commit`],
//! after every rule succeeded. Dropping a tree discards its changes.
//!
//! Reads of the host are memoized, so every rule in one run observes the
//! same snapshot of a file regardless of when it first asked for it.

mod host;
mod path;

pub use host::{FsHost, Host, HostError, MemoryHost};
pub use path::TreePath;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from virtual tree operations.
#[derive(Debug, Error)]
pub enum TreeError {
  #[error("invalid path: '{0}'")]
  InvalidPath(String),

  #[error("path already exists: {0}")]
  AlreadyExists(TreePath),

  #[error("path does not exist: {0}")]
  NotFound(TreePath),

  #[error("file is not valid UTF-8: {0}")]
  NotUtf8(TreePath),

  #[error(transparent)]
  Host(#[from] HostError),
}

/// What a committed action does to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
  Create,
  Overwrite,
  Delete,
}

/// A single change a tree would apply to its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
  pub path: TreePath,
  pub kind: ActionKind,
  /// New content; `None` for deletions.
  #[serde(skip)]
  pub content: Option<Vec<u8>>,
}

type Snapshot = Arc<Mutex<BTreeMap<TreePath, Option<Vec<u8>>>>>;

/// Copy-on-write view of a project.
#[derive(Debug, Clone)]
pub struct Tree {
  host: Arc<dyn Host>,
  snapshot: Snapshot,
  /// `Some` is a pending write, `None` a pending delete.
  overlay: BTreeMap<TreePath, Option<Vec<u8>>>,
}

impl Tree {
  /// Start a new tree over `host` with no pending changes.
  pub fn new(host: Arc<dyn Host>) -> Self {
    Self {
      host,
      snapshot: Arc::default(),
      overlay: BTreeMap::new(),
    }
  }

  pub fn host(&self) -> &Arc<dyn Host> {
    &self.host
  }

  fn base(&self, path: &TreePath) -> Result<Option<Vec<u8>>, TreeError> {
    if let Ok(snapshot) = self.snapshot.lock()
      && let Some(cached) = snapshot.get(path)
    {
      return Ok(cached.clone());
    }

    let content = self.host.read(path)?;
    if let Ok(mut snapshot) = self.snapshot.lock() {
      snapshot.entry(path.clone()).or_insert_with(|| content.clone());
    }
    Ok(content)
  }

  fn current(&self, path: &TreePath) -> Result<Option<Vec<u8>>, TreeError> {
    match self.overlay.get(path) {
      Some(entry) => Ok(entry.clone()),
      None => self.base(path),
    }
  }

  pub fn exists(&self, path: impl AsRef<str>) -> Result<bool, TreeError> {
    let path = TreePath::new(path.as_ref())?;
    Ok(self.current(&path)?.is_some())
  }

  pub fn read(&self, path: impl AsRef<str>) -> Result<Option<Vec<u8>>, TreeError> {
    let path = TreePath::new(path.as_ref())?;
    self.current(&path)
  }

  pub fn read_to_string(&self, path: impl AsRef<str>) -> Result<Option<String>, TreeError> {
    let path = TreePath::new(path.as_ref())?;
    match self.current(&path)? {
      Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| TreeError::NotUtf8(path)),
      None => Ok(None),
    }
  }

  /// Create a file that must not exist yet.
  pub fn create(&mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Result<(), TreeError> {
    let path = TreePath::new(path.as_ref())?;
    if self.current(&path)?.is_some() {
      return Err(TreeError::AlreadyExists(path));
    }
    debug!(path = %path, "create");
    self.overlay.insert(path, Some(content.into()));
    Ok(())
  }

  /// Replace the content of a file that must already exist.
  pub fn overwrite(&mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Result<(), TreeError> {
    let path = TreePath::new(path.as_ref())?;
    if self.current(&path)?.is_none() {
      return Err(TreeError::NotFound(path));
    }
    debug!(path = %path, "overwrite");
    self.overlay.insert(path, Some(content.into()));
    Ok(())
  }

  /// Create or overwrite.
  pub fn write(&mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Result<(), TreeError> {
    let path = TreePath::new(path.as_ref())?;
    self.overlay.insert(path, Some(content.into()));
    Ok(())
  }

  pub fn delete(&mut self, path: impl AsRef<str>) -> Result<(), TreeError> {
    let path = TreePath::new(path.as_ref())?;
    if self.current(&path)?.is_none() {
      return Err(TreeError::NotFound(path));
    }
    debug!(path = %path, "delete");
    self.overlay.insert(path, None);
    Ok(())
  }

  /// Paths touched by pending changes, in order.
  pub fn touched(&self) -> impl Iterator<Item = &TreePath> {
    self.overlay.keys()
  }

  /// The actions a commit would apply, ordered by path.
  ///
  /// Writes whose bytes equal the snapshot and deletes of files the host
  /// never had are dropped.
  pub fn actions(&self) -> Result<Vec<Action>, TreeError> {
    let mut actions = Vec::new();

    for (path, entry) in &self.overlay {
      let base = self.base(path)?;
      let action = match (entry, base) {
        (Some(content), None) => Some(Action {
          path: path.clone(),
          kind: ActionKind::Create,
          content: Some(content.clone()),
        }),
        (Some(content), Some(existing)) if *content == existing => None,
        (Some(content), Some(_)) => Some(Action {
          path: path.clone(),
          kind: ActionKind::Overwrite,
          content: Some(content.clone()),
        }),
        (None, Some(_)) => Some(Action {
          path: path.clone(),
          kind: ActionKind::Delete,
          content: None,
        }),
        (None, None) => None,
      };
      actions.extend(action);
    }

    Ok(actions)
  }

  /// Write every pending change to the host in one batch.
  ///
  /// Consumes the tree: a tree is committed at most once.
  pub fn commit(self) -> Result<Vec<Action>, TreeError> {
    let actions = self.actions()?;
    if actions.is_empty() {
      info!("nothing to commit");
      return Ok(actions);
    }
    self.host.commit(&actions)?;
    info!(actions = actions.len(), "tree committed");
    Ok(actions)
  }
}
