//! Persistent storage behind a virtual tree.
//!
//! A [`Host`] is only read lazily while rules run and is written exactly once,
//! when the pipeline commits.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::path::TreePath;
use super::{Action, ActionKind};

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum HostError {
  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to write {}: {source}", path.display())]
  Write { path: PathBuf, source: io::Error },

  #[error("failed to delete {}: {source}", path.display())]
  Delete { path: PathBuf, source: io::Error },

  #[error("project root not found: {}", .0.display())]
  RootNotFound(PathBuf),
}

/// Storage a [`Tree`](super::Tree) snapshots from and commits to.
pub trait Host: Send + Sync + fmt::Debug {
  /// Read a file, returning `None` when it does not exist.
  fn read(&self, path: &TreePath) -> Result<Option<Vec<u8>>, HostError>;

  /// Apply a batch of actions.
  fn commit(&self, actions: &[Action]) -> Result<(), HostError>;

  /// On-disk root, when the host is backed by a directory.
  fn root(&self) -> Option<&Path> {
    None
  }
}

/// A project directory on disk.
#[derive(Debug, Clone)]
pub struct FsHost {
  root: PathBuf,
}

impl FsHost {
  /// Open a project directory. The path is canonicalized.
  pub fn open(root: impl AsRef<Path>) -> Result<Self, HostError> {
    let root = root.as_ref();
    if !root.is_dir() {
      return Err(HostError::RootNotFound(root.to_path_buf()));
    }
    let root = dunce::canonicalize(root).map_err(|source| HostError::Read {
      path: root.to_path_buf(),
      source,
    })?;
    Ok(Self { root })
  }

  fn resolve(&self, path: &TreePath) -> PathBuf {
    self.root.join(path.relative())
  }
}

impl Host for FsHost {
  fn read(&self, path: &TreePath) -> Result<Option<Vec<u8>>, HostError> {
    let full = self.resolve(path);
    match fs::read(&full) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(source) => Err(HostError::Read { path: full, source }),
    }
  }

  /// Stage every write as a temp file next to its target and copy every
  /// file about to be replaced or deleted aside, then apply the actions in
  /// order.
  ///
  /// If staging fails, the temp files and any directories created for them
  /// are removed and no target is touched. If applying an action fails, the
  /// actions already applied are undone from their backups.
  fn commit(&self, actions: &[Action]) -> Result<(), HostError> {
    let mut created_dirs = Vec::new();
    let staged = match self.stage(actions, &mut created_dirs) {
      Ok(staged) => staged,
      Err(e) => {
        remove_created_dirs(&created_dirs);
        return Err(e);
      }
    };

    debug!(staged = staged.len(), root = %self.root.display(), "staged commit");

    let mut applied: Vec<(PathBuf, Option<NamedTempFile>)> = Vec::with_capacity(staged.len());
    let mut pending = staged.into_iter();
    while let Some(Staged { target, content, backup }) = pending.next() {
      if let Err(e) = apply_staged(&target, content) {
        warn!(path = %target.display(), applied = applied.len(), "commit failed; rolling back");
        drop(pending);
        roll_back(applied);
        remove_created_dirs(&created_dirs);
        return Err(e);
      }
      applied.push((target, backup));
    }

    Ok(())
  }

  fn root(&self) -> Option<&Path> {
    Some(&self.root)
  }
}

/// One target of a commit, prepared next to its final location.
struct Staged {
  target: PathBuf,
  /// New content, `None` for a deletion.
  content: Option<NamedTempFile>,
  /// Copy of the file being replaced or deleted.
  backup: Option<NamedTempFile>,
}

impl FsHost {
  fn stage(&self, actions: &[Action], created_dirs: &mut Vec<PathBuf>) -> Result<Vec<Staged>, HostError> {
    let mut staged = Vec::with_capacity(actions.len());

    for action in actions {
      let target = self.resolve(&action.path);
      let parent = target.parent().unwrap_or(&self.root).to_path_buf();
      let backup = back_up(&target, &parent)?;

      let content = match action.content.as_deref() {
        Some(content) => {
          if let Some(top) = first_missing_dir(&self.root, &parent) {
            created_dirs.push(top);
          }
          fs::create_dir_all(&parent).map_err(|source| HostError::Write {
            path: parent.clone(),
            source,
          })?;
          Some(stage_content(&target, &parent, content)?)
        }
        None => None,
      };

      staged.push(Staged { target, content, backup });
    }

    Ok(staged)
  }
}

fn stage_content(target: &Path, parent: &Path, content: &[u8]) -> Result<NamedTempFile, HostError> {
  let write_err = |source| HostError::Write {
    path: target.to_path_buf(),
    source,
  };

  let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
  temp.write_all(content).map_err(write_err)?;
  if let Some(permissions) = target_permissions(target) {
    temp.as_file().set_permissions(permissions).map_err(write_err)?;
  }
  Ok(temp)
}

/// Copy an existing target aside so it can be restored.
fn back_up(target: &Path, parent: &Path) -> Result<Option<NamedTempFile>, HostError> {
  match fs::symlink_metadata(target) {
    Ok(_) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(source) => {
      return Err(HostError::Read {
        path: target.to_path_buf(),
        source,
      });
    }
  }

  let write_err = |source| HostError::Write {
    path: target.to_path_buf(),
    source,
  };
  let backup = NamedTempFile::new_in(parent).map_err(write_err)?;
  fs::copy(target, backup.path()).map_err(write_err)?;
  Ok(Some(backup))
}

fn apply_staged(target: &Path, content: Option<NamedTempFile>) -> Result<(), HostError> {
  match content {
    Some(temp) => temp.persist(target).map(drop).map_err(|e| HostError::Write {
      path: target.to_path_buf(),
      source: e.error,
    }),
    None => match fs::remove_file(target) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(HostError::Delete {
        path: target.to_path_buf(),
        source,
      }),
    },
  }
}

/// Undo applied actions, newest first. Best effort: failures are logged.
fn roll_back(applied: Vec<(PathBuf, Option<NamedTempFile>)>) {
  for (target, backup) in applied.into_iter().rev() {
    let restored = match backup {
      Some(backup) => backup.persist(&target).map(drop).map_err(|e| e.error),
      None => match fs::remove_file(&target) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
      },
    };
    if let Err(e) = restored {
      warn!(path = %target.display(), error = %e, "failed to restore file");
    }
  }
}

/// Outermost ancestor of `dir` below `root` that does not exist yet.
fn first_missing_dir(root: &Path, dir: &Path) -> Option<PathBuf> {
  let mut top = None;
  for ancestor in dir.ancestors() {
    if ancestor == root || ancestor.exists() {
      break;
    }
    top = Some(ancestor.to_path_buf());
  }
  top
}

fn remove_created_dirs(dirs: &[PathBuf]) {
  for dir in dirs.iter().rev() {
    match fs::remove_dir_all(dir) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => warn!(path = %dir.display(), error = %e, "failed to remove staging directory"),
    }
  }
}

/// Permissions for a staged file: those of the file it replaces, else the
/// usual mode for a new file. Temp files are created owner-only.
fn target_permissions(target: &Path) -> Option<fs::Permissions> {
  if let Ok(meta) = fs::metadata(target) {
    return Some(meta.permissions());
  }
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
  }
  #[cfg(not(unix))]
  {
    None
  }
}

/// An in-memory host.
#[derive(Debug, Default)]
pub struct MemoryHost {
  files: Mutex<BTreeMap<TreePath, Vec<u8>>>,
  commits: Mutex<usize>,
}

impl MemoryHost {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a host from `(path, content)` pairs.
  pub fn with_files<I, P, C>(files: I) -> Result<Self, super::TreeError>
  where
    I: IntoIterator<Item = (P, C)>,
    P: AsRef<str>,
    C: Into<Vec<u8>>,
  {
    let mut map = BTreeMap::new();
    for (path, content) in files {
      map.insert(TreePath::new(path.as_ref())?, content.into());
    }
    Ok(Self {
      files: Mutex::new(map),
      commits: Mutex::new(0),
    })
  }

  /// Snapshot of the stored files.
  pub fn files(&self) -> BTreeMap<TreePath, Vec<u8>> {
    self.files.lock().map(|f| f.clone()).unwrap_or_default()
  }

  /// Stored content of a file as UTF-8, if present.
  pub fn get_string(&self, path: &str) -> Option<String> {
    let path = TreePath::new(path).ok()?;
    let files = self.files.lock().ok()?;
    files.get(&path).map(|b| String::from_utf8_lossy(b).into_owned())
  }

  /// Number of commits applied to this host.
  pub fn commit_count(&self) -> usize {
    self.commits.lock().map(|c| *c).unwrap_or_default()
  }
}

impl Host for MemoryHost {
  fn read(&self, path: &TreePath) -> Result<Option<Vec<u8>>, HostError> {
    let files = self.files.lock().map_err(|_| HostError::Read {
      path: PathBuf::from(path.as_str()),
      source: io::Error::other("memory host lock poisoned"),
    })?;
    Ok(files.get(path).cloned())
  }

  fn commit(&self, actions: &[Action]) -> Result<(), HostError> {
    let poisoned = || HostError::Write {
      path: PathBuf::from("/"),
      source: io::Error::other("memory host lock poisoned"),
    };
    let mut files = self.files.lock().map_err(|_| poisoned())?;
    for action in actions {
      match &action.content {
        Some(content) => {
          files.insert(action.path.clone(), content.clone());
        }
        None => {
          files.remove(&action.path);
        }
      }
    }
    *self.commits.lock().map_err(|_| poisoned())? += 1;
    Ok(())
  }
}
