//! The node package install task.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use super::{TaskError, TaskExecutor, TaskSpec};
use crate::consts::PACKAGE_MANAGER_ENV;

/// Options for [`TaskSpec::NodePackageInstall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOptions {
  /// Explicit package manager; detected when unset.
  pub package_manager: Option<PackageManager>,
  /// Directory relative to the project root to install in.
  pub working_directory: Option<String>,
  pub quiet: bool,
}

impl Default for InstallOptions {
  fn default() -> Self {
    Self {
      package_manager: None,
      working_directory: None,
      quiet: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
  Npm,
  Yarn,
  Pnpm,
  Bun,
}

/// Lockfiles and the package manager that writes them, checked in order.
const LOCKFILES: &[(&str, PackageManager)] = &[
  ("yarn.lock", PackageManager::Yarn),
  ("pnpm-lock.yaml", PackageManager::Pnpm),
  ("bun.lockb", PackageManager::Bun),
  ("package-lock.json", PackageManager::Npm),
];

impl PackageManager {
  pub fn as_str(&self) -> &'static str {
    match self {
      PackageManager::Npm => "npm",
      PackageManager::Yarn => "yarn",
      PackageManager::Pnpm => "pnpm",
      PackageManager::Bun => "bun",
    }
  }

  /// Arguments for a plain `install`.
  pub fn install_args(&self, quiet: bool) -> Vec<&'static str> {
    let mut args = vec!["install"];
    if quiet {
      args.push(match self {
        PackageManager::Npm => "--quiet",
        _ => "--silent",
      });
    }
    args
  }

  /// Pick a package manager: `explicit`, then the environment override,
  /// then a lockfile in `dir`, then npm.
  pub fn resolve(explicit: Option<PackageManager>, dir: Option<&Path>) -> Result<PackageManager, TaskError> {
    if let Some(pm) = explicit {
      return Ok(pm);
    }

    if let Ok(value) = std::env::var(PACKAGE_MANAGER_ENV)
      && !value.trim().is_empty()
    {
      return value.parse();
    }

    if let Some(dir) = dir
      && let Some((_, pm)) = LOCKFILES.iter().find(|(file, _)| dir.join(file).is_file())
    {
      return Ok(*pm);
    }

    Ok(PackageManager::Npm)
  }
}

impl fmt::Display for PackageManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PackageManager {
  type Err = TaskError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "npm" => Ok(PackageManager::Npm),
      "yarn" => Ok(PackageManager::Yarn),
      "pnpm" => Ok(PackageManager::Pnpm),
      "bun" => Ok(PackageManager::Bun),
      other => Err(TaskError::UnknownPackageManager(other.to_string())),
    }
  }
}

/// Runs tasks as child processes in the committed project directory.
///
/// Children inherit the user's environment so the package manager finds its
/// registry configuration and cache.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
  pub fn new() -> Self {
    Self
  }

  async fn install(&self, options: &InstallOptions, root: &Path) -> Result<(), TaskError> {
    let dir = match &options.working_directory {
      Some(sub) => root.join(sub),
      None => root.to_path_buf(),
    };
    let pm = PackageManager::resolve(options.package_manager, Some(&dir))?;
    let args = pm.install_args(options.quiet);
    let command_line = format!("{} {}", pm, args.join(" "));

    info!(cmd = %command_line, dir = %dir.display(), "installing packages");

    let output = Command::new(pm.as_str())
      .args(&args)
      .current_dir(&dir)
      .output()
      .await
      .map_err(|source| TaskError::Spawn {
        program: pm.to_string(),
        source,
      })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let stdout = String::from_utf8_lossy(&output.stdout);

      if !stderr.is_empty() {
        debug!(stderr = %stderr, "command stderr");
      }
      if !stdout.is_empty() {
        debug!(stdout = %stdout, "command stdout");
      }

      return Err(TaskError::Failed {
        command: command_line,
        code: output.status.code(),
      });
    }

    Ok(())
  }
}

#[async_trait]
impl TaskExecutor for ProcessExecutor {
  async fn execute(&self, task: &TaskSpec, root: Option<&Path>) -> Result<(), TaskError> {
    let root = root.ok_or(TaskError::NoRoot)?;
    match task {
      TaskSpec::NodePackageInstall(options) => self.install(options, root).await,
    }
  }
}
