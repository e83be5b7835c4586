//! Implementation of the `graft info` command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use graft_lib::consts::APP_NAME;
use graft_lib::delegate::DelegateRegistry;
use graft_lib::tasks::PackageManager;
use graft_lib::template::strings::HELPERS;
use graft_lib::tree::{FsHost, Tree};
use graft_lib::workspace::Workspace;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Debug, Serialize)]
struct InfoOutput {
  version: &'static str,
  delegates: Vec<String>,
  helpers: Vec<&'static str>,
  package_manager: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  workspace: Option<WorkspaceInfo>,
}

#[derive(Debug, Serialize)]
struct WorkspaceInfo {
  path: String,
  projects: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  default_project: Option<String>,
}

/// Execute the info command.
///
/// Prints the version, registered delegates, template helpers, the package
/// manager that would run the install and, when `dir` holds a workspace
/// configuration, its projects and default project.
pub fn cmd_info(dir: &Path, output: OutputFormat) -> Result<()> {
  let dir = dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
  let dir = dir.as_path();
  let package_manager = PackageManager::resolve(None, Some(dir)).context("Failed to detect package manager")?;

  let workspace = match FsHost::open(dir) {
    Ok(host) => {
      let tree = Tree::new(Arc::new(host));
      Workspace::load(&tree).ok().map(|ws| WorkspaceInfo {
        path: ws.path().to_string(),
        projects: ws.project_names().into_iter().map(str::to_string).collect(),
        default_project: ws.resolve_project(None).ok(),
      })
    }
    Err(_) => None,
  };

  let info = InfoOutput {
    version: env!("CARGO_PKG_VERSION"),
    delegates: DelegateRegistry::with_builtins().names(),
    helpers: HELPERS.to_vec(),
    package_manager: package_manager.to_string(),
    workspace,
  };

  if output.is_json() {
    return print_json(&info);
  }

  println!("{} {}", APP_NAME, info.version);
  print_stat("Delegates", &info.delegates.join(", "));
  print_stat("Template helpers", &info.helpers.join(", "));
  print_stat("Package manager", &info.package_manager);

  match &info.workspace {
    Some(ws) => {
      print_stat("Workspace", &ws.path);
      print_stat("Projects", &ws.projects.join(", "));
      if let Some(default) = &ws.default_project {
        print_stat("Default project", default);
      }
    }
    None => print_info(&format!("No workspace configuration in {}", dir.display())),
  }

  Ok(())
}
