//! Shared helpers for library integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use graft_lib::tree::{FsHost, Host, MemoryHost};
use tempfile::TempDir;

/// Workspace configuration with a single project `app`.
pub const WORKSPACE: &str = r#"{
  "version": 1,
  "projects": {
    "app": {
      "projectType": "application",
      "root": "",
      "sourceRoot": "src",
      "architect": {
        "build": {
          "options": { "outputPath": "dist/app/browser" }
        }
      }
    }
  }
}
"#;

/// In-memory project with the workspace configuration and `manifest`.
pub fn memory_project(manifest: &str) -> Arc<MemoryHost> {
  Arc::new(MemoryHost::with_files([("/angular.json", WORKSPACE), ("/package.json", manifest)]).unwrap())
}

/// Project directory on disk.
pub struct Project {
  pub temp: TempDir,
}

impl Project {
  pub fn new(manifest: &str) -> Self {
    let project = Self {
      temp: TempDir::new().unwrap(),
    };
    project.write_file("angular.json", WORKSPACE);
    project.write_file("package.json", manifest);
    project
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> Option<String> {
    std::fs::read_to_string(self.temp.path().join(relative_path)).ok()
  }

  pub fn host(&self) -> Arc<dyn Host> {
    Arc::new(FsHost::open(self.temp.path()).unwrap())
  }

  /// Every file below the root with its content, sorted by path.
  pub fn snapshot(&self) -> Vec<(PathBuf, String)> {
    let mut files = Vec::new();
    collect(self.temp.path(), self.temp.path(), &mut files);
    files.sort();
    files
  }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) {
  for entry in std::fs::read_dir(dir).unwrap() {
    let path = entry.unwrap().path();
    if path.is_dir() {
      collect(root, &path, out);
    } else {
      let content = std::fs::read_to_string(&path).unwrap_or_default();
      out.push((path.strip_prefix(root).unwrap().to_path_buf(), content));
    }
  }
}
