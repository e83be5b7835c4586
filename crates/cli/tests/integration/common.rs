//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated project directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A project with the fixture workspace configuration and manifest.
  pub fn project() -> Self {
    let env = Self::empty();
    env.write_file("angular.json", &fixture_content("angular.json"));
    env.write_file("package.json", &fixture_content("package.json"));
    env
  }

  /// Create an empty test environment.
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Read a file relative to the project directory.
  pub fn read_file(&self, relative_path: &str) -> Option<String> {
    std::fs::read_to_string(self.temp.path().join(relative_path)).ok()
  }

  pub fn dir(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  /// Directory guaranteed to contain no executables.
  pub fn empty_path(&self) -> PathBuf {
    let p = self.temp.path().join(".empty-bin");
    std::fs::create_dir_all(&p).unwrap();
    p
  }

  /// Get a pre-configured Command for the graft binary, run against this
  /// project with logging and package manager overrides cleared.
  pub fn graft_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("graft");
    cmd.env_remove("GRAFT_LOG");
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("GRAFT_PACKAGE_MANAGER");
    cmd.current_dir(self.dir());
    cmd
  }
}
