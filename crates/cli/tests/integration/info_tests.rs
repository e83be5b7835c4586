//! Info command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn info_reports_workspace_projects() {
  let env = TestEnv::project();

  env
    .graft_cmd()
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("Projects: app"))
    .stdout(predicate::str::contains("Default project: app"));
}

#[test]
fn info_detects_package_manager_from_lockfile() {
  let env = TestEnv::project();
  env.write_file("yarn.lock", "");

  let output = env.graft_cmd().args(["info", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(info["package_manager"], "yarn");
  assert_eq!(info["workspace"]["projects"][0], "app");
}
