//! Add command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn add_writes_server_and_manifest() {
  let env = TestEnv::project();

  env
    .graft_cmd()
    .args(["add", "--skip-install"])
    .assert()
    .success()
    .stdout(predicate::str::contains("+ /server/main.ts"))
    .stdout(predicate::str::contains("Applied"));

  let module = env.read_file("server/app.module.ts").unwrap();
  assert!(module.contains("'dist/app/browser'"));
  let bootstrap = env.read_file("src/main.server.ts").unwrap();
  assert!(bootstrap.contains("./app/app.module.server"));
  let server_module = env.read_file("src/app/app.module.server.ts").unwrap();
  assert!(server_module.contains("export class AppServerModule"));

  let manifest: serde_json::Value = serde_json::from_str(&env.read_file("package.json").unwrap()).unwrap();
  assert_eq!(manifest["dependencies"]["@nestjs/core"], "^10.0.0");
  assert_eq!(manifest["dependencies"]["@angular/core"], "^17.0.0");
  assert_eq!(manifest["scripts"]["prebuild:ssr"], "ngcc");
  assert_eq!(manifest["scripts"]["start"], "ng serve");
}

#[test]
fn dry_run_writes_nothing() {
  let env = TestEnv::project();
  let before = env.read_file("package.json");

  env
    .graft_cmd()
    .args(["add", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"))
    .stdout(predicate::str::contains("Would install project dependencies"));

  assert_eq!(env.read_file("package.json"), before);
  assert!(env.read_file("server/main.ts").is_none());
}

#[test]
fn json_report_lists_actions_and_tasks() {
  let env = TestEnv::project();

  let output = env
    .graft_cmd()
    .args(["add", "--dry-run", "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["committed"], false);
  assert_eq!(report["tasks"].as_array().unwrap().len(), 1);
  assert_eq!(report["tasks"][0]["status"], "pending");
  assert!(
    report["actions"]
      .as_array()
      .unwrap()
      .iter()
      .any(|a| a["path"] == "/package.json" && a["kind"] == "overwrite")
  );
}

#[test]
fn second_run_is_up_to_date() {
  let env = TestEnv::project();
  env.graft_cmd().args(["add", "--skip-install"]).assert().success();

  env
    .graft_cmd()
    .args(["add", "--skip-install"])
    .assert()
    .success()
    .stdout(predicate::str::contains("already up to date"));
}

#[test]
fn unknown_project_changes_nothing() {
  let env = TestEnv::project();

  env
    .graft_cmd()
    .args(["add", "--skip-install", "--project", "admin"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("project 'admin' is not defined"));

  assert!(env.read_file("server/main.ts").is_none());
  assert!(env.read_file("src/main.server.ts").is_none());
}

#[test]
fn failed_install_keeps_committed_changes() {
  let env = TestEnv::project();

  env
    .graft_cmd()
    .args(["add", "--package-manager", "npm"])
    .env("PATH", env.empty_path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to spawn npm"))
    .stderr(predicate::str::contains("a follow-up task failed"));

  assert!(env.read_file("server/main.ts").is_some());
}

#[test]
fn custom_templates_replace_builtin_ones() {
  let env = TestEnv::project();
  env.write_file(
    "tpl/server/__project__.md.template",
    "# <%= classify(getClientProjectName()) %>\n",
  );

  env
    .graft_cmd()
    .args(["add", "--skip-install", "--templates", "tpl"])
    .assert()
    .success();

  assert_eq!(env.read_file("server/app.md").as_deref(), Some("# App\n"));
  assert!(env.read_file("server/main.ts").is_none());
}
