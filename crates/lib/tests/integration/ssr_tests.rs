//! End-to-end SSR integration runs.

use graft_lib::manifest::{DependencyKind, PackageManifest};
use graft_lib::pipeline::RunOptions;
use graft_lib::ssr::{AddSsr, DEPENDENCIES, SsrOptions};
use graft_lib::tasks::{RecordingExecutor, TaskSpec};
use graft_lib::template::TemplateSet;
use graft_lib::tree::{ActionKind, Host, Tree};

use super::common::{Project, memory_project};

fn app_options() -> SsrOptions {
  SsrOptions {
    project: Some("app".to_string()),
    skip_install: false,
  }
}

#[tokio::test]
async fn empty_manifest_gains_server_dependencies() {
  let host = memory_project("{}");
  let executor = RecordingExecutor::new();

  let report = graft_lib::ssr::pipeline(app_options())
    .run(host.clone(), &executor, &RunOptions::default())
    .await
    .unwrap();

  let tree = Tree::new(host.clone());
  let manifest = PackageManifest::read(&tree, "/package.json").unwrap();
  for (name, version) in DEPENDENCIES {
    assert_eq!(manifest.dependency(DependencyKind::Default, name), Some(*version), "{name}");
  }
  assert_eq!(manifest.dependency(DependencyKind::Default, "@angular/core"), None);
  assert_eq!(manifest.script("prebuild:ssr"), Some("ngcc"));

  assert_eq!(report.tasks.len(), 1);
  assert!(matches!(executor.executed().as_slice(), [TaskSpec::NodePackageInstall(_)]));
}

#[tokio::test]
async fn unrelated_manifest_entries_survive() {
  let manifest = r#"{
  "name": "app",
  "version": "0.0.0",
  "scripts": {
    "start": "ng serve"
  },
  "dependencies": {
    "@angular/core": "^17.0.0",
    "zone.js": "~0.14.2"
  },
  "devDependencies": {
    "typescript": "~5.2.2"
  }
}
"#;
  let host = memory_project(manifest);

  graft_lib::ssr::pipeline(app_options())
    .run(host.clone(), &RecordingExecutor::new(), &RunOptions::default())
    .await
    .unwrap();

  let text = host.get_string("/package.json").unwrap();
  let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
  assert_eq!(doc["name"], "app");
  assert_eq!(doc["scripts"]["start"], "ng serve");
  assert_eq!(doc["dependencies"]["zone.js"], "~0.14.2");
  assert_eq!(doc["devDependencies"]["typescript"], "~5.2.2");
  assert!(text.ends_with("}\n"));

  let keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
  assert_eq!(keys, vec!["name", "version", "scripts", "dependencies", "devDependencies"]);
}

#[tokio::test]
async fn second_run_changes_nothing() {
  let project = Project::new("{}");

  graft_lib::ssr::pipeline(app_options())
    .run(project.host(), &RecordingExecutor::new(), &RunOptions::default())
    .await
    .unwrap();
  let after_first = project.snapshot();

  let report = graft_lib::ssr::pipeline(app_options())
    .run(project.host(), &RecordingExecutor::new(), &RunOptions::default())
    .await
    .unwrap();

  assert!(report.actions.is_empty(), "unexpected actions: {:?}", report.actions);
  assert_eq!(project.snapshot(), after_first);
}

#[tokio::test]
async fn existing_server_file_is_replaced() {
  let project = Project::new("{}");
  project.write_file("server/app.module.ts", "// local changes\n");

  let report = graft_lib::ssr::pipeline(app_options())
    .run(project.host(), &RecordingExecutor::new(), &RunOptions::default())
    .await
    .unwrap();

  let module = project.read_file("server/app.module.ts").unwrap();
  assert!(!module.contains("local changes"));
  assert!(module.contains("'dist/app/browser'"));
  assert!(
    report
      .actions
      .iter()
      .any(|a| a.path.as_str() == "/server/app.module.ts" && a.kind == ActionKind::Overwrite)
  );
  assert!(
    report
      .actions
      .iter()
      .any(|a| a.path.as_str() == "/server/main.ts" && a.kind == ActionKind::Create)
  );
}

#[tokio::test]
async fn templates_from_a_directory() {
  let templates = tempfile::TempDir::new().unwrap();
  std::fs::create_dir_all(templates.path().join("server")).unwrap();
  std::fs::write(
    templates.path().join("server/__project@dasherize__.txt.template"),
    "dist=<%= getBrowserDistDirectory() %>\n",
  )
  .unwrap();

  let host = memory_project("{}");
  let rule = AddSsr::new(app_options()).with_templates(TemplateSet::from_dir(templates.path()).unwrap());
  graft_lib::pipeline::Pipeline::new()
    .rule(rule)
    .run(host.clone(), &RecordingExecutor::new(), &RunOptions::default())
    .await
    .unwrap();

  assert_eq!(host.get_string("/server/app.txt").as_deref(), Some("dist=dist/app/browser\n"));
  assert!(host.get_string("/server/main.ts").is_none());
}

#[tokio::test]
async fn unknown_project_fails_before_any_write() {
  let host = memory_project("{}");
  let options = SsrOptions {
    project: Some("missing".to_string()),
    skip_install: false,
  };

  let err = graft_lib::ssr::pipeline(options)
    .run(host.clone(), &RecordingExecutor::new(), &RunOptions::default())
    .await
    .unwrap_err();

  assert!(err.to_string().contains("project 'missing' is not defined"));
  assert_eq!(host.commit_count(), 0);
  assert!(host.root().is_none());
}
