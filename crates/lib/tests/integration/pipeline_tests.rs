//! Pipeline driver: atomicity, task gating and delegate failures.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use graft_lib::delegate::{Delegate, DelegateError, DelegateRegistry};
use graft_lib::pipeline::{Pipeline, PipelineError, RunOptions};
use graft_lib::rule::{RuleContext, RuleError, rule_fn};
use graft_lib::ssr::{AddSsr, SsrOptions};
use graft_lib::tasks::{RecordingExecutor, TaskError, TaskExecutor, TaskSpec};
use graft_lib::tree::Tree;
use serde_json::Value;

use super::common::{Project, memory_project};

struct Broken;

#[async_trait]
impl Delegate for Broken {
  async fn run(&self, tree: &mut Tree, _options: &Value) -> Result<(), RuleError> {
    tree.write("/half-done.txt", "partial")?;
    Err(RuleError::Failed {
      rule: "ng-add".to_string(),
      message: "upstream exploded".to_string(),
    })
  }
}

#[derive(Default)]
struct RootRecorder {
  roots: Mutex<Vec<Option<PathBuf>>>,
}

#[async_trait]
impl TaskExecutor for RootRecorder {
  async fn execute(&self, _task: &TaskSpec, root: Option<&Path>) -> Result<(), TaskError> {
    self.roots.lock().unwrap().push(root.map(Path::to_path_buf));
    Ok(())
  }
}

#[tokio::test]
async fn failed_run_leaves_disk_untouched() {
  let project = Project::new("{\n  \"name\": \"app\"\n}\n");
  project.write_file("server/main.ts", "// hand edited\n");
  let before = project.snapshot();

  let pipeline = Pipeline::new()
    .rule(AddSsr::new(SsrOptions::default()))
    .rule(rule_fn("fail", |_: &mut Tree, _: &mut RuleContext| {
      Err(RuleError::Failed {
        rule: "fail".to_string(),
        message: "late failure".to_string(),
      })
    }));

  let executor = RecordingExecutor::new();
  let err = pipeline
    .run(project.host(), &executor, &RunOptions::default())
    .await
    .unwrap_err();

  assert!(matches!(err, PipelineError::Rule { .. }));
  assert_eq!(project.snapshot(), before);
  assert!(executor.executed().is_empty(), "a failed run must not run tasks");
}

#[tokio::test]
async fn delegate_failure_is_propagated_and_discarded() {
  let host = memory_project("{}");
  let mut delegates = DelegateRegistry::new();
  delegates.register("@angular/ssr", "ng-add", Arc::new(Broken));

  let pipeline = Pipeline::new()
    .with_delegates(delegates)
    .rule(AddSsr::new(SsrOptions::default()));
  let err = pipeline
    .run(host.clone(), &RecordingExecutor::new(), &RunOptions::default())
    .await
    .unwrap_err();

  let (package, error) = match &err {
    PipelineError::Rule {
      source: RuleError::Delegate(DelegateError::Failed { package, error, .. }),
      ..
    } => (package.clone(), error.to_string()),
    other => panic!("expected a delegate failure, got {other:?}"),
  };
  assert_eq!(package, "@angular/ssr");
  assert_eq!(error, "rule 'ng-add' failed: upstream exploded");
  assert!(err.to_string().ends_with(": rule 'ng-add' failed: upstream exploded"));
  assert!(host.get_string("/half-done.txt").is_none());
  assert_eq!(host.commit_count(), 0);
}

#[tokio::test]
async fn missing_delegate_aborts_the_run() {
  let host = memory_project("{}");
  let pipeline = Pipeline::new()
    .with_delegates(DelegateRegistry::new())
    .rule(AddSsr::new(SsrOptions::default()));

  let err = pipeline
    .run(host.clone(), &RecordingExecutor::new(), &RunOptions::default())
    .await
    .unwrap_err();

  assert!(err.to_string().contains("no delegate registered for @angular/ssr:ng-add"));
  assert_eq!(host.commit_count(), 0);
}

#[tokio::test]
async fn skip_install_schedules_nothing() {
  let host = memory_project("{}");
  let executor = RecordingExecutor::new();
  let options = SsrOptions {
    project: Some("app".to_string()),
    skip_install: true,
  };

  let report = graft_lib::ssr::pipeline(options)
    .run(host, &executor, &RunOptions::default())
    .await
    .unwrap();

  assert!(report.committed);
  assert!(report.tasks.is_empty());
  assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn tasks_run_in_the_committed_project_root() {
  let project = Project::new("{}");
  let executor = RootRecorder::default();

  let report = graft_lib::ssr::pipeline(SsrOptions::default())
    .run(project.host(), &executor, &RunOptions::default())
    .await
    .unwrap();

  assert!(report.tasks_succeeded());
  assert_eq!(*executor.roots.lock().unwrap(), vec![Some(project.root())]);
  assert!(project.read_file("server/main.ts").is_some());
}
