//! Implementation of the `graft add` command.
//!
//! Runs the SSR integration against a project directory: every change is
//! computed in memory and written in one commit, after which the dependency
//! install runs unless `--skip-install` is given.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::debug;

use graft_lib::pipeline::{Pipeline, PipelineReport, RunOptions};
use graft_lib::ssr::{AddSsr, SsrOptions};
use graft_lib::tasks::{InstallOptions, PackageManager, ProcessExecutor, TaskStatus};
use graft_lib::template::TemplateSet;
use graft_lib::tree::{ActionKind, FsHost};

use crate::output::{
  OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success, print_warning, symbols,
};

#[derive(Args, Debug)]
pub struct AddArgs {
  /// Project to integrate (default: the workspace's default or only project)
  #[arg(short, long)]
  pub project: Option<String>,

  /// Do not install dependencies afterwards
  #[arg(long)]
  pub skip_install: bool,

  /// Show the changes without writing them
  #[arg(long)]
  pub dry_run: bool,

  /// Project directory
  #[arg(short, long, default_value = ".")]
  pub dir: PathBuf,

  /// Directory of server templates to use instead of the built-in ones
  #[arg(long)]
  pub templates: Option<PathBuf>,

  /// Package manager for the install (npm, yarn, pnpm, bun)
  #[arg(long)]
  pub package_manager: Option<PackageManager>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

/// Execute the add command.
///
/// Runs the SSR pipeline against the project directory:
/// - Applies the upstream base scaffold
/// - Merges the server templates
/// - Adds the server dependencies and scripts to `package.json`
/// - Commits every change at once, then installs dependencies
///
/// With `--dry-run` nothing is written and the install is only reported.
/// Returns an error if a rule fails (nothing written) or if a follow-up
/// task fails after the commit.
pub fn cmd_add(args: AddArgs, verbose: bool) -> Result<()> {
  let start = Instant::now();

  let host = FsHost::open(&args.dir)
    .with_context(|| format!("Failed to open project directory: {}", args.dir.display()))?;

  let options = SsrOptions {
    project: args.project,
    skip_install: args.skip_install,
  };
  debug!(?options, dir = %args.dir.display(), "adding SSR");

  let mut rule = AddSsr::new(options).with_install(InstallOptions {
    package_manager: args.package_manager,
    ..InstallOptions::default()
  });
  if let Some(dir) = &args.templates {
    let templates =
      TemplateSet::from_dir(dir).with_context(|| format!("Failed to load templates from {}", dir.display()))?;
    rule = rule.with_templates(templates);
  }

  let pipeline = Pipeline::new().rule(rule);
  let run_options = RunOptions { dry_run: args.dry_run };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(pipeline.run(Arc::new(host), &ProcessExecutor::new(), &run_options))
    .context("SSR integration failed")?;

  if args.output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report, verbose);
    print_stat("Took", &format_duration(start.elapsed()));
  }

  if !report.tasks_succeeded() {
    bail!("changes were written but a follow-up task failed");
  }

  Ok(())
}

fn print_report(report: &PipelineReport, verbose: bool) {
  if report.actions.is_empty() {
    print_info("Project already up to date");
  }

  for action in &report.actions {
    let symbol = match action.kind {
      ActionKind::Create => symbols::ADD,
      ActionKind::Overwrite => symbols::MODIFY,
      ActionKind::Delete => symbols::REMOVE,
    };
    println!("  {} {}", symbol, action.path);
  }

  if report.committed {
    print_success(&format!("Applied {} change(s)", report.actions.len()));
  } else {
    print_info(&format!("Dry run: {} change(s) not written", report.actions.len()));
  }
  print_stat("Created", &report.count(ActionKind::Create).to_string());
  print_stat("Overwritten", &report.count(ActionKind::Overwrite).to_string());

  for run in &report.tasks {
    match &run.status {
      TaskStatus::Pending => print_info(&format!("Would {}", run.task)),
      TaskStatus::Succeeded => print_success(&format!("Task {}: {}", run.id, run.task)),
      TaskStatus::Failed { error } => print_error(&format!("Task {} failed: {}", run.id, error)),
      TaskStatus::Skipped => print_warning(&format!("Task {} skipped: {}", run.id, run.task)),
    }
  }

  if verbose && report.tasks.is_empty() {
    print_info("No follow-up tasks scheduled");
  }
}
