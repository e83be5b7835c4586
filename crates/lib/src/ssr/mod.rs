//! Server-side rendering integration.
//!
//! Adds a Nest-based SSR server to an Angular workspace: runs the upstream
//! `@angular/ssr:ng-add` rule, merges the server files into the project root
//! and declares the server's dependencies and build script. The dependency
//! install runs after the changes are committed unless `skipInstall` is set.

mod base;
mod templates;

pub use base::{PLATFORM_SERVER, SsrBaseDelegate};
pub use templates::server_files;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::consts::{MANIFEST_PATH, SERVER_DIST};
use crate::delegate::ExternalRule;
use crate::manifest::{DependencyKind, PackageManifest};
use crate::merge::MergeTemplates;
use crate::pipeline::Pipeline;
use crate::rule::{Chain, Outcome, Rule, RuleContext, RuleError, rule_fn};
use crate::tasks::{InstallOptions, TaskSpec};
use crate::template::{TemplateSet, VarContext};
use crate::tree::Tree;
use crate::workspace::Workspace;

/// Package providing the base SSR rule.
pub const SSR_BASE_PACKAGE: &str = "@angular/ssr";

/// Rule name of the base SSR rule.
pub const SSR_BASE_RULE: &str = "ng-add";

/// Runtime dependencies of the server, as `(name, version range)`.
pub const DEPENDENCIES: &[(&str, &str)] = &[
  ("@nestjs/common", "^10.0.0"),
  ("@nestjs/core", "^10.0.0"),
  ("reflect-metadata", "^0.1.13"),
  ("class-transformer", "^0.5.1"),
  ("class-validator", "^0.14.0"),
  ("@nestjs/platform-express", "^10.0.0"),
  ("@nestjs/ng-universal", "^8.0.0"),
  ("@angular/ssr", "^17.0.0"),
];

/// Scripts set in the manifest, as `(name, command)`.
pub const SCRIPTS: &[(&str, &str)] = &[("prebuild:ssr", "ngcc")];

/// Options accepted by the SSR integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsrOptions {
  /// Target project; resolved from the workspace when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project: Option<String>,

  /// Do not install dependencies after committing.
  #[serde(default)]
  pub skip_install: bool,
}

/// The top-level SSR rule.
#[derive(Debug, Clone)]
pub struct AddSsr {
  options: SsrOptions,
  install: InstallOptions,
  templates: TemplateSet,
}

impl AddSsr {
  pub fn new(options: SsrOptions) -> Self {
    Self {
      options,
      install: InstallOptions::default(),
      templates: server_files(),
    }
  }

  /// Options for the deferred install task.
  pub fn with_install(mut self, install: InstallOptions) -> Self {
    self.install = install;
    self
  }

  /// Use `templates` instead of the embedded server files.
  pub fn with_templates(mut self, templates: TemplateSet) -> Self {
    self.templates = templates;
    self
  }
}

#[async_trait]
impl Rule for AddSsr {
  fn name(&self) -> &str {
    "add-ssr"
  }

  async fn apply(&self, _tree: &mut Tree, ctx: &mut RuleContext) -> Result<Outcome, RuleError> {
    if self.options.skip_install {
      debug!("skipping dependency install");
    } else {
      let id = ctx.schedule(TaskSpec::NodePackageInstall(self.install.clone()));
      debug!(task = %id, "scheduled dependency install");
    }

    let upstream = ExternalRule::new(SSR_BASE_PACKAGE, SSR_BASE_RULE, &self.options)?;

    let options = self.options.clone();
    let files = MergeTemplates::new("add-files", self.templates.clone(), move |tree: &Tree| {
      template_context(tree, &options)
    });

    let manifest = rule_fn("add-dependencies-and-scripts", |tree: &mut Tree, _: &mut RuleContext| {
      add_dependencies_and_scripts(tree)
    });

    Ok(Outcome::Then(Box::new(Chain::new(
      "ssr",
      vec![Box::new(upstream), Box::new(files), Box::new(manifest)],
    ))))
  }
}

/// Variables available to the server templates.
///
/// Besides the options themselves and the string helpers:
/// - `project`, `getClientProjectName` - the resolved project
/// - `getBrowserDistDirectory` - output directory of the `build` target
/// - `getServerDistDirectory` - where the server bundle is built
/// - `mainServerFile` - the server bootstrap, from the `build` target's
///   `server` option or `<sourceRoot>/main.server.ts`
pub fn template_context(tree: &Tree, options: &SsrOptions) -> Result<VarContext, RuleError> {
  let workspace = Workspace::load(tree)?;
  let project = workspace.resolve_project(options.project.as_deref())?;
  let browser_dist = workspace.output_path(&project, "build")?;

  let main_server = match workspace.target_option(&project, "build", "server")?.and_then(Value::as_str) {
    Some(path) => path.to_string(),
    None => format!("{}/main.server.ts", workspace.source_root(&project)?),
  };

  Ok(
    VarContext::builder()
      .options(options)?
      .var("project", &project)
      .var("getClientProjectName", &project)
      .var("getBrowserDistDirectory", browser_dist)
      .var("getServerDistDirectory", SERVER_DIST)
      .var("mainServerFile", main_server)
      .build(),
  )
}

/// Declare the server dependencies and scripts in the manifest.
pub fn add_dependencies_and_scripts(tree: &mut Tree) -> Result<(), RuleError> {
  let mut manifest = PackageManifest::read(tree, MANIFEST_PATH)?;
  for (name, version) in DEPENDENCIES {
    manifest.add_dependency(DependencyKind::Default, name, version)?;
  }
  for (name, command) in SCRIPTS {
    manifest.add_script(name, command)?;
  }
  manifest.write(tree)?;

  info!(dependencies = DEPENDENCIES.len(), scripts = SCRIPTS.len(), "manifest updated");
  Ok(())
}

/// A pipeline applying [`AddSsr`] with `options`.
pub fn pipeline(options: SsrOptions) -> Pipeline {
  Pipeline::new().rule(AddSsr::new(options))
}
