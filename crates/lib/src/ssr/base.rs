//! Built-in stand-in for the upstream `@angular/ssr:ng-add` rule.
//!
//! Lays down the minimal base SSR scaffold the server files build on: a
//! server bootstrap next to the browser one, the `AppServerModule` it
//! exports, the platform-server runtime dependency and the build target's
//! `server` entry. The server module wraps `AppModule` and bootstraps
//! `AppComponent` from `<sourceRoot>/app`, the layout a new NgModule
//! application has.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::consts::MANIFEST_PATH;
use crate::delegate::Delegate;
use crate::manifest::{DependencyKind, PackageManifest};
use crate::rule::RuleError;
use crate::tree::Tree;
use crate::workspace::Workspace;

/// Runtime package the base scaffold depends on.
pub const PLATFORM_SERVER: (&str, &str) = ("@angular/platform-server", "^17.0.0");

const MAIN_SERVER: &str = "\
export { AppServerModule as default } from './app/app.module.server';
";

const APP_SERVER_MODULE: &str = "\
import { NgModule } from '@angular/core';
import { ServerModule } from '@angular/platform-server';

import { AppModule } from './app.module';
import { AppComponent } from './app.component';

@NgModule({
  imports: [AppModule, ServerModule],
  bootstrap: [AppComponent],
})
export class AppServerModule {}
";

#[derive(Debug, Clone, Copy, Default)]
pub struct SsrBaseDelegate;

#[async_trait]
impl Delegate for SsrBaseDelegate {
  async fn run(&self, tree: &mut Tree, options: &Value) -> Result<(), RuleError> {
    let mut workspace = Workspace::load(tree)?;
    let project = workspace.resolve_project(options.get("project").and_then(Value::as_str))?;
    let source_root = workspace.source_root(&project)?;
    let main_server = format!("{source_root}/main.server.ts");
    let server_module = format!("{source_root}/app/app.module.server.ts");

    for (path, content) in [(&main_server, MAIN_SERVER), (&server_module, APP_SERVER_MODULE)] {
      if tree.exists(path)? {
        debug!(path = %path, "scaffold file already present");
      } else {
        tree.create(path, content)?;
      }
    }

    if workspace.target_option(&project, "build", "server")?.is_none() {
      workspace.set_target_option(&project, "build", "server", Value::from(main_server.as_str()))?;
      workspace.write(tree)?;
    }

    let mut manifest = PackageManifest::read(tree, MANIFEST_PATH)?;
    let (name, version) = PLATFORM_SERVER;
    if manifest.dependency(DependencyKind::Default, name).is_none() {
      manifest.add_dependency(DependencyKind::Default, name, version)?;
      manifest.write(tree)?;
    }

    info!(project = %project, "base SSR scaffold applied");
    Ok(())
  }
}
