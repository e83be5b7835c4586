//! Templates compiled into the binary.

use crate::template::TemplateSet;

/// Nest server entry point.
pub const SERVER_MAIN: &str = include_str!(concat!(
  env!("CARGO_MANIFEST_DIR"),
  "/templates/ssr/server/main.ts.template"
));

/// Nest module wiring the Universal renderer.
pub const SERVER_APP_MODULE: &str = include_str!(concat!(
  env!("CARGO_MANIFEST_DIR"),
  "/templates/ssr/server/app.module.ts.template"
));

/// The server files added to the project root.
pub fn server_files() -> TemplateSet {
  TemplateSet::embedded(&[
    ("server/main.ts.template", SERVER_MAIN),
    ("server/app.module.ts.template", SERVER_APP_MODULE),
  ])
}
