//! Well-known names and paths.

/// Application name, used for log targets and user-facing messages.
pub const APP_NAME: &str = "graft";

/// Tree path of the project's npm manifest.
pub const MANIFEST_PATH: &str = "/package.json";

/// Tree paths searched, in order, for the workspace configuration.
pub const WORKSPACE_CONFIG_PATHS: &[&str] = &["/angular.json", "/.angular.json"];

/// Directory the server bundle is built into.
pub const SERVER_DIST: &str = "dist/server";

/// Environment variable overriding package manager detection.
pub const PACKAGE_MANAGER_ENV: &str = "GRAFT_PACKAGE_MANAGER";

/// Environment variable holding the log filter; `RUST_LOG` is the fallback.
pub const LOG_ENV: &str = "GRAFT_LOG";
