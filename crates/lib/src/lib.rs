//! graft-lib: additive integration pipelines for JavaScript workspaces
//!
//! This crate provides the pieces a pipeline is built from:
//! - `Tree`: copy-on-write view of a project, committed in one batch
//! - `Rule`: a composable transformation of a tree
//! - `TemplateSet`: file templates expanded and merged into a tree
//! - `PackageManifest`: idempotent `package.json` edits
//! - `Delegate`: an opaque upstream rule looked up by name
//! - `TaskScheduler`: work deferred until after a successful commit
//! - `Pipeline`: the driver tying them together

pub mod consts;
pub mod delegate;
pub mod manifest;
pub mod merge;
pub mod pipeline;
pub mod rule;
pub mod ssr;
pub mod tasks;
pub mod template;
pub mod tree;
pub mod workspace;
