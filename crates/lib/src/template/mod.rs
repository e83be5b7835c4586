//! Template expansion.
//!
//! A [`TemplateSet`] is a list of source templates, either compiled into the
//! binary or read from a directory. Rendering a set against a [`VarContext`]
//! produces [`FileEntry`] values for the merge stage. Rendering is all or
//! nothing: the first failing template aborts the whole set.

mod context;
mod parse;
pub mod strings;

pub use context::{VarContext, VarContextBuilder};
pub use parse::{ExpandError, Expr, Segment, evaluate, expand, expand_path, parse, parse_expr};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::tree::{TreeError, TreePath};

/// Suffix stripped from template file names when rendering.
pub const TEMPLATE_SUFFIX: &str = ".template";

/// Errors that can occur while loading or rendering templates.
#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("template {template}: {source}")]
  Expand {
    template: String,
    #[source]
    source: ExpandError,
  },

  #[error("template {template} renders to an invalid path: {source}")]
  Path {
    template: String,
    #[source]
    source: TreeError,
  },

  #[error("failed to read template source {}: {source}", path.display())]
  Source { path: PathBuf, source: io::Error },

  #[error("template source is not valid UTF-8: {}", .0.display())]
  NotUtf8(PathBuf),
}

/// A single source template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
  /// Path relative to the template root, possibly containing `__var__` segments.
  pub path: String,
  pub content: String,
}

/// A rendered file, ready to be merged into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
  pub path: TreePath,
  pub content: Vec<u8>,
}

/// An ordered collection of templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
  templates: Vec<Template>,
}

impl TemplateSet {
  pub fn new(templates: Vec<Template>) -> Self {
    Self { templates }
  }

  /// Build a set from `(path, content)` pairs compiled into the binary.
  pub fn embedded(entries: &[(&str, &str)]) -> Self {
    Self::new(
      entries
        .iter()
        .map(|(path, content)| Template {
          path: (*path).to_string(),
          content: (*content).to_string(),
        })
        .collect(),
    )
  }

  /// Load every file below `dir`, sorted by relative path.
  pub fn from_dir(dir: &Path) -> Result<Self, TemplateError> {
    let mut templates = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
      let entry = entry.map_err(|e| {
        let path = e.path().unwrap_or(dir).to_path_buf();
        TemplateError::Source {
          path,
          source: e.into_io_error().unwrap_or_else(|| io::Error::other("filesystem loop")),
        }
      })?;
      if !entry.file_type().is_file() {
        continue;
      }

      let bytes = fs::read(entry.path()).map_err(|source| TemplateError::Source {
        path: entry.path().to_path_buf(),
        source,
      })?;
      let content = String::from_utf8(bytes).map_err(|_| TemplateError::NotUtf8(entry.path().to_path_buf()))?;

      let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
      let path = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

      templates.push(Template { path, content });
    }

    debug!(dir = %dir.display(), count = templates.len(), "loaded templates");
    Ok(Self::new(templates))
  }

  pub fn len(&self) -> usize {
    self.templates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.templates.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Template> {
    self.templates.iter()
  }

  /// Render every template. Fails on the first template that does not expand.
  pub fn render(&self, context: &VarContext) -> Result<Vec<FileEntry>, TemplateError> {
    self.templates.iter().map(|t| render_one(t, context)).collect()
  }
}

fn render_one(template: &Template, context: &VarContext) -> Result<FileEntry, TemplateError> {
  let wrap = |source| TemplateError::Expand {
    template: template.path.clone(),
    source,
  };

  let raw_path = template.path.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(&template.path);
  let rendered_path = expand_path(raw_path, context).map_err(wrap)?;
  let path = TreePath::new(&rendered_path).map_err(|source| TemplateError::Path {
    template: template.path.clone(),
    source,
  })?;
  let content = expand(&template.content, context).map_err(wrap)?;

  Ok(FileEntry {
    path,
    content: content.into_bytes(),
  })
}
