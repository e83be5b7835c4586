//! Interpolation parsing for template content and template paths.
//!
//! # Content Syntax
//!
//! - `<%= name %>` - value of variable `name`
//! - `<%= name() %>` - same as `<%= name %>`
//! - `<%= helper(expr) %>` - apply a string helper to `expr`
//! - `<%%` - a literal `<%`
//!
//! Code tags (`<% ... %>` without `=`) are not supported.
//!
//! # Path Syntax
//!
//! - `__name__` - value of variable `name`
//! - `__name@helper__` - `helper` applied to variable `name`
//!
//! # Example
//!
//! ```
//! use graft_lib::template::{parse, Expr, Segment};
//!
//! let segments = parse("dist: <%= dasherize(project) %>").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("dist: ".to_string()),
//!     Segment::Expr(Expr::Call {
//!         helper: "dasherize".to_string(),
//!         arg: Box::new(Expr::Var("project".to_string())),
//!     }),
//! ]);
//! ```

use thiserror::Error;

use super::context::VarContext;
use super::strings;

/// An interpolated expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  /// Variable lookup
  Var(String),

  /// Helper applied to an inner expression
  Call { helper: String, arg: Box<Expr> },
}

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Expr(Expr),
}

/// Errors raised while parsing or expanding a single template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
  #[error("unclosed tag at position {0}")]
  Unclosed(usize),

  #[error("unsupported code tag at position {0}")]
  UnsupportedTag(usize),

  #[error("malformed expression: '{0}'")]
  Malformed(String),

  #[error("unresolved variable: {0}")]
  Unresolved(String),

  #[error("unknown helper: {0}")]
  UnknownHelper(String),
}

const OPEN: &str = "<%";
const CLOSE: &str = "%>";

/// Parse template content into segments.
pub fn parse(input: &str) -> Result<Vec<Segment>, ExpandError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(start) = rest.find(OPEN) {
    literal.push_str(&rest[..start]);
    let after_open = &rest[start + OPEN.len()..];
    let tag_pos = offset + start;

    if let Some(escaped) = after_open.strip_prefix('%') {
      // "<%%" -> literal "<%"
      literal.push_str(OPEN);
      offset = tag_pos + OPEN.len() + 1;
      rest = escaped;
      continue;
    }

    let Some(body) = after_open.strip_prefix('=') else {
      return Err(ExpandError::UnsupportedTag(tag_pos));
    };

    let end = body.find(CLOSE).ok_or(ExpandError::Unclosed(tag_pos))?;

    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }
    segments.push(Segment::Expr(parse_expr(&body[..end])?));

    let consumed = OPEN.len() + 1 + end + CLOSE.len();
    offset = tag_pos + consumed;
    rest = &rest[start + consumed..];
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the body of an interpolation tag.
pub fn parse_expr(raw: &str) -> Result<Expr, ExpandError> {
  let expr = raw.trim();

  let Some(open) = expr.find('(') else {
    return ident(expr, raw).map(|name| Expr::Var(name.to_string()));
  };

  let inner = expr[open + 1..]
    .strip_suffix(')')
    .ok_or_else(|| ExpandError::Malformed(raw.trim().to_string()))?
    .trim();
  let name = ident(expr[..open].trim(), raw)?;

  if inner.is_empty() {
    return Ok(Expr::Var(name.to_string()));
  }

  Ok(Expr::Call {
    helper: name.to_string(),
    arg: Box::new(parse_expr(inner)?),
  })
}

fn ident<'a>(candidate: &'a str, raw: &str) -> Result<&'a str, ExpandError> {
  let mut chars = candidate.chars();
  let valid_start = chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
  if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
    Ok(candidate)
  } else {
    Err(ExpandError::Malformed(raw.trim().to_string()))
  }
}

/// Evaluate an expression against a context.
pub fn evaluate(expr: &Expr, context: &VarContext) -> Result<String, ExpandError> {
  match expr {
    Expr::Var(name) => context
      .get(name)
      .map(str::to_string)
      .ok_or_else(|| ExpandError::Unresolved(name.clone())),
    Expr::Call { helper, arg } => {
      let value = evaluate(arg, context)?;
      strings::apply(helper, &value).ok_or_else(|| ExpandError::UnknownHelper(helper.clone()))
    }
  }
}

/// Parse and expand template content in one step.
pub fn expand(input: &str, context: &VarContext) -> Result<String, ExpandError> {
  let mut output = String::with_capacity(input.len());
  for segment in parse(input)? {
    match segment {
      Segment::Literal(text) => output.push_str(&text),
      Segment::Expr(expr) => output.push_str(&evaluate(&expr, context)?),
    }
  }
  Ok(output)
}

/// Expand `__name__` and `__name@helper__` segments of a template path.
///
/// A `__` with no closing `__` is kept literally.
pub fn expand_path(input: &str, context: &VarContext) -> Result<String, ExpandError> {
  let mut output = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(start) = rest.find("__") {
    let after = &rest[start + 2..];
    let Some(end) = after.find("__") else {
      break;
    };

    output.push_str(&rest[..start]);
    let body = &after[..end];

    let expr = match body.split_once('@') {
      Some((name, helper)) => Expr::Call {
        helper: ident(helper, body)?.to_string(),
        arg: Box::new(Expr::Var(ident(name, body)?.to_string())),
      },
      None => Expr::Var(ident(body, body)?.to_string()),
    };
    output.push_str(&evaluate(&expr, context)?);

    rest = &after[end + 2..];
  }

  output.push_str(rest);
  Ok(output)
}
