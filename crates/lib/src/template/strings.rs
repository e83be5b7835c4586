//! String helpers available inside templates.
//!
//! The case transforms follow the conventions of web project generators so
//! that rendered identifiers line up with names those tools produce.

/// Apply the helper called `name` to `value`.
///
/// Returns `None` for unknown helpers.
pub fn apply(name: &str, value: &str) -> Option<String> {
  let out = match name {
    "dasherize" => dasherize(value),
    "camelize" => camelize(value),
    "classify" => classify(value),
    "underscore" => underscore(value),
    "capitalize" => capitalize(value),
    "decamelize" => decamelize(value),
    "stripTsExtension" => strip_ts_extension(value).to_string(),
    _ => return None,
  };
  Some(out)
}

/// Names of every helper understood by [`apply`].
pub const HELPERS: &[&str] = &[
  "camelize",
  "capitalize",
  "classify",
  "dasherize",
  "decamelize",
  "stripTsExtension",
  "underscore",
];

/// Insert `sep` between a lowercase letter or digit and a following uppercase letter.
fn split_humps(value: &str, sep: char) -> String {
  let mut out = String::with_capacity(value.len() + 4);
  let mut prev: Option<char> = None;
  for c in value.chars() {
    if c.is_ascii_uppercase() && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit()) {
      out.push(sep);
    }
    out.push(c);
    prev = Some(c);
  }
  out
}

/// `innerHTML` -> `inner_html`
pub fn decamelize(value: &str) -> String {
  split_humps(value, '_').to_lowercase()
}

/// `innerHTML` -> `inner-html`, `my app` -> `my-app`
pub fn dasherize(value: &str) -> String {
  decamelize(value)
    .chars()
    .map(|c| if c == ' ' || c == '_' { '-' } else { c })
    .collect()
}

/// `my-app_name` -> `myAppName`
pub fn camelize(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  let mut upper_next = false;

  for c in value.chars() {
    if c == '-' || c == '_' || c == '.' || c.is_whitespace() {
      upper_next = true;
      continue;
    }
    if upper_next {
      out.extend(c.to_uppercase());
      upper_next = false;
    } else {
      out.push(c);
    }
  }

  if out.starts_with(|c: char| c.is_ascii_uppercase()) {
    out[..1].to_ascii_lowercase() + &out[1..]
  } else {
    out
  }
}

/// `my-app.component` -> `MyApp.Component`
pub fn classify(value: &str) -> String {
  value
    .split('.')
    .map(|part| capitalize(&camelize(part)))
    .collect::<Vec<_>>()
    .join(".")
}

/// `innerHTML` -> `inner_html`, `my-app` -> `my_app`
pub fn underscore(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  let mut in_space = false;
  for c in split_humps(value, '_').chars() {
    if c.is_whitespace() {
      if !in_space {
        out.push('_');
      }
      in_space = true;
      continue;
    }
    in_space = false;
    out.push(if c == '-' { '_' } else { c });
  }
  out.to_lowercase()
}

/// `app` -> `App`
pub fn capitalize(value: &str) -> String {
  let mut chars = value.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    None => String::new(),
  }
}

/// `main.server.ts` -> `main.server`
pub fn strip_ts_extension(value: &str) -> &str {
  value.strip_suffix(".ts").unwrap_or(value)
}
