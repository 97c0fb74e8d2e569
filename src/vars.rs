// SPDX-License-Identifier: MPL-2.0

//! Textual `$VAR` expansion for build settings.
//!
//! The grammar recognizes `$$` (a literal `$`), `$PACKAGE_DIR` (the
//! declaring package's filesystem path) and `$NAME` where `NAME` matches
//! `[A-Za-z0-9_]+` and is looked up in the process environment. Unknown
//! names fail with [ProjectError::UnknownVariable].

use std::path::Path;

use crate::error::ProjectError;

/// Expands every variable reference in `input`.
///
/// With `is_path` set, a non-absolute result is resolved against the
/// declaring package's path and returned as a native path string; an
/// absolute result is returned verbatim.
pub fn expand_vars(
    input: &str,
    package_path: &Path,
    is_path: bool,
) -> Result<String, ProjectError> {
    expand_with(input, package_path, is_path, |name| {
        std::env::var(name).ok()
    })
}

/// Expansion against an arbitrary variable lookup, used by tests to avoid
/// touching the process environment.
pub(crate) fn expand_with(
    input: &str,
    package_path: &Path,
    is_path: bool,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ProjectError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&(_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some(&(start, c2)) if is_name_char(c2) => {
                let mut end = start + c2.len_utf8();
                chars.next();
                while let Some(&(i, c3)) = chars.peek() {
                    if !is_name_char(c3) {
                        break;
                    }
                    end = i + c3.len_utf8();
                    chars.next();
                }
                let name = &input[start..end];
                if name == "PACKAGE_DIR" {
                    out.push_str(&package_path.to_string_lossy());
                } else {
                    let value = lookup(name).ok_or_else(|| ProjectError::UnknownVariable {
                        name: name.to_string(),
                    })?;
                    out.push_str(&value);
                }
            }
            _ => {
                return Err(ProjectError::UnknownVariable {
                    name: String::new(),
                })
            }
        }
    }
    if is_path && !out.is_empty() {
        let expanded = Path::new(&out);
        if !expanded.is_absolute() {
            return Ok(package_path.join(expanded).to_string_lossy().into_owned());
        }
    }
    Ok(out)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
