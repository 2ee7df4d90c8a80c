//! Reference name validation following git-style conventions.
//!
//! Valid reference names:
//! - Must be non-empty
//! - Must not contain whitespace, control characters, `~`, `^`, `:`, `?`,
//!   `*`, `[`, `\`
//! - Must not contain `..` (double dot) or `@{`
//! - Must not start or end with `.` or `/`
//! - Must not end with `.lock`
//! - Path components between slashes must be non-empty and not start with `.`
//!
//! Whitespace matters beyond hygiene: update-request lines separate the
//! target id from the reference name with a single space.

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a reference name.
const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a reference name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use dac_refs::names::validate_reference_name;
///
/// assert!(validate_reference_name("main").is_ok());
/// assert!(validate_reference_name("feature/auth").is_ok());
/// assert!(validate_reference_name("").is_err());
/// assert!(validate_reference_name("bad name").is_err());
/// ```
pub fn validate_reference_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "reference name must not be empty"));
    }

    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }

    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }

    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }

    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }

    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }

    Ok(())
}
