//! Input Validation Module
//!
//! Checks applied to rule declarations before anything is attached to a
//! collection. Registration either fully succeeds or fails here; a rule that
//! passes validation can no longer fail synchronously.
//!
//! ## Rules
//!
//! 1. **Field names**: non-empty, bounded length, no `.` (path separator),
//!    no NUL or other control characters, no leading `$` (reserved for
//!    update operators), no leading/trailing whitespace
//! 2. **Cached field**: a valid field name other than `_id`
//! 3. **Watched fields**: each a valid field name, duplicates collapsed
//! 4. **No self-watch**: the cached field may not be one of its own watched
//!    fields, otherwise every cached write would trigger another recompute

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::{ID_FIELD, MAX_FIELD_NAME_LEN};
use crate::error::{CacheFieldError, CacheFieldResult};

static TRIMMED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\S(?:.*\S)?$").expect("field name pattern is valid"));

/// Validate a document field name
///
/// # Examples
///
/// ```rust
/// use cachefield::validation::validate_field_name;
///
/// assert!(validate_field_name("fullName", "cached_field").is_ok());
/// assert!(validate_field_name("address.city", "cached_field").is_err());
/// assert!(validate_field_name("$set", "cached_field").is_err());
/// ```
pub fn validate_field_name(name: &str, param_name: &str) -> CacheFieldResult<()> {
    if name.is_empty() {
        return Err(CacheFieldError::configuration(
            param_name,
            name,
            "Field name cannot be empty",
        ));
    }

    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(CacheFieldError::configuration(
            param_name,
            format!("{}... ({} bytes)", truncate(name, 20), name.len()),
            format!("Field name too long (max {} bytes)", MAX_FIELD_NAME_LEN),
        ));
    }

    let forbidden_chars = ['.', '\0'];
    for &ch in &forbidden_chars {
        if name.contains(ch) {
            return Err(CacheFieldError::configuration(
                param_name,
                sanitize_for_logging(name),
                format!("Field name contains forbidden character: '{}'", ch.escape_default()),
            ));
        }
    }

    if name.chars().any(char::is_control) {
        return Err(CacheFieldError::configuration(
            param_name,
            sanitize_for_logging(name),
            "Field name cannot contain control characters",
        ));
    }

    if name.starts_with('$') {
        return Err(CacheFieldError::configuration(
            param_name,
            sanitize_for_logging(name),
            "Field name cannot start with '$'",
        ));
    }

    if !TRIMMED_NAME.is_match(name) {
        return Err(CacheFieldError::configuration(
            param_name,
            sanitize_for_logging(name),
            "Field name cannot have leading or trailing whitespace",
        ));
    }

    Ok(())
}

/// Validate the name a rule writes to
///
/// `_id` is refused: the store owns the identifier and a `$set` on it would
/// fail on every write.
pub fn validate_cached_field(name: &str) -> CacheFieldResult<()> {
    validate_field_name(name, "cached_field")?;

    if name == ID_FIELD {
        return Err(CacheFieldError::configuration(
            "cached_field",
            name,
            "the document identifier cannot be a cached field",
        ));
    }

    Ok(())
}

/// Validate the watched field list of a rule and collapse duplicates
///
/// Order is kept (the default joiner depends on it); later duplicates are
/// dropped.
pub fn validate_watched_fields(
    cached_field: &str,
    watched_fields: Vec<String>,
) -> CacheFieldResult<Vec<String>> {
    let mut unique: Vec<String> = Vec::with_capacity(watched_fields.len());

    for field in watched_fields {
        validate_field_name(&field, "watched_fields")?;

        if field == cached_field {
            return Err(CacheFieldError::configuration(
                "watched_fields",
                sanitize_for_logging(&field),
                "cached field cannot watch itself",
            ));
        }

        if unique.contains(&field) {
            warn!(cached_field = cached_field, field = %field, "duplicate watched field ignored");
            continue;
        }
        unique.push(field);
    }

    Ok(unique)
}

/// Sanitize string for logging (truncate, escape control chars)
pub(crate) fn sanitize_for_logging(s: &str) -> String {
    let max_len = 50;
    let truncated = if s.len() > max_len {
        format!("{}...", truncate(s, max_len))
    } else {
        s.to_string()
    };

    truncated
        .replace('\0', "\\0")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Longest prefix of `s` with at most `max` bytes, on a char boundary
fn truncate(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
