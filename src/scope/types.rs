//! Scope representation, normalization and validation (spec.md §3.3, §4.4).
//!
//! Scopes are dot-delimited lowercase identifier paths, e.g. `acme.corp.eng`.
//! The empty scope (`""`) denotes the global root. Segments match
//! `[a-z0-9][a-z0-9_-]*`; depth is capped (default 10, configurable per
//! [`crate::scope::resolver::ScopeResolver`]).

use thiserror::Error;

/// Default maximum scope depth (spec.md §3.3).
pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("scope segment is empty")]
    EmptySegment,
    #[error("scope segment '{0}' contains characters outside [a-z0-9_-]")]
    IllegalCharacter(String),
    #[error("scope depth {depth} exceeds maximum {max}")]
    Depth { depth: usize, max: usize },
}

/// Trim, lowercase, and drop leading/trailing/consecutive `.` separators.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)` (spec.md §8.2 #9).
pub fn normalize(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .split('.')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

fn segment_is_legal(seg: &str) -> bool {
    !seg.is_empty()
        && seg
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        && seg.chars().next().map_or(false, |c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// `validateScope(s) -> { valid, normalizedScope?, error? }`.
///
/// Returns the normalized scope on success. The empty scope is always valid.
pub fn validate_scope(s: &str, max_depth: usize) -> Result<String, ScopeError> {
    let normalized = normalize(s);
    if normalized.is_empty() {
        return Ok(normalized);
    }
    let segments: Vec<&str> = normalized.split('.').collect();
    if segments.len() > max_depth {
        return Err(ScopeError::Depth {
            depth: segments.len(),
            max: max_depth,
        });
    }
    for seg in &segments {
        if seg.is_empty() {
            return Err(ScopeError::EmptySegment);
        }
        if !segment_is_legal(seg) {
            return Err(ScopeError::IllegalCharacter(seg.to_string()));
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_lowercases_and_collapses_separators() {
        assert_eq!(normalize("  Acme..Corp. "), "acme.corp");
        assert_eq!(normalize(".acme.corp."), "acme.corp");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let s = "  Acme..Corp.Eng. ";
        let once = normalize(s);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_scope_is_valid() {
        assert_eq!(validate_scope("", DEFAULT_MAX_DEPTH).unwrap(), "");
    }

    #[test]
    fn rejects_illegal_characters() {
        let err = validate_scope("acme.Corp!", DEFAULT_MAX_DEPTH).unwrap_err();
        assert!(matches!(err, ScopeError::IllegalCharacter(_)));
    }

    #[test]
    fn rejects_excess_depth() {
        let deep = (0..11).map(|i| format!("s{i}")).collect::<Vec<_>>().join(".");
        let err = validate_scope(&deep, DEFAULT_MAX_DEPTH).unwrap_err();
        assert!(matches!(err, ScopeError::Depth { .. }));
    }

    #[test]
    fn valid_scope_normalizes() {
        assert_eq!(
            validate_scope("ACME.corp.eng-team_1", DEFAULT_MAX_DEPTH).unwrap(),
            "acme.corp.eng-team_1"
        );
    }
}
