//! C3: action-string and scope-chain wildcard matching.
//!
//! Action patterns are `:`-delimited; scope patterns are `.`-delimited and
//! additionally support `**`. The two matchers are intentionally separate
//! functions because their wildcard semantics differ: a bare `*` in an
//! action pattern means "any single segment", but a *trailing* `*` is
//! tail-greedy (matches one or more remaining segments) while a lone `*`
//! pattern only matches single-segment actions. This asymmetry is called
//! out in the design notes as surprising but intentional and must be
//! reproduced exactly.

/// Matches an action string against an action pattern.
///
/// - Exact string equality always matches.
/// - `*` alone matches any single-segment action.
/// - A middle `*` matches exactly one non-empty segment.
/// - A trailing `*` (pattern has more than one segment and ends in `*`) is
///   tail-greedy: it matches one or more remaining non-empty segments.
///   `prefix:*` does not match the bare `prefix` with an empty tail.
pub fn action_matches(pattern: &str, action: &str) -> bool {
    if pattern == action {
        return true;
    }

    let p: Vec<&str> = pattern.split(':').collect();
    let a: Vec<&str> = action.split(':').collect();

    let trailing_wildcard = p.len() > 1 && p.last() == Some(&"*");

    if trailing_wildcard {
        let head = &p[..p.len() - 1];
        if a.len() <= head.len() {
            return false;
        }
        head.iter()
            .zip(a.iter())
            .all(|(ps, as_)| *ps == "*" || ps == as_)
    } else {
        if p.len() != a.len() {
            return false;
        }
        p.iter().zip(a.iter()).all(|(ps, as_)| *ps == "*" || ps == as_)
    }
}

fn segments(s: &str) -> Vec<&str> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split('.').collect()
    }
}

/// Matches a (normalized, dot-delimited) scope against a scope pattern.
///
/// Supports `*` (exactly one segment) and `**` (zero or more segments, in
/// any position — including standing alone, where it matches every scope
/// including the empty/global scope).
pub fn scope_pattern_matches(pattern: &str, scope: &str) -> bool {
    if pattern == scope {
        return true;
    }
    let p = segments(pattern);
    let s = segments(scope);
    match_scope_segments(&p, &s)
}

fn match_scope_segments(pattern: &[&str], scope: &[&str]) -> bool {
    match pattern.first() {
        None => scope.is_empty(),
        Some(&"**") => {
            let rest = &pattern[1..];
            (0..=scope.len()).any(|i| match_scope_segments(rest, &scope[i..]))
        }
        Some(&"*") => {
            !scope.is_empty() && match_scope_segments(&pattern[1..], &scope[1..])
        }
        Some(seg) => {
            !scope.is_empty() && scope[0] == *seg && match_scope_segments(&pattern[1..], &scope[1..])
        }
    }
}
