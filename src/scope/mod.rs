//! C7: scope ancestry and effective-scope resolution (spec.md §3.3, §4.4).

pub mod resolver;
pub mod types;

pub use resolver::{find_matching_scope, CacheStats, ScopeResolver};
pub use types::{normalize, validate_scope, ScopeError, DEFAULT_MAX_DEPTH};
