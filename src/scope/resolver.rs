//! C7: scope ancestry and effective-scope resolution (spec.md §4.4).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::types::{normalize, validate_scope, ScopeError, DEFAULT_MAX_DEPTH};

/// Default bounded LRU capacity for `buildScopeChain` (spec.md §4.4).
pub const DEFAULT_CHAIN_CACHE_CAPACITY: usize = 1000;
/// Default TTL for cached scope chains.
pub const DEFAULT_CHAIN_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct ChainEntry {
    chain: Vec<String>,
    created_at: Instant,
}

struct Inner {
    cache: LruCache<String, ChainEntry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

/// Builds scope ancestry chains and resolves the effective scope for a
/// request, with a bounded/TTL'd LRU cache on [`Self::build_scope_chain`].
pub struct ScopeResolver {
    inner: Mutex<Inner>,
    max_depth: usize,
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CHAIN_CACHE_CAPACITY, DEFAULT_CHAIN_CACHE_TTL, DEFAULT_MAX_DEPTH)
    }

    pub fn with_config(capacity: usize, ttl: Duration, max_depth: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                cache: LruCache::new(std::num::NonZeroUsize::new(capacity.max(1)).unwrap()),
                ttl,
                hits: 0,
                misses: 0,
            }),
            max_depth,
        }
    }

    /// `validateScope(s) -> { valid, normalizedScope?, error? }`.
    pub fn validate_scope(&self, s: &str) -> Result<String, ScopeError> {
        validate_scope(s, self.max_depth)
    }

    /// `buildScopeChain(scope)`: ancestry from most-specific to least-specific,
    /// e.g. `a.b.c -> [a.b.c, a.b, a]`. The empty scope yields an empty chain.
    pub fn build_scope_chain(&self, scope: &str) -> Vec<String> {
        let normalized = normalize(scope);
        if normalized.is_empty() {
            return Vec::new();
        }

        let mut inner = self.inner.lock().expect("scope chain cache lock poisoned");
        if let Some(entry) = inner.cache.get(&normalized) {
            if entry.created_at.elapsed() <= inner.ttl {
                inner.hits += 1;
                return entry.chain.clone();
            }
        }
        inner.misses += 1;

        let segments: Vec<&str> = normalized.split('.').collect();
        let chain: Vec<String> = (1..=segments.len())
            .rev()
            .map(|n| segments[..n].join("."))
            .collect();

        inner.cache.put(
            normalized,
            ChainEntry {
                chain: chain.clone(),
                created_at: Instant::now(),
            },
        );
        chain
    }

    /// `computeEffectiveScope(principalScope?, resourceScope?)` (spec.md §4.4).
    pub fn compute_effective_scope(
        &self,
        principal_scope: Option<&str>,
        resource_scope: Option<&str>,
    ) -> String {
        let p = principal_scope.map(normalize).filter(|s| !s.is_empty());
        let r = resource_scope.map(normalize).filter(|s| !s.is_empty());

        match (p, r) {
            (Some(p), Some(r)) => {
                let pl = p.to_lowercase();
                let rl = r.to_lowercase();
                if is_segment_prefix(&pl, &rl) || is_segment_prefix(&rl, &pl) {
                    if p.len() >= r.len() {
                        p
                    } else {
                        r
                    }
                } else {
                    common_ancestor(&p, &r)
                }
            }
            (Some(p), None) => p,
            (None, Some(r)) => r,
            (None, None) => String::new(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("scope chain cache lock poisoned");
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    pub fn clear_cache(&self) {
        let mut inner = self.inner.lock().expect("scope chain cache lock poisoned");
        inner.cache.clear();
        inner.hits = 0;
        inner.misses = 0;
    }
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// True if `prefix`'s dot-delimited segments are a leading subsequence of
/// `full`'s segments (e.g. `acme` is a segment-prefix of `acme.eng`, but
/// `ac` is not, even though it is a string prefix).
fn is_segment_prefix(prefix: &str, full: &str) -> bool {
    let prefix_segs: Vec<&str> = prefix.split('.').collect();
    let full_segs: Vec<&str> = full.split('.').collect();
    prefix_segs.len() <= full_segs.len() && prefix_segs.iter().zip(full_segs.iter()).all(|(a, b)| a == b)
}

fn common_ancestor(a: &str, b: &str) -> String {
    let a_segs: Vec<&str> = a.split('.').collect();
    let b_segs: Vec<&str> = b.split('.').collect();
    let mut common = Vec::new();
    for (x, y) in a_segs.iter().zip(b_segs.iter()) {
        if x == y {
            common.push(*x);
        } else {
            break;
        }
    }
    common.join(".")
}

/// Walk `chain` (most-specific to root) plus the implicit global fallback,
/// returning the first scope for which `has(scope)` is true, alongside the
/// full reported inheritance chain (always ending in the global scope).
///
/// This is the policy-store-agnostic half of `findMatchingPolicy` (spec.md
/// §4.4); callers supply `has` so this module stays free of a dependency on
/// [`crate::policy`].
pub fn find_matching_scope(
    chain: &[String],
    mut has: impl FnMut(&str) -> bool,
) -> (Option<String>, Vec<String>) {
    let mut reported: Vec<String> = chain.to_vec();
    if reported.last().map_or(true, |s| !s.is_empty()) {
        reported.push(String::new());
    }

    for scope in chain {
        if has(scope) {
            return (Some(scope.clone()), reported);
        }
    }
    (None, reported)
}
