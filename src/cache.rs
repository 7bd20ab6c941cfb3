//! C1: hash-keyed store of compiled predicates (spec.md §4.1).
//!
//! The key is a 128-bit blake3 digest of the expression source rather than
//! the donor's truncated prefix/suffix slice, which the design notes call
//! out as collision-prone. Collisions are still possible at this width in
//! principle, so each bucket keeps the full source string alongside the
//! compiled value and is checked on lookup; a digest match with a different
//! source is treated as a miss rather than returned as a false hit.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default bounded capacity (spec.md §4.1).
pub const DEFAULT_CAPACITY: usize = 1000;

fn digest(src: &str) -> u128 {
    let hash = blake3::hash(src.as_bytes());
    let bytes = hash.as_bytes();
    u128::from_le_bytes(bytes[..16].try_into().unwrap())
}

#[derive(Debug, Clone)]
struct Entry<T> {
    source: String,
    compiled: T,
    created_at: u64,
    hits: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<T> {
    buckets: HashMap<u128, Vec<Entry<T>>>,
    insertion_order: VecDeque<u128>,
    hits: u64,
    misses: u64,
    capacity: usize,
}

/// `getOrCompile(src) -> Compiled`, safe for concurrent readers; writers
/// serialize on insertion.
pub struct ExpressionCache<T> {
    inner: RwLock<Inner<T>>,
}

impl<T: Clone> ExpressionCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                buckets: HashMap::new(),
                insertion_order: VecDeque::new(),
                hits: 0,
                misses: 0,
                capacity: capacity.max(1),
            }),
        }
    }

    /// Look up a compiled entry by source. Returns `None` on miss; the
    /// caller is expected to compile and call [`Self::insert`].
    pub fn get(&self, src: &str) -> Option<T> {
        let key = digest(src);
        let mut inner = self.inner.write().expect("expression cache lock poisoned");
        if let Some(bucket) = inner.buckets.get_mut(&key) {
            if let Some(entry) = bucket.iter_mut().find(|e| e.source == src) {
                entry.hits += 1;
                inner.hits += 1;
                return Some(entry.compiled.clone());
            }
        }
        inner.misses += 1;
        None
    }

    /// Store a freshly compiled value, evicting the oldest insertion if the
    /// cache is at capacity.
    pub fn insert(&self, src: &str, compiled: T) {
        let key = digest(src);
        let mut inner = self.inner.write().expect("expression cache lock poisoned");

        if let Some(bucket) = inner.buckets.get(&key) {
            if bucket.iter().any(|e| e.source == src) {
                return;
            }
        }

        let total: usize = inner.buckets.values().map(|b| b.len()).sum();
        if total >= inner.capacity {
            while let Some(oldest_key) = inner.insertion_order.pop_front() {
                let mut emptied = false;
                if let Some(bucket) = inner.buckets.get_mut(&oldest_key) {
                    if !bucket.is_empty() {
                        bucket.remove(0);
                    }
                    if bucket.is_empty() {
                        emptied = true;
                    }
                }
                if emptied {
                    inner.buckets.remove(&oldest_key);
                }
                break;
            }
        }

        inner.buckets.entry(key).or_default().push(Entry {
            source: src.to_string(),
            compiled,
            created_at: now_millis(),
            hits: 0,
        });
        inner.insertion_order.push_back(key);
    }

    /// `getOrCompile`: returns the cached value or compiles, stores and
    /// returns the freshly compiled one.
    pub fn get_or_compile<E>(
        &self,
        src: &str,
        compile: impl FnOnce(&str) -> Result<T, E>,
    ) -> Result<T, E> {
        if let Some(hit) = self.get(src) {
            return Ok(hit);
        }
        let compiled = compile(src)?;
        self.insert(src, compiled.clone());
        Ok(compiled)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().expect("expression cache lock poisoned");
        let size = inner.buckets.values().map(|b| b.len()).sum();
        CacheStats {
            size,
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("expression cache lock poisoned");
        inner.buckets.clear();
        inner.insertion_order.clear();
        inner.hits = 0;
        inner.misses = 0;
    }
}
