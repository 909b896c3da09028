//! In-memory TTL cache memoizing fetch+analyze+summarize results.
//!
//! One `Mutex` guards the map and the hit/miss counters; the lock is held
//! only for map operations and never across await points. Values are JSON so
//! heterogeneous results (context bundles, analyses, summaries) share one
//! cache, keyed by the helpers at the bottom.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::sources::types::SourceKind;

/// Conventional TTL for trending data and summaries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_MAX_SIZE: usize = 1000;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("context_cache_hits_total", "Cache lookups served from memory.");
        describe_counter!(
            "context_cache_misses_total",
            "Cache lookups that missed or hit an expired entry."
        );
        describe_gauge!("context_cache_entries", "Live entries in the context cache.");
    });
}

struct Entry {
    value: Value,
    created_at: Instant,
    ttl: Duration,
    /// Insertion sequence; breaks created_at ties during eviction.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    map: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
    next_seq: u64,
}

/// Snapshot of cache counters for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
}

pub struct ContextCache {
    inner: Mutex<Inner>,
    max_size: usize,
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextCache {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        ensure_metrics_described();
        Self {
            inner: Mutex::new(Inner::default()),
            max_size,
        }
    }

    // A poisoned guard still holds a coherent map.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the cached value unless the entry is absent or past its TTL.
    /// An expired entry is removed on access and counted as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        match inner.map.get(key) {
            None => {
                inner.misses += 1;
                counter!("context_cache_misses_total").increment(1);
                None
            }
            Some(entry) if entry.created_at.elapsed() > entry.ttl => {
                inner.map.remove(key);
                inner.misses += 1;
                counter!("context_cache_misses_total").increment(1);
                gauge!("context_cache_entries").set(inner.map.len() as f64);
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                inner.hits += 1;
                counter!("context_cache_hits_total").increment(1);
                Some(value)
            }
        }
    }

    /// Insert or refresh an entry. At capacity, expired entries go first; if
    /// that is not enough, the oldest tenth of the cache is dropped.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let mut inner = self.lock();
        if inner.map.len() >= self.max_size {
            Self::evict_expired(&mut inner);
            if inner.map.len() >= self.max_size {
                Self::evict_oldest(&mut inner, self.max_size / 10);
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.map.insert(
            key.into(),
            Entry {
                value,
                created_at: Instant::now(),
                ttl,
                seq,
            },
        );
        gauge!("context_cache_entries").set(inner.map.len() as f64);
    }

    pub fn delete(&self, key: &str) {
        let mut inner = self.lock();
        inner.map.remove(key);
        gauge!("context_cache_entries").set(inner.map.len() as f64);
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.hits = 0;
        inner.misses = 0;
        gauge!("context_cache_entries").set(0.0);
    }

    /// Remove expired entries without touching live ones.
    pub fn cleanup(&self) {
        let mut inner = self.lock();
        Self::evict_expired(&mut inner);
        gauge!("context_cache_entries").set(inner.map.len() as f64);
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let total = inner.hits + inner.misses;
        CacheStats {
            size: inner.map.len(),
            max_size: self.max_size,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if total > 0 {
                inner.hits as f64 / total as f64
            } else {
                0.0
            },
            total_requests: total,
        }
    }

    fn evict_expired(inner: &mut Inner) {
        inner
            .map
            .retain(|_, entry| entry.created_at.elapsed() <= entry.ttl);
    }

    fn evict_oldest(inner: &mut Inner, count: usize) {
        let mut by_age: Vec<(String, Instant, u64)> = inner
            .map
            .iter()
            .map(|(k, e)| (k.clone(), e.created_at, e.seq))
            .collect();
        by_age.sort_by_key(|(_, created_at, seq)| (*created_at, *seq));
        for (key, _, _) in by_age.into_iter().take(count) {
            inner.map.remove(&key);
        }
    }
}

// --- cache key helpers ---

fn sorted_kind_slug(kinds: &[SourceKind]) -> String {
    let mut names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    names.join("_")
}

fn digest16(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let out = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in out.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Key for a topic's trending context bundle.
pub fn trending_key(topic: &str, kinds: &[SourceKind]) -> String {
    format!("trending:{}:{}", topic.to_lowercase(), sorted_kind_slug(kinds))
}

/// Key for a memoized query analysis; the query is normalized then hashed.
pub fn analysis_key(query: &str) -> String {
    format!("query_analysis:{}", digest16(query.trim().to_lowercase().as_str()))
}

/// Key for a formatted context summary.
pub fn summary_key(topic: &str, kinds: &[SourceKind]) -> String {
    format!(
        "context_summary:{}:{}",
        topic.to_lowercase(),
        sorted_kind_slug(kinds)
    )
}
