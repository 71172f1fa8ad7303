//! Result caching for computed feature columns
//!
//! Cache keys are content-addressed: the canonical JSON of the spec
//! hashed together with a fingerprint of the input frame (schema, row
//! count, and every value). Mutating a frame therefore changes its
//! fingerprint and can never serve stale features.

use fxhash::FxHasher;
use moka::sync::Cache;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheSettings;
use featurecalc_io::{Column, Frame};

/// Hit/miss counters for the cache
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Cache of computed feature columns
pub struct ResultCache {
    inner: Cache<u64, Arc<Column>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create a cache from settings
    pub fn new(settings: &CacheSettings) -> Self {
        let mut builder = Cache::builder().max_capacity(settings.max_entries);
        if settings.ttl_seconds > 0 {
            builder = builder.time_to_live(Duration::from_secs(settings.ttl_seconds));
        }
        Self {
            inner: builder.build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached column
    pub fn get(&self, key: u64) -> Option<Arc<Column>> {
        let found = self.inner.get(&key);
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Store a computed column
    pub fn insert(&self, key: u64, column: Arc<Column>) {
        self.inner.insert(key, column);
    }

    /// Get hit/miss counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.entry_count(),
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ResultCache")
            .field("hits", &stats.hits)
            .field("misses", &stats.misses)
            .finish()
    }
}

/// Compute a content fingerprint of a frame
pub fn frame_fingerprint(frame: &Frame) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_usize(frame.num_rows());
    for name in frame.column_names() {
        hasher.write(name.as_bytes());
        if let Some(column) = frame.column(name) {
            hash_column(&mut hasher, column);
        }
    }
    hasher.finish()
}

fn hash_column(hasher: &mut FxHasher, column: &Column) {
    match column {
        Column::Float64(values) => {
            hasher.write_u8(0);
            for x in values {
                hasher.write_u64(x.to_bits());
            }
        }
        Column::Int64(values) => {
            hasher.write_u8(1);
            for x in values {
                hasher.write_i64(*x);
            }
        }
        Column::Bool(values) => {
            hasher.write_u8(2);
            for x in values {
                hasher.write_u8(*x as u8);
            }
        }
        Column::Str(values) => {
            hasher.write_u8(3);
            for s in values {
                hasher.write(s.as_bytes());
                hasher.write_u8(0xff);
            }
        }
    }
}

/// Combine a spec's canonical JSON with a frame fingerprint
pub fn feature_key(spec_json: &str, fingerprint: u64) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(spec_json.as_bytes());
    hasher.write_u64(fingerprint);
    hasher.finish()
}
