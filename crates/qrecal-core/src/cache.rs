//! Shared memoization of recalibrated qualities.
//!
//! The cached function is pure for a given table set, so concurrent callers
//! may compute the same missing key twice; the first insert wins and every
//! later insert of that key is a no-op. Entries are never removed.
//!
//! A cache is bound to the fingerprint of the table set it was created for.
//! Sharing between recalibrators happens only by passing the same
//! `Arc<RecalibrationCache>` in explicitly.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::covariates::CovariateKey;
use crate::event::EventModel;
use crate::quantization::QuantizationTable;
use crate::tables::RecalibrationTables;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub event: EventModel,
    pub key: CovariateKey,
}

/// SHA-256 identity of a loaded table set and the output mapping applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableFingerprint([u8; 32]);

impl TableFingerprint {
    pub fn compute(
        tables: &RecalibrationTables,
        quantization: &QuantizationTable,
        max_quality: u8,
    ) -> Self {
        let mut h = Sha256::new();
        tables.digest_into(&mut h);
        h.update(b"quantization");
        h.update(quantization.as_slice());
        h.update([max_quality]);
        Self(h.finalize().into())
    }
}

impl std::fmt::Display for TableFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Concurrency-safe, append-only `(event, key) → quality` map.
#[derive(Debug)]
pub struct RecalibrationCache {
    fingerprint: TableFingerprint,
    entries: DashMap<CacheKey, u8>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RecalibrationCache {
    pub fn new(fingerprint: TableFingerprint) -> Self {
        Self {
            fingerprint,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn fingerprint(&self) -> TableFingerprint {
        self.fingerprint
    }

    pub fn get(&self, key: &CacheKey) -> Option<u8> {
        self.entries.get(key).map(|v| *v)
    }

    /// Return the cached value for `key`, computing and inserting it on a miss.
    ///
    /// No shard lock is held while `compute` runs.
    pub fn get_or_compute(&self, key: CacheKey, compute: impl FnOnce(&CacheKey) -> u8) -> u8 {
        if let Some(q) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return q;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let q = compute(&key);
        *self.entries.entry(key).or_insert(q)
    }

    /// Number of distinct `(event, key)` pairs cached so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    /// Lookups that ran the formula. Can exceed `entries` when threads race.
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

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
