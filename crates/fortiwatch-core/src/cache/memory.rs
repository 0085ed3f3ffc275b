// ── In-process TTL tier ──

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

/// One cached payload. Valid iff `now - stored_at < ttl`; an expired
/// entry is logically absent even while it is still physically stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
    pub payload: Arc<Value>,
}

impl CacheEntry {
    /// Elapsed time since the write; a clock that went backwards reads
    /// as zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.stored_at).to_std().unwrap_or_default()
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) < self.ttl
    }
}

/// A hit from either cache tier.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub payload: Arc<Value>,
    pub age: Duration,
}

/// Keyed in-memory cache. Keys are independent: an operation on one key
/// never waits on another.
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn put(&self, key: &str, payload: Arc<Value>) {
        self.put_at(key, payload, Utc::now());
    }

    /// Insert or overwrite with an explicit write time.
    pub fn put_at(&self, key: &str, payload: Arc<Value>, stored_at: DateTime<Utc>) {
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                key: key.to_owned(),
                stored_at,
                ttl: self.ttl,
                payload,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<CacheHit> {
        self.get_at(key, Utc::now())
    }

    /// Look up `key` as of `now`. Expired entries read as misses.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheHit> {
        let entry = self.entries.get(key)?;
        entry.is_valid_at(now).then(|| CacheHit {
            payload: Arc::clone(&entry.payload),
            age: entry.age_at(now),
        })
    }

    /// Physically drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid_at(now));
        before - self.entries.len()
    }

    /// Physically stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
