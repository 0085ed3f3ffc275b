// ── Two-tier cache ──
//
// Memory first, then the disk snapshot. Both tiers are written after
// every successful live fetch; both are consulted only when the live
// fetch for that key failed.

pub mod disk;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

pub use disk::{DiskCache, DiskRead};
pub use memory::{CacheEntry, CacheHit, MemoryCache};

/// Result of walking the cache tiers for one key.
#[derive(Debug, Clone)]
pub enum Recall {
    Memory(CacheHit),
    Disk(CacheHit),
    /// Neither tier could serve. `stale_disk` carries the age of a disk
    /// snapshot that exists but is past the staleness limit.
    Miss { stale_disk: Option<Duration> },
}

#[derive(Debug)]
pub struct CacheLayer {
    memory: MemoryCache,
    disk: Option<DiskCache>,
}

impl CacheLayer {
    pub fn new(memory: MemoryCache, disk: Option<DiskCache>) -> Self {
        Self { memory, disk }
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    /// Record a successful live fetch in both tiers.
    ///
    /// Awaits the disk write. A failed write is logged and otherwise
    /// ignored: the memory tier still holds the payload.
    pub async fn store(&self, key: &str, payload: Arc<Value>) {
        self.memory.put(key, Arc::clone(&payload));
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.write(key, &payload).await {
                warn!(key, error = %e, "disk snapshot write failed");
            }
        }
    }

    /// Walk memory, then disk.
    pub async fn recall(&self, key: &str) -> Recall {
        if let Some(hit) = self.memory.get(key) {
            return Recall::Memory(hit);
        }
        let Some(disk) = &self.disk else {
            return Recall::Miss { stale_disk: None };
        };
        match disk.read(key).await {
            DiskRead::Fresh(hit) => Recall::Disk(hit),
            DiskRead::Stale { age } => Recall::Miss {
                stale_disk: Some(age),
            },
            DiskRead::Miss => Recall::Miss { stale_disk: None },
        }
    }
}
