// ── Disk snapshot tier ──
//
// One file per resource key: `{ "_timestamp": <epoch-millis>, "data": ... }`.
// Writes go to a uniquely named temp file that is then renamed over the
// target, so a reader sees either the previous snapshot or the new one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::memory::CacheHit;
use crate::error::CoreError;

#[derive(Serialize)]
struct DiskRecordRef<'a> {
    #[serde(rename = "_timestamp")]
    timestamp: i64,
    data: &'a Value,
}

#[derive(Deserialize)]
struct DiskRecord {
    #[serde(rename = "_timestamp")]
    timestamp: i64,
    data: Value,
}

/// Outcome of a disk read.
#[derive(Debug, Clone)]
pub enum DiskRead {
    /// Within the staleness threshold.
    Fresh(CacheHit),
    /// Present and parsable, but too old to serve.
    Stale { age: Duration },
    /// Absent or unparsable.
    Miss,
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    max_staleness: Duration,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, max_staleness: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_staleness,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub async fn write(&self, key: &str, payload: &Value) -> Result<(), CoreError> {
        self.write_at(key, payload, Utc::now()).await
    }

    /// Persist `payload` stamped with `at`. Completes only once the
    /// snapshot is renamed into place.
    pub async fn write_at(
        &self,
        key: &str,
        payload: &Value,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CoreError::CacheIo {
                path: self.dir.clone(),
                source,
            })?;

        let body = serde_json::to_vec(&DiskRecordRef {
            timestamp: at.timestamp_millis(),
            data: payload,
        })
        .map_err(|source| CoreError::CacheEncode {
            key: key.to_owned(),
            source,
        })?;

        let target = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4().simple()));

        if let Err(source) = tokio::fs::write(&tmp, &body).await {
            return Err(CoreError::CacheIo { path: tmp, source });
        }
        if let Err(source) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CoreError::CacheIo {
                path: target,
                source,
            });
        }

        debug!(key, path = %target.display(), bytes = body.len(), "disk snapshot written");
        Ok(())
    }

    pub async fn read(&self, key: &str) -> DiskRead {
        self.read_at(key, Utc::now()).await
    }

    /// Read `key` as of `now`, classifying it against the staleness limit.
    pub async fn read_at(&self, key: &str, now: DateTime<Utc>) -> DiskRead {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(key, error = %e, "no disk snapshot");
                return DiskRead::Miss;
            }
        };

        let record: DiskRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                debug!(key, error = %e, "unparsable disk snapshot, treating as miss");
                return DiskRead::Miss;
            }
        };

        let Some(written) = DateTime::from_timestamp_millis(record.timestamp) else {
            return DiskRead::Miss;
        };
        let age = (now - written).to_std().unwrap_or_default();

        if age > self.max_staleness {
            DiskRead::Stale { age }
        } else {
            DiskRead::Fresh(CacheHit {
                payload: Arc::new(record.data),
                age,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn round_trip_within_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), DAY);
        let payload = json!([{ "name": "SW1" }]);

        cache.write_at("fortiswitches", &payload, at(0)).await.unwrap();

        match cache.read_at("fortiswitches", at(3600)).await {
            DiskRead::Fresh(hit) => {
                assert_eq!(*hit.payload, payload);
                assert_eq!(hit.age, Duration::from_secs(3600));
            }
            other => panic!("expected fresh read, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_format_is_timestamped_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), DAY);
        cache.write_at("fortiaps", &json!({ "a": 1 }), at(0)).await.unwrap();

        let raw: Value =
            serde_json::from_slice(&std::fs::read(cache.path_for("fortiaps")).unwrap()).unwrap();
        assert_eq!(
            raw,
            json!({ "_timestamp": at(0).timestamp_millis(), "data": { "a": 1 } })
        );
        // No temp files left behind.
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .is_ok_and(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn older_than_threshold_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), DAY);
        cache.write_at("fortiswitches", &json!([]), at(0)).await.unwrap();

        let at_limit = at(24 * 60 * 60);
        assert!(matches!(
            cache.read_at("fortiswitches", at_limit).await,
            DiskRead::Fresh(_)
        ));

        match cache.read_at("fortiswitches", at(24 * 60 * 60 + 1)).await {
            DiskRead::Stale { age } => assert_eq!(age, DAY + Duration::from_secs(1)),
            other => panic!("expected stale read, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn absent_or_corrupt_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), DAY);
        assert!(matches!(cache.read("endpoints").await, DiskRead::Miss));

        std::fs::write(cache.path_for("endpoints"), b"{ not json").unwrap();
        assert!(matches!(cache.read("endpoints").await, DiskRead::Miss));

        std::fs::write(cache.path_for("endpoints"), br#"{"data": []}"#).unwrap();
        assert!(matches!(cache.read("endpoints").await, DiskRead::Miss));
    }

    #[tokio::test]
    async fn write_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let cache = DiskCache::new(&nested, DAY);
        cache.write("system_status", &json!({})).await.unwrap();
        assert!(cache.path_for("system_status").exists());
    }
}
