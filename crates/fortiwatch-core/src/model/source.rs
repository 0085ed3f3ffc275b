// ── Data provenance ──
//
// Every resource in a cycle records which tier of the fallback chain
// produced it. The worst tier becomes the cycle's `data_source` marker.

use std::collections::BTreeMap;
use std::time::Duration;

use fortiwatch_api::Resource;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Aggregate freshness marker, ordered best to worst.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataSource {
    Live,
    Cache,
    Fallback,
    Error,
}

/// Where one resource's data came from this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum SourceOrigin {
    Live,
    MemoryCache { age_secs: u64 },
    DiskCache { age_secs: u64 },
    Fallback,
    Unavailable,
}

impl SourceOrigin {
    pub fn data_source(self) -> DataSource {
        match self {
            Self::Live => DataSource::Live,
            Self::MemoryCache { .. } | Self::DiskCache { .. } => DataSource::Cache,
            Self::Fallback => DataSource::Fallback,
            Self::Unavailable => DataSource::Error,
        }
    }

    /// Age of cached data, if this origin is a cache tier.
    pub fn cache_age(self) -> Option<Duration> {
        match self {
            Self::MemoryCache { age_secs } | Self::DiskCache { age_secs } => {
                Some(Duration::from_secs(age_secs))
            }
            _ => None,
        }
    }

    /// Neither live nor cached: the chain ran out of real telemetry.
    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Fallback | Self::Unavailable)
    }
}

/// Per-resource provenance for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub origins: BTreeMap<Resource, SourceOrigin>,
    /// Disk snapshots that existed but were past the staleness limit.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stale_disk_secs: BTreeMap<Resource, u64>,
    /// Version of the static dataset, when any resource used it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_version: Option<String>,
}

impl SourceReport {
    pub fn record(&mut self, resource: Resource, origin: SourceOrigin) {
        self.origins.insert(resource, origin);
    }

    pub fn record_stale(&mut self, resource: Resource, age: Duration) {
        self.stale_disk_secs.insert(resource, age.as_secs());
    }

    pub fn origin(&self, resource: Resource) -> Option<SourceOrigin> {
        self.origins.get(&resource).copied()
    }

    /// The worst tier used by any resource. An empty report is live.
    pub fn data_source(&self) -> DataSource {
        self.origins
            .values()
            .map(|o| o.data_source())
            .max()
            .unwrap_or(DataSource::Live)
    }

    /// Resources that did not come from a live fetch.
    pub fn degraded(&self) -> impl Iterator<Item = (Resource, SourceOrigin)> + '_ {
        self.origins
            .iter()
            .filter(|(_, o)| **o != SourceOrigin::Live)
            .map(|(r, o)| (*r, *o))
    }

    /// Every resource fell through to the static dataset or nothing.
    pub fn all_exhausted(&self) -> bool {
        !self.origins.is_empty() && self.origins.values().all(|o| o.is_exhausted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_tier_wins() {
        let mut report = SourceReport::default();
        assert_eq!(report.data_source(), DataSource::Live);

        report.record(Resource::AccessPoints, SourceOrigin::Live);
        report.record(Resource::Switches, SourceOrigin::DiskCache { age_secs: 600 });
        assert_eq!(report.data_source(), DataSource::Cache);

        report.record(Resource::Endpoints, SourceOrigin::Fallback);
        assert_eq!(report.data_source(), DataSource::Fallback);

        report.record(Resource::SystemStatus, SourceOrigin::Unavailable);
        assert_eq!(report.data_source(), DataSource::Error);
        assert!(!report.all_exhausted());
    }

    #[test]
    fn exhausted_requires_every_resource() {
        let mut report = SourceReport::default();
        assert!(!report.all_exhausted());
        report.record(Resource::AccessPoints, SourceOrigin::Fallback);
        report.record(Resource::Switches, SourceOrigin::Unavailable);
        assert!(report.all_exhausted());
    }

    #[test]
    fn origins_serialize_with_tier_tag() {
        let origin = SourceOrigin::DiskCache { age_secs: 90 };
        let json = serde_json::to_value(origin).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "tier": "disk_cache", "age_secs": 90 }));
    }
}
