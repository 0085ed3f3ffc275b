// Upstream monitor resources read once per refresh cycle.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// A read-only monitor endpoint on the gateway.
///
/// The `Display`/serde form doubles as the cache key, so renaming a
/// variant's serialization invalidates existing disk snapshots.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    SystemStatus,
    #[serde(rename = "fortiaps")]
    #[strum(serialize = "fortiaps")]
    AccessPoints,
    #[serde(rename = "fortiswitches")]
    #[strum(serialize = "fortiswitches")]
    Switches,
    Endpoints,
    ResourceUsage,
}

impl Resource {
    /// Monitor API path, without the `?vdom=` query.
    pub fn path(self) -> &'static str {
        match self {
            Self::SystemStatus => "/api/v2/monitor/system/status",
            Self::AccessPoints => "/api/v2/monitor/wifi/managed_ap",
            Self::Switches => "/api/v2/monitor/switch-controller/managed-switch/status",
            Self::Endpoints => "/api/v2/monitor/user/device/query",
            Self::ResourceUsage => "/api/v2/monitor/system/resource/usage",
        }
    }

    /// Stable key for the memory and disk cache tiers.
    pub fn cache_key(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn cache_keys_are_unique_and_parse_back() {
        let keys: Vec<&str> = Resource::iter().map(Resource::cache_key).collect();
        assert_eq!(
            keys,
            [
                "system_status",
                "fortiaps",
                "fortiswitches",
                "endpoints",
                "resource_usage"
            ]
        );
        for r in Resource::iter() {
            assert_eq!(Resource::from_str(r.cache_key()).unwrap(), r);
        }
    }

    #[test]
    fn serde_matches_cache_key() {
        let json = serde_json::to_string(&Resource::Switches).unwrap();
        assert_eq!(json, "\"fortiswitches\"");
    }

    #[test]
    fn all_paths_are_monitor_endpoints() {
        assert!(Resource::iter().all(|r| r.path().starts_with("/api/v2/monitor/")));
    }
}
