// fortiwatch-core: Telemetry pipeline between fortiwatch-api and viewers (CLI, real-time clients).

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod health;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod store;
pub mod topology;

// ── Primary re-exports ──────────────────────────────────────────────
pub use broadcast::{BroadcastServer, Channel, Hub};
pub use cache::{CacheLayer, DiskCache, MemoryCache};
pub use config::{AuthCredentials, BroadcastConfig, CacheConfig, MonitorConfig, TlsVerification};
pub use error::CoreError;
pub use fallback::FallbackStore;
pub use orchestrator::{CycleReport, Orchestrator, RefreshOutcome, RefreshState, Trigger};
pub use store::SnapshotStore;
pub use topology::{PortSynthesis, TopologyEngine, TopologyOptions};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Devices
    AccessPoint, Device, DeviceKind, DeviceStatus, FanStatus, LinkStatus, Switch, SwitchPort,
    // Inventory
    Endpoint, GatewayInfo, UsageSeries,
    // Health
    AggregateMetrics, Alert, AlertKind, Severity,
    // Provenance
    DataSource, SourceOrigin, SourceReport,
    // Cycle output
    FleetSnapshot, MetricsSample, TopologyEdge, TopologyGraph, TopologyNode,
};
