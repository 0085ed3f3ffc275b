// ── Canonical domain model ──

pub mod alert;
pub mod device;
pub mod inventory;
pub mod snapshot;
pub mod source;
pub mod topology;

pub use alert::{AggregateMetrics, Alert, AlertKind, SYSTEM_ALERT_SOURCE, Severity, StatusCounts};
pub use device::{
    AccessPoint, BandUtilization, Device, DeviceKind, DeviceStatus, FanStatus, LinkStatus, Switch,
    SwitchPort,
};
pub use inventory::{Endpoint, GatewayInfo, UsagePoint, UsageSeries};
pub use snapshot::{DevicesView, FleetSnapshot, MetricsSample};
pub use source::{DataSource, SourceOrigin, SourceReport};
pub use topology::{
    GATEWAY_NODE_ID, NodeKind, TopologyEdge, TopologyGraph, TopologyNode, TopologyViolation,
};
