// ── Per-cycle output ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fortiwatch_api::Resource;
use serde::{Deserialize, Serialize};

use super::alert::{AggregateMetrics, Alert};
use super::device::{AccessPoint, Switch};
use super::inventory::{Endpoint, GatewayInfo, UsageSeries};
use super::source::{DataSource, SourceOrigin, SourceReport};
use super::topology::TopologyGraph;

/// Everything one refresh cycle produced. Regenerated wholesale each
/// cycle; nothing is carried over from the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub cycle: u64,
    pub generated_at: DateTime<Utc>,
    pub data_source: DataSource,
    pub sources: SourceReport,
    pub faulted: bool,
    pub gateway: GatewayInfo,
    pub access_points: Vec<AccessPoint>,
    pub switches: Vec<Switch>,
    pub endpoints: Vec<Endpoint>,
    pub metrics: AggregateMetrics,
    pub alerts: Vec<Alert>,
    pub topology: TopologyGraph,
    pub usage: Vec<UsageSeries>,
}

impl FleetSnapshot {
    pub fn origin(&self, resource: Resource) -> Option<SourceOrigin> {
        self.sources.origin(resource)
    }

    pub fn sample(&self) -> MetricsSample {
        MetricsSample {
            cycle: self.cycle,
            timestamp: self.generated_at,
            data_source: self.data_source,
            metrics: self.metrics.clone(),
            alert_count: self.alerts.len(),
        }
    }
}

/// One point of the in-process history ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub data_source: DataSource,
    pub metrics: AggregateMetrics,
    pub alert_count: usize,
}

/// Payload of the `devices` broadcast channel.
#[derive(Debug, Clone, Serialize)]
pub struct DevicesView<'a> {
    pub data_source: DataSource,
    pub sources: &'a BTreeMap<Resource, SourceOrigin>,
    pub metrics: &'a AggregateMetrics,
    pub alerts: &'a [Alert],
    pub access_points: &'a [AccessPoint],
    pub switches: &'a [Switch],
}

impl<'a> From<&'a FleetSnapshot> for DevicesView<'a> {
    fn from(s: &'a FleetSnapshot) -> Self {
        Self {
            data_source: s.data_source,
            sources: &s.sources.origins,
            metrics: &s.metrics,
            alerts: &s.alerts,
            access_points: &s.access_points,
            switches: &s.switches,
        }
    }
}
