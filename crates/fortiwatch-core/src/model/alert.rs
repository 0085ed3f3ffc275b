// ── Alerts and aggregate metrics ──

use serde::{Deserialize, Serialize};
use strum::Display;

/// Device name used for alerts about the pipeline itself.
pub const SYSTEM_ALERT_SOURCE: &str = "system";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertKind {
    Info,
    Warning,
    Error,
}

/// A generated alert. Recomputed every cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub device: String,
    pub message: String,
    pub severity: Severity,
    pub kind: AlertKind,
}

impl Alert {
    pub fn new(
        device: impl Into<String>,
        severity: Severity,
        kind: AlertKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            message: message.into(),
            severity,
            kind,
        }
    }

    pub fn is_system(&self) -> bool {
        self.device == SYSTEM_ALERT_SOURCE
    }
}

/// Up/down/warning tally for one device kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub up: usize,
    pub down: usize,
    pub warning: usize,
}

/// Fleet-wide figures computed from one cycle's devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub access_points: StatusCounts,
    pub switches: StatusCounts,
    pub total_clients: u64,
    pub poe_consumption_w: f64,
    pub poe_budget_w: f64,
    /// `100 × consumption / budget`, or 0 with no budget.
    pub poe_utilization_pct: f64,
}
