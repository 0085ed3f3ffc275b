// ── Non-device inventory: gateway identity, endpoints, usage history ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Identity of the gateway everything hangs off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub hostname: String,
    pub model: String,
    pub serial: String,
    pub version: String,
}

impl Default for GatewayInfo {
    fn default() -> Self {
        Self {
            hostname: "FortiGate".into(),
            model: "Unknown".into(),
            serial: "Unknown".into(),
            version: "Unknown".into(),
        }
    }
}

/// A user device seen by the gateway (laptop, phone, camera, ...).
///
/// Endpoints are topology leaves only; they never raise alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub ip: Option<IpAddr>,
    pub online: bool,
    /// Gateway interface the endpoint was detected on.
    pub interface: Option<String>,
    /// Access point the endpoint is associated with, if wireless.
    pub ap: Option<String>,
}

impl Endpoint {
    /// Stable display identity: MAC, then hostname, then IP.
    pub fn identity(&self) -> Option<String> {
        self.mac
            .clone()
            .or_else(|| self.hostname.clone())
            .or_else(|| self.ip.map(|ip| ip.to_string()))
    }
}

/// One historical sample from the gateway's resource-usage monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A named usage series (`cpu`, `mem`, `session`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSeries {
    pub name: String,
    pub current: Option<f64>,
    pub points: Vec<UsagePoint>,
}
