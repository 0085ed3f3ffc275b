// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use strum::{Display, EnumString};

/// Which half of the [`Device`] union a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    AccessPoint,
    Switch,
}

/// Device operational state, derived from the raw connection-state field.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceStatus {
    Up,
    #[default]
    Down,
    Warning,
}

impl DeviceStatus {
    /// Up or degraded, i.e. still passing traffic.
    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Up | Self::Warning)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FanStatus {
    Ok,
    Warning,
    Failed,
    #[default]
    Unknown,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkStatus {
    Up,
    #[default]
    Down,
}

impl From<DeviceStatus> for LinkStatus {
    fn from(status: DeviceStatus) -> Self {
        if status.is_reachable() {
            Self::Up
        } else {
            Self::Down
        }
    }
}

/// Channel utilization for one radio band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandUtilization {
    pub band: String,
    pub utilization_pct: f64,
}

/// A managed wireless access point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub ip: Option<IpAddr>,
    pub mac: Option<String>,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub clients_connected: u32,
    pub channel_utilization: Vec<BandUtilization>,
    pub temperature: Option<f64>,
    pub interference_count: u32,
    #[serde(default)]
    pub synthetic: bool,
}

/// One physical port on a managed switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchPort {
    pub port_id: String,
    /// Neighbour identifier (name, serial or MAC) as reported by the switch.
    pub connected_device: Option<String>,
    pub link: LinkStatus,
    pub poe_power_w: f64,
}

/// A managed Ethernet switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub ip: Option<IpAddr>,
    pub mac: Option<String>,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub temperature: Option<f64>,
    pub poe_budget_w: f64,
    pub poe_consumption_w: f64,
    pub poe_utilization_pct: f64,
    pub fan_status: FanStatus,
    pub ports: Vec<SwitchPort>,
    #[serde(default)]
    pub synthetic: bool,
}

impl Switch {
    pub fn ports_up(&self) -> usize {
        self.ports
            .iter()
            .filter(|p| p.link == LinkStatus::Up)
            .count()
    }
}

/// The canonical device union produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Device {
    AccessPoint(AccessPoint),
    Switch(Switch),
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::AccessPoint(_) => DeviceKind::AccessPoint,
            Self::Switch(_) => DeviceKind::Switch,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::AccessPoint(ap) => &ap.name,
            Self::Switch(sw) => &sw.name,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::AccessPoint(ap) => &ap.model,
            Self::Switch(sw) => &sw.model,
        }
    }

    pub fn serial(&self) -> &str {
        match self {
            Self::AccessPoint(ap) => &ap.serial,
            Self::Switch(sw) => &sw.serial,
        }
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Self::AccessPoint(ap) => ap.ip,
            Self::Switch(sw) => sw.ip,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        match self {
            Self::AccessPoint(ap) => ap.status,
            Self::Switch(sw) => sw.status,
        }
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::AccessPoint(ap) => ap.last_seen,
            Self::Switch(sw) => sw.last_seen,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        match self {
            Self::AccessPoint(ap) => ap.synthetic,
            Self::Switch(sw) => sw.synthetic,
        }
    }

    pub fn as_access_point(&self) -> Option<&AccessPoint> {
        match self {
            Self::AccessPoint(ap) => Some(ap),
            Self::Switch(_) => None,
        }
    }

    pub fn as_switch(&self) -> Option<&Switch> {
        match self {
            Self::Switch(sw) => Some(sw),
            Self::AccessPoint(_) => None,
        }
    }
}

impl From<AccessPoint> for Device {
    fn from(ap: AccessPoint) -> Self {
        Self::AccessPoint(ap)
    }
}

impl From<Switch> for Device {
    fn from(sw: Switch) -> Self {
        Self::Switch(sw)
    }
}
