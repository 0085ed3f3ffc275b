// ── Health metrics and alert rules ──
//
// Thresholds are strict: a reading exactly at a limit does not alert.
// Alert order is the data-source alert first, then per-device rules in
// device-list order.

use std::time::Duration;

use crate::model::{
    AccessPoint, AggregateMetrics, Alert, AlertKind, DataSource, Device, DeviceStatus, FanStatus,
    SYSTEM_ALERT_SOURCE, Severity, SourceOrigin, SourceReport, StatusCounts, Switch,
};

pub const SWITCH_TEMPERATURE_LIMIT_C: f64 = 65.0;
pub const SWITCH_POE_UTILIZATION_LIMIT_PCT: f64 = 80.0;
pub const AP_TEMPERATURE_LIMIT_C: f64 = 60.0;
pub const AP_INTERFERENCE_LIMIT: u32 = 5;

/// Metrics plus the ordered alert list for one cycle.
pub fn evaluate(devices: &[Device], sources: &SourceReport) -> (AggregateMetrics, Vec<Alert>) {
    let metrics = aggregate(devices);
    let mut alerts: Vec<Alert> = source_alert(sources).into_iter().collect();
    alerts.extend(devices.iter().flat_map(device_alerts));
    (metrics, alerts)
}

pub fn aggregate(devices: &[Device]) -> AggregateMetrics {
    let mut m = AggregateMetrics::default();
    for device in devices {
        let counts = match device {
            Device::AccessPoint(ap) => {
                m.total_clients += u64::from(ap.clients_connected);
                &mut m.access_points
            }
            Device::Switch(sw) => {
                m.poe_consumption_w += sw.poe_consumption_w;
                m.poe_budget_w += sw.poe_budget_w;
                &mut m.switches
            }
        };
        tally(counts, device.status());
    }
    m.poe_utilization_pct = if m.poe_budget_w > 0.0 {
        100.0 * m.poe_consumption_w / m.poe_budget_w
    } else {
        0.0
    };
    m
}

fn tally(counts: &mut StatusCounts, status: DeviceStatus) {
    counts.total += 1;
    match status {
        DeviceStatus::Up => counts.up += 1,
        DeviceStatus::Down => counts.down += 1,
        DeviceStatus::Warning => counts.warning += 1,
    }
}

// ── Data-source alert ──────────────────────────────────────────────

/// The system-level freshness alert. `None` for a fully live cycle.
pub fn source_alert(sources: &SourceReport) -> Option<Alert> {
    let degraded: Vec<(String, SourceOrigin)> = sources
        .degraded()
        .map(|(r, o)| (r.to_string(), o))
        .collect();
    let names = |pred: fn(&SourceOrigin) -> bool| -> String {
        degraded
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    match sources.data_source() {
        DataSource::Live => None,
        DataSource::Cache => {
            let oldest = degraded
                .iter()
                .filter_map(|(_, o)| o.cache_age())
                .max()
                .unwrap_or_default();
            let tier = if degraded
                .iter()
                .any(|(_, o)| matches!(o, SourceOrigin::DiskCache { .. }))
            {
                "disk cache"
            } else {
                "memory cache"
            };
            Some(Alert::new(
                SYSTEM_ALERT_SOURCE,
                Severity::Low,
                AlertKind::Info,
                format!(
                    "Serving cached data for {} from {tier}, {} old",
                    names(|o| o.cache_age().is_some()),
                    format_age(oldest)
                ),
            ))
        }
        DataSource::Fallback => {
            let version = sources.fallback_version.as_deref().unwrap_or("unknown");
            let mut message = format!(
                "Live and cached data unavailable for {}; serving static fallback dataset {version}",
                names(|o| *o == SourceOrigin::Fallback)
            );
            append_stale(&mut message, sources);
            Some(Alert::new(
                SYSTEM_ALERT_SOURCE,
                Severity::High,
                AlertKind::Error,
                message,
            ))
        }
        DataSource::Error => {
            let mut message = format!(
                "All data sources failed for {}; no telemetry available",
                names(|o| *o == SourceOrigin::Unavailable)
            );
            append_stale(&mut message, sources);
            Some(Alert::new(
                SYSTEM_ALERT_SOURCE,
                Severity::High,
                AlertKind::Error,
                message,
            ))
        }
    }
}

fn append_stale(message: &mut String, sources: &SourceReport) {
    let Some(age) = sources.stale_disk_secs.values().max() else {
        return;
    };
    message.push_str(&format!(
        " (disk cache present but stale, {} old)",
        format_age(Duration::from_secs(*age))
    ));
}

/// Human-readable age, whole seconds.
pub fn format_age(age: Duration) -> String {
    humantime::format_duration(Duration::from_secs(age.as_secs())).to_string()
}

// ── Device rules ───────────────────────────────────────────────────

pub fn device_alerts(device: &Device) -> Vec<Alert> {
    match device {
        Device::Switch(sw) => switch_alerts(sw),
        Device::AccessPoint(ap) => access_point_alerts(ap),
    }
}

fn switch_alerts(sw: &Switch) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let name = sw.name.as_str();

    match sw.status {
        DeviceStatus::Warning => alerts.push(Alert::new(
            name,
            Severity::Medium,
            AlertKind::Warning,
            format!("Switch {name} reports warning status"),
        )),
        DeviceStatus::Down => alerts.push(Alert::new(
            name,
            Severity::High,
            AlertKind::Error,
            format!("Switch {name} is down"),
        )),
        DeviceStatus::Up => {}
    }

    if let Some(t) = sw.temperature.filter(|t| *t > SWITCH_TEMPERATURE_LIMIT_C) {
        alerts.push(Alert::new(
            name,
            Severity::Medium,
            AlertKind::Warning,
            format!("Switch {name} temperature {t:.1}°C exceeds {SWITCH_TEMPERATURE_LIMIT_C}°C"),
        ));
    }

    if sw.poe_utilization_pct > SWITCH_POE_UTILIZATION_LIMIT_PCT {
        alerts.push(Alert::new(
            name,
            Severity::Medium,
            AlertKind::Warning,
            format!(
                "Switch {name} PoE utilization {:.1}% exceeds {SWITCH_POE_UTILIZATION_LIMIT_PCT}%",
                sw.poe_utilization_pct
            ),
        ));
    }

    match sw.fan_status {
        FanStatus::Warning => alerts.push(Alert::new(
            name,
            Severity::Medium,
            AlertKind::Warning,
            format!("Switch {name} fan status warning"),
        )),
        FanStatus::Failed => alerts.push(Alert::new(
            name,
            Severity::High,
            AlertKind::Error,
            format!("Switch {name} fan failure"),
        )),
        FanStatus::Ok | FanStatus::Unknown => {}
    }

    alerts
}

fn access_point_alerts(ap: &AccessPoint) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let name = ap.name.as_str();

    if ap.status == DeviceStatus::Down {
        let message = match ap.last_seen {
            Some(seen) => format!(
                "Access point {name} is down (last seen {})",
                seen.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => format!("Access point {name} is down"),
        };
        alerts.push(Alert::new(name, Severity::High, AlertKind::Error, message));
    }

    if let Some(t) = ap.temperature.filter(|t| *t > AP_TEMPERATURE_LIMIT_C) {
        alerts.push(Alert::new(
            name,
            Severity::Medium,
            AlertKind::Warning,
            format!("Access point {name} temperature {t:.1}°C exceeds {AP_TEMPERATURE_LIMIT_C}°C"),
        ));
    }

    if ap.interference_count > AP_INTERFERENCE_LIMIT {
        alerts.push(Alert::new(
            name,
            Severity::Low,
            AlertKind::Info,
            format!(
                "Access point {name} sees {} interfering APs",
                ap.interference_count
            ),
        ));
    }

    alerts
}

// ── Tests ────────────────────────────────────────────────────────────
