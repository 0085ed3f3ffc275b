// ── Raw payload normalization ──
//
// Turns loosely-shaped monitor payloads (and cached or bundled copies of
// them) into canonical model types. Every field has an alias list and a
// default; a record that is not a JSON object is skipped on its own and
// never takes the rest of the batch down with it.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::model::{
    AccessPoint, BandUtilization, Device, DeviceKind, DeviceStatus, Endpoint, FanStatus,
    GatewayInfo, LinkStatus, Switch, SwitchPort, UsagePoint, UsageSeries,
};

const UNKNOWN: &str = "Unknown";

type Record = Map<String, Value>;

// ── Field aliases ──────────────────────────────────────────────────

const NAME: &[&str] = &["name", "wtp_id", "switch-id", "switch_id", "serial"];
const MODEL: &[&str] = &["model", "model_name", "platform"];
const SERIAL: &[&str] = &["serial", "wtp_id", "switch-id", "switch_id"];
const IP: &[&str] = &["ip", "ip_address", "local_ipv4_addr", "connecting_from"];
const MAC: &[&str] = &["mac", "board_mac", "base_mac"];
const STATUS: &[&str] = &["status", "state", "connection_state"];
const LAST_SEEN: &[&str] = &["last_seen", "join_time"];
const CLIENTS: &[&str] = &[
    "clients_connected",
    "clients",
    "wtp_client",
    "wifi_clients",
    "client_count",
];
const INTERFERENCE: &[&str] = &["interference_count", "interfering_aps"];
const POE_BUDGET: &[&str] = &[
    "poe_budget_w",
    "poe_power_budget",
    "poe_budget",
    "max_poe_budget",
];
const POE_PERCENT: &[&str] = &["poe_utilization_pct", "poe_power_percentage"];
const FAN: &[&str] = &["fan_status", "fan"];

const PORT_ID: &[&str] = &["port_id", "port", "interface", "name"];
const PORT_PEER: &[&str] = &[
    "connected_device",
    "fgt_peer_device_name",
    "peer_device",
    "lldp_neighbor",
    "isl_peer_device_name",
];
const PORT_LINK: &[&str] = &["link", "status", "link_status"];
const PORT_POWER: &[&str] = &["poe_power_w", "poe_power", "port_power", "power"];

const RADIO_BAND: &[&str] = &["band", "radio_type", "radio_id"];
const RADIO_UTIL: &[&str] = &[
    "utilization_pct",
    "channel_utilization_percent",
    "channel_utilization",
    "utilization",
];

// ── Public entry points ────────────────────────────────────────────

/// Normalize a raw batch of one device kind.
///
/// Accepts an array of records or a single record. Anything else yields
/// an empty list.
pub fn normalize(raw: &Value, kind: DeviceKind) -> Vec<Device> {
    match kind {
        DeviceKind::AccessPoint => normalize_access_points(raw)
            .into_iter()
            .map(Device::from)
            .collect(),
        DeviceKind::Switch => normalize_switches(raw)
            .into_iter()
            .map(Device::from)
            .collect(),
    }
}

pub fn normalize_access_points(raw: &Value) -> Vec<AccessPoint> {
    records(raw, "access point")
        .map(access_point_from_record)
        .collect()
}

pub fn normalize_switches(raw: &Value) -> Vec<Switch> {
    records(raw, "switch").map(switch_from_record).collect()
}

pub fn normalize_endpoints(raw: &Value) -> Vec<Endpoint> {
    records(raw, "endpoint")
        .map(endpoint_from_record)
        .filter(|e| e.identity().is_some())
        .collect()
}

/// Gateway identity from a system-status payload. Missing data keeps the
/// defaults.
pub fn normalize_gateway(raw: &Value) -> GatewayInfo {
    let Some(rec) = raw.as_object() else {
        return GatewayInfo::default();
    };
    let defaults = GatewayInfo::default();
    GatewayInfo {
        hostname: text(rec, &["hostname", "name"]).unwrap_or(defaults.hostname),
        model: text(rec, &["model", "model_name", "model_number"]).unwrap_or(defaults.model),
        serial: text(rec, &["serial"]).unwrap_or(defaults.serial),
        version: text(rec, &["version"]).unwrap_or(defaults.version),
    }
}

/// Usage series from a resource-usage payload:
/// `{ "cpu": [{ "current": 4, "historical": { "1-min": { "values": [[ms, v], ...] } } }], ... }`.
///
/// Canonical `[{ name, current, points }]` input is accepted as well.
pub fn normalize_usage(raw: &Value) -> Vec<UsageSeries> {
    if let Value::Array(items) = raw {
        return items
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect();
    }
    let Some(rec) = raw.as_object() else {
        return Vec::new();
    };

    rec.iter()
        .filter_map(|(name, value)| {
            let entry = match value {
                Value::Array(items) => items.first()?.as_object()?,
                Value::Object(obj) => obj,
                _ => return None,
            };
            let current = number(entry, &["current"]);
            let points = entry
                .get("historical")
                .and_then(Value::as_object)
                .and_then(|windows| windows.get("1-min").or_else(|| windows.values().next()))
                .and_then(|w| w.get("values"))
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(usage_point).collect())
                .unwrap_or_default();
            Some(UsageSeries {
                name: name.clone(),
                current,
                points,
            })
        })
        .collect()
}

// ── Record iteration ───────────────────────────────────────────────

fn records<'a>(raw: &'a Value, what: &'static str) -> Box<dyn Iterator<Item = &'a Record> + 'a> {
    match raw {
        Value::Array(items) => Box::new(items.iter().enumerate().filter_map(move |(i, item)| {
            let rec = item.as_object();
            if rec.is_none() {
                warn!(index = i, kind = what, "skipping malformed record: not an object");
            }
            rec
        })),
        Value::Object(rec) => Box::new(std::iter::once(rec)),
        Value::Null => Box::new(std::iter::empty()),
        _ => {
            warn!(kind = what, "unexpected payload shape, ignoring");
            Box::new(std::iter::empty())
        }
    }
}

// ── Per-kind conversion ────────────────────────────────────────────

fn access_point_from_record(rec: &Record) -> AccessPoint {
    let radios = radios(rec);
    let interference = count(rec, INTERFERENCE).unwrap_or_else(|| {
        radios
            .iter()
            .filter_map(|r| count(r, &["interfering_aps"]))
            .sum()
    });
    let channel_utilization = radios
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let utilization_pct = number(r, RADIO_UTIL)?;
            let band = text(r, RADIO_BAND).unwrap_or_else(|| format!("radio{}", i + 1));
            Some(BandUtilization {
                band,
                utilization_pct,
            })
        })
        .collect();

    AccessPoint {
        name: text(rec, NAME).unwrap_or_else(|| UNKNOWN.into()),
        model: text(rec, MODEL)
            .or_else(|| model_from_os_version(rec))
            .unwrap_or_else(|| UNKNOWN.into()),
        serial: text(rec, SERIAL).unwrap_or_else(|| UNKNOWN.into()),
        ip: ip(rec),
        mac: text(rec, MAC),
        status: parse_status(first(rec, STATUS)),
        last_seen: first(rec, LAST_SEEN).and_then(parse_timestamp),
        clients_connected: count(rec, CLIENTS).unwrap_or(0),
        channel_utilization,
        temperature: temperature(rec),
        interference_count: interference,
        synthetic: flag(rec, "synthetic"),
    }
}

fn switch_from_record(rec: &Record) -> Switch {
    let ports = ports(rec);
    let poe_consumption_w: f64 = ports.iter().map(|(p, _)| p.poe_power_w).sum();
    let port_budget: f64 = ports.iter().filter_map(|(_, max)| *max).sum();
    let poe_budget_w = number(rec, POE_BUDGET).unwrap_or(port_budget);
    let poe_utilization_pct = number(rec, POE_PERCENT).unwrap_or_else(|| {
        if poe_budget_w > 0.0 {
            100.0 * poe_consumption_w / poe_budget_w
        } else {
            0.0
        }
    });

    Switch {
        name: text(rec, NAME).unwrap_or_else(|| UNKNOWN.into()),
        model: text(rec, MODEL)
            .or_else(|| model_from_os_version(rec))
            .unwrap_or_else(|| UNKNOWN.into()),
        serial: text(rec, SERIAL).unwrap_or_else(|| UNKNOWN.into()),
        ip: ip(rec),
        mac: text(rec, MAC),
        status: parse_status(first(rec, STATUS)),
        last_seen: first(rec, LAST_SEEN).and_then(parse_timestamp),
        temperature: temperature(rec),
        poe_budget_w,
        poe_consumption_w,
        poe_utilization_pct,
        fan_status: fan_status(rec),
        ports: ports.into_iter().map(|(p, _)| p).collect(),
        synthetic: flag(rec, "synthetic"),
    }
}

fn endpoint_from_record(rec: &Record) -> Endpoint {
    Endpoint {
        mac: text(rec, &["mac", "mac_address"]),
        hostname: text(rec, &["hostname", "host", "name"]),
        ip: first(rec, &["ip", "ipv4_address", "ip_address"])
            .and_then(Value::as_str)
            .and_then(parse_ip),
        online: first(rec, &["online", "is_online"]).is_some_and(truthy),
        interface: text(rec, &["interface", "detected_interface"]),
        ap: text(rec, &["ap", "ap_name", "fortiap_name", "wifi_ap"]),
    }
}

/// Ports arrive either as an array or as an object keyed by port id.
/// Returns each port with its `poe_max`, if reported.
fn ports(rec: &Record) -> Vec<(SwitchPort, Option<f64>)> {
    let entries: Vec<(Option<&str>, &Record)> = match rec.get("ports") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|p| (None, p))
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(key, v)| v.as_object().map(|p| (Some(key.as_str()), p)))
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (key, p))| {
            let port_id = text(p, PORT_ID)
                .or_else(|| key.map(str::to_owned))
                .unwrap_or_else(|| format!("port{}", i + 1));
            let link = match first(p, PORT_LINK).and_then(Value::as_str) {
                Some(s) if s.eq_ignore_ascii_case("up") => LinkStatus::Up,
                _ => LinkStatus::Down,
            };
            let port = SwitchPort {
                port_id,
                connected_device: text(p, PORT_PEER),
                link,
                poe_power_w: number(p, PORT_POWER).unwrap_or(0.0),
            };
            (port, number(p, &["poe_max"]))
        })
        .collect()
}

/// Radios as a `radio` array, canonical `channel_utilization` array, or
/// `radio_1`, `radio_2`, ... objects.
fn radios(rec: &Record) -> Vec<&Record> {
    for key in ["radio", "radios", "channel_utilization"] {
        if let Some(Value::Array(items)) = rec.get(key) {
            return items.iter().filter_map(Value::as_object).collect();
        }
    }
    let mut numbered: Vec<(&String, &Record)> = rec
        .iter()
        .filter(|(k, _)| k.starts_with("radio_"))
        .filter_map(|(k, v)| v.as_object().map(|r| (k, r)))
        .collect();
    numbered.sort_by(|a, b| a.0.cmp(b.0));
    numbered.into_iter().map(|(_, r)| r).collect()
}

// ── Field helpers ──────────────────────────────────────────────────

/// First alias present with a non-null value.
fn first<'a>(rec: &'a Record, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| rec.get(*k))
        .find(|v| !v.is_null())
}

/// First alias holding a non-empty string (numbers are stringified).
fn text(rec: &Record, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| rec.get(*k)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number(rec: &Record, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| rec.get(*k))
        .find_map(as_number)
}

/// Numbers, or strings with a numeric prefix (`"70"`, `"45.5C"`).
fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
                .unwrap_or(s.len());
            s[..end].parse().ok()
        }
        _ => None,
    }
}

fn count(rec: &Record, keys: &[&str]) -> Option<u32> {
    keys.iter().filter_map(|k| rec.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn flag(rec: &Record, key: &str) -> bool {
    rec.get(key).is_some_and(truthy)
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

fn ip(rec: &Record) -> Option<IpAddr> {
    first(rec, IP).and_then(Value::as_str).and_then(parse_ip)
}

/// Parse an address, tolerating a CIDR suffix.
fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().split('/').next()?.parse().ok()
}

/// Status derives only from the connection-state field; absent or
/// unrecognised means down.
pub fn parse_status(raw: Option<&Value>) -> DeviceStatus {
    let Some(s) = raw.and_then(Value::as_str) else {
        return DeviceStatus::Down;
    };
    match s.trim().to_ascii_lowercase().as_str() {
        "connected" | "up" | "online" | "authorized" | "ok" => DeviceStatus::Up,
        "warning" | "degraded" => DeviceStatus::Warning,
        _ => DeviceStatus::Down,
    }
}

/// Epoch seconds, epoch millis, or RFC 3339.
fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::Number(n) => {
            let n = n.as_i64()?;
            if n <= 0 {
                None
            } else if n > 100_000_000_000 {
                DateTime::from_timestamp_millis(n)
            } else {
                DateTime::from_timestamp(n, 0)
            }
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| s.trim().parse::<i64>().ok().and_then(|n| parse_timestamp(&n.into()))),
        _ => None,
    }
}

/// `FP231F-v7.2.4-build0123` -> `FP231F`.
fn model_from_os_version(rec: &Record) -> Option<String> {
    let os = rec.get("os_version")?.as_str()?;
    let model = os.split('-').next()?.trim();
    (!model.is_empty()).then(|| model.to_owned())
}

/// Scalar `temperature`, first `sensors_temperatures` reading, or the
/// hottest of a `temperatures` list.
fn temperature(rec: &Record) -> Option<f64> {
    if let Some(t) = rec.get("temperature").and_then(as_number) {
        return Some(t);
    }
    if let Some(Value::Array(sensors)) = rec.get("sensors_temperatures") {
        return sensors.iter().find_map(as_number);
    }
    let list = match (rec.get("temperature"), rec.get("temperatures")) {
        (Some(Value::Array(l)), _) | (_, Some(Value::Array(l))) => l,
        _ => return None,
    };
    list.iter()
        .filter_map(|t| match t {
            Value::Object(o) => number(o, &["value", "temperature", "celsius"]),
            other => as_number(other),
        })
        .reduce(f64::max)
}

fn fan_status(rec: &Record) -> FanStatus {
    if let Some(s) = first(rec, FAN).and_then(Value::as_str) {
        return parse_fan(s);
    }
    // A `fans` list reports the worst individual fan.
    let Some(Value::Array(fans)) = rec.get("fans") else {
        return FanStatus::Unknown;
    };
    fans.iter()
        .filter_map(|f| f.get("status").and_then(Value::as_str).map(parse_fan))
        .max_by_key(|s| match s {
            FanStatus::Unknown => 0,
            FanStatus::Ok => 1,
            FanStatus::Warning => 2,
            FanStatus::Failed => 3,
        })
        .unwrap_or(FanStatus::Unknown)
}

fn parse_fan(raw: &str) -> FanStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ok" | "normal" | "good" | "up" => FanStatus::Ok,
        "warning" | "degraded" | "slow" => FanStatus::Warning,
        "failed" | "fail" | "failure" | "critical" | "down" => FanStatus::Failed,
        _ => FanStatus::Unknown,
    }
}

fn usage_point(v: &Value) -> Option<UsagePoint> {
    let pair = v.as_array()?;
    let timestamp = parse_timestamp(pair.first()?)?;
    let value = as_number(pair.get(1)?)?;
    Some(UsagePoint { timestamp, value })
}

// ── Tests ────────────────────────────────────────────────────────────
