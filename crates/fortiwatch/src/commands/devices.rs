//! `aps` and `switches` list handlers.

use tabled::Tabled;

use fortiwatch_core::{AccessPoint, FleetSnapshot, Switch};

use crate::cli::{DeviceListArgs, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, paint_status};

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn celsius(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |t| format!("{t:.1}°C"))
}

// ── Access points ────────────────────────────────────────────────────

#[derive(Tabled)]
struct ApRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Clients")]
    clients: u32,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Interference")]
    interference: u32,
    #[tabled(rename = "Channel util")]
    utilization: String,
}

fn ap_row(ap: &AccessPoint, color: bool) -> ApRow {
    let utilization = ap
        .channel_utilization
        .iter()
        .map(|b| format!("{} {:.0}%", b.band, b.utilization_pct))
        .collect::<Vec<_>>()
        .join(", ");
    ApRow {
        name: ap.name.clone(),
        model: ap.model.clone(),
        status: paint_status(ap.status, color),
        ip: opt(ap.ip),
        clients: ap.clients_connected,
        temperature: celsius(ap.temperature),
        interference: ap.interference_count,
        utilization: if utilization.is_empty() {
            "-".into()
        } else {
            utilization
        },
    }
}

pub fn handle_aps(
    snapshot: &FleetSnapshot,
    args: &DeviceListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let aps: Vec<&AccessPoint> = snapshot
        .access_points
        .iter()
        .filter(|ap| !args.unhealthy || ap.status != fortiwatch_core::DeviceStatus::Up)
        .collect();

    let out = output::render_list(
        &global.output,
        &aps,
        |ap| ap_row(ap, color),
        |ap| ap.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Switches ─────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SwitchRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Ports up")]
    ports: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "PoE")]
    poe: String,
    #[tabled(rename = "Fan")]
    fan: String,
}

fn switch_row(sw: &Switch, color: bool) -> SwitchRow {
    SwitchRow {
        name: sw.name.clone(),
        model: sw.model.clone(),
        status: paint_status(sw.status, color),
        ip: opt(sw.ip),
        ports: format!("{}/{}", sw.ports_up(), sw.ports.len()),
        temperature: celsius(sw.temperature),
        poe: format!(
            "{:.1}/{:.0} W ({:.1}%)",
            sw.poe_consumption_w, sw.poe_budget_w, sw.poe_utilization_pct
        ),
        fan: sw.fan_status.to_string(),
    }
}

pub fn handle_switches(
    snapshot: &FleetSnapshot,
    args: &DeviceListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let switches: Vec<&Switch> = snapshot
        .switches
        .iter()
        .filter(|sw| !args.unhealthy || sw.status != fortiwatch_core::DeviceStatus::Up)
        .collect();

    let out = output::render_list(
        &global.output,
        &switches,
        |sw| switch_row(sw, color),
        |sw| sw.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
