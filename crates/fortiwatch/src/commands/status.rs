//! `status`: gateway identity, provenance, and a fleet summary.

use std::time::Duration;

use fortiwatch_core::FleetSnapshot;
use fortiwatch_core::health::format_age;
use fortiwatch_core::model::SourceOrigin;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, key_values, paint_source};

fn origin_label(origin: SourceOrigin) -> String {
    match origin {
        SourceOrigin::Live => "live".into(),
        SourceOrigin::MemoryCache { age_secs } => {
            format!("memory cache ({} old)", format_age(Duration::from_secs(age_secs)))
        }
        SourceOrigin::DiskCache { age_secs } => {
            format!("disk cache ({} old)", format_age(Duration::from_secs(age_secs)))
        }
        SourceOrigin::Fallback => "fallback".into(),
        SourceOrigin::Unavailable => "unavailable".into(),
    }
}

fn detail(snapshot: &FleetSnapshot, color: bool) -> String {
    let gw = &snapshot.gateway;
    let m = &snapshot.metrics;

    let mut pairs = vec![
        ("Gateway", format!("{} ({})", gw.hostname, gw.model)),
        ("Serial", gw.serial.clone()),
        ("Firmware", gw.version.clone()),
        ("Data source", paint_source(snapshot.data_source, color)),
    ];
    if let Some(ref version) = snapshot.sources.fallback_version {
        pairs.push(("Fallback set", version.clone()));
    }
    pairs.extend([
        (
            "Access points",
            format!(
                "{} total, {} up, {} down",
                m.access_points.total, m.access_points.up, m.access_points.down
            ),
        ),
        (
            "Switches",
            format!(
                "{} total, {} up, {} warning, {} down",
                m.switches.total, m.switches.up, m.switches.warning, m.switches.down
            ),
        ),
        ("Clients", m.total_clients.to_string()),
        ("Alerts", snapshot.alerts.len().to_string()),
        (
            "Generated",
            snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
    ]);

    let mut out = key_values(&pairs);
    out.push_str("\n\nSources\n");
    let sources: Vec<(&str, String)> = snapshot
        .sources
        .origins
        .iter()
        .map(|(resource, origin)| (resource.cache_key(), origin_label(*origin)))
        .collect();
    out.push_str(&key_values(&sources));
    out
}

pub fn handle(snapshot: &FleetSnapshot, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        snapshot,
        |s| detail(s, color),
        |s| s.data_source.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_labels_include_age() {
        assert_eq!(
            origin_label(SourceOrigin::DiskCache { age_secs: 720 }),
            "disk cache (12m old)"
        );
        assert_eq!(origin_label(SourceOrigin::Live), "live");
    }
}
