//! `stats` handler: aggregate fleet metrics.

use fortiwatch_core::{AggregateMetrics, FleetSnapshot};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, key_values};

fn detail(m: &AggregateMetrics) -> String {
    key_values(&[
        (
            "Access points",
            format!(
                "{} ({} up / {} warning / {} down)",
                m.access_points.total,
                m.access_points.up,
                m.access_points.warning,
                m.access_points.down
            ),
        ),
        (
            "Switches",
            format!(
                "{} ({} up / {} warning / {} down)",
                m.switches.total, m.switches.up, m.switches.warning, m.switches.down
            ),
        ),
        ("Wireless clients", m.total_clients.to_string()),
        (
            "PoE",
            format!(
                "{:.1} W of {:.0} W ({:.1}%)",
                m.poe_consumption_w, m.poe_budget_w, m.poe_utilization_pct
            ),
        ),
    ])
}

pub fn handle(snapshot: &FleetSnapshot, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(&global.output, &snapshot.metrics, detail, |m| {
        m.total_clients.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
