//! `alerts` handler.

use tabled::Tabled;

use fortiwatch_core::{Alert, FleetSnapshot, Severity};

use crate::cli::{AlertsArgs, GlobalOpts, SeverityFilter};
use crate::error::CliError;
use crate::output::{self, paint_severity};

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn threshold(filter: SeverityFilter) -> Severity {
    match filter {
        SeverityFilter::Low => Severity::Low,
        SeverityFilter::Medium => Severity::Medium,
        SeverityFilter::High => Severity::High,
    }
}

/// Alerts at or above `min`, in engine order.
fn select(alerts: &[Alert], min: Severity) -> Vec<&Alert> {
    alerts.iter().filter(|a| a.severity >= min).collect()
}

pub fn handle(
    snapshot: &FleetSnapshot,
    args: &AlertsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let alerts = select(&snapshot.alerts, threshold(args.min_severity));

    let out = output::render_list(
        &global.output,
        &alerts,
        |a| AlertRow {
            severity: paint_severity(a.severity, color),
            kind: a.kind.to_string(),
            device: a.device.clone(),
            message: a.message.clone(),
        },
        |a| format!("{}\t{}\t{}", a.severity, a.device, a.message),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
