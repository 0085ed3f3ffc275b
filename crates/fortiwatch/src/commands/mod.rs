//! Command dispatch.
//!
//! Read commands run one refresh cycle through the full pipeline and
//! render the resulting snapshot. `serve` stays up.

pub mod alerts;
pub mod config_cmd;
pub mod devices;
pub mod history;
pub mod serve;
pub mod stats;
pub mod status;
pub mod topology;

use fortiwatch_core::{DataSource, FleetSnapshot, Orchestrator};
use tracing::warn;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Route a snapshot-reading command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    if let Command::Serve(args) = cmd {
        return serve::handle(args, global).await;
    }

    let cfg = config::build_monitor_config(global)?;
    let snapshot = Orchestrator::oneshot(cfg).await?;
    note_degraded(&snapshot);

    match cmd {
        Command::Status => status::handle(&snapshot, global),
        Command::Aps(args) => devices::handle_aps(&snapshot, &args, global),
        Command::Switches(args) => devices::handle_switches(&snapshot, &args, global),
        Command::Alerts(args) => alerts::handle(&snapshot, &args, global),
        Command::Stats => stats::handle(&snapshot, global),
        Command::Topology(args) => topology::handle(&snapshot, &args, global),
        Command::History => history::handle(&snapshot, global),
        Command::Serve(_) | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command should have been handled before dispatch".into(),
        )),
    }
}

fn note_degraded(snapshot: &FleetSnapshot) {
    if snapshot.data_source != DataSource::Live {
        warn!(
            source = %snapshot.data_source,
            faulted = snapshot.faulted,
            "gateway data is not live"
        );
    }
}
