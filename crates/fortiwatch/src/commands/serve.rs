//! `serve`: long-running monitor plus the real-time WebSocket server.
//!
//! Ctrl-C shuts down cleanly. On unix, SIGHUP forces a refresh.

use std::net::SocketAddr;

use fortiwatch_core::{BroadcastServer, Orchestrator, RefreshOutcome, Trigger};
use tracing::{info, warn};

use crate::cli::{GlobalOpts, ServeArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: ServeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::build_monitor_config(global)?;

    if let Some(ref listen) = args.listen {
        cfg.broadcast.bind = listen
            .parse::<SocketAddr>()
            .map_err(|e| CliError::Validation {
                field: "listen".into(),
                reason: format!("'{listen}': {e}"),
            })?;
    }
    if let Some(ref interval) = args.interval {
        cfg.refresh_interval =
            humantime::parse_duration(interval).map_err(|e| CliError::Validation {
                field: "interval".into(),
                reason: format!("'{interval}': {e}"),
            })?;
    }
    if args.no_disk_cache {
        cfg.cache.dir = None;
    }

    let orchestrator = Orchestrator::new(cfg)?;
    let server =
        BroadcastServer::bind(&orchestrator.config().broadcast, orchestrator.hub().clone())
            .await?;
    let addr = server.local_addr()?;
    let server_task = tokio::spawn(server.run(orchestrator.cancellation()));

    output::print_output(
        &format!(
            "fortiwatch: monitoring {} every {}, real-time feed on ws://{addr}",
            orchestrator.config().url,
            humantime::format_duration(orchestrator.config().refresh_interval),
        ),
        global.quiet,
    );

    log_outcome(&orchestrator.start().await);

    let waited = wait_for_shutdown(&orchestrator).await;
    info!("shutting down");
    orchestrator.shutdown().await;
    if let Err(e) = server_task.await {
        warn!(error = %e, "real-time server task failed");
    }
    waited
}

fn log_outcome(outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Completed(report) => info!(
            cycle = report.cycle,
            trigger = %report.trigger,
            source = %report.data_source,
            alerts = report.alerts,
            "cycle complete"
        ),
        RefreshOutcome::Rejected => info!("refresh already in progress"),
    }
}

#[cfg(unix)]
async fn wait_for_shutdown(orchestrator: &Orchestrator) -> Result<(), CliError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => return Ok(res?),
            _ = hangup.recv() => {
                info!("SIGHUP received, refreshing");
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    log_outcome(&orchestrator.trigger(Trigger::Manual).await);
                });
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_orchestrator: &Orchestrator) -> Result<(), CliError> {
    Ok(tokio::signal::ctrl_c().await?)
}
