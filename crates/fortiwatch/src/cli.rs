//! Clap derive structures for the `fortiwatch` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fortiwatch -- fleet telemetry for FortiGate-managed APs and switches
#[derive(Debug, Parser)]
#[command(
    name = "fortiwatch",
    version,
    about = "Monitor FortiGate-managed access points and switches",
    long_about = "Polls a FortiGate's REST monitor API for managed FortiAP and\n\
        FortiSwitch telemetry, evaluates health alerts, infers the physical\n\
        topology, and serves live updates to WebSocket subscribers.\n\n\
        Read commands run a single refresh cycle. When the gateway is\n\
        unreachable they fall back to cached or bundled data.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "FORTIWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway URL (overrides profile)
    #[arg(long, short = 'g', env = "FORTIWATCH_GATEWAY", global = true)]
    pub gateway: Option<String>,

    /// REST API token
    #[arg(long, env = "FORTIWATCH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Virtual domain
    #[arg(long, env = "FORTIWATCH_VDOM", global = true)]
    pub vdom: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FORTIWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FORTIWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "FORTIWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Directory for the on-disk cache
    #[arg(long, env = "FORTIWATCH_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the monitor and the real-time WebSocket server
    Serve(ServeArgs),

    /// Gateway identity, data provenance, and fleet summary
    #[command(alias = "st")]
    Status,

    /// List managed access points
    #[command(alias = "ap")]
    Aps(DeviceListArgs),

    /// List managed switches
    #[command(alias = "sw")]
    Switches(DeviceListArgs),

    /// Show active alerts
    Alerts(AlertsArgs),

    /// Aggregate fleet metrics
    Stats,

    /// Show the inferred physical topology
    #[command(alias = "topo")]
    Topology(TopologyArgs),

    /// Gateway resource-usage history
    History,

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── serve ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// WebSocket listen address (e.g. 0.0.0.0:8765)
    #[arg(long, short = 'l', env = "FORTIWATCH_LISTEN")]
    pub listen: Option<String>,

    /// Refresh interval (e.g. 5m, 90s)
    #[arg(long, short = 'i')]
    pub interval: Option<String>,

    /// Keep cached payloads in memory only
    #[arg(long)]
    pub no_disk_cache: bool,
}

// ── Read commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DeviceListArgs {
    /// Only devices that are down or degraded
    #[arg(long)]
    pub unhealthy: bool,
}

#[derive(Debug, Args)]
pub struct AlertsArgs {
    /// Minimum severity to show
    #[arg(long, short = 's', default_value = "low")]
    pub min_severity: SeverityFilter,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityFilter {
    Low,
    Medium,
    High,
}

#[derive(Debug, Args)]
pub struct TopologyArgs {
    /// Table layout: indented tree or flat edge list
    #[arg(long, default_value = "tree")]
    pub view: TopologyView,

    /// Leave endpoints out of the tree
    #[arg(long)]
    pub no_endpoints: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TopologyView {
    Tree,
    Edges,
}

// ── config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// List profile names
    Profiles,
}

// ── completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
