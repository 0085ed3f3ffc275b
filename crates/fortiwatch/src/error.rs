//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fortiwatch_config::ConfigError;
use fortiwatch_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const DATA: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to gateway at {url}")]
    #[diagnostic(
        code(fortiwatch::connection_failed),
        help(
            "Check that the gateway is reachable and the REST API is enabled.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(fortiwatch::timeout),
        help("Increase the timeout with --timeout or check gateway load.")
    )]
    Timeout { seconds: u64 },

    #[error("Cannot listen on {addr}")]
    #[diagnostic(
        code(fortiwatch::bind),
        help("Pick another address with --listen. Reason: {reason}")
    )]
    Bind { addr: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(fortiwatch::auth_failed),
        help(
            "Verify the REST API token (System > Administrators > REST API Admin)\n\
             and that its trusted hosts include this machine."
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(fortiwatch::no_credentials),
        help(
            "Set token or token_env in the profile, pass --token,\n\
             or export FORTIWATCH_TOKEN."
        )
    )]
    NoCredentials { profile: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Upstream error: {message}")]
    #[diagnostic(code(fortiwatch::upstream))]
    Upstream { message: String },

    #[error("No telemetry available: {message}")]
    #[diagnostic(
        code(fortiwatch::no_data),
        help("The gateway, the caches, and the fallback dataset all failed.")
    )]
    NoData { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fortiwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fortiwatch::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(fortiwatch::no_config),
        help(
            "Pass --gateway and --token, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fortiwatch::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Bind { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Upstream { .. } | Self::NoData { .. } => exit_code::DATA,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Bind { addr, source } => Self::Bind {
                addr,
                reason: source.to_string(),
            },
            CoreError::FallbackUnavailable { message } => Self::NoData { message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => Self::Internal(message),
            other => Self::Upstream {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let auth = CliError::from(CoreError::AuthenticationFailed {
            message: "401".into(),
        });
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let timeout = CliError::from(CoreError::Timeout { timeout_secs: 10 });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let creds = CliError::from(ConfigError::NoCredentials {
            profile: "lab".into(),
        });
        assert_eq!(creds.exit_code(), exit_code::AUTH);

        let usage = CliError::from(ConfigError::Validation {
            field: "listen".into(),
            reason: "bad".into(),
        });
        assert_eq!(usage.exit_code(), exit_code::USAGE);

        let missing = CliError::from(ConfigError::UnknownProfile {
            name: "x".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::GENERAL);
    }
}
