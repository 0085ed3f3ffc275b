// ── Core error types ──
//
// User-facing errors from fortiwatch-core. Consumers never see HTTP
// status codes or JSON parse failures directly; the
// `From<fortiwatch_api::Error>` impl folds transport-layer errors into
// domain variants.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Upstream errors ──────────────────────────────────────────────
    #[error("Cannot connect to gateway at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Gateway request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
        transient: bool,
    },

    // ── Cache / fallback ─────────────────────────────────────────────
    #[error("Cache I/O error at {}: {source}", path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache encoding error for {key}: {source}")]
    CacheEncode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The static dataset is missing or corrupt. The one condition with
    /// no further tier to fall back to.
    #[error("Fallback dataset unavailable: {message}")]
    FallbackUnavailable { message: String },

    // ── Broadcast ────────────────────────────────────────────────────
    #[error("Cannot bind real-time server to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::Upstream { transient, .. } => *transient,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fortiwatch_api::Error> for CoreError {
    fn from(err: fortiwatch_api::Error) -> Self {
        use fortiwatch_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::AuthenticationFailed { message },
            Api::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            Api::Transport(ref e) if e.is_connect() => Self::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: e.to_string(),
            },
            Api::InvalidUrl(e) => Self::Config {
                message: format!("invalid gateway URL: {e}"),
            },
            Api::Tls(message) => Self::Config {
                message: format!("TLS setup failed: {message}"),
            },
            Api::RetriesExhausted { last, .. } => Self::from(*last),
            other => Self::Upstream {
                message: other.to_string(),
                status: other.status(),
                transient: other.is_transient(),
            },
        }
    }
}
