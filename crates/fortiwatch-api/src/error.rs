use thiserror::Error;

/// Top-level error type for the `fortiwatch-api` crate.
///
/// Every failure is classified as either *transient* (worth retrying with
/// backoff) or a *client* error (retrying cannot help). `fortiwatch-core`
/// uses that split to decide when to escalate to its cache tiers.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed, or the gateway rejected the token/session (401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, reset, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP status ─────────────────────────────────────────────────
    /// The gateway answered 429.
    #[error("Rate limited by gateway{}", retry_after_secs.map(|s| format!(" -- retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Monitor API ─────────────────────────────────────────────────
    /// 2xx response whose envelope reports `"status": "error"`.
    #[error("Monitor API error: {message}")]
    Api { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Retry ───────────────────────────────────────────────────────
    /// A transient failure persisted through every allowed attempt.
    #[error("{resource}: giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        resource: String,
        attempts: u32,
        #[source]
        last: Box<Error>,
    },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Timeouts, connection failures (including a reset mid-body), 429
    /// and 5xx are transient. An exhausted retry chain is not: the caller
    /// already spent its budget.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` for 4xx-class failures (other than 429) that must
    /// not be retried.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::Api { .. } => true,
            Self::Http { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Returns `true` if the gateway rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::RetriesExhausted { last, .. } => last.is_auth_failure(),
            _ => false,
        }
    }

    /// The HTTP status behind this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}
