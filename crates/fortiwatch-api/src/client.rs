// Gateway monitor API HTTP client
//
// Wraps `reqwest::Client` with monitor URL construction, status
// classification and envelope unwrapping. Retry lives in `retry.rs`;
// this module only performs single attempts and reports what happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::cookie::Jar;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::resource::Resource;
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

/// Envelope-level fields copied into object `results`.
const ENVELOPE_IDENTITY_FIELDS: [&str; 3] = ["serial", "version", "build"];

/// The monitor envelope: `{ "status": "success", "results": ..., ... }`.
#[derive(Deserialize)]
struct MonitorEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    http_status: Option<u16>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    results: Option<Value>,
}

/// Raw HTTP client for the gateway's read-only monitor API.
///
/// All methods return the unwrapped `results` payload; the envelope is
/// stripped and checked before the caller sees it.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    vdom: String,
    credentials: Credentials,
    retry: RetryPolicy,
    timeout_secs: u64,
    cookie_jar: Option<Arc<Jar>>,
    /// Bumped on every successful login.
    session_epoch: AtomicU64,
    /// Serializes re-logins from concurrent fetches.
    login_lock: Mutex<()>,
}

impl GatewayClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// Token credentials are sent as a bearer header on every request.
    /// Session credentials get a cookie jar; call [`login`](Self::login)
    /// before the first fetch.
    pub fn new(
        base_url: Url,
        vdom: impl Into<String>,
        credentials: Credentials,
        transport: &TransportConfig,
        retry: RetryPolicy,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let config = match &credentials {
            Credentials::ApiToken(token) => {
                let mut value =
                    HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                        .map_err(|e| Error::Authentication {
                            message: format!("API token is not a valid header value: {e}"),
                        })?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                transport.clone()
            }
            Credentials::Session { .. } if transport.cookie_jar.is_some() => transport.clone(),
            Credentials::Session { .. } => transport.clone().with_cookie_jar(),
        };

        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client(headers)?;
        Ok(Self {
            http,
            base_url,
            vdom: vdom.into(),
            credentials,
            retry,
            timeout_secs: config.timeout.as_secs(),
            cookie_jar,
            session_epoch: AtomicU64::new(0),
            login_lock: Mutex::new(()),
        })
    }

    /// The underlying HTTP client (for the session login flow).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The virtual domain every monitor query is scoped to.
    pub fn vdom(&self) -> &str {
        &self.vdom
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Whether a session cookie jar is attached.
    pub fn has_cookie_jar(&self) -> bool {
        self.cookie_jar.is_some()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a gateway URL for an absolute path: `{base}{path}`.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    /// Build the vdom-scoped monitor URL for a resource.
    pub fn resource_url(&self, resource: Resource) -> Result<Url, Error> {
        let mut url = self.url(resource.path())?;
        url.query_pairs_mut().append_pair("vdom", &self.vdom);
        Ok(url)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Fetch a resource, retrying transient failures per the client's
    /// [`RetryPolicy`].
    ///
    /// With session credentials a rejected request triggers one fresh
    /// login followed by one more fetch, so an expired cookie or a login
    /// that failed while the gateway was down heals on the next read.
    pub async fn fetch(&self, resource: Resource) -> Result<Value, Error> {
        let epoch = self.session_epoch.load(Ordering::Acquire);
        match self.fetch_with_retry(resource).await {
            Err(e) if e.is_auth_failure() && self.credentials.is_session() => {
                debug!(resource = resource.cache_key(), "session rejected, logging in again");
                if let Err(login) = self.relogin(epoch).await {
                    warn!(error = %login, "re-login failed");
                    return Err(login);
                }
                self.fetch_with_retry(resource).await
            }
            other => other,
        }
    }

    async fn fetch_with_retry(&self, resource: Resource) -> Result<Value, Error> {
        self.retry
            .run(resource.cache_key(), || self.fetch_once(resource))
            .await
    }

    /// Log in again unless another fetch already did since `seen`.
    async fn relogin(&self, seen: u64) -> Result<(), Error> {
        let _guard = self.login_lock.lock().await;
        if self.session_epoch.load(Ordering::Acquire) != seen {
            return Ok(());
        }
        self.login().await
    }

    pub(crate) fn session_established(&self) {
        self.session_epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// A single GET against the resource's monitor endpoint.
    pub async fn fetch_once(&self, resource: Resource) -> Result<Value, Error> {
        let url = self.resource_url(resource)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        self.parse_envelope(resp).await
    }

    fn classify_transport(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(e)
        }
    }

    /// Classify the HTTP status, then unwrap the monitor envelope.
    ///
    /// A 2xx whose envelope says `"status": "error"` becomes
    /// [`Error::Api`]. Bodies without an envelope are returned whole.
    async fn parse_envelope(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("gateway rejected credentials (HTTP {status})"),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(Error::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let value: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })?;

        if !value.is_object() {
            return Ok(value);
        }
        let Ok(envelope) = MonitorEnvelope::deserialize(&value) else {
            return Ok(value);
        };

        if envelope.status.as_deref() == Some("error") {
            let detail = envelope
                .error
                .map(|e| match e {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .or_else(|| envelope.http_status.map(|s| format!("http_status={s}")))
                .unwrap_or_else(|| "unspecified error".into());
            return Err(Error::Api { message: detail });
        }

        match envelope.results {
            Some(Value::Object(mut results)) => {
                // System status keeps serial/version beside `results`.
                for key in ENVELOPE_IDENTITY_FIELDS {
                    if let Some(v) = value.get(key) {
                        results.entry(key).or_insert_with(|| v.clone());
                    }
                }
                Ok(Value::Object(results))
            }
            Some(results) => Ok(results),
            None => Ok(value),
        }
    }
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
