// ── Runtime monitor configuration ──
//
// These types describe which gateway to poll and how to run the
// pipeline. They carry credential data and tuning, but never touch disk.
// The binary builds a `MonitorConfig` (usually through fortiwatch-config)
// and hands it in.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use fortiwatch_api::{Credentials, RetryPolicy, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::broadcast::DEFAULT_CLIENT_BUFFER;
use crate::topology::TopologyOptions;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// One day of samples at the default refresh interval.
pub const DEFAULT_HISTORY_CAPACITY: usize = 288;
pub const DEFAULT_BROADCAST_PORT: u16 = 8765;

/// How to authenticate with the gateway.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// REST API administrator token.
    ApiToken(SecretString),
    /// Interactive administrator login (session cookie).
    Session {
        username: String,
        password: SecretString,
    },
}

impl From<AuthCredentials> for Credentials {
    fn from(auth: AuthCredentials) -> Self {
        match auth {
            AuthCredentials::ApiToken(token) => Credentials::ApiToken(token),
            AuthCredentials::Session { username, password } => {
                Credentials::Session { username, password }
            }
        }
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Default: gateways ship self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Memory and disk cache tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of an in-memory entry. Default: 10 minutes.
    pub memory_ttl: Duration,
    /// Directory for per-resource disk snapshots. `None` disables the
    /// disk tier.
    pub dir: Option<PathBuf>,
    /// Disk snapshots older than this are not served. Default: 24 hours.
    pub max_staleness: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl: Duration::from_secs(10 * 60),
            dir: None,
            max_staleness: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Real-time server tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    pub bind: SocketAddr,
    /// Interval between server ping frames. Default: 30s.
    pub heartbeat_interval: Duration,
    /// A client silent for this long is dropped. Default: 90s.
    pub client_timeout: Duration,
    /// Outbound frames queued per client before updates are dropped.
    pub client_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_BROADCAST_PORT)),
            heartbeat_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
            client_buffer: DEFAULT_CLIENT_BUFFER,
        }
    }
}

/// Configuration for monitoring a single gateway.
///
/// Built by the binary and passed to `Orchestrator`; core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Gateway URL (e.g., `https://192.168.1.99`).
    pub url: Url,
    pub auth: AuthCredentials,
    /// Virtual domain the monitor endpoints are scoped to.
    pub vdom: String,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Period of the refresh timer. Zero disables it.
    pub refresh_interval: Duration,
    pub cache: CacheConfig,
    /// Operator-supplied fallback dataset. `None` uses the bundled one.
    pub fallback_path: Option<PathBuf>,
    pub topology: TopologyOptions,
    pub broadcast: BroadcastConfig,
    /// Cycles of aggregate metrics kept in memory.
    pub history_capacity: usize,
}

impl MonitorConfig {
    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            vdom: "root".into(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            cache: CacheConfig::default(),
            fallback_path: None,
            topology: TopologyOptions::default(),
            broadcast: BroadcastConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
            cookie_jar: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = MonitorConfig::new(
            "https://10.0.0.1".parse().unwrap(),
            AuthCredentials::ApiToken(SecretString::from("t".to_owned())),
        );
        assert_eq!(cfg.refresh_interval, Duration::from_secs(300));
        assert_eq!(cfg.cache.memory_ttl, Duration::from_secs(600));
        assert_eq!(cfg.cache.max_staleness, Duration::from_secs(86_400));
        assert_eq!(cfg.broadcast.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.broadcast.client_timeout, Duration::from_secs(90));
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.history_capacity, 288);
        assert_eq!(cfg.vdom, "root");
        assert!(matches!(cfg.transport().tls, TlsMode::DangerAcceptInvalid));
    }

    #[test]
    fn session_auth_maps_to_session_credentials() {
        let auth = AuthCredentials::Session {
            username: "admin".into(),
            password: SecretString::from("pw".to_owned()),
        };
        assert!(Credentials::from(auth).is_session());
    }
}
