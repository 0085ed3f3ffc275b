//! Configuration for the fortiwatch binary.
//!
//! TOML profiles, environment overrides, credential resolution (env +
//! plaintext), and translation to `fortiwatch_core::MonitorConfig`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fortiwatch_core::{AuthCredentials, MonitorConfig, PortSynthesis, TlsVerification};

/// Environment prefix for config overrides. Nested keys use `__`,
/// e.g. `FORTIWATCH_PROFILES__LAB__GATEWAY`.
pub const ENV_PREFIX: &str = "FORTIWATCH_";
pub const TOKEN_ENV: &str = "FORTIWATCH_TOKEN";
pub const USERNAME_ENV: &str = "FORTIWATCH_USERNAME";
pub const PASSWORD_ENV: &str = "FORTIWATCH_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Pick `requested`, else the configured default profile.
    pub fn profile<'a>(
        &'a self,
        requested: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Accept self-signed gateway certificates unless a profile says
    /// otherwise.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// Request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Refresh period for `serve`, seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Real-time server listen address.
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: default_insecure(),
            timeout: default_timeout(),
            refresh_interval: default_refresh_interval(),
            listen: default_listen(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_insecure() -> bool {
    true
}
fn default_timeout() -> u64 {
    10
}
fn default_refresh_interval() -> u64 {
    300
}
fn default_listen() -> String {
    "127.0.0.1:8765".into()
}

/// A named gateway profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Gateway base URL (e.g., "https://192.168.1.99").
    pub gateway: String,

    #[serde(default = "default_vdom")]
    pub vdom: String,

    /// Auth mode: "token" or "session".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// REST API token (plaintext, prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable name containing the API token.
    pub token_env: Option<String>,

    /// Administrator name for session auth.
    pub username: Option<String>,

    /// Administrator password for session auth (plaintext).
    pub password: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override the insecure TLS default.
    pub insecure: Option<bool>,

    pub timeout: Option<u64>,
    pub refresh_interval: Option<u64>,

    /// Attempts per upstream request, including the first.
    pub retries: Option<u32>,

    /// Disk cache directory. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,

    /// Replacement for the bundled fallback dataset.
    pub fallback: Option<PathBuf>,

    pub listen: Option<String>,
    pub history_capacity: Option<usize>,

    /// Switch model prefixes treated as core switches.
    pub core_models: Option<Vec<String>>,

    pub port_synthesis: Option<PortSynthesis>,
}

fn default_vdom() -> String {
    "root".into()
}
fn default_auth_mode() -> String {
    "token".into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "fortiwatch", "fortiwatch")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location for per-resource disk snapshots.
pub fn default_cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

fn dirs_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("fortiwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) layered under the environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve an API token: profile's `token_env`, then `FORTIWATCH_TOKEN`,
/// then plaintext.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(val) = std::env::var(TOKEN_ENV) {
        return Ok(SecretString::from(val));
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve session credentials (username + password).
pub fn resolve_session_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let missing = || ConfigError::NoCredentials {
        profile: profile_name.into(),
    };

    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(missing)?;

    let password = std::env::var(PASSWORD_ENV)
        .ok()
        .or_else(|| profile.password.clone())
        .ok_or_else(missing)?;

    Ok((username, SecretString::from(password)))
}

/// Resolve `AuthCredentials` from a profile's `auth_mode` field.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    match profile.auth_mode.as_str() {
        "token" => Ok(AuthCredentials::ApiToken(resolve_token(
            profile,
            profile_name,
        )?)),
        "session" => {
            let (username, password) = resolve_session_credentials(profile, profile_name)?;
            Ok(AuthCredentials::Session { username, password })
        }
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'token' or 'session', got '{other}'"),
        }),
    }
}

pub fn resolve_tls(profile: &Profile, defaults: &Defaults) -> TlsVerification {
    if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `MonitorConfig` from a profile layered over `defaults`.
pub fn profile_to_monitor_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<MonitorConfig, ConfigError> {
    let url: url::Url = profile
        .gateway
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "gateway".into(),
            reason: format!("invalid URL: '{}'", profile.gateway),
        })?;

    let auth = resolve_auth(profile, profile_name)?;
    let mut cfg = MonitorConfig::new(url, auth);

    cfg.vdom.clone_from(&profile.vdom);
    cfg.tls = resolve_tls(profile, defaults);
    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    cfg.refresh_interval = Duration::from_secs(
        profile
            .refresh_interval
            .unwrap_or(defaults.refresh_interval),
    );
    if let Some(attempts) = profile.retries {
        if attempts == 0 {
            return Err(ConfigError::Validation {
                field: "retries".into(),
                reason: "must be at least 1".into(),
            });
        }
        cfg.retry.max_attempts = attempts;
    }

    cfg.cache.dir = Some(profile.cache_dir.clone().unwrap_or_else(default_cache_dir));
    cfg.fallback_path.clone_from(&profile.fallback);

    let listen = profile.listen.as_deref().unwrap_or(&defaults.listen);
    cfg.broadcast.bind = listen
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::Validation {
            field: "listen".into(),
            reason: format!("'{listen}': {e}"),
        })?;

    if let Some(capacity) = profile.history_capacity {
        cfg.history_capacity = capacity;
    }
    if let Some(ref models) = profile.core_models {
        cfg.topology.core_models.clone_from(models);
    }
    if let Some(mode) = profile.port_synthesis {
        cfg.topology.port_synthesis = mode;
    }

    Ok(cfg)
}
