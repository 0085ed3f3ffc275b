//! CLI configuration: thin wrapper around `fortiwatch_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--gateway, --token, --vdom, ...).

use fortiwatch_config::{Config, Profile};
use fortiwatch_core::MonitorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use fortiwatch_config::{config_path, load_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Apply flag overrides on top of a profile.
fn apply_flags(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref gateway) = global.gateway {
        profile.gateway.clone_from(gateway);
    }
    if let Some(ref token) = global.token {
        profile.auth_mode = "token".into();
        profile.token = Some(token.clone());
    }
    if let Some(ref vdom) = global.vdom {
        profile.vdom.clone_from(vdom);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    if global.cache_dir.is_some() {
        profile.cache_dir.clone_from(&global.cache_dir);
    }
}

/// Build a `MonitorConfig` from the config file, profile, and flags.
///
/// Without a matching profile, `--gateway` alone is enough as long as a
/// token is available from `--token` or the environment.
pub fn build_monitor_config(global: &GlobalOpts) -> Result<MonitorConfig, CliError> {
    let cfg = load_config()?;
    let name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.gateway.is_some() => Profile {
            vdom: "root".into(),
            auth_mode: "token".into(),
            ..Profile::default()
        },
        // An explicitly requested profile must exist.
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    apply_flags(&mut profile, global);
    Ok(fortiwatch_config::profile_to_monitor_config(
        &profile,
        &name,
        &cfg.defaults,
    )?)
}
