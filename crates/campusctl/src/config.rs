//! CLI configuration: a thin wrapper around `campus_config` shared types.
//!
//! Adds CLI-specific resolution that respects `GlobalOpts` flag overrides
//! (--api-url, --socket-url, --timeout, --insecure).

use campus_config::{ConfigError, resolve_profile};
use campus_core::{BackendConfig, ReconcilerConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use campus_config::{Config, Profile, config_path, load_config, save_config};

/// Everything needed to build a source and a reconciler.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub profile_name: String,
    pub backend: BackendConfig,
    pub reconciler: ReconcilerConfig,
}

/// Pick the active profile and apply CLI flag overrides on top of it.
pub fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref api_url) = global.api_url {
        profile.api_url.clone_from(api_url);
        // a new API root implies a new socket origin unless one is given
        profile.socket_url = None;
    }
    if let Some(ref socket_url) = global.socket_url {
        profile.socket_url = Some(socket_url.clone());
    }
    if let Some(ref timeout) = global.timeout {
        profile.timeout = Some(timeout.clone());
    }
    if global.insecure {
        profile.accept_invalid_certs = Some(true);
    }
    profile
}

/// Load the config file and resolve the active profile with overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config()?;
    resolve_from(&cfg, global)
}

pub fn resolve_from(cfg: &Config, global: &GlobalOpts) -> Result<Resolved, CliError> {
    let (profile_name, profile) =
        resolve_profile(cfg, global.profile.as_deref()).map_err(|err| match err {
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: available_profiles(cfg),
            },
            other => other.into(),
        })?;
    let profile = apply_overrides(profile, global);

    let backend = campus_config::profile_to_backend_config(&profile, &cfg.defaults)?;
    let reconciler = campus_config::profile_to_reconciler_config(&profile, &cfg.defaults)?;

    tracing::debug!(
        profile = %profile_name,
        api_url = %backend.api_url,
        socket_url = %backend.socket_url,
        "resolved backend configuration"
    );

    Ok(Resolved {
        profile_name,
        backend,
        reconciler,
    })
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
