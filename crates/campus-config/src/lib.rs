//! Shared configuration for `campusctl`.
//!
//! TOML profiles plus `CAMPUS_*` environment overrides, and translation
//! into `campus_core::{BackendConfig, ReconcilerConfig}`. The CLI layers
//! its global flags on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use campus_core::config::{DEFAULT_API_URL, DEFAULT_REPORT_RECIPIENT};
use campus_core::{BackendConfig, ReconcilerConfig};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "CAMPUS_CONFIG";

// ── Error ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

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

// ── TOML config structs ──────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout, humantime syntax (`10s`, `1m`).
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Poll period for counters and health; `off` disables polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> String {
    "10s".into()
}
fn default_poll_interval() -> String {
    "5s".into()
}

/// A named backend profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// REST root, e.g. `http://campus-gw:5000/api`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Socket.IO origin; derived from `api_url` when absent.
    pub socket_url: Option<String>,

    pub timeout: Option<String>,

    pub poll_interval: Option<String>,

    /// Subscribe to live push events.
    pub push: Option<bool>,

    /// Mail a report automatically on CRITICAL alerts.
    pub auto_report: Option<bool>,

    /// Recipient named in report confirmations.
    pub report_recipient: Option<String>,

    /// Accept self-signed certificates.
    pub accept_invalid_certs: Option<bool>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            socket_url: None,
            timeout: None,
            poll_interval: None,
            push: None,
            auto_report: None,
            report_recipient: None,
            accept_invalid_certs: None,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

// ── Config file path ─────────────────────────────────────────────────

/// Resolve the config file path: `$CAMPUS_CONFIG`, else platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("in", "rnsinstitute", "campusctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("campusctl");
    p
}

// ── Config loading ───────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) with `CAMPUS_*` overrides.
/// Nested keys use a double underscore: `CAMPUS_DEFAULTS__TIMEOUT=30s`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAMPUS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ────────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ───────────────────────────────────────────────

/// Pick the requested profile, else the configured default.
///
/// A missing `default` profile resolves to the built-in localhost profile;
/// any other missing name is an error.
pub fn resolve_profile(config: &Config, requested: Option<&str>) -> Result<(String, Profile), ConfigError> {
    let name = requested
        .or(config.default_profile.as_deref())
        .unwrap_or("default")
        .to_owned();
    match config.profiles.get(&name) {
        Some(profile) => Ok((name, profile.clone())),
        None if name == "default" => Ok((name, Profile::default())),
        None => Err(ConfigError::UnknownProfile { profile: name }),
    }
}

/// Parse a humantime duration; `off`, `never` and `0` mean `None`.
pub fn parse_interval(field: &str, raw: &str) -> Result<Option<Duration>, ConfigError> {
    let raw = raw.trim();
    if matches!(raw, "off" | "never" | "0" | "0s") {
        return Ok(None);
    }
    humantime::parse_duration(raw)
        .map(Some)
        .map_err(|e| ConfigError::Validation {
            field: field.into(),
            reason: format!("'{raw}': {e}"),
        })
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    parse_interval("timeout", raw)?.ok_or_else(|| ConfigError::Validation {
        field: "timeout".into(),
        reason: "must be greater than zero".into(),
    })
}

/// `http://host:5000/api` → `http://host:5000`.
fn origin_of(api_url: &str) -> Result<String, ConfigError> {
    let url = Url::parse(api_url).map_err(|e| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("'{api_url}': {e}"),
    })?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("'{api_url}' has no host"),
        });
    }
    Ok(origin.ascii_serialization())
}

/// Build a `BackendConfig` from a profile without CLI flag overrides.
pub fn profile_to_backend_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<BackendConfig, ConfigError> {
    let socket_url = match profile.socket_url {
        Some(ref url) => url.clone(),
        None => origin_of(&profile.api_url)?,
    };
    let mut backend = BackendConfig::new(&profile.api_url, &socket_url).map_err(|e| {
        ConfigError::Validation {
            field: "api_url".into(),
            reason: e.to_string(),
        }
    })?;
    backend.timeout = parse_timeout(profile.timeout.as_deref().unwrap_or(&defaults.timeout))?;
    backend.accept_invalid_certs = profile.accept_invalid_certs.unwrap_or(false);
    Ok(backend)
}

/// Build a long-running `ReconcilerConfig` (polling and push on by default).
pub fn profile_to_reconciler_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ReconcilerConfig, ConfigError> {
    let poll_interval = parse_interval(
        "poll_interval",
        profile
            .poll_interval
            .as_deref()
            .unwrap_or(&defaults.poll_interval),
    )?;
    Ok(ReconcilerConfig {
        poll_interval,
        push_enabled: profile.push.unwrap_or(true),
        auto_report_critical: profile.auto_report.unwrap_or(true),
        report_recipient: profile
            .report_recipient
            .clone()
            .unwrap_or_else(|| DEFAULT_REPORT_RECIPIENT.into()),
        ..ReconcilerConfig::default()
    })
}
