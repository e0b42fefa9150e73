//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use campus_config::ConfigError;
use campus_core::{CoreError, TransportErrorKind};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the campus backend ({kind})")]
    #[diagnostic(
        code(campus::unreachable),
        help(
            "Check that the backend is running and reachable.\n\
             Details: {message}\n\
             Try: campusctl system status --simulate"
        )
    )]
    Unreachable { kind: String, message: String },

    #[error("Backend did not answer in time")]
    #[diagnostic(
        code(campus::timeout),
        help("Increase the timeout with --timeout or check backend load.")
    )]
    Timeout { message: String },

    #[error("Backend sent an unexpected payload: {message}")]
    #[diagnostic(
        code(campus::protocol),
        help("The backend version may not match this CLI. Run with -vv for details.")
    )]
    Protocol { message: String },

    // ── Commands ─────────────────────────────────────────────────────

    #[error("Backend rejected the command: {reason}")]
    #[diagnostic(code(campus::rejected))]
    Rejected { reason: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(campus::not_found),
        help("Run: campusctl {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(campus::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(campus::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: campusctl config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(
        code(campus::config),
        help("Check the config file shown by: campusctl config path")
    )]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(campus::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal ─────────────────────────────────────────────────────

    #[error("{0}")]
    #[diagnostic(code(campus::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } | Self::Config(_) => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport {
                kind: TransportErrorKind::Timeout,
                message,
            } => CliError::Timeout { message },

            CoreError::Transport { kind, message } => CliError::Unreachable {
                kind: kind.to_string(),
                message,
            },

            CoreError::Protocol { message } => CliError::Protocol { message },

            CoreError::CommandRejected { reason } => CliError::Rejected { reason },

            CoreError::UnknownSector { sector } => CliError::NotFound {
                resource_type: "sector".into(),
                identifier: sector,
                list_command: "sensors list".into(),
            },

            CoreError::UnknownSensor { sector, sensor } => CliError::NotFound {
                list_command: format!("sensors list --sector {sector}"),
                resource_type: "sensor".into(),
                identifier: sensor,
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            other @ (CoreError::NotLive { .. }
            | CoreError::AlreadyStarted
            | CoreError::Internal(_)) => CliError::Internal(other.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
