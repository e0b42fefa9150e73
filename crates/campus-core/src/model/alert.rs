// ── Alerts ───────────────────────────────────────────────────────────
//
// Security alerts as shown in the defense feed. An `AlertEvent` is
// immutable once built; the store keeps them newest-first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Backend-assigned severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Info,
}

/// Coarse alert class, used for the feed icon.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AlertKind {
    Critical,
    Warning,
    Info,
}

impl From<Severity> for AlertKind {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Critical,
            Severity::High | Severity::Medium => Self::Warning,
            Severity::Info => Self::Info,
        }
    }
}

/// Where an alert came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOrigin {
    /// Attack log or `attack_detected` push.
    Backend,
    /// Generated locally after a confirmed operator action.
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub severity: Severity,
    pub kind: AlertKind,
    pub category: String,
    pub message: String,
    pub observed_at: DateTime<Utc>,
    pub source_address: Option<String>,
    pub origin: AlertOrigin,
}

impl AlertEvent {
    /// Informational alert recording an operator action.
    pub fn local_info(
        category: impl Into<String>,
        message: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            severity: Severity::Info,
            kind: AlertKind::Info,
            category: category.into(),
            message: message.into(),
            observed_at,
            source_address: None,
            origin: AlertOrigin::Local,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_address = Some(source.into());
        self
    }

    /// Idempotency key: two deliveries of the same backend alert share it.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.category,
            self.message,
            self.observed_at.timestamp(),
            self.source_address.as_deref().unwrap_or("")
        )
    }
}

/// Resource warnings pushed by the backend (`system_warning`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemWarning {
    pub messages: Vec<String>,
    pub observed_at: DateTime<Utc>,
}
