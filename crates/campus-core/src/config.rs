// ── Runtime configuration ────────────────────────────────────────────
//
// Plain structs built by `campus-config` (or by hand in tests). Nothing
// here touches the filesystem or environment.

use std::time::Duration;

use campus_api::ReconnectConfig;
use url::Url;

use crate::error::CoreError;
use crate::store::StoreLimits;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:5000";
pub const DEFAULT_REPORT_RECIPIENT: &str = "admin@rnsinstitute.edu.in";

/// Where and how to reach the backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// REST root, e.g. `http://localhost:5000/api`.
    pub api_url: Url,
    /// HTTP origin of the Socket.IO server, e.g. `http://localhost:5000`.
    pub socket_url: Url,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    pub reconnect: ReconnectConfig,
}

impl BackendConfig {
    pub fn new(api_url: &str, socket_url: &str) -> Result<Self, CoreError> {
        let parse = |what: &str, raw: &str| {
            Url::parse(raw).map_err(|e| CoreError::Config {
                message: format!("invalid {what} URL {raw:?}: {e}"),
            })
        };
        Ok(Self {
            api_url: parse("API", api_url)?,
            socket_url: parse("socket", socket_url)?,
            ..Self::default()
        })
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).unwrap_or_else(|_| unreachable!()),
            socket_url: Url::parse(DEFAULT_SOCKET_URL).unwrap_or_else(|_| unreachable!()),
            timeout: campus_api::transport::DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Behaviour of a `Reconciler` session.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Poll interval for counters and health; `None` disables polling.
    pub poll_interval: Option<Duration>,
    /// Subscribe to the source's push channel while live.
    pub push_enabled: bool,
    /// Fetch every family while loading.
    pub initial_fetch: bool,
    pub limits: StoreLimits,
    /// Mail a report when a CRITICAL alert is pushed and email alerts are on.
    pub auto_report_critical: bool,
    /// Shown in the local alert after a report is sent.
    pub report_recipient: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Some(Duration::from_secs(5)),
            push_enabled: true,
            initial_fetch: true,
            limits: StoreLimits::default(),
            auto_report_critical: true,
            report_recipient: DEFAULT_REPORT_RECIPIENT.to_owned(),
        }
    }
}

impl ReconcilerConfig {
    /// No polling, no push, no initial fetch: for one-shot CLI commands.
    pub fn oneshot(mut self) -> Self {
        self.poll_interval = None;
        self.push_enabled = false;
        self.initial_fetch = false;
        self.auto_report_critical = false;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let backend = BackendConfig::default();
        assert_eq!(backend.api_url.as_str(), "http://localhost:5000/api");
        assert_eq!(backend.socket_url.as_str(), "http://localhost:5000/");
        assert_eq!(backend.timeout, Duration::from_secs(10));

        let reconciler = ReconcilerConfig::default();
        assert_eq!(reconciler.poll_interval, Some(Duration::from_secs(5)));
        assert_eq!(reconciler.limits.alert_retention, 15);
        assert_eq!(reconciler.limits.history_len, 20);
    }

    #[test]
    fn oneshot_disables_background_work() {
        let config = ReconcilerConfig::default().oneshot();
        assert!(config.poll_interval.is_none());
        assert!(!config.push_enabled);
        assert!(!config.initial_fetch);
    }

    #[test]
    fn bad_url_is_config_error() {
        let err = BackendConfig::new("not a url", DEFAULT_SOCKET_URL).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
