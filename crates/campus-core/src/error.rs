// ── Core error types ─────────────────────────────────────────────────
//
// Domain errors from campus-core. Consumers never see reqwest or serde
// failures directly: the `From<campus_api::Error>` impl folds transport
// failures into `Transport`, bad payloads into `Protocol`, and backend
// refusals into `CommandRejected`.

use std::fmt;

use thiserror::Error;

/// Why the backend could not be reached or answered abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Refused,
    ServerStatus(u16),
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Refused => f.write_str("connection refused"),
            Self::ServerStatus(code) => write!(f, "HTTP {code}"),
            Self::Other => f.write_str("transport failure"),
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Backend errors ───────────────────────────────────────────────
    #[error("Backend unavailable ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("Malformed payload from backend: {message}")]
    Protocol { message: String },

    #[error("Command rejected by backend: {reason}")]
    CommandRejected { reason: String },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Unknown sector: {sector}")]
    UnknownSector { sector: String },

    #[error("Unknown sensor {sensor} in sector {sector}")]
    UnknownSensor { sector: String, sensor: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Reconciler is not live (state: {state})")]
    NotLive { state: String },

    #[error("Reconciler is already running")]
    AlreadyStarted,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures the next poll tick may clear on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { kind, .. } => match kind {
                TransportErrorKind::ServerStatus(code) => *code >= 500,
                _ => true,
            },
            _ => false,
        }
    }

    /// `true` if the backend understood and declined the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CommandRejected { .. })
    }
}

impl From<campus_api::Error> for CoreError {
    fn from(err: campus_api::Error) -> Self {
        use campus_api::Error as Api;

        match err {
            Api::Timeout { timeout_secs } => Self::Transport {
                kind: TransportErrorKind::Timeout,
                message: format!("no response within {timeout_secs}s"),
            },
            Api::ConnectionRefused { url } => Self::Transport {
                kind: TransportErrorKind::Refused,
                message: format!("nothing listening at {url}"),
            },
            Api::Transport(ref e) => {
                let kind = if e.is_timeout() {
                    TransportErrorKind::Timeout
                } else if e.is_connect() {
                    TransportErrorKind::Refused
                } else if let Some(status) = e.status() {
                    TransportErrorKind::ServerStatus(status.as_u16())
                } else {
                    TransportErrorKind::Other
                };
                Self::Transport {
                    kind,
                    message: err.to_string(),
                }
            }
            Api::ServerStatus { status, message } => Self::Transport {
                kind: TransportErrorKind::ServerStatus(status),
                message,
            },
            Api::CommandRejected { message } => Self::CommandRejected { reason: message },
            Api::Deserialization { message, .. } | Api::Protocol(message) => {
                Self::Protocol { message }
            }
            Api::InvalidUrl(e) => Self::Config {
                message: format!("invalid backend URL: {e}"),
            },
            Api::WebSocketConnect(message) => Self::Transport {
                kind: TransportErrorKind::Other,
                message,
            },
            Api::WebSocketClosed { code, reason } => Self::Transport {
                kind: TransportErrorKind::Other,
                message: format!("push channel closed ({code}): {reason}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_onto_taxonomy() {
        let timeout: CoreError = campus_api::Error::Timeout { timeout_secs: 10 }.into();
        assert!(matches!(
            timeout,
            CoreError::Transport {
                kind: TransportErrorKind::Timeout,
                ..
            }
        ));
        assert!(timeout.is_transient());

        let rejected: CoreError = campus_api::Error::CommandRejected {
            message: "nope".into(),
        }
        .into();
        assert!(rejected.is_rejection());

        let malformed: CoreError = campus_api::Error::Deserialization {
            message: "expected map".into(),
            body: "[]".into(),
        }
        .into();
        assert!(matches!(malformed, CoreError::Protocol { .. }));

        let server: CoreError = campus_api::Error::ServerStatus {
            status: 503,
            message: "down".into(),
        }
        .into();
        assert!(matches!(
            server,
            CoreError::Transport {
                kind: TransportErrorKind::ServerStatus(503),
                ..
            }
        ));
    }
}
