use thiserror::Error;

/// Top-level error type for the `campus-api` crate.
///
/// Covers every failure mode of the backend surfaces: HTTP transport,
/// the `{success, data, error}` response envelope, and the Socket.IO push
/// channel. `campus-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ────────────────────────────────────────────────────
    /// HTTP transport error (DNS failure, TLS, broken connection, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The backend refused the TCP connection (service not running).
    #[error("Connection refused by {url}")]
    ConnectionRefused { url: String },

    // ── Backend envelope ─────────────────────────────────────────────
    /// Non-2xx HTTP status. `message` carries the envelope's `error` field
    /// when the body parsed, otherwise a body preview.
    #[error("Backend returned HTTP {status}: {message}")]
    ServerStatus { status: u16, message: String },

    /// HTTP 200 with `success: false`: the backend understood the request
    /// and declined it.
    #[error("Command rejected by backend: {message}")]
    CommandRejected { message: String },

    // ── Push channel ─────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Engine.IO / Socket.IO frame that could not be decoded.
    #[error("Push protocol error: {0}")]
    Protocol(String),

    // ── Data ─────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying on the
    /// next poll or reconnect.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::ConnectionRefused { .. } | Self::WebSocketConnect(_) => {
                true
            }
            Self::ServerStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the backend explicitly declined a command.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CommandRejected { .. })
    }

    /// Map a raw reqwest failure onto the narrower transport variants.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else if err.is_connect() {
            Self::ConnectionRefused {
                url: err
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
            }
        } else {
            Self::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let e500 = Error::ServerStatus {
            status: 500,
            message: "boom".into(),
        };
        let e404 = Error::ServerStatus {
            status: 404,
            message: "missing".into(),
        };
        assert!(e500.is_transient());
        assert!(!e404.is_transient());
    }

    #[test]
    fn rejection_is_not_transient() {
        let err = Error::CommandRejected {
            message: "unknown measure".into(),
        };
        assert!(err.is_rejection());
        assert!(!err.is_transient());
    }
}
