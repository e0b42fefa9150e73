// Backend REST client
//
// Wraps `reqwest::Client` with URL construction under the `/api` prefix and
// unwrapping of the `{success, data, message, error}` envelope. Callers only
// ever see the unwrapped payload or a typed `Error`.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{
    Ack, AddressRequest, AttackRecord, Envelope, MitigationRequest, SensorControlRequest,
    SensorMap, ServiceStatus, SystemStats, ToggleRequest,
};
use crate::transport::{DEFAULT_TIMEOUT, TransportConfig};

/// Longest body excerpt carried into error messages.
const BODY_PREVIEW_CHARS: usize = 200;

/// Mitigation measure name the backend treats as "restart network services".
pub const RESTART_NETWORK_MEASURE: &str = "restart_network";

/// Raw HTTP client for the Smart Campus backend.
///
/// `base_url` is the API root (e.g. `http://localhost:5000/api`); every
/// endpoint path is appended to it.
#[derive(Debug, Clone)]
pub struct CampusClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl CampusClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/{path}` with exactly one slash between the two.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Sensors ──────────────────────────────────────────────────────

    /// `GET /sensors`: latest reading per sector and sensor.
    pub async fn get_sensors(&self) -> Result<SensorMap, Error> {
        self.get(self.api_url("sensors")?).await
    }

    /// `POST /sensors/control`. `action` is `"on"` or `"off"`.
    pub async fn control_sensor(
        &self,
        sector: &str,
        sensor: &str,
        action: &str,
    ) -> Result<Ack, Error> {
        let body = SensorControlRequest {
            sector,
            sensor,
            action,
        };
        self.post(self.api_url("sensors/control")?, &body).await
    }

    // ── System ───────────────────────────────────────────────────────

    /// `GET /system/stats`.
    pub async fn get_system_stats(&self) -> Result<SystemStats, Error> {
        self.get(self.api_url("system/stats")?).await
    }

    /// `GET /` on the service root. The root endpoint is not enveloped.
    pub async fn status(&self) -> Result<ServiceStatus, Error> {
        let url = self.base_url.join("/")?;
        debug!("GET {}", url);
        let resp = self.send(self.http.get(url)).await?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;
        if !status.is_success() {
            return Err(Error::ServerStatus {
                status: status.as_u16(),
                message: preview(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    // ── Security ─────────────────────────────────────────────────────

    /// `GET /security/attacks`: the backend's attack log, oldest first.
    pub async fn get_attacks(&self) -> Result<Vec<AttackRecord>, Error> {
        self.get(self.api_url("security/attacks")?).await
    }

    /// `GET /security/stats`: attack counts keyed by snake_case category.
    pub async fn get_security_stats(&self) -> Result<HashMap<String, u64>, Error> {
        self.get(self.api_url("security/stats")?).await
    }

    /// `POST /security/block-ip`.
    pub async fn block_ip(&self, ip: &str) -> Result<Ack, Error> {
        self.post(self.api_url("security/block-ip")?, &AddressRequest { ip })
            .await
    }

    /// `POST /security/unblock-ip`.
    pub async fn unblock_ip(&self, ip: &str) -> Result<Ack, Error> {
        self.post(self.api_url("security/unblock-ip")?, &AddressRequest { ip })
            .await
    }

    /// `POST /mitigation/toggle`.
    ///
    /// Pass [`RESTART_NETWORK_MEASURE`] to restart network services; the
    /// `enabled` flag is ignored by the backend in that case.
    pub async fn toggle_mitigation(&self, measure: &str, enabled: bool) -> Result<Ack, Error> {
        self.post(
            self.api_url("mitigation/toggle")?,
            &MitigationRequest { measure, enabled },
        )
        .await
    }

    // ── Email ────────────────────────────────────────────────────────

    /// `POST /email/send-report`.
    pub async fn send_email_report(&self) -> Result<Ack, Error> {
        self.post(self.api_url("email/send-report")?, &serde_json::json!({}))
            .await
    }

    /// `POST /email/toggle`.
    pub async fn toggle_email_alerts(&self, enabled: bool) -> Result<Ack, Error> {
        self.post(self.api_url("email/toggle")?, &ToggleRequest { enabled })
            .await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))
    }

    /// Send a GET request and return the envelope's `data` payload.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.send(self.http.get(url)).await?;
        let envelope: Envelope<T> = self.parse_envelope(resp).await?;

        envelope.data.ok_or_else(|| Error::Deserialization {
            message: "envelope reported success but carried no data".into(),
            body: String::new(),
        })
    }

    /// Send a POST request with a JSON body and return the confirmation.
    async fn post(&self, url: Url, body: &(impl Serialize + Sync)) -> Result<Ack, Error> {
        debug!("POST {}", url);

        let resp = self.send(self.http.post(url).json(body)).await?;
        let envelope: Envelope<serde_json::Value> = self.parse_envelope(resp).await?;

        Ok(Ack {
            message: envelope.message,
        })
    }

    /// Parse the `{success, data, message, error}` envelope.
    ///
    /// Non-2xx statuses become `ServerStatus` (the Flask handlers answer 500
    /// with `{success: false, error}`); a 2xx with `success: false` becomes
    /// `CommandRejected`.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<Envelope<T>, Error> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;
        trace!(status = status.as_u16(), len = body.len(), "response received");

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|env| env.reason().map(String::from))
                .unwrap_or_else(|| preview(&body));
            return Err(Error::ServerStatus {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body: body.clone(),
            }
        })?;

        if envelope.success {
            Ok(envelope)
        } else {
            Err(Error::CommandRejected {
                message: envelope
                    .reason()
                    .unwrap_or("backend reported failure without a reason")
                    .to_owned(),
            })
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_with_single_slash() {
        for base in ["http://localhost:5000/api", "http://localhost:5000/api/"] {
            let client =
                CampusClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap());
            assert_eq!(
                client.api_url("security/stats").unwrap().as_str(),
                "http://localhost:5000/api/security/stats"
            );
        }
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(300);
        assert_eq!(preview(&body).chars().count(), BODY_PREVIEW_CHARS);
    }
}
