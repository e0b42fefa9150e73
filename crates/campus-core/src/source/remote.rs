// ── Remote backend source ────────────────────────────────────────────
//
// Adapts `CampusClient` (REST) and `PushHandle` (Socket.IO) to the
// `DataSource` contract, converting wire payloads on the way in.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use campus_api::models::ServiceStatus;
use campus_api::{
    CampusClient, PushEvent, PushHandle, RESTART_NETWORK_MEASURE, TransportConfig, socket_url,
};

use super::{DataSource, EVENT_QUEUE_CAPACITY, SourceEvent, SourceSubscription};
use crate::config::BackendConfig;
use crate::convert;
use crate::error::CoreError;
use crate::model::{
    AlertEvent, AttackCounters, MitigationControl, SectorState, SensorAction, SystemHealthSnapshot,
};

/// The real Smart Campus backend.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    client: CampusClient,
    config: BackendConfig,
}

impl RemoteSource {
    pub fn new(config: BackendConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: config.timeout,
            accept_invalid_certs: config.accept_invalid_certs,
        };
        let client = CampusClient::new(config.api_url.clone(), &transport)?;
        Ok(Self { client, config })
    }

    /// Wrap an existing client; push uses `config.socket_url`.
    pub fn with_client(client: CampusClient, config: BackendConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &CampusClient {
        &self.client
    }

    /// Service banner from the backend root.
    pub async fn status(&self) -> Result<ServiceStatus, CoreError> {
        Ok(self.client.status().await?)
    }
}

impl DataSource for RemoteSource {
    fn describe(&self) -> String {
        self.config.api_url.to_string()
    }

    async fn fetch_attacks(&self) -> Result<Vec<AlertEvent>, CoreError> {
        let log = self.client.get_attacks().await?;
        Ok(convert::alerts_from_log(&log, Utc::now()))
    }

    async fn fetch_security_counters(&self) -> Result<AttackCounters, CoreError> {
        let raw = self.client.get_security_stats().await?;
        Ok(AttackCounters::from_wire(&raw))
    }

    async fn fetch_system_stats(&self) -> Result<SystemHealthSnapshot, CoreError> {
        let stats = self.client.get_system_stats().await?;
        convert::snapshot_from_stats(&stats)
    }

    async fn fetch_sensors(&self) -> Result<IndexMap<String, SectorState>, CoreError> {
        let map = self.client.get_sensors().await?;
        Ok(convert::sectors_from_wire(&map, Utc::now()))
    }

    async fn control_sensor(
        &self,
        sector: &str,
        sensor: &str,
        action: SensorAction,
    ) -> Result<(), CoreError> {
        let ack = self
            .client
            .control_sensor(sector, sensor, &action.to_string())
            .await?;
        debug!(sector, sensor, %action, message = ?ack.message, "sensor control acknowledged");
        Ok(())
    }

    async fn toggle_mitigation(
        &self,
        control: MitigationControl,
        enabled: bool,
    ) -> Result<(), CoreError> {
        self.client
            .toggle_mitigation(&control.to_string(), enabled)
            .await?;
        Ok(())
    }

    async fn restart_network_services(&self) -> Result<(), CoreError> {
        self.client
            .toggle_mitigation(RESTART_NETWORK_MEASURE, true)
            .await?;
        Ok(())
    }

    async fn block_address(&self, ip: IpAddr) -> Result<(), CoreError> {
        self.client.block_ip(&ip.to_string()).await?;
        Ok(())
    }

    async fn unblock_address(&self, ip: IpAddr) -> Result<(), CoreError> {
        self.client.unblock_ip(&ip.to_string()).await?;
        Ok(())
    }

    async fn send_email_report(&self) -> Result<(), CoreError> {
        self.client.send_email_report().await?;
        Ok(())
    }

    async fn toggle_email_alerts(&self, enabled: bool) -> Result<(), CoreError> {
        self.client.toggle_email_alerts(enabled).await?;
        Ok(())
    }

    fn subscribe(&self, cancel: CancellationToken) -> Option<SourceSubscription> {
        let ws_url = match socket_url(&self.config.socket_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "push channel unavailable, continuing with polling only");
                return None;
            }
        };

        let cancel = cancel.child_token();
        let handle = PushHandle::connect(ws_url, self.config.reconnect.clone(), cancel.child_token());
        let link = handle.link();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let bridge_cancel = cancel.clone();
        tokio::spawn(async move {
            push_bridge(handle, tx, bridge_cancel).await;
        });

        info!(url = %self.config.socket_url, "push channel spawned (handshake in progress)");
        Some(SourceSubscription::new(rx, link, cancel))
    }
}

// ── Push bridge ──────────────────────────────────────────────────────

/// Forward push events as domain events until cancelled or the consumer
/// goes away. Owns the handle so the socket closes with the bridge.
async fn push_bridge(
    handle: PushHandle,
    tx: mpsc::Sender<SourceEvent>,
    cancel: CancellationToken,
) {
    let mut rx = handle.subscribe();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = rx.recv() => match result {
                Ok(event) => {
                    let Some(mapped) = source_event(&event) else {
                        continue;
                    };
                    if tx.send(mapped).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "push bridge lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    handle.shutdown();
    debug!("push bridge stopped");
}

fn source_event(event: &Arc<PushEvent>) -> Option<SourceEvent> {
    let now = Utc::now();
    match event.as_ref() {
        PushEvent::AttackDetected(record) => Some(SourceEvent::Alert(
            convert::alert_from_record(record, now),
        )),
        PushEvent::SystemStats(stats) => Some(SourceEvent::Health(
            convert::health_update_from_stats(stats),
        )),
        PushEvent::SensorUpdate(update) => Some(SourceEvent::Sensor {
            sector: update.sector.clone(),
            sensor: update.sensor.clone(),
            state: convert::sensor_from_reading(&update.data, now),
        }),
        PushEvent::SystemWarning(payload) => Some(SourceEvent::Warning(
            convert::warning_from_wire(payload, now),
        )),
        PushEvent::IpBlocked(blocked) => match blocked.ip.trim().parse::<IpAddr>() {
            Ok(ip) => Some(SourceEvent::AddressBlocked(ip)),
            Err(_) => {
                debug!(ip = %blocked.ip, "ignoring ip_blocked with unparseable address");
                None
            }
        },
        PushEvent::ConnectionStatus { status } => {
            debug!(%status, "backend greeting");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use campus_api::models::{AttackRecord, BlockedIp, SensorReading, SensorUpdate};

    use super::*;
    use crate::model::Severity;

    #[test]
    fn push_events_map_to_domain_events() {
        let attack = Arc::new(PushEvent::AttackDetected(AttackRecord {
            kind: Some("critical".into()),
            category: "DoS".into(),
            message: "flood".into(),
            time: Some("2026-10-19T08:00:00Z".into()),
            severity: Some("CRITICAL".into()),
            source: None,
        }));
        let Some(SourceEvent::Alert(alert)) = source_event(&attack) else {
            panic!("expected alert");
        };
        assert_eq!(alert.severity, Severity::Critical);

        let sensor = Arc::new(PushEvent::SensorUpdate(SensorUpdate {
            sector: "building_a".into(),
            sensor: "light".into(),
            data: SensorReading {
                value: 42.0,
                unit: "%".into(),
                active: true,
                timestamp: None,
            },
        }));
        assert!(matches!(
            source_event(&sensor),
            Some(SourceEvent::Sensor { ref sector, .. }) if sector == "building_a"
        ));

        let blocked = Arc::new(PushEvent::IpBlocked(BlockedIp {
            ip: "10.0.0.9".into(),
            time: None,
        }));
        assert_eq!(
            source_event(&blocked),
            Some(SourceEvent::AddressBlocked("10.0.0.9".parse().unwrap()))
        );

        let garbage = Arc::new(PushEvent::IpBlocked(BlockedIp {
            ip: "not-an-ip".into(),
            time: None,
        }));
        assert_eq!(source_event(&garbage), None);

        let greeting = Arc::new(PushEvent::ConnectionStatus {
            status: "connected".into(),
        });
        assert_eq!(source_event(&greeting), None);
    }
}
