// ── Data sources ─────────────────────────────────────────────────────
//
// The reconciler talks to the outside world only through `DataSource`.
// `RemoteSource` reaches the real backend; `SimulatedSource` generates
// plausible telemetry locally and keeps its own authoritative state.

mod remote;
mod simulated;

use std::future::Future;
use std::net::IpAddr;

use indexmap::IndexMap;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub use campus_api::{LinkState, LinkStatus};
pub use remote::RemoteSource;
pub use simulated::{SimulatedSource, SimulationConfig};

use crate::error::CoreError;
use crate::model::{
    AlertEvent, AttackCounters, HealthUpdate, MitigationControl, SectorState, SensorAction,
    SensorState, SystemHealthSnapshot, SystemWarning,
};

/// Capacity of the per-subscription event queue.
pub(crate) const EVENT_QUEUE_CAPACITY: usize = 256;

/// A push notification already converted into the domain model.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Alert(AlertEvent),
    Health(HealthUpdate),
    Sensor {
        sector: String,
        sensor: String,
        state: SensorState,
    },
    Warning(SystemWarning),
    AddressBlocked(IpAddr),
}

/// Live feed from a source. Dropping it stops the producer.
pub struct SourceSubscription {
    pub events: mpsc::Receiver<SourceEvent>,
    pub link: watch::Receiver<LinkStatus>,
    cancel: CancellationToken,
}

impl SourceSubscription {
    pub fn new(
        events: mpsc::Receiver<SourceEvent>,
        link: watch::Receiver<LinkStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            events,
            link,
            cancel,
        }
    }
}

impl Drop for SourceSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Request/response operations plus an optional push feed.
///
/// Command methods succeed only once the source has confirmed the change;
/// the reconciler relies on that to keep its cache honest.
pub trait DataSource: Send + Sync + 'static {
    /// Short description for logs, e.g. the backend URL.
    fn describe(&self) -> String;

    /// Attack log, newest first.
    fn fetch_attacks(&self) -> impl Future<Output = Result<Vec<AlertEvent>, CoreError>> + Send;

    fn fetch_security_counters(
        &self,
    ) -> impl Future<Output = Result<AttackCounters, CoreError>> + Send;

    fn fetch_system_stats(
        &self,
    ) -> impl Future<Output = Result<SystemHealthSnapshot, CoreError>> + Send;

    /// Sectors with the sensors the source currently reports.
    fn fetch_sensors(
        &self,
    ) -> impl Future<Output = Result<IndexMap<String, SectorState>, CoreError>> + Send;

    fn control_sensor(
        &self,
        sector: &str,
        sensor: &str,
        action: SensorAction,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn toggle_mitigation(
        &self,
        control: MitigationControl,
        enabled: bool,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn restart_network_services(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn block_address(&self, ip: IpAddr) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn unblock_address(&self, ip: IpAddr) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn send_email_report(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn toggle_email_alerts(&self, enabled: bool)
    -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Start the push feed, if the source has one. The feed stops when
    /// `cancel` fires or the subscription is dropped.
    fn subscribe(&self, cancel: CancellationToken) -> Option<SourceSubscription>;
}
