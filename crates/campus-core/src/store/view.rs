// ── View model ───────────────────────────────────────────────────────
//
// The single authoritative state the reconciler maintains. Every merge rule
// lives here as a plain method so it can be tested without a runtime; each
// returns `true` when it changed something observable.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::IpAddr;

use campus_api::LinkStatus;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::model::health::as_f64;
use crate::model::sector::sector_template;
use crate::model::{
    AlertEvent, AlertOrigin, AttackCounters, Connectivity, HealthReadings, HealthUpdate,
    HistoryFamily, HistoryRing, MitigationControl, MitigationStatus, SectorState, SensorState,
    SystemWarning, TimeSeriesPoint, campus_layout, normalize_key,
};
use crate::store::sequence::{Family, SyncState};

/// Size limits for the bounded collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub alert_retention: usize,
    pub history_len: usize,
    pub warning_retention: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            alert_retention: 15,
            history_len: crate::model::DEFAULT_HISTORY_LEN,
            warning_retention: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct History {
    pub attacks: HistoryRing,
    pub resources: HistoryRing,
    pub network: HistoryRing,
}

impl History {
    fn new(len: usize) -> Self {
        Self {
            attacks: HistoryRing::new(len),
            resources: HistoryRing::new(len),
            network: HistoryRing::new(len),
        }
    }

    pub fn family(&self, family: HistoryFamily) -> &HistoryRing {
        match family {
            HistoryFamily::Attacks => &self.attacks,
            HistoryFamily::Resources => &self.resources,
            HistoryFamily::Network => &self.network,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    /// Newest first, at most `alert_retention` long.
    pub alerts: VecDeque<AlertEvent>,
    pub counters: AttackCounters,
    pub health: HealthReadings,
    pub history: History,
    pub sectors: IndexMap<String, SectorState>,
    pub mitigation: MitigationStatus,
    pub email_alerts_enabled: bool,
    pub blocked_addresses: BTreeSet<IpAddr>,
    /// Newest first.
    pub warnings: VecDeque<SystemWarning>,
    /// Push link state; `None` when the source has no push channel.
    pub link: Option<LinkStatus>,
    pub refreshed_at: BTreeMap<Family, DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) limits: StoreLimits,
    #[serde(skip)]
    pub(crate) sync: SyncState,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

impl ViewModel {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            alerts: VecDeque::with_capacity(limits.alert_retention),
            counters: AttackCounters::default(),
            health: HealthReadings::default(),
            history: History::new(limits.history_len),
            sectors: campus_layout(),
            mitigation: MitigationStatus::default(),
            email_alerts_enabled: true,
            blocked_addresses: BTreeSet::new(),
            warnings: VecDeque::new(),
            link: None,
            refreshed_at: BTreeMap::new(),
            limits,
            sync: SyncState::default(),
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    // ── Alerts ───────────────────────────────────────────────────────

    /// Prepend one alert and truncate to the retention cap. A backend alert
    /// whose fingerprint is already retained is a duplicate delivery.
    pub fn insert_alert(&mut self, alert: AlertEvent) -> bool {
        if alert.origin == AlertOrigin::Backend {
            let fingerprint = alert.fingerprint();
            if self
                .alerts
                .iter()
                .any(|a| a.origin == AlertOrigin::Backend && a.fingerprint() == fingerprint)
            {
                tracing::trace!(category = %alert.category, "dropping duplicate alert");
                return false;
            }
        }
        self.alerts.push_front(alert);
        self.alerts.truncate(self.limits.alert_retention);
        true
    }

    /// Replace the list with a fetched snapshot (already newest-first).
    pub fn replace_alerts(&mut self, alerts: Vec<AlertEvent>, at: DateTime<Utc>) -> bool {
        let fresh: VecDeque<AlertEvent> = alerts
            .into_iter()
            .take(self.limits.alert_retention)
            .collect();
        self.refreshed_at.insert(Family::Alerts, at);
        if fresh == self.alerts {
            return false;
        }
        self.alerts = fresh;
        true
    }

    // ── Counters ─────────────────────────────────────────────────────

    /// Replace the counters wholesale and append an attacks history point.
    pub fn replace_counters(&mut self, counters: AttackCounters, at: DateTime<Utc>) -> bool {
        self.counters = counters;
        self.refreshed_at.insert(Family::Counters, at);
        let point = TimeSeriesPoint::new(at)
            .with("attacks", Some(as_f64(self.counters.total())))
            .with(
                "packets",
                self.health.connection_count.map(|c| as_f64(c) * 100.0),
            );
        self.history.attacks.push(point);
        true
    }

    // ── Health ───────────────────────────────────────────────────────

    /// Merge a health update and append resources and network points built
    /// from the latest known values.
    pub fn apply_health(&mut self, update: &HealthUpdate, at: DateTime<Utc>) -> bool {
        self.health.apply(update, at);
        self.refreshed_at.insert(Family::Health, at);

        let h = &self.health;
        self.history.resources.push(
            TimeSeriesPoint::new(at)
                .with("cpu", h.cpu_percent)
                .with("memory", h.memory_percent)
                .with("temp", h.temperature_c),
        );
        self.history.network.push(
            TimeSeriesPoint::new(at)
                .with("incoming", h.network_io.map(|io| as_f64(io.packets_recv)))
                .with("outgoing", h.network_io.map(|io| as_f64(io.packets_sent))),
        );
        true
    }

    pub fn push_warning(&mut self, warning: SystemWarning) -> bool {
        self.warnings.push_front(warning);
        self.warnings.truncate(self.limits.warning_retention);
        true
    }

    // ── Sectors ──────────────────────────────────────────────────────

    /// Update exactly one sensor of one sector.
    pub fn apply_sensor_update(&mut self, sector: &str, sensor: &str, state: SensorState) -> bool {
        let sector_key = normalize_key(sector);
        let entry = self
            .sectors
            .entry(sector_key.clone())
            .or_insert_with(|| sector_template(&sector_key));
        entry.connectivity = Connectivity::Online;
        entry.sensors.insert(normalize_key(sensor), state);
        true
    }

    /// Upsert every sensor a fetch reported; sensors it did not report are
    /// left as they were.
    pub fn merge_sectors(
        &mut self,
        fetched: IndexMap<String, SectorState>,
        at: DateTime<Utc>,
    ) -> bool {
        self.refreshed_at.insert(Family::Sensors, at);
        let mut changed = false;
        for (key, incoming) in fetched {
            match self.sectors.get_mut(&key) {
                Some(existing) => {
                    if existing.connectivity != incoming.connectivity {
                        existing.connectivity = incoming.connectivity;
                        changed = true;
                    }
                    for (sensor_key, sensor) in incoming.sensors {
                        if existing.sensors.get(&sensor_key) != Some(&sensor) {
                            existing.sensors.insert(sensor_key, sensor);
                            changed = true;
                        }
                    }
                }
                None => {
                    self.sectors.insert(key, incoming);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Record a confirmed sensor control command.
    pub fn set_sensor_active(
        &mut self,
        sector: &str,
        sensor: &str,
        active: bool,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(state) = self
            .sectors
            .get_mut(sector)
            .and_then(|s| s.sensors.get_mut(sensor))
        else {
            return false;
        };
        state.active = active;
        state.last_update = Some(at);
        true
    }

    // ── Controls ─────────────────────────────────────────────────────

    pub fn set_mitigation(&mut self, control: MitigationControl, enabled: bool) -> bool {
        self.mitigation.set(control, enabled)
    }

    pub fn set_email_alerts(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.email_alerts_enabled, enabled) != enabled
    }

    pub fn block_address(&mut self, ip: IpAddr) -> bool {
        self.blocked_addresses.insert(ip)
    }

    pub fn unblock_address(&mut self, ip: IpAddr) -> bool {
        self.blocked_addresses.remove(&ip)
    }

    /// Clear the alert feed and zero the counters until the next poll.
    pub fn reset_logs(&mut self) -> bool {
        let changed = !self.alerts.is_empty() || self.counters != AttackCounters::default();
        self.alerts.clear();
        self.counters = AttackCounters::default();
        changed
    }

    pub fn set_link(&mut self, status: LinkStatus) -> bool {
        self.link.replace(status) != Some(status)
    }
}
