// ── Simulated source ─────────────────────────────────────────────────
//
// Stand-in backend for demos and tests. Keeps its own authoritative state
// so confirmed commands show up in later fetches, and emits random attack,
// health and sensor events on a timer while subscribed.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{DataSource, EVENT_QUEUE_CAPACITY, LinkState, LinkStatus, SourceEvent, SourceSubscription};
use crate::error::CoreError;
use crate::model::{
    AlertEvent, AlertKind, AlertOrigin, AttackCategory, AttackCounters, Connectivity,
    HealthUpdate, MitigationControl, MitigationStatus, NetworkIo, SectorState, SensorAction,
    SensorState, Severity, SystemHealthSnapshot, campus_layout,
};

/// The backend keeps this many attack-log entries.
const ATTACK_LOG_CAP: usize = 100;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Fixed seed for reproducible runs; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Period of the push event generator.
    pub event_interval: Duration,
    /// Chance per tick that an attack is detected.
    pub attack_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            event_interval: Duration::from_secs(2),
            attack_probability: 0.3,
        }
    }
}

struct SimState {
    rng: StdRng,
    /// Newest first.
    log: Vec<AlertEvent>,
    counters: AttackCounters,
    sectors: IndexMap<String, SectorState>,
    mitigation: MitigationStatus,
    email_alerts: bool,
    blocked: BTreeSet<IpAddr>,
    net: NetworkIo,
}

/// In-process backend generating plausible campus telemetry.
#[derive(Clone)]
pub struct SimulatedSource {
    state: Arc<Mutex<SimState>>,
    config: SimulationConfig,
    fail_commands: Arc<AtomicBool>,
}

impl SimulatedSource {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let mut sectors = campus_layout();
        for sector in sectors.values_mut() {
            sector.connectivity = Connectivity::Online;
            for sensor in sector.sensors.values_mut() {
                sensor.active = true;
            }
        }
        Self {
            state: Arc::new(Mutex::new(SimState {
                rng,
                log: Vec::new(),
                counters: AttackCounters::default(),
                sectors,
                mitigation: MitigationStatus::default(),
                email_alerts: true,
                blocked: BTreeSet::new(),
                net: NetworkIo::default(),
            })),
            config,
            fail_commands: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deterministic source with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(SimulationConfig {
            seed: Some(seed),
            ..SimulationConfig::default()
        })
    }

    /// Make every command fail with `CommandRejected` until switched back.
    pub fn set_fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    /// Record a detected attack as the backend would. Returns the alert.
    pub fn inject_attack(&self, category: AttackCategory) -> AlertEvent {
        self.with_state(|s| s.detect(category))
    }

    pub fn blocked_addresses(&self) -> BTreeSet<IpAddr> {
        self.with_state(|s| s.blocked.clone())
    }

    pub fn email_alerts_enabled(&self) -> bool {
        self.with_state(|s| s.email_alerts)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn command<R>(&self, f: impl FnOnce(&mut SimState) -> Result<R, CoreError>) -> Result<R, CoreError> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(CoreError::CommandRejected {
                reason: "simulated backend failure".into(),
            });
        }
        self.with_state(f)
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

// ── Generators ───────────────────────────────────────────────────────

impl SimState {
    fn detect(&mut self, category: AttackCategory) -> AlertEvent {
        let host = format!("192.168.1.{}", self.rng.gen_range(20..250));
        let (severity, message, source) = match category {
            AttackCategory::Dos => (
                Severity::Critical,
                format!(
                    "High packet rate detected: {} packets/min",
                    self.rng.gen_range(1000..5000)
                ),
                "Network Monitor".to_owned(),
            ),
            AttackCategory::SqlInjection => (
                Severity::High,
                "SQL injection pattern detected: ' OR '1'='1".to_owned(),
                "Input Validation".to_owned(),
            ),
            AttackCategory::BruteForce => (
                Severity::High,
                format!("Multiple failed login attempts from {host}"),
                host,
            ),
            AttackCategory::ArpSpoofing => (
                Severity::Critical,
                "Duplicate MAC addresses detected - Possible ARP poisoning".to_owned(),
                "ARP Monitor".to_owned(),
            ),
            AttackCategory::PortScan => (
                Severity::Medium,
                format!("Port scanning activity detected from {host}"),
                host,
            ),
            AttackCategory::Mitm => (
                Severity::Critical,
                "Gateway certificate mismatch - Possible man-in-the-middle".to_owned(),
                "TLS Monitor".to_owned(),
            ),
        };

        let alert = AlertEvent {
            severity,
            kind: AlertKind::from(severity),
            category: category.label().to_owned(),
            message,
            observed_at: Utc::now(),
            source_address: Some(source),
            origin: AlertOrigin::Backend,
        };
        self.counters.increment(category);
        self.log.insert(0, alert.clone());
        self.log.truncate(ATTACK_LOG_CAP);
        alert
    }

    fn health(&mut self) -> SystemHealthSnapshot {
        let recv: u64 = self.rng.gen_range(200..9_000);
        let sent: u64 = self.rng.gen_range(200..9_000);
        self.net = NetworkIo {
            bytes_sent: self.net.bytes_sent + sent * 512,
            bytes_recv: self.net.bytes_recv + recv * 512,
            packets_sent: sent,
            packets_recv: recv,
        };
        SystemHealthSnapshot {
            cpu_percent: self.rng.gen_range(10.0..60.0),
            memory_percent: self.rng.gen_range(30.0..70.0),
            disk_percent: self.rng.gen_range(40.0..60.0),
            temperature_c: self.rng.gen_range(40.0..65.0),
            network_percent: self.net.network_percent(),
            connection_count: self.rng.gen_range(10..80),
            network_io: self.net,
        }
    }

    /// Drift one random active sensor and return it.
    fn drift_sensor(&mut self) -> Option<(String, String, SensorState)> {
        let sector_keys: Vec<String> = self.sectors.keys().cloned().collect();
        let sector_key = sector_keys.choose(&mut self.rng)?.clone();
        let sensor_keys: Vec<String> = self.sectors.get(&sector_key)?.sensors.keys().cloned().collect();
        let sensor_key = sensor_keys.choose(&mut self.rng)?.clone();
        let value = reading_for(&sensor_key, &mut self.rng);
        let sensor = self
            .sectors
            .get_mut(&sector_key)?
            .sensors
            .get_mut(&sensor_key)?;
        if sensor.active {
            sensor.value = value;
        }
        sensor.last_update = Some(Utc::now());
        Some((sector_key, sensor_key, sensor.clone()))
    }

    fn refresh_sensors(&mut self) {
        let now = Utc::now();
        for sector in self.sectors.values_mut() {
            for (key, sensor) in &mut sector.sensors {
                if sensor.active {
                    sensor.value = reading_for(key, &mut self.rng);
                }
                sensor.last_update = Some(now);
            }
        }
    }
}

fn reading_for(sensor: &str, rng: &mut StdRng) -> f64 {
    match sensor {
        "temperature" => (rng.gen_range(20.0_f64..35.0) * 10.0).round() / 10.0,
        "light" | "soilMoisture" => rng.gen_range(0.0_f64..100.0).round(),
        "smoke" => rng.gen_range(0.0_f64..50.0).round(),
        "ultrasonic" => rng.gen_range(5.0_f64..400.0).round(),
        "sound" => rng.gen_range(30.0_f64..90.0).round(),
        _ => f64::from(u8::from(rng.gen_bool(0.5))),
    }
}

// ── DataSource ───────────────────────────────────────────────────────

impl DataSource for SimulatedSource {
    fn describe(&self) -> String {
        "simulated backend".to_owned()
    }

    async fn fetch_attacks(&self) -> Result<Vec<AlertEvent>, CoreError> {
        Ok(self.with_state(|s| s.log.clone()))
    }

    async fn fetch_security_counters(&self) -> Result<AttackCounters, CoreError> {
        Ok(self.with_state(|s| s.counters.clone()))
    }

    async fn fetch_system_stats(&self) -> Result<SystemHealthSnapshot, CoreError> {
        Ok(self.with_state(SimState::health))
    }

    async fn fetch_sensors(&self) -> Result<IndexMap<String, SectorState>, CoreError> {
        Ok(self.with_state(|s| {
            s.refresh_sensors();
            s.sectors.clone()
        }))
    }

    async fn control_sensor(
        &self,
        sector: &str,
        sensor: &str,
        action: SensorAction,
    ) -> Result<(), CoreError> {
        self.command(|s| {
            let state = s
                .sectors
                .get_mut(sector)
                .ok_or_else(|| CoreError::UnknownSector {
                    sector: sector.to_owned(),
                })?
                .sensors
                .get_mut(sensor)
                .ok_or_else(|| CoreError::UnknownSensor {
                    sector: sector.to_owned(),
                    sensor: sensor.to_owned(),
                })?;
            state.active = action.is_on();
            state.last_update = Some(Utc::now());
            Ok(())
        })
    }

    async fn toggle_mitigation(
        &self,
        control: MitigationControl,
        enabled: bool,
    ) -> Result<(), CoreError> {
        self.command(|s| {
            s.mitigation.set(control, enabled);
            Ok(())
        })
    }

    async fn restart_network_services(&self) -> Result<(), CoreError> {
        self.command(|s| {
            s.net = NetworkIo::default();
            Ok(())
        })
    }

    async fn block_address(&self, ip: IpAddr) -> Result<(), CoreError> {
        self.command(|s| {
            s.blocked.insert(ip);
            Ok(())
        })
    }

    async fn unblock_address(&self, ip: IpAddr) -> Result<(), CoreError> {
        self.command(|s| {
            s.blocked.remove(&ip);
            Ok(())
        })
    }

    async fn send_email_report(&self) -> Result<(), CoreError> {
        self.command(|_| Ok(()))
    }

    async fn toggle_email_alerts(&self, enabled: bool) -> Result<(), CoreError> {
        self.command(|s| {
            s.email_alerts = enabled;
            Ok(())
        })
    }

    fn subscribe(&self, cancel: CancellationToken) -> Option<SourceSubscription> {
        let cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (link_tx, link_rx) = watch::channel(LinkStatus {
            state: LinkState::Connected,
            attempt: 0,
            generation: 1,
        });

        let source = self.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            generate_events(source, tx, task_cancel).await;
            link_tx.send_replace(LinkStatus::default());
        });

        Some(SourceSubscription::new(rx, link_rx, cancel))
    }
}

async fn generate_events(
    source: SimulatedSource,
    tx: mpsc::Sender<SourceEvent>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(source.config.event_interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let events = source.with_state(|s| {
                    let mut events = Vec::with_capacity(3);
                    if s.rng.gen_bool(source.config.attack_probability.clamp(0.0, 1.0)) {
                        let categories = [
                            AttackCategory::Dos,
                            AttackCategory::SqlInjection,
                            AttackCategory::BruteForce,
                            AttackCategory::ArpSpoofing,
                            AttackCategory::PortScan,
                            AttackCategory::Mitm,
                        ];
                        let category = *categories.choose(&mut s.rng).unwrap_or(&AttackCategory::PortScan);
                        events.push(SourceEvent::Alert(s.detect(category)));
                    }
                    events.push(SourceEvent::Health(HealthUpdate::Snapshot(s.health())));
                    if let Some((sector, sensor, state)) = s.drift_sensor() {
                        events.push(SourceEvent::Sensor { sector, sensor, state });
                    }
                    events
                });
                trace!(count = events.len(), "simulated tick");
                for event in events {
                    if tx.send(event).await.is_err() {
                        debug!("simulated event consumer gone");
                        return;
                    }
                }
            }
        }
    }
}
