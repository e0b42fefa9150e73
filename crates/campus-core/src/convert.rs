// ── Wire-to-domain conversion ────────────────────────────────────────
//
// Bridges `campus_api::models` into `crate::model`. The backend is loose
// about timestamps (HH:MM:SS labels, naive ISO strings) and sends partial
// stats on the push channel, so every conversion here is total except the
// polled health snapshot, which must carry every metric.

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use indexmap::IndexMap;

use campus_api::models::{
    AttackRecord, NetworkCounters, SensorMap, SensorReading, SystemStats, WarningPayload,
};

use crate::error::CoreError;
use crate::model::sector::sector_template;
use crate::model::{
    AlertEvent, AlertKind, AlertOrigin, Connectivity, HealthReadings, HealthUpdate, NetworkIo,
    SectorState, SensorState, Severity, SystemHealthSnapshot, SystemWarning, normalize_key,
};

// ── Alerts ───────────────────────────────────────────────────────────

/// Convert one attack-log entry. Unknown severities become `Info`; a
/// missing kind is derived from the severity.
pub fn alert_from_record(record: &AttackRecord, received_at: DateTime<Utc>) -> AlertEvent {
    let severity = record
        .severity
        .as_deref()
        .and_then(|s| s.parse::<Severity>().ok())
        .unwrap_or(Severity::Info);
    let kind = record
        .kind
        .as_deref()
        .and_then(|k| k.parse::<AlertKind>().ok())
        .unwrap_or_else(|| AlertKind::from(severity));

    AlertEvent {
        severity,
        kind,
        category: record.category.clone(),
        message: record.message.clone(),
        observed_at: record
            .time
            .as_deref()
            .and_then(|t| parse_backend_time(t, received_at))
            .unwrap_or(received_at),
        source_address: record
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        origin: AlertOrigin::Backend,
    }
}

/// The attack log arrives oldest-first; the store wants newest-first.
pub fn alerts_from_log(log: &[AttackRecord], received_at: DateTime<Utc>) -> Vec<AlertEvent> {
    log.iter()
        .rev()
        .map(|record| alert_from_record(record, received_at))
        .collect()
}

pub fn warning_from_wire(payload: &WarningPayload, received_at: DateTime<Utc>) -> SystemWarning {
    SystemWarning {
        messages: payload.warnings.clone(),
        observed_at: payload
            .stats
            .as_ref()
            .and_then(|s| s.timestamp.as_deref())
            .and_then(|t| parse_backend_time(t, received_at))
            .unwrap_or(received_at),
    }
}

// ── Health ───────────────────────────────────────────────────────────

fn network_io(counters: NetworkCounters) -> NetworkIo {
    NetworkIo {
        bytes_sent: counters.bytes_sent,
        bytes_recv: counters.bytes_recv,
        packets_sent: counters.packets_sent,
        packets_recv: counters.packets_recv,
    }
}

/// Classify a pushed stats payload: a snapshot if every metric is present,
/// otherwise a partial update.
pub fn health_update_from_stats(stats: &SystemStats) -> HealthUpdate {
    match snapshot_from_stats(stats) {
        Ok(snapshot) => HealthUpdate::Snapshot(snapshot),
        Err(_) => {
            let io = stats.network.map(network_io);
            HealthUpdate::Partial(HealthReadings {
                cpu_percent: stats.cpu,
                memory_percent: stats.memory,
                disk_percent: stats.disk,
                temperature_c: stats.temperature,
                network_percent: io.map(|io| io.network_percent()),
                connection_count: stats.connections,
                network_io: io,
                observed_at: None,
            })
        }
    }
}

/// A polled `/system/stats` payload must be complete.
pub fn snapshot_from_stats(stats: &SystemStats) -> Result<SystemHealthSnapshot, CoreError> {
    let missing: Vec<&str> = [
        ("cpu", stats.cpu.is_none()),
        ("memory", stats.memory.is_none()),
        ("disk", stats.disk.is_none()),
        ("temperature", stats.temperature.is_none()),
        ("network", stats.network.is_none()),
        ("connections", stats.connections.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();

    match (
        stats.cpu,
        stats.memory,
        stats.disk,
        stats.temperature,
        stats.network,
        stats.connections,
    ) {
        (Some(cpu), Some(memory), Some(disk), Some(temperature), Some(net), Some(conns)) => {
            let io = network_io(net);
            Ok(SystemHealthSnapshot {
                cpu_percent: cpu,
                memory_percent: memory,
                disk_percent: disk,
                temperature_c: temperature,
                network_percent: io.network_percent(),
                connection_count: conns,
                network_io: io,
            })
        }
        _ => Err(CoreError::Protocol {
            message: format!("system stats missing {}", missing.join(", ")),
        }),
    }
}

// ── Sensors ──────────────────────────────────────────────────────────

pub fn sensor_from_reading(reading: &SensorReading, received_at: DateTime<Utc>) -> SensorState {
    SensorState {
        active: reading.active,
        value: reading.value,
        unit: reading.unit.clone(),
        last_update: Some(
            reading
                .timestamp
                .as_deref()
                .and_then(|t| parse_backend_time(t, received_at))
                .unwrap_or(received_at),
        ),
    }
}

/// Convert `GET /sensors`. Keys are normalized; each returned sector holds
/// only the sensors the backend reported, in layout order where known.
pub fn sectors_from_wire(
    map: &SensorMap,
    received_at: DateTime<Utc>,
) -> IndexMap<String, SectorState> {
    let mut out: IndexMap<String, SectorState> = IndexMap::new();
    for (raw_sector, sensors) in map {
        let key = normalize_key(raw_sector);
        let sector = out.entry(key.clone()).or_insert_with(|| {
            let mut tpl = sector_template(&key);
            tpl.connectivity = Connectivity::Online;
            tpl
        });
        for (raw_sensor, reading) in sensors {
            sector.sensors.insert(
                normalize_key(raw_sensor),
                sensor_from_reading(reading, received_at),
            );
        }
    }
    out
}

// ── Timestamps ───────────────────────────────────────────────────────

/// Parse the backend's time formats:
/// RFC 3339, naive ISO-8601 (`datetime.now().isoformat()`, local time),
/// or a bare `HH:MM:SS` label taken as local time on `reference`'s day.
pub fn parse_backend_time(raw: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
    }
    let time = NaiveTime::parse_from_str(raw, "%H:%M:%S").ok()?;
    let day = reference.with_timezone(&Local).date_naive();
    Local
        .from_local_datetime(&day.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
