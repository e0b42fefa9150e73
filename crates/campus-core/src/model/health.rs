// ── System health ────────────────────────────────────────────────────
//
// A `SystemHealthSnapshot` has every metric; `HealthReadings` is the
// partial form used both for partial push updates and for the store's
// "latest known value" record. A `None` reading was never observed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Receive-packet count the dashboards treat as 0 % network headroom.
pub const NETWORK_PACKET_CEILING: f64 = 10_000.0;

/// Cumulative interface counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIo {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

impl NetworkIo {
    /// Network headroom gauge: `100 - packets_recv / 10 000 * 100`, clamped.
    pub fn network_percent(&self) -> f64 {
        (100.0 - as_f64(self.packets_recv) / NETWORK_PACKET_CEILING * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemHealthSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub temperature_c: f64,
    pub network_percent: f64,
    pub connection_count: u64,
    pub network_io: NetworkIo,
}

/// Latest known value of each metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReadings {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
    pub temperature_c: Option<f64>,
    pub network_percent: Option<f64>,
    pub connection_count: Option<u64>,
    pub network_io: Option<NetworkIo>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// One health update as delivered by a poll or a push.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthUpdate {
    /// Every metric present: replaces the readings.
    Snapshot(SystemHealthSnapshot),
    /// Some metrics present: overwrites those, carries the rest forward.
    Partial(HealthReadings),
}

impl HealthReadings {
    /// Fold an update into the readings, stamping `at`.
    pub fn apply(&mut self, update: &HealthUpdate, at: DateTime<Utc>) {
        match update {
            HealthUpdate::Snapshot(snap) => {
                *self = Self::from(*snap);
            }
            HealthUpdate::Partial(partial) => {
                self.cpu_percent = partial.cpu_percent.or(self.cpu_percent);
                self.memory_percent = partial.memory_percent.or(self.memory_percent);
                self.disk_percent = partial.disk_percent.or(self.disk_percent);
                self.temperature_c = partial.temperature_c.or(self.temperature_c);
                self.connection_count = partial.connection_count.or(self.connection_count);
                if let Some(io) = partial.network_io {
                    self.network_io = Some(io);
                    self.network_percent = Some(io.network_percent());
                } else if partial.network_percent.is_some() {
                    self.network_percent = partial.network_percent;
                }
            }
        }
        self.observed_at = Some(at);
    }

    /// Full snapshot, once every metric has been observed at least once.
    pub fn snapshot(&self) -> Option<SystemHealthSnapshot> {
        Some(SystemHealthSnapshot {
            cpu_percent: self.cpu_percent?,
            memory_percent: self.memory_percent?,
            disk_percent: self.disk_percent?,
            temperature_c: self.temperature_c?,
            network_percent: self.network_percent?,
            connection_count: self.connection_count?,
            network_io: self.network_io?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.observed_at.is_none()
    }
}

impl From<SystemHealthSnapshot> for HealthReadings {
    fn from(snap: SystemHealthSnapshot) -> Self {
        Self {
            cpu_percent: Some(snap.cpu_percent),
            memory_percent: Some(snap.memory_percent),
            disk_percent: Some(snap.disk_percent),
            temperature_c: Some(snap.temperature_c),
            network_percent: Some(snap.network_percent),
            connection_count: Some(snap.connection_count),
            network_io: Some(snap.network_io),
            observed_at: None,
        }
    }
}

/// Counter to float for gauges and charts; precision loss above 2^53 is
/// irrelevant at these magnitudes.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub(crate) fn as_f64(value: u64) -> f64 {
    value as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot() -> SystemHealthSnapshot {
        let io = NetworkIo {
            packets_recv: 2_500,
            ..NetworkIo::default()
        };
        SystemHealthSnapshot {
            cpu_percent: 30.0,
            memory_percent: 50.0,
            disk_percent: 40.0,
            temperature_c: 55.0,
            network_percent: io.network_percent(),
            connection_count: 12,
            network_io: io,
        }
    }

    #[test]
    fn network_percent_is_clamped() {
        let io = NetworkIo {
            packets_recv: 2_500,
            ..NetworkIo::default()
        };
        assert!((io.network_percent() - 75.0).abs() < 1e-9);

        let saturated = NetworkIo {
            packets_recv: 1_000_000,
            ..NetworkIo::default()
        };
        assert!(saturated.network_percent().abs() < f64::EPSILON);
    }

    #[test]
    fn partial_update_carries_forward() {
        let now = Utc::now();
        let mut readings = HealthReadings::default();
        readings.apply(&HealthUpdate::Snapshot(snapshot()), now);

        let partial = HealthReadings {
            cpu_percent: Some(91.0),
            ..HealthReadings::default()
        };
        readings.apply(&HealthUpdate::Partial(partial), now);

        assert_eq!(readings.cpu_percent, Some(91.0));
        assert_eq!(readings.memory_percent, Some(50.0));
        assert_eq!(readings.connection_count, Some(12));
        assert!(readings.snapshot().is_some());
    }

    #[test]
    fn unobserved_metrics_stay_unknown() {
        let mut readings = HealthReadings::default();
        let partial = HealthReadings {
            cpu_percent: Some(10.0),
            ..HealthReadings::default()
        };
        readings.apply(&HealthUpdate::Partial(partial), Utc::now());

        assert_eq!(readings.cpu_percent, Some(10.0));
        assert_eq!(readings.temperature_c, None);
        assert!(readings.snapshot().is_none());
    }

    #[test]
    fn snapshot_replaces_everything() {
        let now = Utc::now();
        let mut readings = HealthReadings {
            cpu_percent: Some(99.0),
            temperature_c: Some(99.0),
            ..HealthReadings::default()
        };
        readings.apply(&HealthUpdate::Snapshot(snapshot()), now);
        assert_eq!(readings.snapshot().unwrap(), snapshot());
        assert_eq!(readings.observed_at, Some(now));
    }
}
