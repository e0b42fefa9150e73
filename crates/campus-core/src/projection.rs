// ── View projections ─────────────────────────────────────────────────
//
// Pure functions from the view model to display-ready rows. Renderers
// (CLI tables, JSON output, `watch`) never reach into the model directly.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use strum::{Display, IntoEnumIterator};

use crate::model::{
    AlertKind, AttackCategory, AttackCounters, HistoryFamily, HistoryRing, SectorState,
    Severity, SystemHealthSnapshot,
};
use crate::store::ViewModel;

/// Named palette colour; renderers map it onto their own styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tone {
    Red,
    Orange,
    Yellow,
    Blue,
}

impl From<Severity> for Tone {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Red,
            Severity::High => Self::Orange,
            Severity::Medium => Self::Yellow,
            Severity::Info => Self::Blue,
        }
    }
}

// ── Alerts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEntry {
    pub severity: Severity,
    pub tone: Tone,
    pub icon: &'static str,
    pub category: String,
    pub message: String,
    /// Local wall-clock time, `HH:MM:SS`.
    pub time: String,
    pub source: Option<String>,
}

fn icon_for(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Critical => "shield-alert",
        AlertKind::Warning => "alert-triangle",
        AlertKind::Info => "check-circle",
    }
}

/// Alert feed rows, newest first.
pub fn alert_entries(vm: &ViewModel) -> Vec<AlertEntry> {
    vm.alerts
        .iter()
        .map(|alert| AlertEntry {
            severity: alert.severity,
            tone: Tone::from(alert.severity),
            icon: icon_for(alert.kind),
            category: alert.category.clone(),
            message: alert.message.clone(),
            time: clock_label(alert.observed_at),
            source: alert.source_address.clone(),
        })
        .collect()
}

pub fn clock_label(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

// ── Attack distribution ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionSlice {
    pub category: AttackCategory,
    pub label: &'static str,
    pub count: u64,
    /// Hex colour of the slice.
    pub color: &'static str,
}

pub fn category_color(category: AttackCategory) -> &'static str {
    match category {
        AttackCategory::Dos => "#ef4444",
        AttackCategory::SqlInjection => "#f97316",
        AttackCategory::BruteForce => "#eab308",
        AttackCategory::ArpSpoofing => "#8b5cf6",
        AttackCategory::PortScan => "#06b6d4",
        AttackCategory::Mitm => "#ec4899",
    }
}

/// Non-zero categories in their fixed order.
pub fn attack_distribution(counters: &AttackCounters) -> Vec<DistributionSlice> {
    AttackCategory::iter()
        .filter_map(|category| {
            let count = counters.get(category);
            (count > 0).then(|| DistributionSlice {
                category,
                label: category.label(),
                count,
                color: category_color(category),
            })
        })
        .collect()
}

// ── Sectors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectorFilter {
    All,
    Key(String),
}

impl SectorFilter {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Key(wanted) => wanted == key,
        }
    }
}

/// Sectors in layout order. An unknown key yields nothing.
pub fn filter_sectors<'a>(vm: &'a ViewModel, filter: &SectorFilter) -> Vec<(&'a str, &'a SectorState)> {
    vm.sectors
        .iter()
        .filter(|(key, _)| filter.matches(key))
        .map(|(key, sector)| (key.as_str(), sector))
        .collect()
}

pub fn active_sensor_count(vm: &ViewModel) -> usize {
    vm.sectors.values().map(SectorState::active_sensor_count).sum()
}

// ── Health ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GaugeKind {
    Cpu,
    Memory,
    Disk,
    Temperature,
    Network,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthGauge {
    pub kind: GaugeKind,
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
    pub threshold: f64,
    /// Past the threshold: above it, or below it for network headroom.
    pub warning: bool,
}

pub fn health_gauges(snapshot: &SystemHealthSnapshot) -> Vec<HealthGauge> {
    let above = |kind, label, value: f64, unit, threshold: f64| HealthGauge {
        kind,
        label,
        value,
        unit,
        threshold,
        warning: value > threshold,
    };
    vec![
        above(GaugeKind::Cpu, "CPU Usage", snapshot.cpu_percent, "%", 80.0),
        above(GaugeKind::Memory, "Memory", snapshot.memory_percent, "%", 75.0),
        above(GaugeKind::Disk, "Disk Usage", snapshot.disk_percent, "%", 80.0),
        above(GaugeKind::Temperature, "Temperature", snapshot.temperature_c, "°C", 70.0),
        HealthGauge {
            kind: GaugeKind::Network,
            label: "Network",
            value: snapshot.network_percent,
            unit: "%",
            threshold: 40.0,
            warning: snapshot.network_percent < 40.0,
        },
    ]
}

// ── History ──────────────────────────────────────────────────────────

/// One chart row: time label plus the family's fields in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub label: String,
    pub values: Vec<(&'static str, Option<f64>)>,
}

/// Rows oldest first, each carrying every field of `family`.
pub fn history_rows(ring: &HistoryRing, family: HistoryFamily) -> Vec<HistoryRow> {
    ring.iter()
        .map(|point| HistoryRow {
            label: point.label.clone(),
            values: family
                .fields()
                .iter()
                .map(|field| (*field, point.value(field)))
                .collect(),
        })
        .collect()
}
