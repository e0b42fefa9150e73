// ── Attack counters ──────────────────────────────────────────────────

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// The fixed set of attack categories the backend counts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttackCategory {
    Dos,
    SqlInjection,
    BruteForce,
    ArpSpoofing,
    PortScan,
    Mitm,
}

impl AttackCategory {
    /// Display label used by the dashboards and the attack log.
    pub fn label(self) -> &'static str {
        match self {
            Self::Dos => "DoS",
            Self::SqlInjection => "SQL Injection",
            Self::BruteForce => "Brute Force",
            Self::ArpSpoofing => "ARP Spoofing",
            Self::PortScan => "Port Scan",
            Self::Mitm => "MITM",
        }
    }

    /// Resolve a display category (`"SQL Injection"`) the way the backend
    /// keys its counters: lowercase, spaces to underscores.
    pub fn from_display(category: &str) -> Option<Self> {
        category
            .trim()
            .to_lowercase()
            .replace(' ', "_")
            .parse()
            .ok()
    }
}

/// Per-category attack totals. Always holds every category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackCounters {
    counts: BTreeMap<AttackCategory, u64>,
}

impl Default for AttackCounters {
    fn default() -> Self {
        Self {
            counts: AttackCategory::iter().map(|c| (c, 0)).collect(),
        }
    }
}

impl AttackCounters {
    /// Build from the backend's snake_case map. Missing keys count as zero;
    /// keys outside the fixed set are ignored.
    pub fn from_wire(raw: &HashMap<String, u64>) -> Self {
        let mut counters = Self::default();
        for (key, count) in raw {
            match key.parse::<AttackCategory>() {
                Ok(category) => counters.set(category, *count),
                Err(_) => tracing::debug!(key, "ignoring unknown attack category"),
            }
        }
        counters
    }

    pub fn get(&self, category: AttackCategory) -> u64 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn set(&mut self, category: AttackCategory, count: u64) {
        self.counts.insert(category, count);
    }

    pub fn increment(&mut self, category: AttackCategory) {
        *self.counts.entry(category).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Categories in fixed order with their counts.
    pub fn iter(&self) -> impl Iterator<Item = (AttackCategory, u64)> + '_ {
        self.counts.iter().map(|(c, n)| (*c, *n))
    }
}
