// ── Time series history ──────────────────────────────────────────────
//
// Fixed-capacity FIFO rings of chart points. A ring grows to its capacity
// and then stays there: every append past capacity evicts the oldest point.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

pub const DEFAULT_HISTORY_LEN: usize = 20;

/// The three chart families the defense dashboard plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryFamily {
    /// `attacks`, `packets`
    Attacks,
    /// `cpu`, `memory`, `temp`
    Resources,
    /// `incoming`, `outgoing`
    Network,
}

impl HistoryFamily {
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Attacks => &["attacks", "packets"],
            Self::Resources => &["cpu", "memory", "temp"],
            Self::Network => &["incoming", "outgoing"],
        }
    }
}

/// One chart sample. A `None` value is a gap: the metric was never observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub label: String,
    pub values: BTreeMap<&'static str, Option<f64>>,
}

impl TimeSeriesPoint {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            label: at.with_timezone(&Local).format("%H:%M:%S").to_string(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &'static str, value: Option<f64>) -> Self {
        self.values.insert(field, value);
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRing {
    capacity: usize,
    points: VecDeque<TimeSeriesPoint>,
}

impl HistoryRing {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: TimeSeriesPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TimeSeriesPoint> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&TimeSeriesPoint> {
        self.points.back()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}
