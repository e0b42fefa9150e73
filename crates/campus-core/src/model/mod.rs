// ── Domain model ─────────────────────────────────────────────────────
//
// Transport-independent types the reconciler stores and the projections
// read. Wire shapes live in `campus_api::models`; `crate::convert` bridges.

pub mod alert;
pub mod counters;
pub mod health;
pub mod mitigation;
pub mod sector;
pub mod series;

pub use alert::{AlertEvent, AlertKind, AlertOrigin, Severity, SystemWarning};
pub use counters::{AttackCategory, AttackCounters};
pub use health::{HealthReadings, HealthUpdate, NetworkIo, SystemHealthSnapshot};
pub use mitigation::{MitigationControl, MitigationStatus};
pub use sector::{
    Connectivity, SectorState, SensorAction, SensorState, campus_layout, normalize_key,
};
pub use series::{DEFAULT_HISTORY_LEN, HistoryFamily, HistoryRing, TimeSeriesPoint};
