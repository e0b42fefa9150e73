//! Live-state layer between `campus-api` and the `campusctl` front end.
//!
//! This crate owns the domain model, the reconciliation rules, and the
//! data sources for the Smart Campus dashboard:
//!
//! - **[`Reconciler`]** drives the session lifecycle. [`start()`](Reconciler::start)
//!   loads every family, then spawns the poll timer and the push bridge;
//!   [`teardown()`](Reconciler::teardown) cancels both and invalidates
//!   in-flight fetches. [`Reconciler::oneshot()`] is the CLI shortcut.
//!
//! - **[`Store`]** holds the [`ViewModel`] behind a `watch` channel. Every
//!   write carries a [`Stamp`] so stale fetch results are dropped.
//!
//! - **[`DataSource`]** is the seam to the outside world:
//!   [`RemoteSource`] talks to the backend, [`SimulatedSource`] generates
//!   telemetry locally.
//!
//! - **[`projection`]** turns the view model into display rows.

pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod projection;
pub mod reconciler;
pub mod source;
pub mod store;
pub mod stream;

// ── Primary re-exports ───────────────────────────────────────────────
pub use command::{Command, CommandOutcome};
pub use config::{BackendConfig, ReconcilerConfig};
pub use error::{CoreError, TransportErrorKind};
pub use reconciler::{Reconciler, ReconcilerState};
pub use source::{
    DataSource, LinkState, LinkStatus, RemoteSource, SimulatedSource, SimulationConfig,
    SourceEvent, SourceSubscription,
};
pub use store::{Family, Stamp, Store, StoreLimits, Ticket, ViewModel};
pub use stream::{ViewStream, ViewWatchStream};

pub use model::{
    AlertEvent, AlertKind, AlertOrigin, AttackCategory, AttackCounters, Connectivity,
    HealthReadings, HealthUpdate, HistoryFamily, HistoryRing, MitigationControl,
    MitigationStatus, NetworkIo, SectorState, SensorAction, SensorState, Severity,
    SystemHealthSnapshot, SystemWarning, TimeSeriesPoint,
};
