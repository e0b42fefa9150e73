// ── Reconciler ───────────────────────────────────────────────────────
//
// Owns the live session: initial load, periodic polling, the push bridge,
// and command execution. All view-model writes go through `Store::apply`
// with a stamp, so late fetches from a torn-down session are dropped and a
// slow fetch never overwrites a newer one.

use std::future::Future;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use strum::{Display, IntoEnumIterator};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandOutcome};
use crate::config::ReconcilerConfig;
use crate::error::CoreError;
use crate::model::{
    AlertEvent, HealthUpdate, MitigationControl, SensorAction, Severity, normalize_key,
};
use crate::source::{DataSource, LinkState, SourceEvent, SourceSubscription};
use crate::store::{Family, Stamp, Store, ViewModel};
use crate::stream::ViewStream;

// ── ReconcilerState ──────────────────────────────────────────────────

/// Lifecycle observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReconcilerState {
    Uninitialized,
    Loading,
    Live,
    TornDown,
}

// ── Reconciler ───────────────────────────────────────────────────────

/// Keeps a `ViewModel` in sync with a `DataSource`.
///
/// Cheaply cloneable. Dropping the last clone cancels any running session.
pub struct Reconciler<S: DataSource> {
    inner: Arc<Inner<S>>,
}

impl<S: DataSource> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S: DataSource> {
    shared: Arc<Shared<S>>,
    state: watch::Sender<ReconcilerState>,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
}

/// What background tasks need; never holds the session.
struct Shared<S: DataSource> {
    source: S,
    store: Store,
    config: ReconcilerConfig,
}

/// Tasks of one `start()`..`teardown()` span.
struct Session {
    id: u64,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: DataSource> Drop for Inner<S> {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            session.cancel.cancel();
            for task in session.tasks {
                task.abort();
            }
        }
    }
}

impl<S: DataSource> Reconciler<S> {
    /// Create a reconciler. Does not touch the source until
    /// [`start()`](Self::start).
    pub fn new(config: ReconcilerConfig, source: S) -> Self {
        let store = Store::new(config.limits);
        let (state, _) = watch::channel(ReconcilerState::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    source,
                    store,
                    config,
                }),
                state,
                session: Mutex::new(None),
                next_session: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.shared.config
    }

    pub fn source(&self) -> &S {
        &self.inner.shared.source
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load every family, then go live: spawn the poll timer and the push
    /// bridge. Allowed from `Uninitialized` and `TornDown`.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut admitted = false;
        self.inner.state.send_if_modified(|state| match state {
            ReconcilerState::Uninitialized | ReconcilerState::TornDown => {
                *state = ReconcilerState::Loading;
                admitted = true;
                true
            }
            ReconcilerState::Loading | ReconcilerState::Live => false,
        });
        if !admitted {
            return Err(CoreError::AlreadyStarted);
        }

        let shared = &self.inner.shared;
        info!(source = %shared.source.describe(), "starting reconciler");

        // Register the session first so a teardown during loading cancels it.
        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *self.lock_session() = Some(Session {
            id,
            cancel: cancel.clone(),
            tasks: Vec::new(),
        });

        if shared.config.initial_fetch {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                _ = shared.refresh_all() => {}
            }
        }

        {
            let mut guard = self.lock_session();
            // A later start() may have registered its own session meanwhile.
            let Some(session) = guard
                .as_mut()
                .filter(|s| s.id == id && !s.cancel.is_cancelled())
            else {
                debug!(session = id, "teardown during loading, not going live");
                return Err(CoreError::NotLive {
                    state: ReconcilerState::TornDown.to_string(),
                });
            };

            if let Some(period) = shared.config.poll_interval {
                let task_cancel = session.cancel.clone();
                session.tasks.push(tokio::spawn(poll_task(
                    Arc::clone(shared),
                    period,
                    task_cancel,
                )));
            }

            if shared.config.push_enabled {
                if let Some(subscription) = shared.source.subscribe(session.cancel.child_token()) {
                    let task_cancel = session.cancel.clone();
                    session.tasks.push(tokio::spawn(push_bridge_task(
                        Arc::clone(shared),
                        subscription,
                        task_cancel,
                    )));
                } else {
                    debug!("source has no push channel, polling only");
                }
            }

            self.inner.state.send_if_modified(|state| {
                if *state == ReconcilerState::Loading {
                    *state = ReconcilerState::Live;
                    true
                } else {
                    false
                }
            });
        }
        info!(session = id, "reconciler live");
        Ok(())
    }

    /// Stop the poll timer and push bridge and drop any in-flight fetch
    /// results. The view model keeps its last values.
    pub async fn teardown(&self) {
        self.inner.state.send_replace(ReconcilerState::TornDown);
        self.inner.shared.store.advance_epoch();

        let session = self.lock_session().take();
        if let Some(session) = session {
            session.cancel.cancel();
            for task in &session.tasks {
                task.abort();
            }
            for task in session.tasks {
                let _ = task.await;
            }
        }
        debug!("reconciler torn down");
    }

    /// One-shot: build, start without polling or push, run `f`, tear down.
    ///
    /// `f` may use any error type a [`CoreError`] converts into.
    pub async fn oneshot<F, Fut, T, E>(config: ReconcilerConfig, source: S, f: F) -> Result<T, E>
    where
        F: FnOnce(Reconciler<S>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let reconciler = Self::new(config.oneshot(), source);
        reconciler.start().await?;
        let result = f(reconciler.clone()).await;
        reconciler.teardown().await;
        result
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_live(&self) -> Result<(), CoreError> {
        let state = *self.inner.state.borrow();
        if state == ReconcilerState::Live {
            Ok(())
        } else {
            Err(CoreError::NotLive {
                state: state.to_string(),
            })
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> watch::Receiver<ReconcilerState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> ReconcilerState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> ViewStream {
        ViewStream::new(self.inner.shared.store.subscribe())
    }

    pub fn snapshot(&self) -> ViewModel {
        self.inner.shared.store.snapshot()
    }

    /// Read the view model without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&ViewModel) -> R) -> R {
        self.inner.shared.store.read(f)
    }

    // ── Manual refresh ───────────────────────────────────────────────

    /// Re-fetch every family. All fetches run; the first error is returned.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.ensure_live()?;
        self.inner.shared.refresh_all().await
    }

    /// Re-fetch one family. `Ok(false)` means the result arrived stale and
    /// was dropped.
    pub async fn refresh_family(&self, family: Family) -> Result<bool, CoreError> {
        self.ensure_live()?;
        self.inner.shared.refresh_family(family).await
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Run a command against the source and record it once confirmed.
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, CoreError> {
        self.ensure_live()?;
        let shared = &self.inner.shared;
        // Taken before the round trip so a teardown in between wins.
        let stamp = shared.store.live_stamp();
        debug!(%command, "executing command");

        match command {
            Command::ControlSensor {
                sector,
                sensor,
                action,
            } => {
                let (sector, sensor) = shared.resolve_sensor(&sector, &sensor)?;
                shared.source.control_sensor(&sector, &sensor, action).await?;
                Ok(shared.confirm(stamp, None, |vm| {
                    vm.set_sensor_active(&sector, &sensor, action.is_on(), Utc::now())
                }))
            }
            Command::ToggleMitigation { control, enabled } => {
                shared.source.toggle_mitigation(control, enabled).await?;
                let message = format!(
                    "{} has been {}",
                    control.to_string().to_uppercase(),
                    if enabled { "ENABLED" } else { "DISABLED" }
                );
                let alert = local_alert("Security Action", message);
                Ok(shared.confirm(stamp, Some(alert), |vm| {
                    vm.set_mitigation(control, enabled)
                }))
            }
            Command::RestartNetworkServices => {
                shared.source.restart_network_services().await?;
                let alert = local_alert(
                    "System Action",
                    "Network services restarted - All connections refreshed",
                );
                Ok(shared.confirm(stamp, Some(alert), |_| false))
            }
            Command::BlockAddress(ip) => {
                shared.source.block_address(ip).await?;
                let alert = local_alert(
                    "IP Blocked",
                    format!("IP address {ip} has been blocked via UFW firewall"),
                );
                Ok(shared.confirm(stamp, Some(alert), |vm| vm.block_address(ip)))
            }
            Command::UnblockAddress(ip) => {
                shared.source.unblock_address(ip).await?;
                let alert = local_alert("IP Unblocked", format!("IP address {ip} has been unblocked"));
                Ok(shared.confirm(stamp, Some(alert), |vm| vm.unblock_address(ip)))
            }
            Command::SendEmailReport => {
                shared.source.send_email_report().await?;
                let alert = local_alert(
                    "Email Alert",
                    format!("Security report sent to {}", shared.config.report_recipient),
                );
                Ok(shared.confirm(stamp, Some(alert), |_| false))
            }
            Command::ToggleEmailAlerts { enabled } => {
                shared.source.toggle_email_alerts(enabled).await?;
                Ok(shared.confirm(stamp, None, |vm| vm.set_email_alerts(enabled)))
            }
            Command::ResetLogs => Ok(shared.confirm(stamp, None, ViewModel::reset_logs)),
        }
    }

    pub async fn control_sensor(
        &self,
        sector: &str,
        sensor: &str,
        action: SensorAction,
    ) -> Result<CommandOutcome, CoreError> {
        self.execute(Command::ControlSensor {
            sector: sector.to_owned(),
            sensor: sensor.to_owned(),
            action,
        })
        .await
    }

    pub async fn toggle_mitigation(
        &self,
        control: MitigationControl,
        enabled: bool,
    ) -> Result<CommandOutcome, CoreError> {
        self.execute(Command::ToggleMitigation { control, enabled })
            .await
    }

    pub async fn restart_network_services(&self) -> Result<CommandOutcome, CoreError> {
        self.execute(Command::RestartNetworkServices).await
    }

    pub async fn block_address(&self, ip: IpAddr) -> Result<CommandOutcome, CoreError> {
        self.execute(Command::BlockAddress(ip)).await
    }

    pub async fn unblock_address(&self, ip: IpAddr) -> Result<CommandOutcome, CoreError> {
        self.execute(Command::UnblockAddress(ip)).await
    }

    pub async fn send_email_report(&self) -> Result<CommandOutcome, CoreError> {
        self.execute(Command::SendEmailReport).await
    }

    pub async fn toggle_email_alerts(&self, enabled: bool) -> Result<CommandOutcome, CoreError> {
        self.execute(Command::ToggleEmailAlerts { enabled }).await
    }

    pub async fn reset_logs(&self) -> Result<CommandOutcome, CoreError> {
        self.execute(Command::ResetLogs).await
    }
}

fn local_alert(category: &str, message: impl Into<String>) -> AlertEvent {
    AlertEvent::local_info(category, message, Utc::now())
}

// ── Shared: fetch and merge ──────────────────────────────────────────

impl<S: DataSource> Shared<S> {
    async fn refresh_family(&self, family: Family) -> Result<bool, CoreError> {
        let stamp = Stamp::Fetch(self.store.issue(family));
        let admitted = match family {
            Family::Alerts => {
                let alerts = self.source.fetch_attacks().await?;
                self.store
                    .apply(stamp, |vm| vm.replace_alerts(alerts, Utc::now()))
            }
            Family::Counters => {
                let counters = self.source.fetch_security_counters().await?;
                self.store
                    .apply(stamp, |vm| vm.replace_counters(counters, Utc::now()))
            }
            Family::Health => {
                let update = HealthUpdate::Snapshot(self.source.fetch_system_stats().await?);
                self.store
                    .apply(stamp, |vm| vm.apply_health(&update, Utc::now()))
            }
            Family::Sensors => {
                let sectors = self.source.fetch_sensors().await?;
                self.store
                    .apply(stamp, |vm| vm.merge_sectors(sectors, Utc::now()))
            }
        };
        if !admitted {
            debug!(%family, "fetch result arrived stale, dropped");
        }
        Ok(admitted)
    }

    /// Fetch every family concurrently. Failures are logged and the family
    /// keeps its last good value; the first error is returned.
    async fn refresh_all(&self) -> Result<(), CoreError> {
        let (alerts, counters, health, sensors) = tokio::join!(
            self.refresh_family(Family::Alerts),
            self.refresh_family(Family::Counters),
            self.refresh_family(Family::Health),
            self.refresh_family(Family::Sensors),
        );
        let mut first_error = None;
        for (family, result) in Family::iter().zip([alerts, counters, health, sensors]) {
            if let Err(e) = result {
                warn!(%family, error = %e, "fetch failed, keeping last value");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Normalize and check a sector/sensor pair against the view model.
    fn resolve_sensor(&self, sector: &str, sensor: &str) -> Result<(String, String), CoreError> {
        let sector_key = normalize_key(sector);
        let sensor_key = normalize_key(sensor);
        self.store.read(|vm| match vm.sectors.get(&sector_key) {
            None => Err(CoreError::UnknownSector {
                sector: sector.to_owned(),
            }),
            Some(s) if !s.sensors.contains_key(&sensor_key) => Err(CoreError::UnknownSensor {
                sector: sector.to_owned(),
                sensor: sensor.to_owned(),
            }),
            Some(_) => Ok(()),
        })?;
        Ok((sector_key, sensor_key))
    }

    /// Record a confirmed command and its feed entry in one store update.
    fn confirm(
        &self,
        stamp: Stamp,
        alert: Option<AlertEvent>,
        mutate: impl FnOnce(&mut ViewModel) -> bool,
    ) -> CommandOutcome {
        let mut changed = false;
        let recorded = alert.clone();
        let admitted = self.store.apply(stamp, |vm| {
            changed = mutate(vm);
            if let Some(alert) = alert {
                changed |= vm.insert_alert(alert);
            }
            changed
        });
        if !admitted {
            debug!("command confirmed after teardown, view model left as is");
        }
        CommandOutcome {
            changed,
            alert: recorded.filter(|_| admitted),
        }
    }

    /// Merge one push event. Returns `true` if it was a new CRITICAL alert.
    fn apply_event(&self, event: SourceEvent) -> bool {
        let stamp = self.store.live_stamp();
        let now = Utc::now();
        match event {
            SourceEvent::Alert(alert) => {
                let critical = alert.severity == Severity::Critical;
                let mut inserted = false;
                self.store.apply(stamp, |vm| {
                    inserted = vm.insert_alert(alert);
                    inserted
                });
                inserted && critical
            }
            SourceEvent::Health(update) => {
                self.store.apply(stamp, |vm| vm.apply_health(&update, now));
                false
            }
            SourceEvent::Sensor {
                sector,
                sensor,
                state,
            } => {
                self.store
                    .apply(stamp, |vm| vm.apply_sensor_update(&sector, &sensor, state));
                false
            }
            SourceEvent::Warning(warning) => {
                warn!(warnings = ?warning.messages, "backend resource warning");
                self.store.apply(stamp, |vm| vm.push_warning(warning));
                false
            }
            SourceEvent::AddressBlocked(ip) => {
                self.store.apply(stamp, |vm| vm.block_address(ip));
                false
            }
        }
    }

    fn wants_auto_report(&self) -> bool {
        self.config.auto_report_critical && self.store.read(|vm| vm.email_alerts_enabled)
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Poll counters and health on a fixed period.
async fn poll_task<S: DataSource>(shared: Arc<Shared<S>>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let (counters, health) = tokio::join!(
                    shared.refresh_family(Family::Counters),
                    shared.refresh_family(Family::Health),
                );
                for (family, result) in [(Family::Counters, counters), (Family::Health, health)] {
                    if let Err(e) = result {
                        warn!(%family, error = %e, "poll failed, keeping last value");
                    }
                }
            }
        }
    }
    debug!("poll task stopped");
}

/// Apply push events and link changes; re-fetch everything whenever the
/// link comes back, since missed events are not replayed.
async fn push_bridge_task<S: DataSource>(
    shared: Arc<Shared<S>>,
    mut subscription: SourceSubscription,
    cancel: CancellationToken,
) {
    let mut seen_generation = 0;
    let mut link_open = true;
    let initial = *subscription.link.borrow_and_update();
    shared
        .store
        .apply(shared.store.live_stamp(), |vm| vm.set_link(initial));
    let mut pending = Some(initial);

    loop {
        if let Some(status) = pending.take() {
            if status.state == LinkState::Connected && status.generation > seen_generation {
                seen_generation = status.generation;
                info!(generation = status.generation, "push link up, re-fetching");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = shared.refresh_all() => {}
                }
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = subscription.link.changed(), if link_open => {
                if changed.is_err() {
                    link_open = false;
                    continue;
                }
                let status = *subscription.link.borrow_and_update();
                debug!(state = ?status.state, attempt = status.attempt, "push link changed");
                shared.store.apply(shared.store.live_stamp(), |vm| vm.set_link(status));
                pending = Some(status);
            }
            event = subscription.events.recv() => {
                let Some(event) = event else {
                    debug!("push event stream ended");
                    break;
                };
                if shared.apply_event(event) && shared.wants_auto_report() {
                    spawn_auto_report(&shared, &cancel);
                }
            }
        }
    }
    debug!("push bridge stopped");
}

/// Fire-and-forget report mail for a CRITICAL alert.
fn spawn_auto_report<S: DataSource>(shared: &Arc<Shared<S>>, cancel: &CancellationToken) {
    let shared = Arc::clone(shared);
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            result = shared.source.send_email_report() => match result {
                Ok(()) => info!("critical alert reported by email"),
                Err(e) => warn!(error = %e, "automatic email report failed"),
            },
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use tokio::sync::{Notify, mpsc};

    use super::*;
    use crate::model::{
        AttackCategory, AttackCounters, NetworkIo, SectorState, SystemHealthSnapshot,
    };
    use crate::source::LinkStatus;

    // ── Fake source ──────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeState {
        counters: Mutex<AttackCounters>,
        attacks: Mutex<Vec<AlertEvent>>,
        fail_commands: AtomicBool,
        gate_counters: AtomicBool,
        gate: Notify,
        attack_fetches: AtomicUsize,
        reports: AtomicUsize,
        push: Mutex<Option<(mpsc::Receiver<SourceEvent>, watch::Receiver<LinkStatus>)>>,
        subscriptions: Mutex<Vec<CancellationToken>>,
    }

    #[derive(Clone, Default)]
    struct FakeSource(Arc<FakeState>);

    impl FakeSource {
        fn with_push() -> (Self, mpsc::Sender<SourceEvent>, watch::Sender<LinkStatus>) {
            let source = Self::default();
            let (tx, rx) = mpsc::channel(16);
            let (link_tx, link_rx) = watch::channel(LinkStatus::default());
            *source.0.push.lock().unwrap() = Some((rx, link_rx));
            (source, tx, link_tx)
        }

        fn set_counters(&self, dos: u64) {
            self.0.counters.lock().unwrap().set(AttackCategory::Dos, dos);
        }

        fn check(&self) -> Result<(), CoreError> {
            if self.0.fail_commands.load(Ordering::SeqCst) {
                Err(CoreError::CommandRejected {
                    reason: "nope".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl DataSource for FakeSource {
        fn describe(&self) -> String {
            "fake".into()
        }

        async fn fetch_attacks(&self) -> Result<Vec<AlertEvent>, CoreError> {
            self.0.attack_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.attacks.lock().unwrap().clone())
        }

        async fn fetch_security_counters(&self) -> Result<AttackCounters, CoreError> {
            let snapshot = self.0.counters.lock().unwrap().clone();
            if self.0.gate_counters.load(Ordering::SeqCst) {
                self.0.gate.notified().await;
            }
            Ok(snapshot)
        }

        async fn fetch_system_stats(&self) -> Result<SystemHealthSnapshot, CoreError> {
            Ok(SystemHealthSnapshot {
                cpu_percent: 20.0,
                memory_percent: 40.0,
                disk_percent: 50.0,
                temperature_c: 45.0,
                network_percent: 90.0,
                connection_count: 12,
                network_io: NetworkIo::default(),
            })
        }

        async fn fetch_sensors(&self) -> Result<IndexMap<String, SectorState>, CoreError> {
            Ok(IndexMap::new())
        }

        async fn control_sensor(
            &self,
            _sector: &str,
            _sensor: &str,
            _action: SensorAction,
        ) -> Result<(), CoreError> {
            self.check()
        }

        async fn toggle_mitigation(
            &self,
            _control: MitigationControl,
            _enabled: bool,
        ) -> Result<(), CoreError> {
            self.check()
        }

        async fn restart_network_services(&self) -> Result<(), CoreError> {
            self.check()
        }

        async fn block_address(&self, _ip: IpAddr) -> Result<(), CoreError> {
            self.check()
        }

        async fn unblock_address(&self, _ip: IpAddr) -> Result<(), CoreError> {
            self.check()
        }

        async fn send_email_report(&self) -> Result<(), CoreError> {
            self.0.reports.fetch_add(1, Ordering::SeqCst);
            self.check()
        }

        async fn toggle_email_alerts(&self, _enabled: bool) -> Result<(), CoreError> {
            self.check()
        }

        fn subscribe(&self, cancel: CancellationToken) -> Option<SourceSubscription> {
            let (events, link) = self.0.push.lock().unwrap().take()?;
            self.0.subscriptions.lock().unwrap().push(cancel.clone());
            Some(SourceSubscription::new(events, link, cancel))
        }
    }

    fn quiet() -> ReconcilerConfig {
        ReconcilerConfig {
            poll_interval: None,
            push_enabled: false,
            ..ReconcilerConfig::default()
        }
    }

    fn critical(message: &str) -> AlertEvent {
        let mut alert = AlertEvent::local_info("DoS Attack", message, Utc::now());
        alert.severity = Severity::Critical;
        alert.kind = crate::model::AlertKind::Critical;
        alert.origin = crate::model::AlertOrigin::Backend;
        alert
    }

    async fn wait_until(stream: &mut ViewStream, pred: impl Fn(&ViewModel) -> bool) {
        if pred(stream.current()) {
            return;
        }
        tokio::time::timeout(Duration::from_secs(30), async {
            while let Some(vm) = stream.changed().await {
                if pred(vm) {
                    return;
                }
            }
        })
        .await
        .unwrap();
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_is_not_reentrant_while_live() {
        let reconciler = Reconciler::new(quiet(), FakeSource::default());
        assert_eq!(reconciler.current_state(), ReconcilerState::Uninitialized);

        reconciler.start().await.unwrap();
        assert_eq!(reconciler.current_state(), ReconcilerState::Live);
        assert!(matches!(
            reconciler.start().await,
            Err(CoreError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn restart_after_teardown_does_not_leak_tasks() {
        let (source, _tx, _link) = FakeSource::with_push();
        let config = ReconcilerConfig {
            poll_interval: Some(Duration::from_secs(5)),
            ..ReconcilerConfig::default()
        };
        let reconciler = Reconciler::new(config, source.clone());

        for _ in 0..3 {
            reconciler.start().await.unwrap();
            reconciler.teardown().await;
            assert_eq!(reconciler.current_state(), ReconcilerState::TornDown);
            assert!(reconciler.lock_session().is_none());
        }
        let subs = source.0.subscriptions.lock().unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].is_cancelled());
    }

    #[tokio::test]
    async fn torn_down_start_does_not_adopt_a_newer_session() {
        let source = FakeSource::default();
        let config = ReconcilerConfig {
            poll_interval: Some(Duration::from_secs(5)),
            push_enabled: false,
            ..ReconcilerConfig::default()
        };
        let reconciler = Reconciler::new(config, source.clone());

        source.0.gate_counters.store(true, Ordering::SeqCst);
        let first = {
            let r = reconciler.clone();
            tokio::spawn(async move { r.start().await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(reconciler.current_state(), ReconcilerState::Loading);

        reconciler.teardown().await;
        source.0.gate_counters.store(false, Ordering::SeqCst);
        reconciler.start().await.unwrap();
        source.0.gate.notify_one();

        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, CoreError::NotLive { ref state } if state == "torn_down"));
        assert_eq!(reconciler.current_state(), ReconcilerState::Live);
        assert_eq!(
            reconciler.lock_session().as_ref().map(|s| s.tasks.len()),
            Some(1)
        );

        reconciler.teardown().await;
    }

    #[tokio::test]
    async fn commands_require_live_state() {
        let reconciler = Reconciler::new(quiet(), FakeSource::default());
        let err = reconciler.toggle_email_alerts(false).await.unwrap_err();
        assert!(matches!(err, CoreError::NotLive { ref state } if state == "uninitialized"));

        reconciler.start().await.unwrap();
        reconciler.teardown().await;
        let err = reconciler.reset_logs().await.unwrap_err();
        assert!(matches!(err, CoreError::NotLive { ref state } if state == "torn_down"));
    }

    // ── Commands ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn failed_command_leaves_model_unchanged() {
        let source = FakeSource::default();
        source.0.fail_commands.store(true, Ordering::SeqCst);
        let reconciler = Reconciler::new(quiet(), source);
        reconciler.start().await.unwrap();
        let before = reconciler.snapshot();

        let err = reconciler
            .toggle_mitigation(MitigationControl::Firewall, false)
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        assert!(reconciler.block_address(ip).await.is_err());

        let after = reconciler.snapshot();
        assert_eq!(after.mitigation, before.mitigation);
        assert_eq!(after.alerts, before.alerts);
        assert!(after.blocked_addresses.is_empty());
    }

    #[tokio::test]
    async fn confirmed_command_updates_model_and_feed() {
        let reconciler = Reconciler::new(quiet(), FakeSource::default());
        reconciler.start().await.unwrap();

        let outcome = reconciler
            .toggle_mitigation(MitigationControl::Firewall, false)
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(
            outcome.alert.unwrap().message,
            "FIREWALL has been DISABLED"
        );

        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        reconciler.block_address(ip).await.unwrap();
        reconciler.send_email_report().await.unwrap();

        let vm = reconciler.snapshot();
        assert!(!vm.mitigation.is_enabled(MitigationControl::Firewall));
        assert!(vm.blocked_addresses.contains(&ip));
        let messages: Vec<&str> = vm.alerts.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Security report sent to admin@rnsinstitute.edu.in",
                "IP address 10.0.0.5 has been blocked via UFW firewall",
                "FIREWALL has been DISABLED",
            ]
        );
    }

    #[tokio::test]
    async fn sensor_control_validates_and_normalizes_keys() {
        let reconciler = Reconciler::new(quiet(), FakeSource::default());
        reconciler.start().await.unwrap();

        let err = reconciler
            .control_sensor("library", "light", SensorAction::On)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownSector { .. }));
        let err = reconciler
            .control_sensor("parking", "sprinkler", SensorAction::On)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownSensor { .. }));

        let outcome = reconciler
            .control_sensor("building_a", "light", SensorAction::On)
            .await
            .unwrap();
        assert!(outcome.changed);
        assert!(outcome.alert.is_none());
        assert!(reconciler.read(|vm| vm.sectors["buildingA"].sensors["light"].active));
    }

    #[tokio::test]
    async fn reset_logs_is_local() {
        let source = FakeSource::default();
        source.set_counters(4);
        let reconciler = Reconciler::new(quiet(), source);
        reconciler.start().await.unwrap();
        assert_eq!(reconciler.read(|vm| vm.counters.total()), 4);

        reconciler.reset_logs().await.unwrap();
        assert_eq!(reconciler.read(|vm| vm.counters.total()), 0);

        reconciler.refresh_family(Family::Counters).await.unwrap();
        assert_eq!(reconciler.read(|vm| vm.counters.total()), 4);
    }

    // ── Staleness ────────────────────────────────────────────────────

    #[tokio::test]
    async fn teardown_drops_late_fetch_results() {
        let source = FakeSource::default();
        let reconciler = Reconciler::new(quiet(), source.clone());
        reconciler.start().await.unwrap();

        source.set_counters(9);
        source.0.gate_counters.store(true, Ordering::SeqCst);
        let pending = {
            let r = reconciler.clone();
            tokio::spawn(async move { r.refresh_family(Family::Counters).await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        reconciler.teardown().await;
        source.0.gate.notify_one();

        let admitted = pending.await.unwrap().unwrap();
        assert!(!admitted);
        assert_eq!(reconciler.read(|vm| vm.counters.total()), 0);
    }

    // ── Push ─────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn pushed_alert_then_polled_counters() {
        let (source, tx, _link) = FakeSource::with_push();
        let config = ReconcilerConfig {
            poll_interval: Some(Duration::from_secs(5)),
            ..ReconcilerConfig::default()
        };
        let reconciler = Reconciler::new(config, source.clone());
        reconciler.start().await.unwrap();
        let mut view = reconciler.subscribe();
        assert_eq!(view.current().counters.total(), 0);

        tx.send(SourceEvent::Alert(critical("High packet rate detected")))
            .await
            .unwrap();
        wait_until(&mut view, |vm| !vm.alerts.is_empty()).await;

        let vm = view.current();
        assert_eq!(vm.alerts[0].message, "High packet rate detected");
        assert_eq!(vm.counters.total(), 0);
        assert_eq!(vm.link.map(|l| l.state), Some(LinkState::Disconnected));

        source.set_counters(1);
        tokio::time::sleep(Duration::from_secs(6)).await;
        wait_until(&mut view, |vm| vm.counters.get(AttackCategory::Dos) == 1).await;
        assert_eq!(view.current().alerts.len(), 1);

        // Auto report for the CRITICAL alert.
        tokio::task::yield_now().await;
        assert_eq!(source.0.reports.load(Ordering::SeqCst), 1);
        reconciler.teardown().await;
    }

    #[tokio::test]
    async fn duplicate_push_is_dropped_and_not_reported_twice() {
        let (source, tx, _link) = FakeSource::with_push();
        let config = ReconcilerConfig {
            poll_interval: None,
            ..ReconcilerConfig::default()
        };
        let reconciler = Reconciler::new(config, source.clone());
        reconciler.start().await.unwrap();
        let mut view = reconciler.subscribe();

        let alert = critical("ARP poisoning");
        tx.send(SourceEvent::Alert(alert.clone())).await.unwrap();
        tx.send(SourceEvent::Alert(alert)).await.unwrap();
        tx.send(SourceEvent::AddressBlocked("10.9.9.9".parse().unwrap()))
            .await
            .unwrap();
        wait_until(&mut view, |vm| !vm.blocked_addresses.is_empty()).await;

        assert_eq!(view.current().alerts.len(), 1);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(source.0.reports.load(Ordering::SeqCst), 1);
        reconciler.teardown().await;
    }

    #[tokio::test]
    async fn reconnect_triggers_full_refetch() {
        let (source, _tx, link) = FakeSource::with_push();
        let config = ReconcilerConfig {
            poll_interval: None,
            ..ReconcilerConfig::default()
        };
        let reconciler = Reconciler::new(config, source.clone());
        reconciler.start().await.unwrap();
        assert_eq!(source.0.attack_fetches.load(Ordering::SeqCst), 1);

        let mut view = reconciler.subscribe();
        for generation in 1..=2 {
            link.send_replace(LinkStatus {
                state: LinkState::Connected,
                attempt: 0,
                generation,
            });
            wait_until(&mut view, |vm| {
                vm.link.map(|l| l.generation) == Some(generation)
            })
            .await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(source.0.attack_fetches.load(Ordering::SeqCst), 3);
        reconciler.teardown().await;
    }

    #[tokio::test]
    async fn oneshot_runs_closure_and_tears_down() {
        let source = FakeSource::default();
        source.set_counters(2);
        let total = Reconciler::oneshot(ReconcilerConfig::default(), source, |r| async move {
            assert!(r.read(|vm| vm.counters.total() == 0));
            r.refresh_family(Family::Counters).await?;
            Ok::<_, CoreError>(r.read(|vm| vm.counters.total()))
        })
        .await
        .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn oneshot_accepts_caller_error_type() {
        #[derive(Debug)]
        enum AppError {
            Core(CoreError),
        }
        impl From<CoreError> for AppError {
            fn from(err: CoreError) -> Self {
                Self::Core(err)
            }
        }

        let source = FakeSource::default();
        source.0.fail_commands.store(true, Ordering::SeqCst);
        let result: Result<(), AppError> =
            Reconciler::oneshot(quiet(), source, |r| async move {
                r.toggle_email_alerts(false).await?;
                Ok(())
            })
            .await;
        let AppError::Core(err) = result.unwrap_err();
        assert!(err.is_rejection());
    }
}
