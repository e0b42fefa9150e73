//! `watch`: a live session that prints what changes until Ctrl-C.

use std::collections::HashSet;
use std::io::IsTerminal;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use campus_core::projection::{self, AlertEntry, Tone};
use campus_core::{
    DataSource, LinkState, LinkStatus, Reconciler, ReconcilerConfig, SystemHealthSnapshot,
    ViewModel,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// One printable change between two view model revisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchLine {
    Alert(AlertEntry),
    Health(SystemHealthSnapshot),
    Link(LinkStatus),
    Warning { messages: Vec<String> },
}

/// Remembers what has been printed so each revision yields only news.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    seen_alerts: HashSet<String>,
    link: Option<LinkStatus>,
    health_at: Option<DateTime<Utc>>,
    warning_at: Option<DateTime<Utc>>,
    alerts_only: bool,
}

impl ChangeTracker {
    pub fn new(alerts_only: bool) -> Self {
        Self {
            alerts_only,
            ..Self::default()
        }
    }

    /// Lines for everything new in `vm`, oldest first.
    pub fn diff(&mut self, vm: &ViewModel) -> Vec<WatchLine> {
        let mut lines = Vec::new();

        if let Some(link) = vm.link {
            let changed = self
                .link
                .is_none_or(|prev| prev.state != link.state || prev.attempt != link.attempt);
            if changed {
                lines.push(WatchLine::Link(link));
            }
            self.link = Some(link);
        }

        let entries = projection::alert_entries(vm);
        let current: HashSet<String> = vm.alerts.iter().map(|a| a.fingerprint()).collect();
        for (alert, entry) in vm.alerts.iter().zip(entries).rev() {
            if !self.seen_alerts.contains(&alert.fingerprint()) {
                lines.push(WatchLine::Alert(entry));
            }
        }
        self.seen_alerts = current;

        let mut fresh: Vec<_> = vm
            .warnings
            .iter()
            .filter(|w| self.warning_at.is_none_or(|at| w.observed_at > at))
            .collect();
        fresh.sort_by_key(|w| w.observed_at);
        for warning in fresh {
            self.warning_at = Some(warning.observed_at);
            lines.push(WatchLine::Warning {
                messages: warning.messages.clone(),
            });
        }

        if !self.alerts_only && vm.health.observed_at != self.health_at {
            self.health_at = vm.health.observed_at;
            if let Some(snapshot) = vm.health.snapshot() {
                lines.push(WatchLine::Health(snapshot));
            }
        }

        lines
    }
}

// ── Rendering ────────────────────────────────────────────────────────

fn link_label(link: &LinkStatus) -> String {
    match link.state {
        LinkState::Connected => format!("live link connected (session {})", link.generation),
        LinkState::Connecting if link.attempt > 0 => {
            format!("live link reconnecting (attempt {})", link.attempt)
        }
        LinkState::Connecting => "live link connecting".to_owned(),
        LinkState::Disconnected => "live link disconnected".to_owned(),
    }
}

pub fn render_line(line: &WatchLine, color: bool) -> String {
    match line {
        WatchLine::Alert(entry) => {
            let source = entry
                .source
                .as_deref()
                .map(|s| format!(" [{s}]"))
                .unwrap_or_default();
            format!(
                "{} {} {}: {}{}",
                output::dim(&entry.time, color),
                output::tint(&format!("{:<8}", entry.severity), entry.tone, color),
                entry.category,
                entry.message,
                source
            )
        }
        WatchLine::Health(snapshot) => {
            let gauges = projection::health_gauges(snapshot)
                .into_iter()
                .map(|g| {
                    let text = format!("{} {:.1}{}", g.label, g.value, g.unit);
                    if g.warning {
                        output::tint(&text, Tone::Yellow, color)
                    } else {
                        text
                    }
                })
                .collect::<Vec<_>>()
                .join("  ");
            format!("{} {gauges}", output::dim("health", color))
        }
        WatchLine::Link(link) => output::dim(&link_label(link), color),
        WatchLine::Warning { messages } => {
            output::tint(&format!("warning: {}", messages.join("; ")), Tone::Orange, color)
        }
    }
}

/// One line of output per change: JSON lines, YAML documents, or text.
fn format_line(line: &WatchLine, format: &OutputFormat, color: bool) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(line)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(line)?.trim_end()),
        OutputFormat::Table | OutputFormat::Plain => render_line(line, color),
    })
}

fn emit(line: &WatchLine, format: &OutputFormat, color: bool) -> Result<(), CliError> {
    output::print_output(&format_line(line, format, color)?, false);
    Ok(())
}

fn spinner(message: String, global: &GlobalOpts) -> ProgressBar {
    if global.quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn run<S: DataSource>(
    source: S,
    mut config: ReconcilerConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(ref raw) = args.interval {
        config.poll_interval = campus_config::parse_interval("interval", raw)?;
    }
    if args.no_push {
        config.push_enabled = false;
    }

    let reconciler = Reconciler::new(config, source);
    let target = reconciler.source().describe();

    let bar = spinner(format!("Loading from {target}"), global);
    let started = reconciler.start().await;
    bar.finish_and_clear();
    started?;

    if !global.quiet {
        eprintln!("Watching {target} (Ctrl-C to stop)");
    }

    let color = output::should_color(&global.color);
    let mut tracker = ChangeTracker::new(args.alerts_only);
    let mut stream = reconciler.subscribe();
    for line in tracker.diff(stream.current()) {
        emit(&line, &global.output, color)?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            changed = stream.changed() => {
                let Some(vm) = changed else { break Ok(()) };
                let lines = tracker.diff(vm);
                if let Err(err) = lines.iter().try_for_each(|line| emit(line, &global.output, color)) {
                    break Err(err);
                }
            }
        }
    };

    reconciler.teardown().await;
    if !global.quiet {
        eprintln!("Stopped");
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use campus_core::{AlertEvent, HealthUpdate, Severity, SystemWarning};

    use super::*;

    fn critical(message: &str) -> AlertEvent {
        let mut alert = AlertEvent::local_info("DoS Attack", message, Utc::now());
        alert.severity = Severity::Critical;
        alert
    }

    #[test]
    fn alerts_are_reported_once_oldest_first() {
        let mut vm = ViewModel::default();
        vm.insert_alert(critical("first"));
        vm.insert_alert(critical("second"));

        let mut tracker = ChangeTracker::new(true);
        let lines = tracker.diff(&vm);
        let messages: Vec<_> = lines
            .iter()
            .map(|l| match l {
                WatchLine::Alert(entry) => entry.message.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(messages, vec!["first", "second"]);

        assert!(tracker.diff(&vm).is_empty());

        vm.insert_alert(critical("third"));
        let lines = tracker.diff(&vm);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn link_changes_are_reported_on_transition() {
        let mut vm = ViewModel::default();
        let mut tracker = ChangeTracker::new(true);
        vm.set_link(LinkStatus {
            state: LinkState::Connected,
            attempt: 0,
            generation: 1,
        });
        assert!(matches!(tracker.diff(&vm)[..], [WatchLine::Link(_)]));
        assert!(tracker.diff(&vm).is_empty());

        vm.set_link(LinkStatus {
            state: LinkState::Connecting,
            attempt: 2,
            generation: 1,
        });
        let lines = tracker.diff(&vm);
        assert_eq!(
            render_line(&lines[0], false),
            "live link reconnecting (attempt 2)"
        );
    }

    #[test]
    fn health_lines_follow_new_readings_only() {
        let mut vm = ViewModel::default();
        let mut tracker = ChangeTracker::new(false);
        assert!(tracker.diff(&vm).is_empty());

        let update = HealthUpdate::Snapshot(SystemHealthSnapshot {
            cpu_percent: 91.0,
            memory_percent: 40.0,
            disk_percent: 30.0,
            temperature_c: 50.0,
            network_percent: 80.0,
            connection_count: 3,
            network_io: campus_core::NetworkIo::default(),
        });
        vm.apply_health(&update, Utc::now());
        let lines = tracker.diff(&vm);
        assert_eq!(lines.len(), 1);
        let text = render_line(&lines[0], false);
        assert!(text.starts_with("health CPU Usage 91.0%"), "{text}");
        assert!(tracker.diff(&vm).is_empty());
    }

    #[test]
    fn warnings_are_printed_once() {
        let mut vm = ViewModel::default();
        let mut tracker = ChangeTracker::new(true);
        vm.push_warning(SystemWarning {
            messages: vec!["High CPU usage: 95%".into()],
            observed_at: Utc::now(),
        });
        let lines = tracker.diff(&vm);
        assert_eq!(
            lines,
            vec![WatchLine::Warning {
                messages: vec!["High CPU usage: 95%".into()]
            }]
        );
        assert!(tracker.diff(&vm).is_empty());
    }

    #[test]
    fn yaml_output_is_one_document_per_change() {
        let line = WatchLine::Warning {
            messages: vec!["disk".into()],
        };
        assert_eq!(
            format_line(&line, &OutputFormat::Yaml, false).unwrap(),
            "---\ntype: warning\nmessages:\n- disk"
        );
        assert_eq!(
            format_line(&line, &OutputFormat::JsonCompact, false).unwrap(),
            r#"{"type":"warning","messages":["disk"]}"#
        );
    }

    #[test]
    fn json_lines_are_tagged() {
        let line = WatchLine::Warning {
            messages: vec!["disk".into()],
        };
        assert_eq!(
            serde_json::to_string(&line).unwrap(),
            r#"{"type":"warning","messages":["disk"]}"#
        );
    }
}
