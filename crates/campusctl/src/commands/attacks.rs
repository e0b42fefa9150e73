//! Attack log and counter handlers.

use serde::Serialize;
use tabled::Tabled;

use campus_core::projection::{self, AlertEntry};
use campus_core::{DataSource, Family, Reconciler};

use crate::cli::{AttacksArgs, AttacksCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize, Tabled)]
struct AttackRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Type")]
    category: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<AlertEntry> for AttackRow {
    fn from(entry: AlertEntry) -> Self {
        Self {
            time: entry.time,
            severity: entry.severity.to_string(),
            category: entry.category,
            source: entry.source.unwrap_or_else(|| "-".into()),
            message: entry.message,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct CounterRow {
    #[tabled(rename = "Category")]
    category: &'static str,
    #[tabled(rename = "Count")]
    count: u64,
    #[tabled(rename = "Share")]
    share: String,
}

pub async fn handle<S: DataSource>(
    reconciler: &Reconciler<S>,
    args: AttacksArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AttacksCommand::List { limit } => {
            reconciler.refresh_family(Family::Alerts).await?;

            let mut entries = reconciler.read(projection::alert_entries);
            if let Some(limit) = limit {
                entries.truncate(limit);
            }
            let rows: Vec<AttackRow> = entries.into_iter().map(AttackRow::from).collect();

            if rows.is_empty() && !global.quiet {
                eprintln!("No attacks detected");
                return Ok(());
            }
            let out = output::render_list(&global.output, &rows, |r| {
                format!("{}\t{}\t{}", r.time, r.category, r.message)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AttacksCommand::Stats => {
            reconciler.refresh_family(Family::Counters).await?;

            let (slices, total) = reconciler.read(|vm| {
                (
                    projection::attack_distribution(&vm.counters),
                    vm.counters.total(),
                )
            });
            let rows: Vec<CounterRow> = slices
                .into_iter()
                .map(|slice| CounterRow {
                    category: slice.label,
                    count: slice.count,
                    share: share_label(slice.count, total),
                })
                .collect();

            if rows.is_empty() && !global.quiet {
                eprintln!("No attacks detected");
                return Ok(());
            }
            let out = output::render_list(&global.output, &rows, |r| {
                format!("{}\t{}", r.category, r.count)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn share_label(count: u64, total: u64) -> String {
    if total == 0 {
        return "-".into();
    }
    format!("{:.1}%", count as f64 * 100.0 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_is_a_percentage_of_total() {
        assert_eq!(share_label(1, 4), "25.0%");
        assert_eq!(share_label(0, 0), "-");
    }
}
