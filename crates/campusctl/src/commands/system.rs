//! System command handlers.

use serde::Serialize;
use strum::IntoEnumIterator;
use tabled::Tabled;

use campus_core::projection::{self, HealthGauge};
use campus_core::{DataSource, Family, Reconciler, SystemHealthSnapshot};

use crate::cli::{GlobalOpts, SystemArgs, SystemCommand};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize, Tabled)]
struct GaugeRow {
    #[tabled(rename = "Gauge")]
    label: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "Status")]
    status: &'static str,
}

impl From<HealthGauge> for GaugeRow {
    fn from(gauge: HealthGauge) -> Self {
        Self {
            label: gauge.label,
            value: format!("{:.1}{}", gauge.value, gauge.unit),
            threshold: format!("{:.0}{}", gauge.threshold, gauge.unit),
            status: if gauge.warning { "warning" } else { "ok" },
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct FamilyRow {
    #[tabled(rename = "Data")]
    family: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn gauge_detail(snapshot: &SystemHealthSnapshot) -> String {
    let rows: Vec<GaugeRow> = projection::health_gauges(snapshot)
        .into_iter()
        .map(GaugeRow::from)
        .collect();
    let io = snapshot.network_io;
    format!(
        "{}\nConnections: {}\nNetwork I/O: {} B sent, {} B received ({} / {} packets)",
        tabled::Table::new(rows).with(tabled::settings::Style::rounded()),
        snapshot.connection_count,
        io.bytes_sent,
        io.bytes_recv,
        io.packets_sent,
        io.packets_recv,
    )
}

pub async fn handle<S: DataSource>(
    reconciler: &Reconciler<S>,
    args: SystemArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SystemCommand::Stats => {
            reconciler.refresh_family(Family::Health).await?;

            let Some(snapshot) = reconciler.read(|vm| vm.health.snapshot()) else {
                return Err(CliError::Protocol {
                    message: "backend returned no health readings".into(),
                });
            };
            let out = output::render_single(&global.output, &snapshot, gauge_detail, |s| {
                format!(
                    "cpu={:.1} memory={:.1} disk={:.1} temp={:.1} network={:.1}",
                    s.cpu_percent,
                    s.memory_percent,
                    s.disk_percent,
                    s.temperature_c,
                    s.network_percent
                )
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SystemCommand::Status => {
            let mut rows = Vec::new();
            let mut failures = 0_usize;
            for family in Family::iter() {
                let status = match reconciler.refresh_family(family).await {
                    Ok(_) => "ok".to_owned(),
                    Err(err) => {
                        failures += 1;
                        err.to_string()
                    }
                };
                rows.push(FamilyRow {
                    family: family.to_string(),
                    status,
                });
            }

            if !global.quiet {
                eprintln!("Backend: {}", reconciler.source().describe());
            }
            let out = output::render_list(&global.output, &rows, |r| {
                format!("{}\t{}", r.family, r.status)
            })?;
            output::print_output(&out, global.quiet);

            if failures == rows.len() {
                // nothing answered: surface it through the exit code
                return Err(CliError::Unreachable {
                    kind: "all requests failed".into(),
                    message: reconciler.source().describe(),
                });
            }
            Ok(())
        }
    }
}
