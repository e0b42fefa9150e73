//! Sensor command handlers.

use chrono::Utc;
use serde::Serialize;
use tabled::Tabled;

use campus_core::projection::{self, SectorFilter};
use campus_core::{DataSource, Family, Reconciler, SectorState, SensorAction};

use crate::cli::{GlobalOpts, SensorsArgs, SensorsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize, Tabled)]
struct SensorRow {
    #[tabled(rename = "Sector")]
    sector: String,
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "State")]
    state: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Node")]
    online: String,
}

fn sector_rows(key: &str, sector: &SectorState, now: chrono::DateTime<Utc>) -> Vec<SensorRow> {
    sector
        .sensors
        .iter()
        .map(|(name, sensor)| SensorRow {
            sector: key.to_owned(),
            sensor: name.clone(),
            state: if sensor.active { "on" } else { "off" },
            value: format!("{:.1}{}", sensor.value, sensor.unit),
            updated: sensor.last_update_label(now),
            online: sector.connectivity.to_string(),
        })
        .collect()
}

pub async fn handle<S: DataSource>(
    reconciler: &Reconciler<S>,
    args: SensorsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SensorsCommand::List { sector } => {
            reconciler.refresh_family(Family::Sensors).await?;

            let filter = sector.map_or(SectorFilter::All, SectorFilter::Key);
            let now = Utc::now();
            let rows = reconciler.read(|vm| {
                projection::filter_sectors(vm, &filter)
                    .into_iter()
                    .flat_map(|(key, sector)| sector_rows(key, sector, now))
                    .collect::<Vec<_>>()
            });

            if let SectorFilter::Key(ref key) = filter {
                if rows.is_empty() && !reconciler.read(|vm| vm.sectors.contains_key(key)) {
                    return Err(CliError::NotFound {
                        resource_type: "sector".into(),
                        identifier: key.clone(),
                        list_command: "sensors list".into(),
                    });
                }
            }

            let out = output::render_list(&global.output, &rows, |r| {
                format!("{}/{}", r.sector, r.sensor)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SensorsCommand::Set {
            sector,
            sensor,
            state,
        } => {
            let action = SensorAction::from(state.is_on());
            let outcome = reconciler.control_sensor(&sector, &sensor, action).await?;
            util::report_outcome(
                &outcome,
                &format!("{sector}/{sensor} switched {action}"),
                global,
            );
            Ok(())
        }
    }
}
