//! Mitigation control handlers.

use serde::Serialize;
use tabled::Tabled;

use campus_core::{DataSource, Reconciler};

use crate::cli::{GlobalOpts, MitigationArgs, MitigationCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize, Tabled)]
struct ControlRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Control")]
    label: &'static str,
    #[tabled(rename = "Enabled")]
    enabled: bool,
}

pub async fn handle<S: DataSource>(
    reconciler: &Reconciler<S>,
    args: MitigationArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        // The backend has no read endpoint for these flags, so this is the
        // locally assumed state.
        MitigationCommand::List => {
            let rows: Vec<ControlRow> = reconciler.read(|vm| {
                vm.mitigation
                    .iter()
                    .map(|(control, enabled)| ControlRow {
                        key: control.to_string(),
                        label: control.label(),
                        enabled,
                    })
                    .collect()
            });
            let out = output::render_list(&global.output, &rows, |r| {
                format!("{}\t{}", r.key, if r.enabled { "on" } else { "off" })
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        MitigationCommand::Set { control, state } => {
            let outcome = reconciler.toggle_mitigation(control, state.is_on()).await?;
            util::report_outcome(
                &outcome,
                &format!("{} switched {}", control.label(), if state.is_on() { "on" } else { "off" }),
                global,
            );
            Ok(())
        }

        MitigationCommand::RestartNetwork => {
            if !util::confirm(
                "restart-network",
                "Restart network services? Active connections will drop.",
                global.yes,
            )? {
                return Ok(());
            }
            let outcome = reconciler.restart_network_services().await?;
            util::report_outcome(&outcome, "Network services restarted", global);
            Ok(())
        }
    }
}
