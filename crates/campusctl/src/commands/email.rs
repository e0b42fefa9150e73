//! Email report handlers.

use campus_core::{DataSource, Reconciler};

use crate::cli::{EmailArgs, EmailCommand, GlobalOpts};
use crate::error::CliError;

use super::util;

pub async fn handle<S: DataSource>(
    reconciler: &Reconciler<S>,
    args: EmailArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        EmailCommand::Report => {
            let outcome = reconciler.send_email_report().await?;
            util::report_outcome(&outcome, "Security report sent", global);
            Ok(())
        }

        EmailCommand::Alerts { state } => {
            let outcome = reconciler.toggle_email_alerts(state.is_on()).await?;
            let fallback = if state.is_on() {
                "Email alerts enabled"
            } else {
                "Email alerts disabled"
            };
            util::report_outcome(&outcome, fallback, global);
            Ok(())
        }
    }
}
