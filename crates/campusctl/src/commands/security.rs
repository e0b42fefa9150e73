//! Firewall block/unblock handlers.

use campus_core::{DataSource, Reconciler};

use crate::cli::{GlobalOpts, SecurityArgs, SecurityCommand};
use crate::error::CliError;

use super::util;

pub async fn handle<S: DataSource>(
    reconciler: &Reconciler<S>,
    args: SecurityArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SecurityCommand::Block { ip } => {
            if !util::confirm("block", &format!("Block {ip} at the firewall?"), global.yes)? {
                return Ok(());
            }
            let outcome = reconciler.block_address(ip).await?;
            util::report_outcome(&outcome, &format!("{ip} blocked"), global);
            Ok(())
        }

        SecurityCommand::Unblock { ip } => {
            if !util::confirm("unblock", &format!("Remove the firewall block on {ip}?"), global.yes)? {
                return Ok(());
            }
            let outcome = reconciler.unblock_address(ip).await?;
            util::report_outcome(&outcome, &format!("{ip} unblocked"), global);
            Ok(())
        }
    }
}
