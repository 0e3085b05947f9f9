//! `device-reporter reset` - return files to `pending` so the next scan
//! picks them up again.

use anyhow::Result;
use clap::Args;
use device_reporter_db::DeviceDb;
use tracing::info;

use crate::cli::error::HelpfulError;

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// File names (as recorded, without directory) to reset
    #[arg(value_name = "NAMES")]
    pub names: Vec<String>,

    /// Reset every file currently in `error`
    #[arg(long)]
    pub errored: bool,
}

pub async fn run(db: &DeviceDb, args: ResetArgs) -> Result<()> {
    if args.names.is_empty() && !args.errored {
        return Err(HelpfulError::nothing_to_reset().into());
    }

    let mut reset = 0;
    if !args.names.is_empty() {
        reset += db.reset_files(&args.names).await?;
    }
    if args.errored {
        reset += db.reset_errored_files().await?;
    }

    info!(count = reset, "Reset files to pending");
    println!("Reset {} file(s) to pending", reset);
    Ok(())
}
