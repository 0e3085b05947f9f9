//! `device-reporter files` - list watched-file processing state.

use anyhow::Result;
use clap::Args;
use device_reporter_db::{DeviceDb, FileStatus};

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_timestamp, print_table_colored, status_color, truncate};

#[derive(Debug, Args)]
pub struct FilesArgs {
    /// Only show files in this status (pending, processing, done, error)
    #[arg(long)]
    pub status: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(db: &DeviceDb, args: FilesArgs) -> Result<()> {
    let files = match args.status.as_deref() {
        Some(raw) => {
            let status = FileStatus::parse(raw).ok_or_else(|| HelpfulError::unknown_status(raw))?;
            db.list_files_with_status(status).await?
        }
        None => db.list_files().await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        println!("No files recorded.");
        return Ok(());
    }

    let rows = files
        .iter()
        .map(|f| {
            vec![
                (f.name.clone(), None),
                (f.status.to_string(), Some(status_color(f.status))),
                (format_timestamp(f.processed_at), None),
                (truncate(f.error_message.as_deref().unwrap_or(""), 60), None),
            ]
        })
        .collect();

    print_table_colored(&["NAME", "STATUS", "PROCESSED", "ERROR"], rows);
    println!("{} file(s)", files.len());
    Ok(())
}
