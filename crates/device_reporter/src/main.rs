//! device-reporter
//!
//! Watches a directory for device TSV exports, stores their devices and
//! writes one report per unit.
//!
//! Usage:
//!     device-reporter run --watch-dir ./input --reports-dir ./output
//!     device-reporter devices <UNIT_GUID> --page 2
//!     device-reporter files --status error
//!     device-reporter reset --errored

use clap::{Parser, Subcommand};
use device_reporter_logging::{init_logging, ConsoleLevel, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "device-reporter", version, about = "Device file ingest and per-unit reporting")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "DEVICE_REPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true, env = "DEVICE_REPORTER_DATABASE")]
    database: Option<PathBuf>,

    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the ingest pipeline until interrupted
    Run(cli::run::RunArgs),

    /// List stored devices for one unit
    Devices(cli::devices::DevicesArgs),

    /// List watched files and their processing status
    Files(cli::files::FilesArgs),

    /// Return files to pending so they are processed again
    Reset(cli::reset::ResetArgs),
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Devices(args) => args.json,
            Commands::Files(args) => args.json,
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let console = if cli.verbose {
        ConsoleLevel::Verbose
    } else if cli.command.wants_json() {
        ConsoleLevel::Quiet
    } else {
        ConsoleLevel::Normal
    };
    if let Err(err) = init_logging(LogConfig {
        app_name: "device-reporter",
        console,
        log_dir: None,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{:#}", err), "Command failed");
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = cli::load_config(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Run(args) => cli::run::run(config, args).await,
        Commands::Devices(args) => {
            let db = cli::open_existing_db(&config).await?;
            cli::devices::run(&db, args).await
        }
        Commands::Files(args) => {
            let db = cli::open_existing_db(&config).await?;
            cli::files::run(&db, args).await
        }
        Commands::Reset(args) => {
            let db = cli::open_existing_db(&config).await?;
            cli::reset::run(&db, args).await
        }
    }
}
