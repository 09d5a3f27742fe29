mod archive;
mod cleanup;
mod cli;
mod commands;
mod config;
mod error;
mod locator;
mod logging;
mod storage;
mod types;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, CliDisplay};
use commands::backup::{RunContext, RunOptions};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => {}
        Err(err) => {
            let message = format!("{:#}", err);
            tracing::error!(error = %message, "Backup run failed");
            eprintln!("{}", utils::format_error(&err));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let context = setup(&cli)?;

    tracing::info!(
        bucket = %context.store.bucket(),
        machine = %context.config.machine.name,
        "Starting backup run"
    );

    let report = commands::backup::execute(&context, &cleanup::SystemTrash).await?;
    CliDisplay::print_report(&report);

    Ok(())
}

/// Resolve config, credentials and the bucket client into one immutable context
fn setup(cli: &Cli) -> Result<RunContext> {
    let config = config::Config::load(&cli.config)?;
    let credentials = config::Credentials::load(&cli.credentials)?;
    let store = storage::ArchiveStore::connect(&config.wasabi, &credentials)?;

    let scratch_dir = match cli.scratch_dir.clone().or_else(|| config.machine.scratch_dir.clone()) {
        Some(dir) => dir,
        None => utils::build_local_path(cleanup::SCRATCH_DIR_NAME)
            .context("Could not place the scratch directory")?,
    };

    Ok(RunContext {
        config,
        store,
        scratch_dir,
        options: RunOptions {
            trash_backup_folder: cli.trash_backup_folder,
            verify_digest: cli.verify,
        },
    })
}
