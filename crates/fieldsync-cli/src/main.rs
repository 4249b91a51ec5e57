//! Fieldsync CLI - notifications and calendar that keep working offline
//!
//! Reads come from the local cache when the remote cannot be reached, and
//! writes are queued until `fieldsync sync` replays them.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::CommandContext;
use crate::error::CliError;

const LOG_DIRECTIVES: [&str; 2] = ["fieldsync=info", "fieldsync_core=info"];

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    for directive in LOG_DIRECTIVES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = CommandContext::from_cli(&cli)?;

    match cli.command {
        Commands::Notifications { command } => {
            commands::notifications::run_notifications(command, &context).await?;
        }
        Commands::Events { command } => {
            commands::events::run_events(command, &context).await?;
        }
        Commands::Queue { command } => commands::queue::run_queue(command, &context).await?,
        Commands::Sync {
            family,
            operations,
            priorities,
            prioritized,
            json,
        } => {
            let filter = commands::sync::build_filter(operations, priorities, prioritized);
            commands::sync::run_sync(family, &filter, json, &context).await?;
        }
        Commands::Config { command } => commands::config::run_config(command, &context)?,
    }

    Ok(())
}
