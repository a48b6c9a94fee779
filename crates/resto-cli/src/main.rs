//! Resto CLI - browse restaurants and write reviews from the terminal
//!
//! Reads come from the local mirror; edits are queued and pushed by `resto sync`.

mod cli;
mod commands;
mod error;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ReviewCommands, SyncCommands};
use crate::commands::common::{load_config, open_context};
use crate::commands::completions::run_completions;
use crate::commands::favorite::run_favorite;
use crate::commands::restaurants::{run_cuisines, run_neighborhoods, run_restaurants};
use crate::commands::review::{run_review_add, run_review_delete, run_review_edit};
use crate::commands::show::run_show;
use crate::commands::sync::{run_sync, run_sync_conflicts, run_sync_watch};
use crate::error::CliError;

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
    if let Ok(directive) = "resto=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = load_config(cli.config.as_deref(), cli.db_path)?;
    let context = open_context(&config)?;

    match cli.command {
        Commands::Restaurants {
            cuisine,
            neighborhood,
            refresh,
            json,
        } => run_restaurants(&context, &cuisine, &neighborhood, refresh, json).await,
        Commands::Show { id, json } => run_show(&context, id, json).await,
        Commands::Cuisines => run_cuisines(&context).await,
        Commands::Neighborhoods => run_neighborhoods(&context).await,
        Commands::Favorite { id } => run_favorite(&context, id).await,
        Commands::Review { command } => match command {
            ReviewCommands::Add {
                restaurant_id,
                name,
                rating,
                comments,
            } => run_review_add(&context, restaurant_id, &name, rating, &comments).await,
            ReviewCommands::Edit {
                id,
                name,
                rating,
                comments,
            } => run_review_edit(&context, id, name, rating, &comments).await,
            ReviewCommands::Delete { id } => run_review_delete(&context, id).await,
        },
        Commands::Sync { command } => match command {
            None => run_sync(&context).await,
            Some(SyncCommands::Conflicts { limit, json }) => {
                run_sync_conflicts(&context, limit, json).await
            }
            Some(SyncCommands::Watch { interval }) => {
                let interval = interval.map_or_else(
                    || config.sync_interval(),
                    |secs| Duration::from_secs(secs.max(1)),
                );
                run_sync_watch(&context, interval).await
            }
        },
        Commands::Completions { .. } => Ok(()),
    }
}
