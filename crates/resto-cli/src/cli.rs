use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use resto_core::api::ALL_FILTER;

#[derive(Parser)]
#[command(name = "resto")]
#[command(about = "Browse restaurants and reviews offline, sync when connected")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local mirror database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List restaurants from the local mirror
    #[command(alias = "ls")]
    Restaurants {
        /// Only this cuisine (exact match, `all` for any)
        #[arg(long, default_value = ALL_FILTER)]
        cuisine: String,
        /// Only this neighborhood (exact match, `all` for any)
        #[arg(long, default_value = ALL_FILTER)]
        neighborhood: String,
        /// Refresh restaurants and reviews from the data service first
        #[arg(long)]
        refresh: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a restaurant and its reviews
    Show {
        /// Restaurant ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List known cuisines
    Cuisines,
    /// List known neighborhoods
    Neighborhoods,
    /// Toggle a restaurant's favorite flag
    Favorite {
        /// Restaurant ID
        id: i64,
    },
    /// Write, edit or delete reviews
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Reconcile the local mirror with the data service
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Write a new review (synced on the next pass)
    #[command(alias = "new")]
    Add {
        /// Restaurant ID
        restaurant_id: i64,
        /// Author name
        #[arg(long)]
        name: String,
        /// Rating from 0 to 5
        #[arg(short, long)]
        rating: i32,
        /// Review text (stdin or $EDITOR when omitted)
        comments: Vec<String>,
    },
    /// Edit an existing review
    Edit {
        /// Review ID (negative for reviews not yet synced)
        #[arg(allow_negative_numbers = true)]
        id: i64,
        /// New author name
        #[arg(long)]
        name: Option<String>,
        /// New rating from 0 to 5
        #[arg(short, long)]
        rating: Option<i32>,
        /// New review text ($EDITOR when nothing else is given)
        comments: Vec<String>,
    },
    /// Delete a review
    Delete {
        /// Review ID (negative for reviews not yet synced)
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the foreground until interrupted
    Watch {
        /// Seconds between background wake-ups (config value when omitted)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}
