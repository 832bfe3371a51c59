//! Threadline CLI - sign in and browse Threadline from the terminal.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use client_config::{Config, Paths};
use commands::AppContext;
use tracing::debug;

/// Threadline CLI - Sign in and browse communities from the terminal.
#[derive(Parser)]
#[command(name = "threadline")]
#[command(about = "Threadline CLI for authentication and browsing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login,

    /// Create an account and sign in
    Register,

    /// Sign out and clear the stored session
    Logout,

    /// Show authentication status
    Status,

    /// Show your profile
    Profile,

    /// List posts from the feed
    Feed {
        /// Number of posts to fetch
        #[arg(short, long, default_value_t = social_api::DEFAULT_PAGE_SIZE)]
        limit: u32,
        /// Number of posts to skip
        #[arg(short, long, default_value_t = 0)]
        offset: u32,
    },

    /// List notifications
    Notifications {
        /// Mark every notification as read after listing
        #[arg(long)]
        mark_all_read: bool,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    client_config::init_logging(&level, &paths);
    debug!(api_base_url = %config.api_base_url, "Configuration loaded");

    let app = AppContext::connect(config, &paths).await?;
    let format = &cli.format;

    match cli.command {
        Commands::Login => commands::login(&app, format).await,
        Commands::Register => commands::register(&app, format).await,
        Commands::Logout => commands::logout(&app, format).await,
        Commands::Status => commands::status(&app, format).await,
        Commands::Profile => commands::profile(&app, format).await,
        Commands::Feed { limit, offset } => commands::feed(&app, limit, offset, format).await,
        Commands::Notifications { mark_all_read } => {
            commands::notifications(&app, mark_all_read, format).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
