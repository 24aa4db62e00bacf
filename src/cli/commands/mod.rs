//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod config_cmd;
mod scrape;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use embedsniff::Config;

#[derive(Parser)]
#[command(name = "embedsniff")]
#[command(about = "Extract dynamically loaded video embed links from web pages")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP extraction service
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: from config, 0.0.0.0:3001)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Extract embeds from one page and print the result as JSON
    Scrape {
        /// Page URL to render
        url: String,
        /// CSS selector to wait for after navigation
        #[arg(short, long)]
        wait_for: Option<String>,
        /// Navigation timeout in milliseconds
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Show whether URLs look like provider/embed links
    Check {
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with(cli.config.as_deref())
        .await
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(config, bind.as_deref()).await,
        Commands::Scrape {
            url,
            wait_for,
            timeout,
            pretty,
        } => scrape::cmd_scrape(config, &url, wait_for, timeout, pretty).await,
        Commands::Check { urls } => check::cmd_check(&config, &urls),
        Commands::Config => config_cmd::cmd_config_show(&config),
    }
}
