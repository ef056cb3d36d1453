//! bundlefetch CLI - resolve, preload, and fetch CDN resource bundles.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bundlefetch",
    about = "Resolve and fetch versioned resource bundles from redundant CDN mirrors",
    version
)]
pub struct Cli {
    /// Path to the bundles configuration file (JSON).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve every configured bundle concurrently.
    Preload,

    /// Fetch assets from a bundle.
    Fetch {
        /// Bundle to fetch from; defaults to the first configured bundle.
        #[arg(long)]
        bundle: Option<String>,

        /// Load everything under a directory instead of individual paths.
        #[arg(long, conflicts_with = "paths")]
        dir: Option<String>,

        /// Asset paths to fetch.
        paths: Vec<String>,
    },

    /// Show configured bundles, their CDN pools, and persisted affinity.
    Status,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = commands::run(cli).await {
        eprintln!("{} {}", console::style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
