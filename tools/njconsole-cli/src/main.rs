//! NjConsole CLI - Harness for the NjConsole logging core
//!
//! # Commands
//!
//! - `njconsole demo` - Hammer a log history from several threads and print the result
//! - `njconsole config` - Show or write the logging configuration
//!
//! # Usage
//!
//! ```bash
//! # Four writers, history pinned so nothing is evicted
//! njconsole demo --threads 4 --pin
//!
//! # Print the effective config, then write defaults somewhere else
//! njconsole config
//! njconsole config --write ./log.toml
//! ```

mod config;
mod demo;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// NjConsole CLI - Harness for the NjConsole logging core
#[derive(Parser)]
#[command(name = "njconsole")]
#[command(about = "Harness for the NjConsole logging core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log from several threads into one history and print stats plus the tail
    Demo(demo::DemoArgs),

    /// Show the effective logging configuration or write defaults
    Config(config::ConfigArgs),
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo(args) => demo::execute(args),
        Commands::Config(args) => config::execute(args),
    }
}
