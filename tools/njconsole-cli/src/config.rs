//! Config command - show or write the logging configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use njconsole_core::LogConfig;
use njconsole_core::config;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Read this file instead of the platform config file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Write the default configuration to this path
    #[arg(short, long, conflicts_with = "file")]
    pub write: Option<PathBuf>,

    /// Only print where the platform config file lives
    #[arg(long, conflicts_with_all = ["file", "write"])]
    pub path: bool,
}

/// Execute the config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    if args.path {
        match config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("(no config directory on this platform)"),
        }
        return Ok(());
    }

    if let Some(path) = args.write {
        config::save_to(&LogConfig::default(), &path)
            .with_context(|| format!("Failed to write defaults to {}", path.display()))?;
        println!("Wrote default log config to {}", path.display());
        return Ok(());
    }

    let effective = match &args.file {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    let text = toml::to_string_pretty(&effective).context("Failed to serialize config")?;
    print!("{text}");
    Ok(())
}
