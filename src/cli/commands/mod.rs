//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `scan`: library scanning and catalog listing
//! - `config`: printing and saving the effective configuration

mod config;
mod scan;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::Config;

pub use config::cmd_config;
pub use scan::{cmd_albums, cmd_list, cmd_scan};

/// Saboriman library synchronization CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of searching the default locations
    #[arg(long, global = true, env = "SABORIMAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Library root to scan
    #[arg(long, global = true, env = "SABORIMAN_MUSIC_FOLDER")]
    pub music_folder: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, env = "SABORIMAN_DB")]
    pub db: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "SABORIMAN_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// ffprobe binary used to probe audio streams
    #[arg(long, global = true, env = "SABORIMAN_FFPROBE")]
    pub ffprobe: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the music folder with the catalog
    Scan {
        /// Print the scan result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all cataloged tracks
    List,
    /// List all albums with their track counts
    Albums,
    /// Print the effective configuration
    Config {
        /// Save the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

impl Cli {
    /// Load the config file and apply command-line overrides.
    pub fn load_config(&self) -> Config {
        let config = match &self.config {
            Some(path) => crate::config::load_from(path),
            None => crate::config::load(),
        };
        self.apply_overrides(config)
    }

    fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(folder) = &self.music_folder {
            config.music_folder = Some(folder.clone());
        }
        if let Some(db) = &self.db {
            config.database.path = db.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(ffprobe) = &self.ffprobe {
            config.scan.ffprobe_path = ffprobe.clone();
        }
        config
    }
}

/// Run the specified CLI command against the effective configuration.
pub fn run_command(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Scan { json } => cmd_scan(&rt, config, *json),
        Commands::List => cmd_list(&rt, config),
        Commands::Albums => cmd_albums(&rt, config),
        Commands::Config { write } => cmd_config(config, *write, cli.config.as_deref()),
    }
}
