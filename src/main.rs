//! Saboriman - keeps a music catalog in sync with the music folder.
//!
//! Run `saboriman scan` to reconcile the configured folder with the catalog,
//! or `saboriman --help` for the other commands.

use clap::Parser;
use saboriman::cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let config = args.load_config();

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("saboriman={}", config.log_level)))
        .unwrap_or_else(|_| EnvFilter::new("saboriman=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    tracing::debug!(?config, "Effective configuration");
    cli::run_command(&args, &config)
}
