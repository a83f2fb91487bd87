//! Command-line interface for saboriman.
//!
//! This module provides CLI commands for scanning the music folder into the
//! catalog and inspecting the result.

mod commands;

pub use commands::{Cli, Commands, run_command};
