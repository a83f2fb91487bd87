//! Configuration inspection command.

use std::path::Path;

use crate::config::{self, Config};

/// Print the effective configuration, optionally saving it.
///
/// Saves to `explicit` when a config file was given on the command line,
/// otherwise to the per-user config file.
pub fn cmd_config(config: &Config, write: bool, explicit: Option<&Path>) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);

    if write {
        let path = match explicit {
            Some(path) => {
                config::save_to(config, path)?;
                path.to_path_buf()
            }
            None => config::save(config)?,
        };
        eprintln!("Saved config to {}", path.display());
    }
    Ok(())
}
