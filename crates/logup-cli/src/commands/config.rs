//! `logup config` command implementation
//!
//! Prints the effective configuration after every layer is applied.

use crate::config::{
    UploadConfig, CONFIG_FILE_NAME, ENV_BASE_DELAY_SECS, ENV_CHUNK_SIZE, ENV_CONCURRENCY,
    ENV_ENDPOINT, ENV_MAX_ATTEMPTS, ENV_MAX_DELAY_SECS, ENV_TIMEOUT_SECS,
};
use crate::error::Result;
use colored::Colorize;
use std::path::Path;

/// Show the effective configuration as TOML
pub async fn show(config_path: Option<&Path>) -> Result<()> {
    let config = effective(config_path)?;
    print!("{}", config.to_toml()?);

    if let Err(e) = config.validate() {
        eprintln!();
        eprintln!("{} {}", "⚠".yellow(), e);
    }

    eprintln!();
    eprintln!("{}", "Sources (lowest precedence first):".cyan());
    eprintln!("  defaults");
    eprintln!("  {} or --config FILE", CONFIG_FILE_NAME);
    for name in [
        ENV_ENDPOINT,
        ENV_CHUNK_SIZE,
        ENV_MAX_ATTEMPTS,
        ENV_BASE_DELAY_SECS,
        ENV_MAX_DELAY_SECS,
        ENV_CONCURRENCY,
        ENV_TIMEOUT_SECS,
    ] {
        eprintln!("  {name}");
    }
    eprintln!("  command-line flags");

    Ok(())
}

/// Defaults, file and environment merged; flags are not part of this view
pub fn effective(config_path: Option<&Path>) -> Result<UploadConfig> {
    let mut config = UploadConfig::load(config_path)?;
    config.apply_env()?;
    Ok(config)
}
