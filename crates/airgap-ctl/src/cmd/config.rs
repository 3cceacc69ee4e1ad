//! Show or initialize the configuration file.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AirGapConfig;

pub fn cmd_config(config: &AirGapConfig, path: &Path) -> Result<()> {
    let mut shown = config.clone();
    if !shown.crypto.passphrase.is_empty() {
        shown.crypto.passphrase = "********".into();
    }
    let text = toml::to_string_pretty(&shown).context("failed to serialize config")?;

    println!("# {}{}", path.display(), if path.exists() { "" } else { " (not found, defaults)" });
    println!("# environment overrides applied");
    print!("{}", text);
    Ok(())
}

pub fn cmd_config_init(path: &Path) -> Result<()> {
    if AirGapConfig::write_default_if_missing(path)? {
        println!("Wrote default config to {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}
