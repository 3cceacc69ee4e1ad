//! CLI command modules.

pub mod config;
pub mod decode;
pub mod encode;
pub mod inspect;

use std::io::Read;

use airgap_core::AirGap;
use anyhow::{bail, Context, Result};

use crate::config::AirGapConfig;

/// Protocol context built from the resolved config.
pub fn airgap(config: &AirGapConfig) -> Result<AirGap> {
    let settings = config
        .protocol_settings()
        .context("invalid [protocol] settings")?;
    let airgap = AirGap::from_settings(settings).context("invalid [protocol] settings")?;

    match config.cipher() {
        Some(_) if config.crypto.passphrase.is_empty() => {
            bail!("[crypto] enabled = true requires a passphrase")
        }
        Some(cipher) => Ok(airgap.with_cipher(cipher)),
        None => Ok(airgap),
    }
}

/// Contents of `path`, or stdin for `-`.
pub fn read_input(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("failed to read {}", path))
    }
}
