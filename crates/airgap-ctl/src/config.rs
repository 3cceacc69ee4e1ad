//! Configuration for airgap-ctl.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. --config <path> on the command line
//!   2. $AIRGAP_CONFIG (explicit override)
//!   3. $XDG_CONFIG_HOME/airgap/config.toml
//!   4. ~/.config/airgap/config.toml

use std::path::{Path, PathBuf};

use airgap_core::wire::{DEFAULT_CHUNK_SIZE, DEFAULT_VERSION, INSTANCE_ID_SIZE};
use airgap_core::{ChaChaCipher, ConfigError, InstanceId, ProtocolSettings};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirGapConfig {
    pub protocol: ProtocolConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Protocol version. Both devices must agree exactly.
    pub version: u8,
    /// Counterpart instance id, 33 bytes as hex.
    pub instance_id: String,
    /// Frame size in bytes, 6-byte header included. 6..=65535.
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Encrypt envelopes with ChaCha20-Poly1305.
    pub enabled: bool,
    /// Shared secret the key is derived from. Required when enabled.
    pub passphrase: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            instance_id: "00".repeat(INSTANCE_ID_SIZE),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("airgap")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl AirGapConfig {
    /// Config file path when none is given on the command line.
    pub fn file_path() -> PathBuf {
        std::env::var("AIRGAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Load config from `path`: env vars → file → defaults. A missing file
    /// is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigFileError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigFileError::ParseFailed(path.to_path_buf(), e))
    }

    /// Write the default config to `path` unless a file is already there.
    /// Returns whether a file was written.
    pub fn write_default_if_missing(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigFileError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&AirGapConfig::default())
            .map_err(ConfigFileError::SerializeFailed)?;
        std::fs::write(path, text)
            .map_err(|e| ConfigFileError::WriteFailed(path.to_path_buf(), e))?;
        Ok(true)
    }

    /// Apply AIRGAP_* overrides looked up through `var`. Values that do not
    /// parse are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("AIRGAP_PROTOCOL__VERSION") {
            if let Ok(n) = v.parse() {
                self.protocol.version = n;
            }
        }
        if let Some(v) = var("AIRGAP_PROTOCOL__INSTANCE_ID") {
            self.protocol.instance_id = v;
        }
        if let Some(v) = var("AIRGAP_PROTOCOL__CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.protocol.chunk_size = n;
            }
        }
        if let Some(v) = var("AIRGAP_CRYPTO__ENABLED") {
            self.crypto.enabled = v == "true" || v == "1";
        }
        if let Some(v) = var("AIRGAP_CRYPTO__PASSPHRASE") {
            self.crypto.passphrase = v;
        }
    }

    /// Protocol settings for the core. Chunk size bounds are checked when
    /// the context is built from them.
    pub fn protocol_settings(&self) -> Result<ProtocolSettings, ConfigError> {
        Ok(ProtocolSettings {
            version: self.protocol.version,
            instance_id: self.protocol.instance_id.parse::<InstanceId>()?,
            chunk_size: self.protocol.chunk_size,
        })
    }

    /// Cipher derived from the passphrase, if encryption is enabled.
    pub fn cipher(&self) -> Option<ChaChaCipher> {
        self.crypto
            .enabled
            .then(|| ChaChaCipher::from_passphrase(&self.crypto.passphrase))
    }
}
