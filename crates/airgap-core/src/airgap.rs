//! Protocol context — the settings one device uses to talk to its pair.
//!
//! An [`AirGap`] holds the protocol version, the counterpart's instance id,
//! the chunk size and an optional cipher. Every message is created from it
//! and every received blob is unmarshaled through it. Settings are checked
//! when the context is built, never later.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use zerocopy::FromBytes;

use crate::chunks::{payload_capacity, Chunks};
use crate::crypto::Cipher;
use crate::message::{Message, MessageError};
use crate::wire::{
    EnvelopeHeader, InstanceId, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};

/// Validated settings for building an [`AirGap`] from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolSettings {
    pub version: u8,
    pub instance_id: InstanceId,
    pub chunk_size: usize,
}

/// Shared protocol context for one paired counterpart.
#[derive(Clone)]
pub struct AirGap {
    version: u8,
    instance_id: InstanceId,
    chunk_size: usize,
    cipher: Option<Arc<dyn Cipher>>,
}

impl AirGap {
    /// Context for `version` bound to the counterpart's 33-byte instance id.
    /// Messages are unencrypted and use the default chunk size until
    /// configured otherwise.
    pub fn new(version: u8, instance_id: &[u8]) -> Result<Self, ConfigError> {
        let instance_id = InstanceId::try_from(instance_id)?;
        Ok(Self {
            version,
            instance_id,
            chunk_size: DEFAULT_CHUNK_SIZE,
            cipher: None,
        })
    }

    pub fn from_settings(settings: ProtocolSettings) -> Result<Self, ConfigError> {
        payload_capacity(settings.chunk_size)?;
        Ok(Self {
            version: settings.version,
            instance_id: settings.instance_id,
            chunk_size: settings.chunk_size,
            cipher: None,
        })
    }

    /// Encrypt outgoing and decrypt incoming messages with `cipher`.
    pub fn with_cipher(self, cipher: impl Cipher + 'static) -> Self {
        self.with_shared_cipher(Arc::new(cipher))
    }

    /// Like [`with_cipher`](Self::with_cipher) for a cipher shared with
    /// other contexts.
    pub fn with_shared_cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Frame size on the wire, header included: 6..=65535 bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self, ConfigError> {
        self.set_chunk_size(chunk_size)?;
        Ok(self)
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) -> Result<(), ConfigError> {
        payload_capacity(chunk_size)?;
        self.chunk_size = chunk_size;
        Ok(())
    }

    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// A fresh, empty message bound to this context's settings.
    pub fn create_message(&self) -> Message {
        Message::new(
            self.version,
            self.instance_id,
            self.chunk_size,
            self.cipher.clone(),
        )
    }

    /// Decrypt (when a cipher is bound), check version and instance id, and
    /// decode every operation record.
    pub fn unmarshal(&self, data: &[u8]) -> Result<Message, MessageError> {
        let envelope = match &self.cipher {
            Some(cipher) => Bytes::from(cipher.decrypt(data).map_err(MessageError::Decryption)?),
            None => Bytes::copy_from_slice(data),
        };

        let header = EnvelopeHeader::read_from_prefix(&envelope)
            .ok_or(MessageError::TruncatedEnvelope(envelope.len()))?;

        if header.version < self.version {
            return Err(MessageError::VersionTooOld {
                got: header.version,
                supported: self.version,
            });
        }
        if header.version > self.version {
            return Err(MessageError::VersionTooNew {
                got: header.version,
                supported: self.version,
            });
        }

        let got = InstanceId::new(header.instance_id);
        if got != self.instance_id {
            tracing::warn!(
                expected = %self.instance_id.short_hex(),
                got = %got.short_hex(),
                "message addressed to another instance"
            );
            return Err(MessageError::InstanceMismatch {
                expected: self.instance_id,
                got,
            });
        }

        let message = self.create_message().decode_operations(envelope)?;
        tracing::debug!(
            instance = %self.instance_id.short_hex(),
            operations = message.operations().len(),
            "message unmarshaled"
        );
        Ok(message)
    }

    /// Unmarshal the payload of a completely received chunk buffer.
    pub fn unmarshal_chunks(&self, chunks: &Chunks) -> Result<Message, MessageError> {
        let data = chunks.data()?;
        self.unmarshal(&data)
    }
}

impl fmt::Debug for AirGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirGap")
            .field("version", &self.version)
            .field("instance_id", &self.instance_id)
            .field("chunk_size", &self.chunk_size)
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Invalid protocol settings, reported when a context is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("chunk size {0} is below the minimum of {}", MIN_CHUNK_SIZE)]
    ChunkSizeTooSmall(usize),

    #[error("chunk size {0} exceeds the maximum of {}", MAX_CHUNK_SIZE)]
    ChunkSizeTooLarge(usize),

    #[error("instance id must be exactly 33 bytes, got {0}")]
    InstanceIdSize(usize),

    #[error("instance id is not valid hex: {0}")]
    InvalidInstanceIdHex(#[source] hex::FromHexError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
