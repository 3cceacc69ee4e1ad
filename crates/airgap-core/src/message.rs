//! Message envelope — an ordered batch of typed operations.
//!
//! Envelope bytes (before encryption and chunking):
//!   [version (1)] [instance_id (33)] [record]...
//!   record = [op_code (2, BE)] [size (4, BE)] [data (size)]
//!
//! Records are concatenated without delimiters and decode in the order they
//! were added.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use zerocopy::byteorder::{U16, U32};
use zerocopy::{AsBytes, FromBytes};

use crate::chunks::{ChunkError, Chunks};
use crate::crypto::{Cipher, CryptoError};
use crate::wire::{
    EnvelopeHeader, InstanceId, OpRecordHeader, ENVELOPE_HEADER_SIZE, OP_RECORD_HEADER_SIZE,
};

// ── Operation ─────────────────────────────────────────────────────────────────

/// One typed unit of application data. The size on the wire is always the
/// length of `data`; callers never supply it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpPayload {
    op_code: u16,
    data: Bytes,
}

impl OpPayload {
    pub fn new(op_code: u16, data: impl Into<Bytes>) -> Self {
        Self {
            op_code,
            data: data.into(),
        }
    }

    pub fn op_code(&self) -> u16 {
        self.op_code
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// An envelope under construction or freshly decoded.
///
/// Created by `AirGap::create_message`, which binds the protocol version,
/// instance id, chunk size and cipher. `add_operation` takes the message by
/// value, so a chain of calls always owns exactly one envelope.
///
/// # Example
/// ```
/// use airgap_core::AirGap;
///
/// let airgap = AirGap::new(1, &[0x02; 33]).unwrap();
/// let frames = airgap
///     .create_message()
///     .add_operation(1, &b"sign this"[..])
///     .add_operation(2, &b"and this"[..])
///     .marshal_chunks()
///     .unwrap();
/// assert!(!frames.is_empty());
/// ```
#[derive(Clone)]
pub struct Message {
    version: u8,
    instance_id: InstanceId,
    operations: Vec<OpPayload>,
    chunk_size: usize,
    cipher: Option<Arc<dyn Cipher>>,
}

impl Message {
    pub(crate) fn new(
        version: u8,
        instance_id: InstanceId,
        chunk_size: usize,
        cipher: Option<Arc<dyn Cipher>>,
    ) -> Self {
        Self {
            version,
            instance_id,
            operations: Vec::new(),
            chunk_size,
            cipher,
        }
    }

    /// Append one operation. Operations keep their call order on the wire.
    pub fn add_operation(mut self, op_code: u16, data: impl Into<Bytes>) -> Self {
        self.operations.push(OpPayload::new(op_code, data));
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn operations(&self) -> &[OpPayload] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<OpPayload> {
        self.operations
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Plaintext envelope bytes: header followed by every record.
    pub fn encode_envelope(&self) -> Result<Vec<u8>, MessageError> {
        let body: usize = self
            .operations
            .iter()
            .map(|op| OP_RECORD_HEADER_SIZE + op.size())
            .sum();
        let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE + body);

        let header = EnvelopeHeader {
            version: self.version,
            instance_id: *self.instance_id.as_bytes(),
        };
        out.extend_from_slice(header.as_bytes());

        for op in &self.operations {
            let size = u32::try_from(op.size()).map_err(|_| MessageError::OperationTooLarge {
                op_code: op.op_code,
                size: op.size(),
            })?;
            let record = OpRecordHeader {
                op_code: U16::new(op.op_code),
                size: U32::new(size),
            };
            out.extend_from_slice(record.as_bytes());
            out.extend_from_slice(&op.data);
        }

        Ok(out)
    }

    /// Envelope bytes, encrypted when a cipher is bound.
    pub fn marshal(&self) -> Result<Vec<u8>, MessageError> {
        let envelope = self.encode_envelope()?;
        match &self.cipher {
            Some(cipher) => cipher.encrypt(&envelope).map_err(MessageError::Encryption),
            None => Ok(envelope),
        }
    }

    /// Marshal, compress and split into a filled chunk buffer.
    pub fn to_chunks(&self) -> Result<Chunks, MessageError> {
        let marshaled = self.marshal()?;
        let chunks = Chunks::from_data(&marshaled, self.chunk_size)?;

        tracing::debug!(
            instance = %self.instance_id.short_hex(),
            operations = self.operations.len(),
            encrypted = self.is_encrypted(),
            chunks = chunks.count(),
            "message marshaled"
        );
        Ok(chunks)
    }

    /// Base64 frames ready for display, one per chunk in index order.
    pub fn marshal_chunks(&self) -> Result<Vec<String>, MessageError> {
        Ok(self.to_chunks()?.serialize())
    }

    /// Fill this (empty) message with the records that follow the envelope
    /// header in `envelope`.
    pub(crate) fn decode_operations(mut self, envelope: Bytes) -> Result<Self, MessageError> {
        let mut offset = ENVELOPE_HEADER_SIZE;

        while offset < envelope.len() {
            let rest = &envelope[offset..];
            let header = OpRecordHeader::read_from_prefix(rest).ok_or(
                MessageError::TruncatedOperation {
                    offset,
                    needed: OP_RECORD_HEADER_SIZE,
                    available: rest.len(),
                },
            )?;

            let size = header.size.get() as usize;
            let start = offset + OP_RECORD_HEADER_SIZE;
            let available = envelope.len() - start;
            if size > available {
                return Err(MessageError::TruncatedOperation {
                    offset,
                    needed: OP_RECORD_HEADER_SIZE.saturating_add(size),
                    available: rest.len(),
                });
            }

            self.operations.push(OpPayload {
                op_code: header.op_code.get(),
                data: envelope.slice(start..start + size),
            });
            offset = start + size;
        }

        Ok(self)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("version", &self.version)
            .field("instance_id", &self.instance_id)
            .field("operations", &self.operations)
            .field("chunk_size", &self.chunk_size)
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("cannot encrypt message: {0}")]
    Encryption(#[source] CryptoError),

    #[error("cannot decrypt message: {0}")]
    Decryption(#[source] CryptoError),

    #[error("message version {got} is older than supported version {supported}")]
    VersionTooOld { got: u8, supported: u8 },

    #[error("message version {got} is newer than supported version {supported}")]
    VersionTooNew { got: u8, supported: u8 },

    #[error("message is addressed to instance {got}, expected {expected}")]
    InstanceMismatch { expected: InstanceId, got: InstanceId },

    #[error("envelope too short: {0} bytes, the header alone is {}", ENVELOPE_HEADER_SIZE)]
    TruncatedEnvelope(usize),

    #[error("operation record at offset {offset} needs {needed} bytes, only {available} remain")]
    TruncatedOperation {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("operation 0x{op_code:04x} carries {size} bytes, more than a record can describe")]
    OperationTooLarge { op_code: u16, size: usize },

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
