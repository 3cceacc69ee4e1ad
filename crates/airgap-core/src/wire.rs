//! Airgap wire format — byte layouts shared by both devices.
//!
//! These types ARE the protocol. Every field, every size, every byte order
//! is part of the wire format. A counterpart device built against an older
//! release must still read what this module writes.
//!
//! Chunk headers are little-endian, envelope records are big-endian. Both
//! orders are spelled out in the field types (zerocopy byteorder wrappers),
//! so the structs are alignment-free and serialize without any unsafe code.

use std::fmt;
use std::str::FromStr;

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::airgap::ConfigError;

// ── Chunk Header ─────────────────────────────────────────────────────────────

/// Prefix of every chunk frame.
///
/// Wire layout: `[indexLo, indexHi, countLo, countHi, sizeLo, sizeHi]`.
/// The frame is followed by `size` payload bytes and, on frames produced by
/// this crate, zero padding up to the configured chunk size.
///
/// Wire size: 6 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct ChunkHeader {
    /// Zero-based position of this chunk within the message.
    pub index: U16<LittleEndian>,

    /// Total number of chunks in the message. Identical in every chunk.
    pub count: U16<LittleEndian>,

    /// Number of payload bytes carried after the header.
    pub size: U16<LittleEndian>,
}

assert_eq_size!(ChunkHeader, [u8; CHUNK_HEADER_SIZE]);

impl ChunkHeader {
    pub fn new(index: u16, count: u16, size: u16) -> Self {
        Self {
            index: U16::new(index),
            count: U16::new(count),
            size: U16::new(size),
        }
    }
}

// ── Envelope ─────────────────────────────────────────────────────────────────

/// Fixed prefix of a marshaled message: `version || instance_id`.
///
/// Wire size: 34 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct EnvelopeHeader {
    /// Protocol version. Receivers accept only their own version.
    pub version: u8,

    /// Compressed public key of the paired counterpart.
    pub instance_id: [u8; INSTANCE_ID_SIZE],
}

assert_eq_size!(EnvelopeHeader, [u8; ENVELOPE_HEADER_SIZE]);

/// Prefix of one operation record: `op_code || size`, big-endian.
/// Followed by exactly `size` data bytes. Records carry no delimiter.
///
/// Wire size: 6 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct OpRecordHeader {
    /// Application-defined operation code.
    pub op_code: U16<BigEndian>,

    /// Length of the record's data in bytes.
    pub size: U32<BigEndian>,
}

assert_eq_size!(OpRecordHeader, [u8; OP_RECORD_HEADER_SIZE]);

// ── Instance Id ──────────────────────────────────────────────────────────────

/// 33-byte identifier of the paired device (a compressed public key in
/// practice). The length is checked once, here, and nowhere else.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId([u8; INSTANCE_ID_SIZE]);

impl InstanceId {
    pub fn new(bytes: [u8; INSTANCE_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; INSTANCE_ID_SIZE] {
        &self.0
    }

    /// First eight bytes as hex, for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl TryFrom<&[u8]> for InstanceId {
    type Error = ConfigError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; INSTANCE_ID_SIZE] = value
            .try_into()
            .map_err(|_| ConfigError::InstanceIdSize(value.len()))?;
        Ok(Self(bytes))
    }
}

impl FromStr for InstanceId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s.trim()).map_err(ConfigError::InvalidInstanceIdHex)?;
        Self::try_from(raw.as_slice())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.short_hex())
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// chunk_index(2) + chunk_count(2) + chunk_size(2)
pub const CHUNK_HEADER_SIZE: usize = 6;

/// Smallest accepted chunk size: a bare header.
pub const MIN_CHUNK_SIZE: usize = CHUNK_HEADER_SIZE;

/// Largest accepted chunk size. The payload size field is 16 bits wide.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// Default chunk size. Small enough to scan reliably off a phone screen.
pub const DEFAULT_CHUNK_SIZE: usize = 192;

/// Maximum number of chunks in one message.
pub const MAX_CHUNK_COUNT: usize = u16::MAX as usize;

/// Size of a compressed secp256k1/P-256 public key.
pub const INSTANCE_ID_SIZE: usize = 33;

/// version(1) + instance_id(33)
pub const ENVELOPE_HEADER_SIZE: usize = 1 + INSTANCE_ID_SIZE;

/// op_code(2) + op_size(4)
pub const OP_RECORD_HEADER_SIZE: usize = 6;

/// Protocol version spoken by default.
pub const DEFAULT_VERSION: u8 = 1;

// ── Tests ─────────────────────────────────────────────────────────────────────
