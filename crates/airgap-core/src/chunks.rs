//! Chunk splitting and reassembly.
//!
//! A marshaled message is compressed, cut into fixed-capacity windows, and
//! each window is framed with a 6-byte [`ChunkHeader`]. Frames are displayed
//! and scanned in any order, possibly more than once. [`Chunks`] collects
//! them by index until every slot is filled.
//!
//! Frame on the wire (before base64):
//!   [header (6 bytes)] [payload (size bytes)] [zero padding to chunk size]
//!
//! The reassembly table sits behind one reader/writer lock, so a scanner
//! thread can feed frames while another polls for completion.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;
use zerocopy::{AsBytes, FromBytes};

use crate::airgap::ConfigError;
use crate::compress::{compress, decompress, CompressionError};
use crate::wire::{ChunkHeader, CHUNK_HEADER_SIZE, MAX_CHUNK_COUNT, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};

// ── Chunk ─────────────────────────────────────────────────────────────────────

/// One addressed window of a compressed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    index: u16,
    count: u16,
    payload: Bytes,
}

impl Chunk {
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn payload_size(&self) -> u16 {
        // Payloads are built from windows of at most MAX_CHUNK_SIZE bytes
        // or parsed from a 16-bit size field.
        self.payload.len() as u16
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn header(&self) -> ChunkHeader {
        ChunkHeader::new(self.index, self.count, self.payload_size())
    }

    /// Header + payload, zero-padded to `payload_capacity` payload bytes.
    pub fn to_frame(&self, payload_capacity: usize) -> Vec<u8> {
        let body = payload_capacity.max(self.payload.len());
        let mut frame = vec![0u8; CHUNK_HEADER_SIZE + body];
        frame[..CHUNK_HEADER_SIZE].copy_from_slice(self.header().as_bytes());
        frame[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + self.payload.len()]
            .copy_from_slice(&self.payload);
        frame
    }

    /// Parse a decoded frame. Trailing padding after the payload is ignored.
    pub fn from_frame(frame: &[u8]) -> Result<Self, ChunkError> {
        let header =
            ChunkHeader::read_from_prefix(frame).ok_or(ChunkError::FrameTooShort(frame.len()))?;

        let size = header.size.get() as usize;
        let available = frame.len() - CHUNK_HEADER_SIZE;
        if size > available {
            return Err(ChunkError::PayloadOverrun {
                declared: size,
                available,
            });
        }

        Ok(Self {
            index: header.index.get(),
            count: header.count.get(),
            payload: Bytes::copy_from_slice(&frame[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + size]),
        })
    }
}

/// Validate a configured chunk size and return the payload bytes each frame
/// can carry after the header.
pub fn payload_capacity(chunk_size: usize) -> Result<usize, ConfigError> {
    if chunk_size < MIN_CHUNK_SIZE {
        return Err(ConfigError::ChunkSizeTooSmall(chunk_size));
    }
    if chunk_size > MAX_CHUNK_SIZE {
        return Err(ConfigError::ChunkSizeTooLarge(chunk_size));
    }
    Ok(chunk_size - CHUNK_HEADER_SIZE)
}

/// Compress `data` and cut it into chunks of at most `chunk_size` bytes on
/// the wire. Chunks come back in ascending index order.
pub fn split(data: &[u8], chunk_size: usize) -> Result<Vec<Chunk>, ChunkError> {
    let capacity = payload_capacity(chunk_size)?;
    let compressed = Bytes::from(compress(data)?);

    if compressed.is_empty() {
        return Ok(vec![Chunk {
            index: 0,
            count: 1,
            payload: Bytes::new(),
        }]);
    }

    let too_many = || ChunkError::TooManyChunks {
        len: compressed.len(),
        capacity,
    };
    if capacity == 0 {
        return Err(too_many());
    }
    let needed = compressed.len().div_ceil(capacity);
    if needed > MAX_CHUNK_COUNT {
        return Err(too_many());
    }

    let count = needed as u16;
    let chunks = (0..count)
        .map(|index| {
            let start = index as usize * capacity;
            let end = (start + capacity).min(compressed.len());
            Chunk {
                index,
                count,
                payload: compressed.slice(start..end),
            }
        })
        .collect();

    Ok(chunks)
}

// ── Reassembly Buffer ─────────────────────────────────────────────────────────

/// Index-addressed accumulator for the chunks of exactly one message.
///
/// Empty until the first frame is accepted; that frame fixes the chunk count
/// for the buffer's lifetime. Complete when every index in `0..count` holds
/// a payload. The first payload stored at an index wins.
#[derive(Debug, Default)]
pub struct Chunks {
    table: RwLock<ChunkTable>,
}

#[derive(Debug, Default)]
struct ChunkTable {
    /// Chunk count. Zero while no frame has been accepted.
    count: u16,
    /// Payload capacity of one frame. Informational on the receive side.
    payload_size: u16,
    slots: Vec<Option<Bytes>>,
    filled: usize,
}

impl ChunkTable {
    fn is_complete(&self) -> bool {
        self.count > 0 && self.filled == self.count as usize
    }

    /// Validate first, then mutate: a rejected chunk leaves the table as it was.
    fn insert(&mut self, chunk: Chunk, frame_capacity: usize) -> Result<bool, ChunkError> {
        let count = if self.count == 0 {
            chunk.count
        } else {
            if chunk.count != self.count {
                return Err(ChunkError::CountMismatch {
                    expected: self.count,
                    got: chunk.count,
                });
            }
            self.count
        };

        if chunk.index >= count {
            return Err(ChunkError::IndexOutOfRange {
                index: chunk.index,
                count,
            });
        }

        if self.count == 0 {
            self.count = count;
            self.payload_size = frame_capacity.min(MAX_CHUNK_SIZE) as u16;
            self.slots = vec![None; count as usize];
        }

        let slot = &mut self.slots[chunk.index as usize];
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(chunk.payload);
        self.filled += 1;
        Ok(true)
    }
}

impl Chunks {
    /// An empty buffer, ready to receive frames.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filled buffer holding `data` split for `chunk_size`-byte frames.
    pub fn from_data(data: &[u8], chunk_size: usize) -> Result<Self, ChunkError> {
        let chunks = split(data, chunk_size)?;
        let count = chunks.len() as u16;
        let filled = chunks.len();

        tracing::info!(
            bytes = data.len(),
            chunks = count,
            chunk_size,
            "message split into chunks"
        );

        Ok(Self {
            table: RwLock::new(ChunkTable {
                count,
                payload_size: (chunk_size - CHUNK_HEADER_SIZE) as u16,
                slots: chunks.into_iter().map(|c| Some(c.payload)).collect(),
                filled,
            }),
        })
    }

    /// Accept one base64 text frame. Returns `true` if the chunk was new,
    /// `false` if its index had already been filled.
    pub fn read_chunk(&self, frame: &str) -> Result<bool, ChunkError> {
        match BASE64.decode(frame.trim()) {
            Ok(raw) => self.read_frame(&raw),
            Err(e) => Err(rejected(e.into())),
        }
    }

    /// Accept one frame that is already decoded to bytes.
    pub fn read_frame(&self, frame: &[u8]) -> Result<bool, ChunkError> {
        self.store_frame(frame).map_err(rejected)
    }

    fn store_frame(&self, frame: &[u8]) -> Result<bool, ChunkError> {
        let chunk = Chunk::from_frame(frame)?;
        let index = chunk.index;

        let mut table = self.table.write();
        let added = table.insert(chunk, frame.len() - CHUNK_HEADER_SIZE)?;

        if added {
            tracing::debug!(index, received = table.filled, count = table.count, "chunk stored");
            if table.is_complete() {
                tracing::info!(chunks = table.count, "all chunks received");
            }
        } else {
            tracing::debug!(index, "duplicate chunk, ignoring");
        }

        Ok(added)
    }

    /// True once every index in `0..count` has been filled.
    pub fn is_complete(&self) -> bool {
        self.table.read().is_complete()
    }

    /// Chunk count fixed by the first accepted frame; zero before that.
    pub fn count(&self) -> u16 {
        self.table.read().count
    }

    /// Number of distinct chunks stored so far.
    pub fn received(&self) -> usize {
        self.table.read().filled
    }

    /// `(received, count)` in one read, for progress displays.
    pub fn progress(&self) -> (usize, u16) {
        let table = self.table.read();
        (table.filled, table.count)
    }

    /// Indices still missing, ascending.
    pub fn missing(&self) -> Vec<u16> {
        let table = self.table.read();
        (0..table.count)
            .filter(|i| table.slots[*i as usize].is_none())
            .collect()
    }

    /// Payload capacity of one frame.
    pub fn chunk_payload_size(&self) -> u16 {
        self.table.read().payload_size
    }

    /// Concatenate all chunks in index order and decompress.
    pub fn data(&self) -> Result<Vec<u8>, ChunkError> {
        let table = self.table.read();
        if !table.is_complete() {
            return Err(ChunkError::IncompleteMessage {
                received: table.filled,
                expected: table.count as usize,
            });
        }

        let total = table.slots.iter().flatten().map(Bytes::len).sum();
        let mut compressed = Vec::with_capacity(total);
        for payload in table.slots.iter().flatten() {
            compressed.extend_from_slice(payload);
        }

        Ok(decompress(&compressed)?)
    }

    /// Frames for every stored chunk in index order, base64-encoded and
    /// ready to be rendered. Does not consume the buffer.
    pub fn serialize(&self) -> Vec<String> {
        self.frames().iter().map(|f| BASE64.encode(f)).collect()
    }

    /// Raw frames for every stored chunk in index order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        let table = self.table.read();
        let capacity = table.payload_size as usize;
        table
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref().map(|payload| {
                    Chunk {
                        index: index as u16,
                        count: table.count,
                        payload: payload.clone(),
                    }
                    .to_frame(capacity)
                })
            })
            .collect()
    }
}

/// Log a rejected frame once, whatever stage refused it.
fn rejected(e: ChunkError) -> ChunkError {
    tracing::warn!(error = %e, "chunk rejected");
    e
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("frame is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("frame too short: {0} bytes, the header alone is {}", CHUNK_HEADER_SIZE)]
    FrameTooShort(usize),

    #[error("frame declares {declared} payload bytes but carries only {available}")]
    PayloadOverrun { declared: usize, available: usize },

    #[error("chunk index {index} out of range for a {count}-chunk message")]
    IndexOutOfRange { index: u16, count: u16 },

    #[error("frame declares {got} chunks but this message has {expected}")]
    CountMismatch { expected: u16, got: u16 },

    #[error(
        "compressed message of {len} bytes does not fit in {} chunks of {capacity} payload bytes",
        MAX_CHUNK_COUNT
    )]
    TooManyChunks { len: usize, capacity: usize },

    #[error("message incomplete: {received} of {expected} chunks received")]
    IncompleteMessage { received: usize, expected: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compression(#[from] CompressionError),
}

impl ChunkError {
    /// True for errors caused by one bad frame. The caller can drop that
    /// frame and keep scanning; the buffer is unchanged.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            ChunkError::InvalidBase64(_)
                | ChunkError::FrameTooShort(_)
                | ChunkError::PayloadOverrun { .. }
                | ChunkError::IndexOutOfRange { .. }
                | ChunkError::CountMismatch { .. }
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
