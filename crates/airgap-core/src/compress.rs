//! Gzip glue for the chunk layer.
//!
//! The stream is self-delimiting (header, deflate body, CRC32 + length
//! trailer), so a receiver needs no external length to find its end.

use std::io::{Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

/// 10-byte gzip header + 2-byte empty deflate block + 8-byte trailer.
const MIN_GZIP_LEN: usize = 20;

/// Compress `data` into a gzip stream at the best compression level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let buf = Vec::with_capacity(data.len() / 2 + MIN_GZIP_LEN);
    let mut encoder = GzEncoder::new(buf, Compression::best());
    encoder.write_all(data).map_err(CompressionError::Compress)?;
    encoder.finish().map_err(CompressionError::Compress)
}

/// Inverse of [`compress`]. Concatenated gzip members decode as one stream.
/// Any malformed, truncated, or checksum-failing input is an error, and so
/// are bytes trailing the last member; nothing is returned partially.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    if data.len() < MIN_GZIP_LEN {
        return Err(CompressionError::Truncated(data.len()));
    }

    let mut decoder = MultiGzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder
        .read_to_end(&mut out)
        .map_err(CompressionError::Decompress)?;
    Ok(out)
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("cannot compress data: {0}")]
    Compress(#[source] std::io::Error),

    #[error("cannot decompress data: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("compressed stream too short: {0} bytes, need at least {}", MIN_GZIP_LEN)]
    Truncated(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
