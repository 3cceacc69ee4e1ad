//! Show the header of a single frame without reassembling anything.

use std::fmt::Write;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use airgap_core::wire::CHUNK_HEADER_SIZE;
use airgap_core::Chunk;

/// Bytes of payload shown before the preview is cut off.
const PREVIEW_LEN: usize = 16;

/// Human-readable report for one decoded frame. Header fields come from
/// untrusted input, so any index and count must render.
fn describe(raw: &[u8]) -> Result<String> {
    let chunk = Chunk::from_frame(raw).context("frame is malformed")?;
    let payload = chunk.payload();
    let padding = raw.len() - CHUNK_HEADER_SIZE - payload.len();

    let mut out = String::new();
    writeln!(out, "═══════════════════════════════════════")?;
    writeln!(out, "  Frame {} of {}", u32::from(chunk.index()) + 1, chunk.count())?;
    writeln!(out, "═══════════════════════════════════════")?;
    writeln!(out, "  Index        : {}", chunk.index())?;
    writeln!(out, "  Count        : {}", chunk.count())?;
    writeln!(out, "  Payload size : {} bytes", chunk.payload_size())?;
    writeln!(out, "  Frame size   : {} bytes ({} padding)", raw.len(), padding)?;

    let shown = payload.len().min(PREVIEW_LEN);
    let ellipsis = if payload.len() > shown { "..." } else { "" };
    writeln!(out, "  Payload      : {}{}", hex::encode(&payload[..shown]), ellipsis)?;

    if chunk.index() >= chunk.count() {
        writeln!(out, "\n  warning: index is outside 0..{}", chunk.count())?;
    }
    Ok(out)
}

pub fn cmd_inspect(frame: &str) -> Result<()> {
    let raw = BASE64
        .decode(frame.trim())
        .context("frame is not valid base64")?;
    print!("{}", describe(&raw)?);
    Ok(())
}
