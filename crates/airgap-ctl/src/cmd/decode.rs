//! Reassemble scanned frames and print the decoded operations.

use std::io::BufRead;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use airgap_core::{AirGap, Chunks, OpPayload};

#[derive(Debug, Default, PartialEq, Eq)]
struct FeedStats {
    stored: usize,
    duplicates: usize,
    rejected: usize,
}

/// Feed frames, one per line, until the buffer is complete or input ends.
/// Blank lines are skipped. Malformed frames are counted and dropped so one
/// bad scan never aborts the session.
fn feed(chunks: &Chunks, input: impl BufRead) -> Result<FeedStats> {
    let mut stats = FeedStats::default();

    for (line_no, line) in input.lines().enumerate() {
        let line = line.context("failed to read frame input")?;
        if line.trim().is_empty() {
            continue;
        }

        match chunks.read_chunk(&line) {
            Ok(true) => {
                stats.stored += 1;
                let (received, count) = chunks.progress();
                eprintln!("  received {}/{}", received, count);
            }
            Ok(false) => stats.duplicates += 1,
            Err(e) if e.is_malformed_frame() => {
                eprintln!("  line {}: {}", line_no + 1, e);
                stats.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }

        if chunks.is_complete() {
            break;
        }
    }

    Ok(stats)
}

#[derive(Serialize)]
struct OpJson {
    op_code: u16,
    size: usize,
    /// Hex-encoded payload.
    data: String,
}

impl From<&OpPayload> for OpJson {
    fn from(op: &OpPayload) -> Self {
        Self {
            op_code: op.op_code(),
            size: op.size(),
            data: hex::encode(op.data()),
        }
    }
}

/// Payload as text when it is printable UTF-8, otherwise hex.
fn render(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) if !text.chars().any(|c| c.is_control() && c != '\n' && c != '\t') => {
            text.to_string()
        }
        _ => hex::encode(data),
    }
}

pub fn cmd_decode(airgap: &AirGap, path: Option<&str>, json: bool) -> Result<()> {
    let chunks = Chunks::new();
    let stats = match path {
        None | Some("-") => feed(&chunks, std::io::stdin().lock())?,
        Some(p) => {
            let file = std::fs::File::open(p).with_context(|| format!("failed to open {}", p))?;
            feed(&chunks, std::io::BufReader::new(file))?
        }
    };
    tracing::debug!(
        stored = stats.stored,
        duplicates = stats.duplicates,
        rejected = stats.rejected,
        "frame input consumed"
    );

    if !chunks.is_complete() {
        let (received, count) = chunks.progress();
        if count == 0 {
            bail!("no valid frames read");
        }
        bail!(
            "message incomplete: {}/{} chunks, missing {:?}",
            received,
            count,
            chunks.missing()
        );
    }

    let message = airgap
        .unmarshal_chunks(&chunks)
        .context("failed to decode message")?;

    if json {
        let ops: Vec<OpJson> = message.operations().iter().map(OpJson::from).collect();
        println!("{}", serde_json::to_string_pretty(&ops)?);
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Message v{} ({} operations)", message.version(), message.operations().len());
    println!("═══════════════════════════════════════");
    for op in message.operations() {
        println!("  ┌─ op 0x{:04x} ({})", op.op_code(), op.op_code());
        println!("  │  size : {} bytes", op.size());
        println!("  └─ data : {}", render(op.data()));
    }
    Ok(())
}
