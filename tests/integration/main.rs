//! airgap integration test harness.
//!
//! Tests here drive the public API end to end: operations in, base64 frames
//! out, frames back in (shuffled, duplicated, corrupted), operations out.
//! They need no devices or cameras; a `Vec<String>` stands in for the
//! screen between the two sides.
//!
//!   cargo test --test integration

use airgap_core::wire::DEFAULT_VERSION;
use airgap_core::{AirGap, Chunks};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

mod properties;
mod rejection;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Instance id shared by both sides of the simulated pair.
pub const INSTANCE: [u8; 33] = [0x02; 33];

/// Operations used by the envelope round-trip tests.
pub const SAMPLE_OPS: [(u16, &[u8]); 3] = [(1, b"a"), (1000, b"bb"), (65535, b"ccc")];

/// Unencrypted context with the given chunk size.
pub fn airgap(chunk_size: usize) -> AirGap {
    AirGap::new(DEFAULT_VERSION, &INSTANCE)
        .and_then(|ctx| ctx.with_chunk_size(chunk_size))
        .expect("test context settings are valid")
}

/// `frames` in a deterministic random order.
pub fn shuffled(frames: &[String], seed: u64) -> Vec<String> {
    let mut out = frames.to_vec();
    out.shuffle(&mut StdRng::seed_from_u64(seed));
    out
}

/// Pseudo-random bytes that gzip cannot shrink much, so they span many chunks.
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    use rand::RngCore;
    let mut out = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut out);
    out
}

/// Feed every frame into a fresh receive buffer.
pub fn receive(frames: &[String]) -> anyhow::Result<Chunks> {
    let chunks = Chunks::new();
    for frame in frames {
        chunks.read_chunk(frame)?;
    }
    Ok(chunks)
}
