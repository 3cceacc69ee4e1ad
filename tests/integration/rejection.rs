use std::sync::Arc;

use anyhow::Result;

use airgap_core::wire::{CHUNK_HEADER_SIZE, DEFAULT_CHUNK_SIZE};
use airgap_core::{
    ChaChaCipher, ChunkError, Chunks, ConfigError, CryptoError, Decryptor, Encryptor,
    MessageError,
};

use crate::*;

/// Raw frame with an arbitrary header.
fn frame(index: u16, count: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + payload.len());
    out.extend_from_slice(&index.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

// ══════════════════════════════════════════════════════════════════════════════
//  Protocol context
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn chunk_size_boundaries() {
    let ctx = || AirGap::new(1, &INSTANCE).unwrap();
    assert_eq!(
        ctx().with_chunk_size(5).unwrap_err(),
        ConfigError::ChunkSizeTooSmall(5)
    );
    assert_eq!(
        ctx().with_chunk_size(65536).unwrap_err(),
        ConfigError::ChunkSizeTooLarge(65536)
    );
    assert!(ctx().with_chunk_size(6).is_ok());
    assert!(ctx().with_chunk_size(65535).is_ok());
}

#[test]
fn zero_capacity_frames_cannot_carry_a_message() {
    let err = airgap(CHUNK_HEADER_SIZE)
        .create_message()
        .marshal_chunks()
        .unwrap_err();
    assert!(matches!(
        err,
        MessageError::Chunk(ChunkError::TooManyChunks { capacity: 0, .. })
    ));
}

#[test]
fn version_mismatch_is_rejected_both_ways() -> Result<()> {
    let mut old = airgap(DEFAULT_CHUNK_SIZE);
    old.set_version(1);
    let mut new = airgap(DEFAULT_CHUNK_SIZE);
    new.set_version(2);

    let from_old = receive(&old.create_message().add_operation(1, &b"x"[..]).marshal_chunks()?)?;
    let from_new = receive(&new.create_message().add_operation(1, &b"x"[..]).marshal_chunks()?)?;

    assert!(matches!(
        new.unmarshal_chunks(&from_old),
        Err(MessageError::VersionTooOld { got: 1, supported: 2 })
    ));
    assert!(matches!(
        old.unmarshal_chunks(&from_new),
        Err(MessageError::VersionTooNew { got: 2, supported: 1 })
    ));
    Ok(())
}

#[test]
fn foreign_instance_is_rejected() -> Result<()> {
    let stranger = AirGap::new(1, &[0x09; 33])?;
    let frames = stranger.create_message().add_operation(1, &b"x"[..]).marshal_chunks()?;

    let err = airgap(DEFAULT_CHUNK_SIZE)
        .unmarshal_chunks(&receive(&frames)?)
        .unwrap_err();
    assert!(matches!(err, MessageError::InstanceMismatch { .. }));
    Ok(())
}

#[test]
fn truncated_operation_record_is_rejected() -> Result<()> {
    let ctx = airgap(DEFAULT_CHUNK_SIZE);
    let mut envelope = ctx
        .create_message()
        .add_operation(3, &b"payload"[..])
        .encode_envelope()?;
    envelope.truncate(envelope.len() - 2);

    let chunks = Chunks::from_data(&envelope, DEFAULT_CHUNK_SIZE)?;
    assert!(matches!(
        ctx.unmarshal_chunks(&chunks),
        Err(MessageError::TruncatedOperation { offset: 34, .. })
    ));
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Frames
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn out_of_range_index_leaves_buffer_untouched() {
    let chunks = Chunks::new();
    assert!(matches!(
        chunks.read_frame(&frame(3, 3, b"abc")),
        Err(ChunkError::IndexOutOfRange { index: 3, count: 3 })
    ));
    assert_eq!(chunks.count(), 0);
    assert_eq!(chunks.received(), 0);

    // A valid frame is still accepted afterwards
    assert!(chunks.read_frame(&frame(0, 2, b"abc")).unwrap());
    assert_eq!(chunks.progress(), (1, 2));
}

#[test]
fn frames_from_another_message_are_rejected() -> Result<()> {
    let a = Chunks::from_data(&noise(300, 1), 32)?.frames();
    let b = Chunks::from_data(&noise(900, 2), 32)?.frames();
    assert_ne!(a.len(), b.len());

    let chunks = Chunks::new();
    chunks.read_frame(&a[0])?;
    let err = chunks.read_frame(&b[1]).unwrap_err();
    assert!(matches!(err, ChunkError::CountMismatch { .. }));
    assert!(err.is_malformed_frame());
    assert_eq!(chunks.received(), 1);
    Ok(())
}

#[test]
fn payload_overrun_is_rejected() {
    let mut raw = frame(0, 1, b"abcd");
    raw.truncate(raw.len() - 1);
    assert!(matches!(
        Chunks::new().read_frame(&raw),
        Err(ChunkError::PayloadOverrun { declared: 4, available: 3 })
    ));
}

#[test]
fn corrupted_compression_trailer_fails_on_data() -> Result<()> {
    let source = Chunks::from_data(&noise(50, 4), 1024)?;
    let mut raw = source.frames().remove(0);
    let size = u16::from_le_bytes([raw[4], raw[5]]) as usize;
    // CRC32 sits 8 bytes before the end of the gzip stream
    raw[CHUNK_HEADER_SIZE + size - 8] ^= 0xff;

    let chunks = Chunks::new();
    assert!(chunks.read_frame(&raw)?);
    assert!(chunks.is_complete());
    assert!(matches!(chunks.data(), Err(ChunkError::Compression(_))));
    Ok(())
}

#[test]
fn incomplete_buffer_reports_progress() -> Result<()> {
    let frames = Chunks::from_data(&noise(200, 6), 32)?.serialize();
    let chunks = receive(&frames[1..])?;
    match chunks.data() {
        Err(ChunkError::IncompleteMessage { received, expected }) => {
            assert_eq!(received, frames.len() - 1);
            assert_eq!(expected, frames.len());
        }
        other => panic!("expected IncompleteMessage, got {other:?}"),
    }
    assert_eq!(chunks.missing(), vec![0]);
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Ciphers
// ══════════════════════════════════════════════════════════════════════════════

/// Stand-in for a hardware module that has gone away.
struct UnpluggedCipher;

impl Encryptor for UnpluggedCipher {
    fn encrypt(&self, _: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::Backend("device unplugged".into()))
    }
}

impl Decryptor for UnpluggedCipher {
    fn decrypt(&self, _: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::Backend("device unplugged".into()))
    }
}

#[test]
fn failing_cipher_surfaces_its_error() -> Result<()> {
    let ctx = airgap(DEFAULT_CHUNK_SIZE).with_shared_cipher(Arc::new(UnpluggedCipher));
    let err = ctx.create_message().marshal_chunks().unwrap_err();
    assert!(matches!(err, MessageError::Encryption(CryptoError::Backend(_))));
    assert!(err.to_string().contains("device unplugged"));

    let frames = airgap(DEFAULT_CHUNK_SIZE).create_message().marshal_chunks()?;
    let err = ctx.unmarshal_chunks(&receive(&frames)?).unwrap_err();
    assert!(matches!(err, MessageError::Decryption(CryptoError::Backend(_))));
    Ok(())
}

#[test]
fn wrong_passphrase_is_rejected() -> Result<()> {
    let sender = airgap(DEFAULT_CHUNK_SIZE).with_cipher(ChaChaCipher::from_passphrase("alpha"));
    let receiver = airgap(DEFAULT_CHUNK_SIZE).with_cipher(ChaChaCipher::from_passphrase("bravo"));

    let frames = sender.create_message().add_operation(1, &b"x"[..]).marshal_chunks()?;
    let err = receiver.unmarshal_chunks(&receive(&frames)?).unwrap_err();
    assert!(matches!(err, MessageError::Decryption(CryptoError::Aead)));
    Ok(())
}

#[test]
fn plain_receiver_cannot_read_encrypted_message() -> Result<()> {
    let sender = airgap(DEFAULT_CHUNK_SIZE).with_cipher(ChaChaCipher::from_passphrase("alpha"));
    let frames = sender.create_message().add_operation(1, &b"x"[..]).marshal_chunks()?;

    // Ciphertext parsed as an envelope: nonce bytes land in the header
    assert!(airgap(DEFAULT_CHUNK_SIZE)
        .unmarshal_chunks(&receive(&frames)?)
        .is_err());
    Ok(())
}
