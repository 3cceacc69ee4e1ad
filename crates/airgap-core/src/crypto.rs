//! Encryption capability for marshaled messages.
//!
//! The envelope layer never names an algorithm. It sees two narrow traits:
//!   1. [`Encryptor`] — used on the send path by `Message::marshal`
//!   2. [`Decryptor`] — used on the receive path by `AirGap::unmarshal`
//!
//! Anything implementing both is a [`Cipher`] and can be bound to an
//! `AirGap` context. Hardware modules and test doubles plug in the same way.
//!
//! [`ChaChaCipher`] is the stock adapter: ChaCha20-Poly1305 keyed from a
//! shared passphrase through BLAKE3 key derivation. Key material derives
//! ZeroizeOnDrop — wiped from memory when dropped.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// ── Capability ────────────────────────────────────────────────────────────────

/// Encrypts a marshaled envelope before it is compressed and chunked.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Decrypts a reassembled blob before the envelope is parsed.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Both halves of the capability, as bound to an `AirGap` context.
pub trait Cipher: Encryptor + Decryptor {}

impl<T: Encryptor + Decryptor> Cipher for T {}

// ── ChaCha20-Poly1305 ─────────────────────────────────────────────────────────

/// Context string for BLAKE3 key derivation. Changing it changes every key.
const KEY_CONTEXT: &str = "airgap 2022-06-01 chunked envelope cipher";

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Authenticated encryption with a fresh random nonce per message.
///
/// Wire format of one sealed message:
///   [nonce (12 bytes)] [ciphertext] [Poly1305 tag (16 bytes)]
///
/// Two calls with the same plaintext produce different output. Both devices
/// must hold the same key; how they agree on it is outside this crate.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ChaChaCipher {
    key: Zeroizing<[u8; 32]>,
}

impl ChaChaCipher {
    /// Use a raw 32-byte key.
    pub fn from_key(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Derive the key from a passphrase shared by both devices.
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self::from_key(blake3::derive_key(KEY_CONTEXT, passphrase.as_bytes()))
    }

    fn aead(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&*self.key))
    }
}

impl Encryptor for ChaChaCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = generate_nonce();
        let sealed = self
            .aead()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Aead)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }
}

impl Decryptor for ChaChaCipher {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::TooShort(ciphertext.len()));
        }

        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
        self.aead()
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Aead)
    }
}

/// Generate a cryptographically random 12-byte nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext too short ({0} bytes, need at least 28: 12 nonce + 16 MAC)")]
    TooShort(usize),

    #[error("authenticated encryption failed (wrong key or tampered data)")]
    Aead,

    /// Failure reported by an externally supplied cipher, passed through as-is.
    #[error(transparent)]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
