//! airgap-core — chunked message protocol between an online device and an
//! offline signer that only see each other's screens.
//!
//! Send path: operations → envelope → (encrypt) → gzip → 6-byte-header
//! frames → base64 strings, one per displayed code.
//! Receive path: the same steps in reverse, with frames accepted in any
//! order and duplicates ignored.

pub mod airgap;
pub mod chunks;
pub mod compress;
pub mod crypto;
pub mod message;
pub mod wire;

pub use airgap::{AirGap, ConfigError, ProtocolSettings};
pub use chunks::{split, Chunk, ChunkError, Chunks};
pub use crypto::{ChaChaCipher, Cipher, CryptoError, Decryptor, Encryptor};
pub use message::{Message, MessageError, OpPayload};
pub use wire::InstanceId;
