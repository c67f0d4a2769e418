//! saltpack-crypto: multi-recipient streaming encryption, signing, and armor
//!
//! Architecture: one random message key, boxed once per recipient, then
//! chunk-by-chunk XChaCha20-Poly1305 with optional cross-group MACs.
//!
//! Wire layout:
//! ```text
//! frame 0    Header { version, sender, nonce, recipients: [[pk, box(KeyBundle)], ...] }
//! frame 1..N ChunkRecord { macs: [HMAC-SHA512(mac_key_g, tag)[..16] per group], chunk: tag || ct }
//!            the last ChunkRecord decrypts to an empty plaintext
//! ```
//!
//! Key hierarchy:
//! ```text
//! Sender X25519 key ──┐
//!                     ├── box(nonce_prefix || recipient_index) ──> KeyBundle per recipient
//! Recipient X25519 ───┘        ├── Encryption Key (256-bit random, shared by all recipients)
//!                              │   └── Chunk AEAD: XChaCha20-Poly1305 (nonce=chunk_index)
//!                              └── MAC Key (128-bit random, one per group; only with >1 group)
//! ```

pub mod armor;
pub mod chunk;
pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod format;
pub mod frame;
pub mod keys;
pub mod nonce;
pub mod observer;
pub mod sign;

pub use armor::{armor, dearmor, efficient_block_sizes, ArmorOptions};
pub use decrypt::{decrypt, decrypt_with_observer};
pub use encrypt::encrypt;
pub use error::{Result, SaltpackError};
pub use format::{ChunkRecord, Header, KeyBundle, RecipientEntry, FORMAT_VERSION};
pub use keys::{generate_secret_key, PublicKey, SecretKey};
pub use observer::{DecryptObserver, NoopObserver, TracingObserver};
pub use sign::{
    generate_signing_key, sign_attached, sign_detached, verify_attached, verify_detached,
    SigningKey, VerifyingKey,
};

/// Size of an X25519 key or message encryption key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of the random per-message nonce prefix
pub const NONCE_PREFIX_SIZE: usize = 16;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a per-group MAC key
pub const MAC_KEY_SIZE: usize = 16;

/// Size of a truncated HMAC-SHA512 chunk MAC
pub const MAC_SIZE: usize = 16;
