//! Error taxonomy for encoding, decoding, signing, and armor.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SaltpackError>;

/// Every variant is fatal for the call that produced it. Decryption never
/// hands back partial plaintext alongside an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaltpackError {
    /// Truncated stream, bad length prefix, or a body that is not valid CBOR
    /// for the expected record.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u64),

    #[error("no header entry matches this recipient key")]
    RecipientNotFound,

    /// A box or secretbox refused to open: wrong key or tampered ciphertext.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(&'static str),

    #[error("MAC mismatch on chunk {chunk_index}")]
    MacMismatch { chunk_index: u64 },

    #[error("chunk size must be positive")]
    InvalidChunkSize,

    #[error("at least one recipient is required")]
    NoRecipients,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    BadSignature,

    #[error("wrong signature mode: expected {expected}, found {found}")]
    WrongMode { expected: u64, found: u64 },

    #[error("armor error: {0}")]
    Armor(String),
}
