//! Attached and detached Ed25519 signatures
//!
//! Attached signature stream:
//! ```text
//! frame 0    SignatureHeader { format, version, mode: 1, sender, nonce }
//! frame 1..N SignedChunk { signature, chunk }     (last chunk is empty)
//! signed text = "saltpack\0attached signature\0" || SHA-512(nonce || chunk_index (8, BE) || chunk)
//! ```
//!
//! Detached signature (one frame):
//! ```text
//! SignatureHeader { format, version, mode: 2, sender, nonce, signature }
//! signed text = "saltpack\0detached signature\0" || SHA-512(nonce || message)
//! ```

use ed25519_dalek::{Signature, Signer};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tracing::debug;
use zeroize::Zeroize;

pub use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::encrypt::chunks_with_terminator;
use crate::error::{Result, SaltpackError};
use crate::frame::{write_frame, FrameReader};
use crate::nonce::generate_nonce_prefix;
use crate::NONCE_PREFIX_SIZE;

pub const SIGNATURE_FORMAT: &str = "saltpack";
pub const SIGNATURE_VERSION: (u64, u64) = (1, 0);
pub const MODE_ATTACHED: u64 = 1;
pub const MODE_DETACHED: u64 = 2;

const ATTACHED_CONTEXT: &[u8] = b"saltpack\0attached signature\0";
const DETACHED_CONTEXT: &[u8] = b"saltpack\0detached signature\0";

/// First (or only) frame of a signed message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureHeader {
    pub format: String,
    /// `(major, minor)`, encoded as a two-element array.
    pub version: (u64, u64),
    pub mode: u64,
    #[serde(rename = "sender", with = "serde_bytes")]
    pub sender_public_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
    /// Detached mode only.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub signature: Option<Vec<u8>>,
}

impl SignatureHeader {
    fn new(signer: &VerifyingKey, mode: u64, nonce: &[u8]) -> Self {
        Self {
            format: SIGNATURE_FORMAT.to_string(),
            version: SIGNATURE_VERSION,
            mode,
            sender_public_key: signer.as_bytes().to_vec(),
            nonce: nonce.to_vec(),
            signature: None,
        }
    }

    /// Check format, version, and mode, then return the signer's key.
    fn verifying_key(&self, expected_mode: u64) -> Result<VerifyingKey> {
        if self.format != SIGNATURE_FORMAT {
            return Err(SaltpackError::MalformedFrame(format!(
                "unknown signature format {:?}",
                self.format
            )));
        }
        if self.version.0 != SIGNATURE_VERSION.0 {
            return Err(SaltpackError::UnsupportedVersion(self.version.0));
        }
        if self.mode != expected_mode {
            return Err(SaltpackError::WrongMode {
                expected: expected_mode,
                found: self.mode,
            });
        }
        if self.nonce.len() != NONCE_PREFIX_SIZE {
            return Err(SaltpackError::MalformedFrame(format!(
                "signature nonce is {} bytes, expected {NONCE_PREFIX_SIZE}",
                self.nonce.len()
            )));
        }

        let bytes: [u8; 32] = self.sender_public_key.as_slice().try_into().map_err(|_| {
            SaltpackError::MalformedFrame(format!(
                "signer key is {} bytes",
                self.sender_public_key.len()
            ))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| SaltpackError::InvalidKey(format!("signer key: {e}")))
    }
}

/// One signed chunk of an attached signature stream.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedChunk {
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub chunk: Vec<u8>,
}

/// Generate a random Ed25519 signing key.
pub fn generate_signing_key() -> SigningKey {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    let key = SigningKey::from_bytes(&seed);
    seed.zeroize();
    key
}

fn attached_signed_text(nonce: &[u8], chunk_index: u64, chunk: &[u8]) -> Vec<u8> {
    let digest = Sha512::new()
        .chain_update(nonce)
        .chain_update(chunk_index.to_be_bytes())
        .chain_update(chunk)
        .finalize();
    [ATTACHED_CONTEXT, digest.as_slice()].concat()
}

fn detached_signed_text(nonce: &[u8], message: &[u8]) -> Vec<u8> {
    let digest = Sha512::new()
        .chain_update(nonce)
        .chain_update(message)
        .finalize();
    [DETACHED_CONTEXT, digest.as_slice()].concat()
}

fn verify_signature(signer: &VerifyingKey, text: &[u8], signature: &[u8]) -> Result<()> {
    let signature = Signature::from_slice(signature).map_err(|_| SaltpackError::BadSignature)?;
    signer
        .verify_strict(text, &signature)
        .map_err(|_| SaltpackError::BadSignature)
}

/// Sign `message` in `chunk_size` pieces, embedding the message in the output.
pub fn sign_attached(signer: &SigningKey, message: &[u8], chunk_size: usize) -> Result<Vec<u8>> {
    if chunk_size == 0 {
        return Err(SaltpackError::InvalidChunkSize);
    }
    let nonce = generate_nonce_prefix();
    let header = SignatureHeader::new(&signer.verifying_key(), MODE_ATTACHED, &nonce);

    let mut output = Vec::with_capacity(message.len() + 256);
    write_frame(&mut output, &header)?;

    let mut chunk_count = 0u64;
    for (chunk_index, chunk) in chunks_with_terminator(message, chunk_size).enumerate() {
        let text = attached_signed_text(&nonce, chunk_index as u64, chunk);
        let signed = SignedChunk {
            signature: signer.sign(&text).to_bytes().to_vec(),
            chunk: chunk.to_vec(),
        };
        write_frame(&mut output, &signed)?;
        chunk_count += 1;
    }

    debug!(chunks = chunk_count, bytes = output.len(), "message signed (attached)");
    Ok(output)
}

/// Verify an attached signature stream, returning the signer and the message.
///
/// Bytes after the empty terminator chunk are ignored.
pub fn verify_attached(input: &[u8]) -> Result<(VerifyingKey, Vec<u8>)> {
    let mut reader = FrameReader::new(input);
    let header: SignatureHeader = reader.read_frame()?;
    let signer = header.verifying_key(MODE_ATTACHED)?;

    let mut message = Vec::new();
    let mut chunk_index = 0u64;
    loop {
        let signed: SignedChunk = reader.read_frame()?;
        let text = attached_signed_text(&header.nonce, chunk_index, &signed.chunk);
        verify_signature(&signer, &text, &signed.signature)?;

        if signed.chunk.is_empty() {
            break;
        }
        message.extend_from_slice(&signed.chunk);
        chunk_index += 1;
    }

    debug!(chunks = chunk_index + 1, bytes = message.len(), "attached signature verified");
    Ok((signer, message))
}

/// Produce a detached signature over `message`.
pub fn sign_detached(signer: &SigningKey, message: &[u8]) -> Result<Vec<u8>> {
    let nonce = generate_nonce_prefix();
    let mut header = SignatureHeader::new(&signer.verifying_key(), MODE_DETACHED, &nonce);
    let text = detached_signed_text(&nonce, message);
    header.signature = Some(signer.sign(&text).to_bytes().to_vec());

    let mut output = Vec::new();
    write_frame(&mut output, &header)?;
    Ok(output)
}

/// Check a detached `signature` over `message`, returning the signer.
pub fn verify_detached(message: &[u8], signature: &[u8]) -> Result<VerifyingKey> {
    let mut reader = FrameReader::new(signature);
    let header: SignatureHeader = reader.read_frame()?;
    let signer = header.verifying_key(MODE_DETACHED)?;

    let sig = header.signature.as_deref().ok_or_else(|| {
        SaltpackError::MalformedFrame("detached signature header has no signature".into())
    })?;
    verify_signature(&signer, &detached_signed_text(&header.nonce, message), sig)?;

    debug!(bytes = message.len(), "detached signature verified");
    Ok(signer)
}
