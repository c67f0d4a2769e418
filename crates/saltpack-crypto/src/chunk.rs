//! Per-chunk secretbox and cross-group MACs
//!
//! Sealed chunk format (binary):
//! ```text
//! [16 bytes: Poly1305 tag][N bytes: XChaCha20 ciphertext]
//! nonce = chunk_index (24 bytes, big-endian)
//! ```
//!
//! The leading tag doubles as the chunk's authenticator. Each recipient group
//! gets `HMAC-SHA512(mac_key, authenticator)[..16]`: a forged tag fails the
//! MAC check for every group, and the tag itself pins the rest of the
//! ciphertext.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    Tag, XChaCha20Poly1305, XNonce,
};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::error::{Result, SaltpackError};
use crate::keys::{EncryptionKey, MacKey};
use crate::nonce::chunk_nonce;
use crate::{KEY_SIZE, MAC_SIZE, NONCE_SIZE, TAG_SIZE};

type HmacSha512 = Hmac<Sha512>;

/// XChaCha20-Poly1305 with the tag moved to the front: `tag || ciphertext`.
pub(crate) fn secretbox_seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(XNonce::from_slice(nonce), b"", &mut buffer)
        .map_err(|_| SaltpackError::InvalidKey("secretbox encryption failed".into()))?;

    let mut sealed = Vec::with_capacity(TAG_SIZE + buffer.len());
    sealed.extend_from_slice(&tag);
    sealed.extend_from_slice(&buffer);
    Ok(sealed)
}

/// Inverse of [`secretbox_seal`]. `None` if the input is short or does not authenticate.
pub(crate) fn secretbox_open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    sealed: &[u8],
) -> Option<Vec<u8>> {
    if sealed.len() < TAG_SIZE {
        return None;
    }
    let (tag, ciphertext) = sealed.split_at(TAG_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(XNonce::from_slice(nonce), b"", &mut buffer, Tag::from_slice(tag))
        .ok()?;
    Some(buffer)
}

/// Encrypt one chunk under the message key.
///
/// Returns: `[16-byte tag][ciphertext]`
pub fn seal_chunk(key: &EncryptionKey, chunk_index: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
    secretbox_seal(key.as_bytes(), &chunk_nonce(chunk_index), plaintext)
}

/// Decrypt one sealed chunk. The index must match the one used to seal it.
pub fn open_chunk(key: &EncryptionKey, chunk_index: u64, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < TAG_SIZE {
        return Err(SaltpackError::MalformedFrame(format!(
            "chunk {chunk_index} too short: {} bytes (minimum {TAG_SIZE})",
            sealed.len()
        )));
    }
    secretbox_open(key.as_bytes(), &chunk_nonce(chunk_index), sealed)
        .ok_or(SaltpackError::AuthenticationFailure("chunk secretbox did not open"))
}

/// The authenticator of a sealed chunk: its leading tag bytes.
pub fn authenticator(sealed: &[u8]) -> Result<&[u8]> {
    sealed.get(..TAG_SIZE).ok_or_else(|| {
        SaltpackError::MalformedFrame(format!(
            "sealed chunk is {} bytes, shorter than its tag",
            sealed.len()
        ))
    })
}

/// `HMAC-SHA512(mac_key, authenticator)` truncated to 16 bytes.
pub fn chunk_mac(mac_key: &MacKey, authenticator: &[u8]) -> Result<[u8; MAC_SIZE]> {
    let mut mac = <HmacSha512 as Mac>::new_from_slice(mac_key.as_bytes())
        .map_err(|e| SaltpackError::InvalidKey(format!("HMAC key: {e}")))?;
    mac.update(authenticator);
    let digest = mac.finalize().into_bytes();

    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&digest[..MAC_SIZE]);
    Ok(out)
}

/// Constant-time check of `expected` against the MAC this key would produce.
pub fn verify_chunk_mac(mac_key: &MacKey, authenticator: &[u8], expected: &[u8]) -> Result<bool> {
    let ours = chunk_mac(mac_key, authenticator)?;
    Ok(ours.as_slice().ct_eq(expected).into())
}
