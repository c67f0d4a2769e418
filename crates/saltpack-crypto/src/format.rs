//! Wire records for encrypted messages.
//!
//! ```text
//! Header      = { version, sender, nonce, recipients: [[public_key, wrapped_keys], ...] }
//! KeyBundle   = { encryption_key, ?mac_group, ?mac_key }        (boxed per recipient)
//! ChunkRecord = { macs: [mac, ...], chunk: tag || ciphertext }
//! ```
//!
//! Byte fields are CBOR byte strings. Fixed sizes are checked when a record is
//! turned into keys, not during CBOR decoding.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SaltpackError};
use crate::keys::{EncryptionKey, MacKey, PublicKey};
use crate::nonce::NoncePrefix;
use crate::NONCE_PREFIX_SIZE;

/// The only format version this crate reads or writes.
pub const FORMAT_VERSION: u64 = 1;

/// Message header, the first frame of every encrypted message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub version: u64,
    /// Sender's X25519 public key.
    #[serde(rename = "sender", with = "serde_bytes")]
    pub sender_public_key: Vec<u8>,
    /// Random prefix of every recipient nonce.
    #[serde(rename = "nonce", with = "serde_bytes")]
    pub nonce_prefix: Vec<u8>,
    /// Recipient entries in encoding order. Position determines the unwrap nonce.
    pub recipients: Vec<RecipientEntry>,
}

impl Header {
    pub fn sender_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_slice(&self.sender_public_key).map_err(|_| {
            SaltpackError::MalformedFrame(format!(
                "header sender key is {} bytes",
                self.sender_public_key.len()
            ))
        })
    }

    pub fn nonce_prefix(&self) -> Result<NoncePrefix> {
        self.nonce_prefix.as_slice().try_into().map_err(|_| {
            SaltpackError::MalformedFrame(format!(
                "header nonce is {} bytes, expected {NONCE_PREFIX_SIZE}",
                self.nonce_prefix.len()
            ))
        })
    }

    /// Linear scan for `public_key`, returning its index and wrapped bundle.
    pub fn find_recipient(&self, public_key: &PublicKey) -> Option<(u64, &RecipientEntry)> {
        self.recipients
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.public_key() == public_key.as_bytes())
            .map(|(index, entry)| (index as u64, entry))
    }
}

/// One `[public_key, wrapped_keys]` pair, encoded as a two-element array.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipientEntry(
    #[serde(with = "serde_bytes")] pub Vec<u8>,
    #[serde(with = "serde_bytes")] pub Vec<u8>,
);

impl RecipientEntry {
    pub fn new(public_key: &PublicKey, wrapped_keys: Vec<u8>) -> Self {
        Self(public_key.as_bytes().to_vec(), wrapped_keys)
    }

    pub fn public_key(&self) -> &[u8] {
        &self.0
    }

    pub fn wrapped_keys(&self) -> &[u8] {
        &self.1
    }
}

/// Per-recipient key material, boxed so only that recipient can read it.
///
/// `mac_group` and `mac_key` are present iff the message has more than one
/// recipient group.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyBundle {
    #[serde(with = "serde_bytes")]
    pub encryption_key: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_group: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub mac_key: Option<Vec<u8>>,
}

impl KeyBundle {
    pub fn new(encryption_key: &EncryptionKey, mac: Option<(u64, &MacKey)>) -> Self {
        let (mac_group, mac_key) = match mac {
            Some((group, key)) => (Some(group), Some(key.as_bytes().to_vec())),
            None => (None, None),
        };
        Self {
            encryption_key: encryption_key.as_bytes().to_vec(),
            mac_group,
            mac_key,
        }
    }

    pub fn encryption_key(&self) -> Result<EncryptionKey> {
        EncryptionKey::from_slice(&self.encryption_key)
            .map_err(|_| SaltpackError::MalformedFrame("key bundle encryption key size".into()))
    }

    /// The recipient's MAC group and key, if the message uses MACs.
    ///
    /// Exactly one of the two fields being present is malformed.
    pub fn mac(&self) -> Result<Option<(u64, MacKey)>> {
        match (self.mac_group, &self.mac_key) {
            (Some(group), Some(key)) => {
                let key = MacKey::from_slice(key).map_err(|_| {
                    SaltpackError::MalformedFrame("key bundle MAC key size".into())
                })?;
                Ok(Some((group, key)))
            }
            (None, None) => Ok(None),
            _ => Err(SaltpackError::MalformedFrame(
                "key bundle has mac_group without mac_key or vice versa".into(),
            )),
        }
    }
}

impl std::fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBundle")
            .field("encryption_key", &"[REDACTED]")
            .field("mac_group", &self.mac_group)
            .field("mac_key", &self.mac_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// One encrypted chunk and its per-group MACs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    /// One 16-byte MAC per recipient group, in group order. Empty for
    /// single-group messages.
    pub macs: Vec<ByteBuf>,
    /// `tag (16) || ciphertext`
    #[serde(with = "serde_bytes")]
    pub chunk: Vec<u8>,
}
