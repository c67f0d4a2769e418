//! Key types, key generation, and per-recipient key bundle wrapping
//!
//! Wrapped bundle format (sender-authenticated box):
//! ```text
//! box key = HKDF-SHA256(salt = sender_pk || recipient_pk, ikm = X25519(sk, pk))
//! [16 bytes: Poly1305 tag][N bytes: XChaCha20 ciphertext of the CBOR KeyBundle]
//! nonce = nonce_prefix || recipient_index (see `nonce`)
//! ```
//!
//! Both sides reach the same box key from their own secret key and the other
//! side's public key, so a bundle only opens against the true sender's key.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use x25519_dalek::{x25519, X25519_BASEPOINT_BYTES};
use zeroize::{Zeroize, Zeroizing};

use crate::chunk::{secretbox_open, secretbox_seal};
use crate::error::{Result, SaltpackError};
use crate::format::KeyBundle;
use crate::frame::{from_cbor, to_cbor};
use crate::{KEY_SIZE, MAC_KEY_SIZE, NONCE_SIZE};

const BOX_KDF_INFO: &[u8] = b"saltpack key bundle box v1";

/// An X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            SaltpackError::InvalidKey(format!(
                "public key is {} bytes, expected {KEY_SIZE}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| SaltpackError::InvalidKey(format!("public key hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// An X25519 private key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            SaltpackError::InvalidKey(format!(
                "secret key is {} bytes, expected {KEY_SIZE}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s.trim())
            .map_err(|_| SaltpackError::InvalidKey("secret key is not valid hex".into()))?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Derive the public key (X25519 base-point multiplication).
    pub fn public_key(&self) -> PublicKey {
        PublicKey(x25519(self.bytes, X25519_BASEPOINT_BYTES))
    }

    /// X25519 with `their_public`. `None` for a low-order point (all-zero output).
    fn diffie_hellman(&self, their_public: &PublicKey) -> Option<Zeroizing<[u8; KEY_SIZE]>> {
        let shared = Zeroizing::new(x25519(self.bytes, their_public.0));
        if bool::from(shared.as_slice().ct_eq(&[0u8; KEY_SIZE])) {
            None
        } else {
            Some(shared)
        }
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The per-message 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| SaltpackError::InvalidKey("encryption key size".into()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A per-group 128-bit HMAC key. Zeroized on drop.
#[derive(Clone)]
pub struct MacKey {
    bytes: [u8; MAC_KEY_SIZE],
}

impl MacKey {
    pub fn from_bytes(bytes: [u8; MAC_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; MAC_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| SaltpackError::InvalidKey("MAC key size".into()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; MAC_KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MacKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random X25519 private key.
pub fn generate_secret_key() -> SecretKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    SecretKey::from_bytes(bytes)
}

/// Generate a random 256-bit message encryption key.
pub fn generate_encryption_key() -> EncryptionKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    EncryptionKey::from_bytes(bytes)
}

/// Generate a random 128-bit MAC key.
pub fn generate_mac_key() -> MacKey {
    let mut bytes = [0u8; MAC_KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    MacKey::from_bytes(bytes)
}

fn box_key(
    shared: &[u8; KEY_SIZE],
    sender: &PublicKey,
    recipient: &PublicKey,
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let mut salt = [0u8; 2 * KEY_SIZE];
    salt[..KEY_SIZE].copy_from_slice(sender.as_bytes());
    salt[KEY_SIZE..].copy_from_slice(recipient.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(BOX_KDF_INFO, key.as_mut())
        .map_err(|e| SaltpackError::InvalidKey(format!("box key derivation: {e}")))?;
    Ok(key)
}

/// Box `bundle` from `sender` to `recipient` under `nonce`.
pub fn wrap_key_bundle(
    sender: &SecretKey,
    recipient: &PublicKey,
    nonce: &[u8; NONCE_SIZE],
    bundle: &KeyBundle,
) -> Result<Vec<u8>> {
    let shared = sender.diffie_hellman(recipient).ok_or_else(|| {
        SaltpackError::InvalidKey(format!("recipient {} is a low-order point", recipient.to_hex()))
    })?;
    let key = box_key(&shared, &sender.public_key(), recipient)?;

    let packed = Zeroizing::new(to_cbor(bundle)?);
    secretbox_seal(&key, nonce, &packed)
}

/// Open a bundle boxed by `sender` for `recipient`.
///
/// A wrong key, wrong nonce, or modified ciphertext all surface as
/// `AuthenticationFailure`.
pub fn unwrap_key_bundle(
    recipient: &SecretKey,
    sender: &PublicKey,
    nonce: &[u8; NONCE_SIZE],
    wrapped: &[u8],
) -> Result<KeyBundle> {
    let shared = recipient
        .diffie_hellman(sender)
        .ok_or(SaltpackError::AuthenticationFailure("sender key is a low-order point"))?;
    let key = box_key(&shared, sender, &recipient.public_key())?;

    let packed = secretbox_open(&key, nonce, wrapped)
        .map(Zeroizing::new)
        .ok_or(SaltpackError::AuthenticationFailure("key bundle box did not open"))?;
    from_cbor(&packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation_is_random() {
        let k1 = generate_encryption_key();
        let k2 = generate_encryption_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");

        let m1 = generate_mac_key();
        let m2 = generate_mac_key();
        assert_ne!(m1.as_bytes(), m2.as_bytes());
    }

    #[test]
    fn test_public_key_derivation_is_deterministic() {
        let sk = SecretKey::from_bytes([0xAA; KEY_SIZE]);
        assert_eq!(sk.public_key(), sk.public_key());
        assert_ne!(sk.public_key(), SecretKey::from_bytes([0xBB; KEY_SIZE]).public_key());
    }

    #[test]
    fn test_x25519_base_point_vector() {
        // RFC 7748 section 6.1, Alice's key pair
        let sk = SecretKey::from_hex(
            "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a",
        )
        .unwrap();
        assert_eq!(
            sk.public_key().to_hex(),
            "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
        );
    }

    #[test]
    fn test_hex_roundtrip_and_errors() {
        let pk = generate_secret_key().public_key();
        assert_eq!(PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);

        assert!(matches!(
            PublicKey::from_hex("abcd"),
            Err(SaltpackError::InvalidKey(_))
        ));
        assert!(matches!(
            SecretKey::from_hex("zz"),
            Err(SaltpackError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let rendered = format!("{:?}", SecretKey::from_bytes([7; KEY_SIZE]));
        assert!(rendered.contains("REDACTED"));
        let rendered = format!("{:?}", generate_mac_key());
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_bundle_wrap_unwrap_roundtrip() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();
        let nonce = [3u8; NONCE_SIZE];
        let mac_key = generate_mac_key();
        let bundle = KeyBundle::new(&generate_encryption_key(), Some((1, &mac_key)));

        let wrapped =
            wrap_key_bundle(&sender, &recipient.public_key(), &nonce, &bundle).unwrap();
        let opened =
            unwrap_key_bundle(&recipient, &sender.public_key(), &nonce, &wrapped).unwrap();

        assert_eq!(opened, bundle);
    }

    #[test]
    fn test_bundle_unwrap_wrong_recipient() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();
        let other = generate_secret_key();
        let nonce = [0u8; NONCE_SIZE];
        let bundle = KeyBundle::new(&generate_encryption_key(), None);

        let wrapped =
            wrap_key_bundle(&sender, &recipient.public_key(), &nonce, &bundle).unwrap();
        let result = unwrap_key_bundle(&other, &sender.public_key(), &nonce, &wrapped);

        assert!(matches!(result, Err(SaltpackError::AuthenticationFailure(_))));
    }

    #[test]
    fn test_bundle_unwrap_wrong_nonce() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();
        let bundle = KeyBundle::new(&generate_encryption_key(), None);

        let wrapped = wrap_key_bundle(
            &sender,
            &recipient.public_key(),
            &[0u8; NONCE_SIZE],
            &bundle,
        )
        .unwrap();
        let result = unwrap_key_bundle(
            &recipient,
            &sender.public_key(),
            &[1u8; NONCE_SIZE],
            &wrapped,
        );

        assert!(matches!(result, Err(SaltpackError::AuthenticationFailure(_))));
    }

    #[test]
    fn test_box_key_is_symmetric() {
        let a = generate_secret_key();
        let b = generate_secret_key();

        let from_a = a.diffie_hellman(&b.public_key()).unwrap();
        let from_b = b.diffie_hellman(&a.public_key()).unwrap();
        assert_eq!(*from_a, *from_b);

        let key_a = box_key(&from_a, &a.public_key(), &b.public_key()).unwrap();
        let key_b = box_key(&from_b, &a.public_key(), &b.public_key()).unwrap();
        assert_eq!(*key_a, *key_b);

        // direction matters: b -> a uses a different box key
        let reversed = box_key(&from_b, &b.public_key(), &a.public_key()).unwrap();
        assert_ne!(*key_a, *reversed);
    }

    #[test]
    fn test_low_order_recipient_rejected() {
        let sender = generate_secret_key();
        let bundle = KeyBundle::new(&generate_encryption_key(), None);
        let result = wrap_key_bundle(
            &sender,
            &PublicKey::from_bytes([0; KEY_SIZE]),
            &[0u8; NONCE_SIZE],
            &bundle,
        );
        assert!(matches!(result, Err(SaltpackError::InvalidKey(_))));
    }

    #[test]
    fn test_wrapped_bundle_layout() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();
        let bundle = KeyBundle::new(&generate_encryption_key(), None);

        let wrapped =
            wrap_key_bundle(&sender, &recipient.public_key(), &[0u8; NONCE_SIZE], &bundle).unwrap();
        assert_eq!(wrapped.len(), crate::TAG_SIZE + to_cbor(&bundle).unwrap().len());
    }

    #[test]
    fn test_bundle_unwrap_wrong_sender() {
        let sender = generate_secret_key();
        let impostor = generate_secret_key();
        let recipient = generate_secret_key();
        let nonce = [9u8; NONCE_SIZE];
        let bundle = KeyBundle::new(&generate_encryption_key(), None);

        let wrapped =
            wrap_key_bundle(&sender, &recipient.public_key(), &nonce, &bundle).unwrap();
        let result = unwrap_key_bundle(&recipient, &impostor.public_key(), &nonce, &wrapped);

        assert!(matches!(result, Err(SaltpackError::AuthenticationFailure(_))));
    }
}
