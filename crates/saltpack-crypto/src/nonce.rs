//! Deterministic nonce derivation.
//!
//! ```text
//! recipient nonce = nonce_prefix (16 bytes, random per message) || recipient_index (8 bytes BE)
//! chunk nonce     = chunk_index (24 bytes BE)
//! ```
//!
//! Recipient nonces are used with the per-recipient box key, chunk nonces with
//! the message encryption key. Within each key the index is sequential from 0,
//! so no nonce repeats.

use rand::RngCore;

use crate::{NONCE_PREFIX_SIZE, NONCE_SIZE};

/// Random 16-byte prefix shared by every recipient nonce of one message.
pub type NoncePrefix = [u8; NONCE_PREFIX_SIZE];

/// Generate a fresh nonce prefix from the OS-seeded CSPRNG.
pub fn generate_nonce_prefix() -> NoncePrefix {
    let mut prefix = [0u8; NONCE_PREFIX_SIZE];
    rand::thread_rng().fill_bytes(&mut prefix);
    prefix
}

/// Nonce for boxing/unboxing the key bundle of the recipient at `recipient_index`.
pub fn recipient_nonce(prefix: &NoncePrefix, recipient_index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..NONCE_PREFIX_SIZE].copy_from_slice(prefix);
    nonce[NONCE_PREFIX_SIZE..].copy_from_slice(&recipient_index.to_be_bytes());
    nonce
}

/// Nonce for the chunk at `chunk_index`: the index as a 24-byte big-endian counter.
pub fn chunk_nonce(chunk_index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[NONCE_SIZE - 8..].copy_from_slice(&chunk_index.to_be_bytes());
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_recipient_nonce_layout() {
        let prefix = [0xAAu8; NONCE_PREFIX_SIZE];
        let nonce = recipient_nonce(&prefix, 0x0102);

        assert_eq!(&nonce[..16], &prefix);
        assert_eq!(&nonce[16..], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
    }

    #[test]
    fn test_chunk_nonce_layout() {
        assert_eq!(chunk_nonce(0), [0u8; NONCE_SIZE]);

        let nonce = chunk_nonce(258);
        assert_eq!(&nonce[..22], &[0u8; 22]);
        assert_eq!(&nonce[22..], &[1, 2]);
    }

    #[test]
    fn test_nonce_prefixes_are_random() {
        assert_ne!(generate_nonce_prefix(), generate_nonce_prefix());
    }

    proptest! {
        /// Distinct recipient indices under one prefix never share a nonce.
        #[test]
        fn recipient_nonces_are_unique(
            prefix in any::<[u8; NONCE_PREFIX_SIZE]>(),
            indices in proptest::collection::hash_set(any::<u64>(), 1..256),
        ) {
            let nonces: HashSet<_> = indices
                .iter()
                .map(|&i| recipient_nonce(&prefix, i))
                .collect();
            prop_assert_eq!(nonces.len(), indices.len());
        }

        /// Sequential recipient indices as the encoder assigns them.
        #[test]
        fn sequential_recipient_nonces_are_unique(
            prefix in any::<[u8; NONCE_PREFIX_SIZE]>(),
            count in 1u64..512,
        ) {
            let nonces: HashSet<_> = (0..count).map(|i| recipient_nonce(&prefix, i)).collect();
            prop_assert_eq!(nonces.len() as u64, count);
        }

        #[test]
        fn chunk_nonces_are_unique(
            indices in proptest::collection::hash_set(any::<u64>(), 1..256),
        ) {
            let nonces: HashSet<_> = indices.iter().map(|&i| chunk_nonce(i)).collect();
            prop_assert_eq!(nonces.len(), indices.len());
        }
    }
}
