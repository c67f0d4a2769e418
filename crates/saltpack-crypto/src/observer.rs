//! Inspection hooks for the decode path.
//!
//! Observers only see what the decoder has already parsed or verified; they
//! cannot influence control flow. Secret key material is never passed in.

use crate::format::Header;

pub trait DecryptObserver {
    /// The header frame was parsed and its version accepted.
    fn on_header(&mut self, _header: &Header) {}

    /// This recipient's key bundle was unwrapped.
    fn on_key_bundle(&mut self, _recipient_index: u64, _mac_group: Option<u64>) {}

    /// A chunk passed MAC verification (if any) and decrypted.
    fn on_chunk(&mut self, _chunk_index: u64, _plaintext_len: usize) {}
}

/// Observer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DecryptObserver for NoopObserver {}

/// Emits each decode event as a `tracing` event at DEBUG level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DecryptObserver for TracingObserver {
    fn on_header(&mut self, header: &Header) {
        tracing::debug!(
            version = header.version,
            sender = %hex::encode(&header.sender_public_key),
            nonce = %hex::encode(&header.nonce_prefix),
            recipients = header.recipients.len(),
            "header"
        );
        for (index, entry) in header.recipients.iter().enumerate() {
            tracing::debug!(
                index,
                public_key = %hex::encode(entry.public_key()),
                wrapped_len = entry.wrapped_keys().len(),
                "recipient entry"
            );
        }
    }

    fn on_key_bundle(&mut self, recipient_index: u64, mac_group: Option<u64>) {
        tracing::debug!(recipient_index, ?mac_group, "key bundle unwrapped");
    }

    fn on_chunk(&mut self, chunk_index: u64, plaintext_len: usize) {
        tracing::debug!(chunk_index, plaintext_len, "chunk");
    }
}
