//! Decoder: header parsing, recipient lookup, and the chunk loop.
//!
//! Each chunk moves through `AwaitingChunk -> Verifying -> Decrypting` and
//! then back to `AwaitingChunk`, or to `Done` on the empty terminator. Any
//! error ends the loop and the partial plaintext is zeroized.

use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::chunk::{authenticator, open_chunk, verify_chunk_mac};
use crate::error::{Result, SaltpackError};
use crate::format::{ChunkRecord, Header, KeyBundle, FORMAT_VERSION};
use crate::frame::FrameReader;
use crate::keys::{unwrap_key_bundle, EncryptionKey, MacKey, SecretKey};
use crate::nonce::recipient_nonce;
use crate::observer::{DecryptObserver, NoopObserver};

enum ChunkState {
    AwaitingChunk,
    Verifying(ChunkRecord),
    Decrypting(ChunkRecord),
    Done,
}

/// Decrypt `input` with `recipient`'s private key.
///
/// Bytes after the terminator chunk are ignored.
pub fn decrypt(input: &[u8], recipient: &SecretKey) -> Result<Vec<u8>> {
    decrypt_with_observer(input, recipient, &mut NoopObserver)
}

/// Like [`decrypt`], reporting each parsed step to `observer`.
pub fn decrypt_with_observer<O: DecryptObserver + ?Sized>(
    input: &[u8],
    recipient: &SecretKey,
    observer: &mut O,
) -> Result<Vec<u8>> {
    let mut reader = FrameReader::new(input);

    let header: Header = reader.read_frame()?;
    if header.version != FORMAT_VERSION {
        return Err(SaltpackError::UnsupportedVersion(header.version));
    }
    let sender = header.sender_public_key()?;
    let nonce_prefix = header.nonce_prefix()?;
    observer.on_header(&header);

    let (recipient_index, entry) = header
        .find_recipient(&recipient.public_key())
        .ok_or(SaltpackError::RecipientNotFound)?;

    let nonce = recipient_nonce(&nonce_prefix, recipient_index);
    let bundle: KeyBundle =
        unwrap_key_bundle(recipient, &sender, &nonce, entry.wrapped_keys())?;
    let encryption_key = bundle.encryption_key()?;
    let mac = bundle.mac()?;
    observer.on_key_bundle(recipient_index, mac.as_ref().map(|(group, _)| *group));
    debug!(
        recipient_index,
        recipients = header.recipients.len(),
        macs = mac.is_some(),
        "key bundle opened"
    );

    let mut output = Zeroizing::new(Vec::with_capacity(input.len()));
    let mut chunk_index = 0u64;
    let mut state = ChunkState::AwaitingChunk;

    loop {
        state = match state {
            ChunkState::AwaitingChunk => ChunkState::Verifying(reader.read_frame()?),
            ChunkState::Verifying(record) => {
                if let Some((group, mac_key)) = &mac {
                    check_mac(&record, chunk_index, *group, mac_key)?;
                }
                ChunkState::Decrypting(record)
            }
            ChunkState::Decrypting(record) => {
                let plaintext = decrypt_record(&encryption_key, chunk_index, &record)?;
                observer.on_chunk(chunk_index, plaintext.len());
                trace!(chunk_index, len = plaintext.len(), "chunk opened");

                if plaintext.is_empty() {
                    ChunkState::Done
                } else {
                    output.extend_from_slice(&plaintext);
                    chunk_index += 1;
                    ChunkState::AwaitingChunk
                }
            }
            ChunkState::Done => break,
        };
    }

    debug!(
        chunks = chunk_index + 1,
        bytes = output.len(),
        trailing = reader.remaining().len(),
        "message decrypted"
    );
    Ok(std::mem::take(&mut *output))
}

fn check_mac(record: &ChunkRecord, chunk_index: u64, group: u64, mac_key: &MacKey) -> Result<()> {
    let expected = usize::try_from(group)
        .ok()
        .and_then(|slot| record.macs.get(slot))
        .ok_or(SaltpackError::MacMismatch { chunk_index })?;

    let auth = authenticator(&record.chunk)?;
    if verify_chunk_mac(mac_key, auth, expected)? {
        Ok(())
    } else {
        Err(SaltpackError::MacMismatch { chunk_index })
    }
}

fn decrypt_record(
    key: &EncryptionKey,
    chunk_index: u64,
    record: &ChunkRecord,
) -> Result<Zeroizing<Vec<u8>>> {
    open_chunk(key, chunk_index, &record.chunk).map(Zeroizing::new)
}
