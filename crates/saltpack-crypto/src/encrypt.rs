//! Encoder: header construction, per-recipient key wrapping, chunked encryption.

use serde_bytes::ByteBuf;
use tracing::debug;

use crate::chunk::{authenticator, chunk_mac, seal_chunk};
use crate::error::{Result, SaltpackError};
use crate::format::{ChunkRecord, Header, KeyBundle, RecipientEntry, FORMAT_VERSION};
use crate::frame::write_frame;
use crate::keys::{
    generate_encryption_key, generate_mac_key, wrap_key_bundle, MacKey, PublicKey, SecretKey,
};
use crate::nonce::{generate_nonce_prefix, recipient_nonce};

/// Split `message` into `chunk_size` pieces followed by one empty terminator.
///
/// Yields `ceil(len / chunk_size) + 1` slices. `chunk_size` must be positive.
pub(crate) fn chunks_with_terminator(
    message: &[u8],
    chunk_size: usize,
) -> impl Iterator<Item = &[u8]> {
    message.chunks(chunk_size).chain(std::iter::once(&[][..]))
}

/// Encrypt `message` once for every recipient in `recipient_groups`.
///
/// Recipients are numbered in group order, then within-group order; that
/// number fixes each recipient's unwrap nonce. With more than one group, each
/// group gets its own MAC key and every chunk carries one MAC per group.
///
/// Returns the header frame followed by the chunk frames.
pub fn encrypt(
    sender: &SecretKey,
    recipient_groups: &[Vec<PublicKey>],
    message: &[u8],
    chunk_size: usize,
) -> Result<Vec<u8>> {
    if chunk_size == 0 {
        return Err(SaltpackError::InvalidChunkSize);
    }
    let recipient_count: usize = recipient_groups.iter().map(Vec::len).sum();
    if recipient_count == 0 {
        return Err(SaltpackError::NoRecipients);
    }

    let encryption_key = generate_encryption_key();
    // A single group gains nothing from MACs: the box already authenticates
    // the sender to each of its recipients.
    let need_macs = recipient_groups.len() > 1;
    let mac_keys: Vec<MacKey> = if need_macs {
        recipient_groups.iter().map(|_| generate_mac_key()).collect()
    } else {
        Vec::new()
    };
    let nonce_prefix = generate_nonce_prefix();

    let mut recipients = Vec::with_capacity(recipient_count);
    for (group_index, group) in recipient_groups.iter().enumerate() {
        let mac = mac_keys
            .get(group_index)
            .map(|mac_key| (group_index as u64, mac_key));
        let bundle = KeyBundle::new(&encryption_key, mac);

        for recipient in group {
            let nonce = recipient_nonce(&nonce_prefix, recipients.len() as u64);
            let wrapped = wrap_key_bundle(sender, recipient, &nonce, &bundle)?;
            recipients.push(RecipientEntry::new(recipient, wrapped));
        }
    }

    let header = Header {
        version: FORMAT_VERSION,
        sender_public_key: sender.public_key().as_bytes().to_vec(),
        nonce_prefix: nonce_prefix.to_vec(),
        recipients,
    };
    let mut output = Vec::with_capacity(message.len() + 1024);
    write_frame(&mut output, &header)?;

    let mut chunk_count = 0u64;
    for (chunk_index, chunk) in chunks_with_terminator(message, chunk_size).enumerate() {
        let chunk_index = chunk_index as u64;
        let sealed = seal_chunk(&encryption_key, chunk_index, chunk)?;

        let macs = if need_macs {
            let auth = authenticator(&sealed)?;
            mac_keys
                .iter()
                .map(|mac_key| Ok(ByteBuf::from(chunk_mac(mac_key, auth)?.to_vec())))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        write_frame(&mut output, &ChunkRecord { macs, chunk: sealed })?;
        chunk_count += 1;
    }

    debug!(
        recipients = recipient_count,
        groups = recipient_groups.len(),
        macs = need_macs,
        chunks = chunk_count,
        bytes = output.len(),
        "message encrypted"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameReader;
    use crate::keys::{generate_secret_key, unwrap_key_bundle};
    use crate::MAC_SIZE;

    fn chunk_frames(encoded: &[u8]) -> (Header, Vec<ChunkRecord>) {
        let mut reader = FrameReader::new(encoded);
        let header: Header = reader.read_frame().unwrap();
        let mut chunks = Vec::new();
        while !reader.remaining().is_empty() {
            chunks.push(reader.read_frame().unwrap());
        }
        (header, chunks)
    }

    #[test]
    fn test_chunks_with_terminator() {
        let chunks: Vec<&[u8]> = chunks_with_terminator(b"abcdefg", 3).collect();
        assert_eq!(chunks, vec![&b"abc"[..], b"def", b"g", b""]);

        let chunks: Vec<&[u8]> = chunks_with_terminator(b"abcdef", 3).collect();
        assert_eq!(chunks, vec![&b"abc"[..], b"def", b""]);

        let chunks: Vec<&[u8]> = chunks_with_terminator(b"", 3).collect();
        assert_eq!(chunks, vec![&b""[..]]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let sender = generate_secret_key();
        let groups = vec![vec![generate_secret_key().public_key()]];
        assert_eq!(
            encrypt(&sender, &groups, b"x", 0),
            Err(SaltpackError::InvalidChunkSize)
        );
    }

    #[test]
    fn test_no_recipients_rejected() {
        let sender = generate_secret_key();
        assert_eq!(
            encrypt(&sender, &[], b"x", 10),
            Err(SaltpackError::NoRecipients)
        );
        assert_eq!(
            encrypt(&sender, &[vec![], vec![]], b"x", 10),
            Err(SaltpackError::NoRecipients)
        );
    }

    #[test]
    fn test_header_layout() {
        let sender = generate_secret_key();
        let a = generate_secret_key().public_key();
        let b = generate_secret_key().public_key();
        let c = generate_secret_key().public_key();

        let encoded = encrypt(&sender, &[vec![a, b], vec![c]], b"payload", 4).unwrap();
        let (header, chunks) = chunk_frames(&encoded);

        assert_eq!(header.version, FORMAT_VERSION);
        assert_eq!(header.sender_public_key().unwrap(), sender.public_key());
        assert_eq!(header.nonce_prefix.len(), 16);
        let order: Vec<&[u8]> = header.recipients.iter().map(|r| r.public_key()).collect();
        assert_eq!(order, vec![&a.as_bytes()[..], &b.as_bytes()[..], &c.as_bytes()[..]]);

        // "payload" at 4 bytes per chunk: 2 data chunks + terminator
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert_eq!(chunk.macs.len(), 2);
            assert!(chunk.macs.iter().all(|m| m.len() == MAC_SIZE));
        }
    }

    #[test]
    fn test_single_group_has_no_macs() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();

        let encoded = encrypt(&sender, &[vec![recipient.public_key()]], b"hello", 2).unwrap();
        let (header, chunks) = chunk_frames(&encoded);

        assert!(chunks.iter().all(|c| c.macs.is_empty()));

        let nonce = recipient_nonce(&header.nonce_prefix().unwrap(), 0);
        let bundle = unwrap_key_bundle(
            &recipient,
            &sender.public_key(),
            &nonce,
            header.recipients[0].wrapped_keys(),
        )
        .unwrap();
        assert!(bundle.mac_group.is_none());
        assert!(bundle.mac_key.is_none());
    }

    #[test]
    fn test_recipient_indices_span_groups() {
        let sender = generate_secret_key();
        let keys: Vec<SecretKey> = (0..4).map(|_| generate_secret_key()).collect();
        let groups = vec![
            vec![keys[0].public_key()],
            vec![keys[1].public_key(), keys[2].public_key()],
            vec![keys[3].public_key()],
        ];

        let encoded = encrypt(&sender, &groups, b"", 8).unwrap();
        let (header, _) = chunk_frames(&encoded);
        let prefix = header.nonce_prefix().unwrap();

        let expected_groups = [0u64, 1, 1, 2];
        for (index, key) in keys.iter().enumerate() {
            let bundle = unwrap_key_bundle(
                key,
                &sender.public_key(),
                &recipient_nonce(&prefix, index as u64),
                header.recipients[index].wrapped_keys(),
            )
            .unwrap();
            assert_eq!(bundle.mac_group, Some(expected_groups[index]));
        }
    }

    #[test]
    fn test_fresh_keys_per_message() {
        let sender = generate_secret_key();
        let groups = vec![vec![generate_secret_key().public_key()]];

        let first = encrypt(&sender, &groups, b"same", 16).unwrap();
        let second = encrypt(&sender, &groups, b"same", 16).unwrap();
        assert_ne!(first, second);

        let (h1, c1) = chunk_frames(&first);
        let (h2, c2) = chunk_frames(&second);
        assert_ne!(h1.nonce_prefix, h2.nonce_prefix);
        assert_ne!(c1[0].chunk, c2[0].chunk);
    }
}
