//! Signing and armor composed with encryption, the way the CLI uses them.

use proptest::prelude::*;
use saltpack_crypto::armor::{block, unblock, BLOCK_CHARS};
use saltpack_crypto::{
    armor, dearmor, decrypt, efficient_block_sizes, encrypt, generate_secret_key,
    generate_signing_key, sign_attached, sign_detached, verify_attached, verify_detached,
    ArmorOptions, SaltpackError,
};

#[test]
fn armored_encrypted_message_roundtrip() {
    let sender = generate_secret_key();
    let recipient = generate_secret_key();
    let message = b"foo bar";

    let encoded = encrypt(&sender, &[vec![recipient.public_key()]], message, 1024).unwrap();
    let armored = armor(&encoded, "ENCRYPTED MESSAGE", &ArmorOptions::default());

    assert!(armored.is_ascii());
    let dearmored = dearmor(&armored, false).unwrap();
    assert_eq!(dearmored, encoded);
    assert_eq!(decrypt(&dearmored, &recipient).unwrap(), message);
}

#[test]
fn armored_attached_signature_roundtrip() {
    let key = generate_signing_key();
    let signed = sign_attached(&key, b"foo bar", 3).unwrap();
    let armored = armor(&signed, "SIGNED MESSAGE", &ArmorOptions::default());

    let (signer, message) = verify_attached(&dearmor(&armored, false).unwrap()).unwrap();
    assert_eq!(signer, key.verifying_key());
    assert_eq!(message, b"foo bar");
}

#[test]
fn armored_detached_signature_roundtrip() {
    let key = generate_signing_key();
    let options = ArmorOptions {
        raw: true,
        ..ArmorOptions::default()
    };
    let armored = armor(&sign_detached(&key, b"foo bar").unwrap(), "DETACHED SIGNATURE", &options);
    let signature = dearmor(&armored, true).unwrap();

    assert_eq!(verify_detached(b"foo bar", &signature).unwrap(), key.verifying_key());
    assert_eq!(
        verify_detached(b"foo bar!", &signature),
        Err(SaltpackError::BadSignature)
    );
}

#[test]
fn attached_signature_with_megabyte_chunks() {
    let key = generate_signing_key();
    let message: Vec<u8> = (0..3 * 1024 * 1024 + 5).map(|i| (i % 251) as u8).collect();
    let signed = sign_attached(&key, &message, 1024 * 1024).unwrap();

    let (signer, verified) = verify_attached(&signed).unwrap();
    assert_eq!(signer, key.verifying_key());
    assert_eq!(verified, message);
}

#[test]
fn signed_stream_is_not_an_encrypted_message() {
    let key = generate_signing_key();
    let signed = sign_attached(&key, b"foo", 8).unwrap();

    assert!(matches!(
        decrypt(&signed, &generate_secret_key()),
        Err(SaltpackError::MalformedFrame(_))
    ));
}

#[test]
fn efficient_sizes_include_full_block() {
    let sizes = efficient_block_sizes(62, 50);
    assert!(sizes.iter().any(|&(chars, bytes, _)| chars == BLOCK_CHARS && bytes == 32));

    let base64 = efficient_block_sizes(64, 50);
    assert!(base64.iter().any(|&(chars, bytes, _)| chars == 4 && bytes == 3));
}

proptest! {
    #[test]
    fn block_unblock_roundtrip(
        text in "[0-9A-Za-z]{0,300}",
        word_size in 1usize..30,
        words_per_line in 1usize..8,
    ) {
        let blocked = block(&text, word_size, words_per_line);
        prop_assert!(blocked.lines().all(|line| line.split(' ').count() <= words_per_line));
        prop_assert_eq!(unblock(&blocked), text);
    }
}
