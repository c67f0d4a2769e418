//! Base62 ASCII armor
//!
//! Binary input is cut into 32-byte blocks, each written as a fixed-width
//! 43-character base62 number (`0-9A-Za-z`). A shorter final block uses the
//! fewest characters that can hold it. The encoded text is then split into
//! words and lines:
//!
//! ```text
//! BEGIN SALTPACK ENCRYPTED MESSAGE.
//! kiPgBwdlv6bV9N8 dSkCbjKrku4ZvQb WrMf3rAZyV3NLQ3 ...
//! END SALTPACK ENCRYPTED MESSAGE.
//! ```

use crate::error::{Result, SaltpackError};

pub const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Input bytes per full armor block.
pub const BLOCK_BYTES: usize = 32;

/// Characters per full armor block.
pub const BLOCK_CHARS: usize = 43;

/// Word and line layout of armored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmorOptions {
    pub word_size: usize,
    pub words_per_line: usize,
    /// Omit the BEGIN/END framing.
    pub raw: bool,
}

impl Default for ArmorOptions {
    fn default() -> Self {
        Self {
            word_size: 15,
            words_per_line: 5,
            raw: false,
        }
    }
}

/// Largest `n` with `256^n <= alphabet_size^block_size`.
pub fn bytes_per_block(alphabet_size: u32, block_size: usize) -> usize {
    (f64::from(alphabet_size).log2() / 8.0 * block_size as f64).floor() as usize
}

/// Block sizes below `max_block_size` whose bytes-per-char efficiency beats
/// every smaller size, as `(chars, bytes, efficiency)`.
///
/// Sizes too small to carry a single byte never appear.
pub fn efficient_block_sizes(alphabet_size: u32, max_block_size: usize) -> Vec<(usize, usize, f64)> {
    let mut out = Vec::new();
    let mut best = 0.0;
    for block_size in 1..max_block_size {
        let bytes = bytes_per_block(alphabet_size, block_size);
        let efficiency = bytes as f64 / block_size as f64;
        if efficiency > best {
            out.push((block_size, bytes, efficiency));
            best = efficiency;
        }
    }
    out
}

/// Fewest base62 characters that can hold `len` bytes.
fn chars_for_bytes(len: usize) -> usize {
    (1..)
        .find(|&chars| bytes_per_block(62, chars) >= len)
        .unwrap_or(BLOCK_CHARS)
}

fn digit_value(c: u8) -> Result<u32> {
    let value = match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'Z' => c - b'A' + 10,
        b'a'..=b'z' => c - b'a' + 36,
        _ => {
            return Err(SaltpackError::Armor(format!(
                "invalid base62 character {:?}",
                char::from(c)
            )))
        }
    };
    Ok(u32::from(value))
}

/// Encode one block of at most 32 bytes as a fixed-width base62 number.
///
/// The width depends only on the block length: it is the fewest characters
/// whose `bytes_per_block` covers `block.len()`. The value never shortens it,
/// so leading zero bytes are kept.
pub fn encode_block(block: &[u8]) -> String {
    let width = chars_for_bytes(block.len());
    let mut num = block.to_vec();
    let mut digits = Vec::with_capacity(width);

    for _ in 0..width {
        let mut rem = 0u32;
        for byte in num.iter_mut() {
            let acc = (rem << 8) | u32::from(*byte);
            *byte = (acc / 62) as u8;
            rem = acc % 62;
        }
        digits.push(BASE62_ALPHABET[rem as usize]);
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

/// Decode one base62 block back into its bytes.
pub fn decode_block(block: &[u8]) -> Result<Vec<u8>> {
    let len = bytes_per_block(62, block.len());
    if len == 0 || chars_for_bytes(len) != block.len() {
        return Err(SaltpackError::Armor(format!(
            "{} characters is not a valid block length",
            block.len()
        )));
    }

    let mut out = vec![0u8; len];
    for &c in block {
        let mut carry = digit_value(c)?;
        for byte in out.iter_mut().rev() {
            let acc = u32::from(*byte) * 62 + carry;
            *byte = acc as u8;
            carry = acc >> 8;
        }
        if carry != 0 {
            return Err(SaltpackError::Armor(format!(
                "block value overflows {len} bytes"
            )));
        }
    }
    Ok(out)
}

/// Base62-encode `data` with no whitespace.
pub fn encode(data: &[u8]) -> String {
    data.chunks(BLOCK_BYTES).map(encode_block).collect()
}

/// Inverse of [`encode`]. Whitespace must already be removed.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * BLOCK_BYTES / BLOCK_CHARS + 1);
    for block in text.as_bytes().chunks(BLOCK_CHARS) {
        out.extend_from_slice(&decode_block(block)?);
    }
    Ok(out)
}

/// Split `text` into space-separated words, `words_per_line` words per line.
pub fn block(text: &str, word_size: usize, words_per_line: usize) -> String {
    let word_size = word_size.max(1);
    let words_per_line = words_per_line.max(1);
    let chars: Vec<char> = text.chars().collect();

    chars
        .chunks(word_size)
        .map(|word| word.iter().collect::<String>())
        .collect::<Vec<_>>()
        .chunks(words_per_line)
        .map(|line| line.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Undo [`block`] by dropping all whitespace.
pub fn unblock(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Armor `data` as `kind` (e.g. `"ENCRYPTED MESSAGE"`).
pub fn armor(data: &[u8], kind: &str, options: &ArmorOptions) -> String {
    let body = block(&encode(data), options.word_size, options.words_per_line);
    if options.raw {
        return body;
    }
    format!("BEGIN SALTPACK {kind}.\n{body}\nEND SALTPACK {kind}.\n")
}

/// Strip armor framing (unless `raw`) and whitespace, then decode.
pub fn dearmor(text: &str, raw: bool) -> Result<Vec<u8>> {
    if raw {
        return decode(&unblock(text));
    }

    let text = text.trim();
    let (header, rest) = text
        .split_once('.')
        .ok_or_else(|| SaltpackError::Armor("missing armor header".into()))?;
    let kind = header
        .trim()
        .strip_prefix("BEGIN SALTPACK ")
        .ok_or_else(|| SaltpackError::Armor(format!("bad armor header {header:?}")))?;

    let rest = rest
        .strip_suffix('.')
        .ok_or_else(|| SaltpackError::Armor("missing armor footer".into()))?;
    let (body, footer_kind) = rest
        .rsplit_once("END SALTPACK ")
        .ok_or_else(|| SaltpackError::Armor("missing armor footer".into()))?;
    if footer_kind.trim() != kind {
        return Err(SaltpackError::Armor(format!(
            "armor header {kind:?} does not match footer {:?}",
            footer_kind.trim()
        )));
    }

    tracing::trace!(kind, body_len = body.len(), "dearmoring");
    decode(&unblock(body))
}
