//! Length-prefixed CBOR framing
//!
//! Frame format:
//! ```text
//! [CBOR unsigned integer: body length][body: CBOR-encoded record]
//! ```
//!
//! The length prefix is itself a CBOR item, so its width varies (1 to 9 bytes)
//! and is parsed with the same decoder as the body. A reader never consumes
//! bytes past the end of the frame it returns.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, SaltpackError};

/// Serialize `value` to CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| SaltpackError::MalformedFrame(format!("CBOR encode failed: {e}")))?;
    Ok(buf)
}

/// Deserialize exactly one CBOR item from `data`. Trailing bytes are rejected.
pub fn from_cbor<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    let mut reader = data;
    let value = ciborium::from_reader(&mut reader)
        .map_err(|e| SaltpackError::MalformedFrame(format!("CBOR decode failed: {e}")))?;
    if !reader.is_empty() {
        return Err(SaltpackError::MalformedFrame(format!(
            "{} trailing bytes after record",
            reader.len()
        )));
    }
    Ok(value)
}

/// Append one frame holding `value` to `out`.
pub fn write_frame<T: Serialize>(out: &mut Vec<u8>, value: &T) -> Result<()> {
    let body = to_cbor(value)?;
    ciborium::into_writer(&(body.len() as u64), &mut *out)
        .map_err(|e| SaltpackError::MalformedFrame(format!("CBOR encode failed: {e}")))?;
    out.extend_from_slice(&body);
    Ok(())
}

/// Sequential frame reader over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    remaining: &'a [u8],
    frames_read: u64,
}

impl<'a> FrameReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            remaining: input,
            frames_read: 0,
        }
    }

    /// Read and decode the next frame.
    pub fn read_frame<T: DeserializeOwned>(&mut self) -> Result<T> {
        if self.remaining.is_empty() {
            return Err(SaltpackError::MalformedFrame(format!(
                "stream ended before frame {}",
                self.frames_read
            )));
        }

        let declared: u64 = ciborium::from_reader(&mut self.remaining).map_err(|e| {
            SaltpackError::MalformedFrame(format!(
                "frame {}: bad length prefix: {e}",
                self.frames_read
            ))
        })?;

        let len = usize::try_from(declared)
            .ok()
            .filter(|&len| len <= self.remaining.len())
            .ok_or_else(|| {
                SaltpackError::MalformedFrame(format!(
                    "frame {}: declares {declared} bytes, {} remain",
                    self.frames_read,
                    self.remaining.len()
                ))
            })?;

        let (body, rest) = self.remaining.split_at(len);
        self.remaining = rest;
        self.frames_read += 1;
        from_cbor(body)
    }

    /// Number of frames successfully split off so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        n: u64,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    }

    fn record(n: u64, len: usize) -> Record {
        Record {
            n,
            data: vec![n as u8; len],
        }
    }

    #[test]
    fn test_frames_read_back_in_order() {
        let mut out = Vec::new();
        write_frame(&mut out, &record(1, 3)).unwrap();
        write_frame(&mut out, &record(2, 300)).unwrap();
        write_frame(&mut out, &record(3, 0)).unwrap();

        let mut reader = FrameReader::new(&out);
        assert_eq!(reader.read_frame::<Record>().unwrap(), record(1, 3));
        assert_eq!(reader.read_frame::<Record>().unwrap(), record(2, 300));
        assert_eq!(reader.read_frame::<Record>().unwrap(), record(3, 0));
        assert_eq!(reader.frames_read(), 3);
        assert!(reader.remaining().is_empty());
    }

    #[test]
    fn test_length_prefix_is_cbor_uint() {
        let mut out = Vec::new();
        write_frame(&mut out, &record(7, 40)).unwrap();

        let body = to_cbor(&record(7, 40)).unwrap();
        // body is longer than 23 bytes, so the prefix is 0x18 <len>
        assert_eq!(out[0], 0x18);
        assert_eq!(out[1] as usize, body.len());
        assert_eq!(&out[2..], &body[..]);
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = FrameReader::new(&[]);
        let result = reader.read_frame::<Record>();
        assert!(matches!(result, Err(SaltpackError::MalformedFrame(_))));
    }

    #[test]
    fn test_truncated_body() {
        let mut out = Vec::new();
        write_frame(&mut out, &record(1, 64)).unwrap();
        out.truncate(out.len() - 1);

        let result = FrameReader::new(&out).read_frame::<Record>();
        assert!(matches!(result, Err(SaltpackError::MalformedFrame(_))));
    }

    #[test]
    fn test_truncated_length_prefix() {
        // 0x19 announces a two-byte length but only one byte follows
        let result = FrameReader::new(&[0x19, 0x01]).read_frame::<Record>();
        assert!(matches!(result, Err(SaltpackError::MalformedFrame(_))));
    }

    #[test]
    fn test_non_integer_length_prefix() {
        let mut out = to_cbor(&"not a length").unwrap();
        out.extend_from_slice(&to_cbor(&record(1, 1)).unwrap());

        let result = FrameReader::new(&out).read_frame::<Record>();
        assert!(matches!(result, Err(SaltpackError::MalformedFrame(_))));
    }

    #[test]
    fn test_body_with_trailing_bytes() {
        let mut body = to_cbor(&record(1, 4)).unwrap();
        body.push(0x00);
        let mut out = Vec::new();
        ciborium::into_writer(&(body.len() as u64), &mut out).unwrap();
        out.extend_from_slice(&body);

        let result = FrameReader::new(&out).read_frame::<Record>();
        assert!(matches!(result, Err(SaltpackError::MalformedFrame(_))));
    }

    #[test]
    fn test_body_of_wrong_shape() {
        let mut out = Vec::new();
        write_frame(&mut out, &vec![1u64, 2, 3]).unwrap();

        let result = FrameReader::new(&out).read_frame::<Record>();
        assert!(matches!(result, Err(SaltpackError::MalformedFrame(_))));
    }

    #[test]
    fn test_huge_declared_length() {
        let mut out = Vec::new();
        ciborium::into_writer(&u64::MAX, &mut out).unwrap();
        out.extend_from_slice(&[0u8; 8]);

        let result = FrameReader::new(&out).read_frame::<Record>();
        assert!(matches!(result, Err(SaltpackError::MalformedFrame(_))));
    }
}
