//! Splits an incoming byte stream into records before they reach the
//! writer's producer, the way `ZSSWriter.from_file` does for its
//! terminator-separated mode.
//!
//! Two framings are supported:
//! - **Terminator**: records are separated by a single byte (`\n` by
//!   default); the stream is expected to end on a terminator, and the
//!   trailing empty record that would otherwise imply is never written.
//! - **Length-prefixed**: each record is `uleb128(len) || bytes`, with no
//!   terminator at all.

use crate::error::{Error, ErrorKind};
use crate::varint::try_read_uleb128_from;
use std::io::Read;

/// How to split a raw byte stream into records.
pub enum Framing {
    Terminator(u8),
    LengthPrefixed,
}

/// Reads records out of a byte stream one batch at a time, batching until
/// the packed size would cross `approx_block_size`. Used by the writer
/// façade's `add_file_contents`.
pub struct FramedReader<R: Read> {
    inner: R,
    framing: Framing,
    carry: Vec<u8>,
    eof: bool,
}

impl<R: Read> FramedReader<R> {
    pub fn new(inner: R, framing: Framing) -> Self {
        Self {
            inner,
            framing,
            carry: Vec::new(),
            eof: false,
        }
    }

    /// Pull records until the accumulated size reaches `approx_block_size`
    /// or the stream ends. Returns an empty vec only once the stream is
    /// exhausted and everything has been yielded.
    pub fn next_batch(&mut self, approx_block_size: usize) -> Result<Vec<Vec<u8>>, Error> {
        match self.framing {
            Framing::Terminator(sep) => self.next_batch_terminator(sep, approx_block_size),
            Framing::LengthPrefixed => self.next_batch_length_prefixed(approx_block_size),
        }
    }

    fn next_batch_terminator(&mut self, sep: u8, approx_block_size: usize) -> Result<Vec<Vec<u8>>, Error> {
        let mut records = Vec::new();
        let mut accumulated = 0usize;
        loop {
            if accumulated >= approx_block_size {
                return Ok(records);
            }
            if self.eof {
                return Ok(records);
            }
            let mut chunk = vec![0u8; approx_block_size.max(4096)];
            let n = self.inner.read(&mut chunk).map_err(Error::from_io)?;
            if n == 0 {
                self.eof = true;
                if !self.carry.is_empty() {
                    return Err(Error::new(
                        ErrorKind::Framing,
                        "terminator-framed stream did not end on a terminator",
                    ));
                }
                return Ok(records);
            }
            self.carry.extend_from_slice(&chunk[..n]);

            let mut start = 0;
            while let Some(rel_pos) = self.carry[start..].iter().position(|&b| b == sep) {
                let end = start + rel_pos;
                let record = self.carry[start..end].to_vec();
                accumulated += record.len();
                records.push(record);
                start = end + 1;
            }
            self.carry.drain(..start);

            if accumulated >= approx_block_size {
                return Ok(records);
            }
        }
    }

    fn next_batch_length_prefixed(&mut self, approx_block_size: usize) -> Result<Vec<Vec<u8>>, Error> {
        let mut records = Vec::new();
        let mut accumulated = 0usize;
        while accumulated < approx_block_size {
            if self.eof {
                break;
            }
            let len = match try_read_uleb128_from(&mut self.inner)? {
                Some(len) => len,
                None => {
                    self.eof = true;
                    break;
                }
            };
            let mut buf = vec![0u8; len as usize];
            self.inner.read_exact(&mut buf).map_err(Error::from_io)?;
            accumulated += buf.len();
            records.push(buf);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn terminator_framing_splits_on_separator() {
        let data = b"alpha\nbeta\ngamma\n".to_vec();
        let mut reader = FramedReader::new(Cursor::new(data), Framing::Terminator(b'\n'));
        let batch = reader.next_batch(1024).unwrap();
        assert_eq!(batch, vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()]);
        let next = reader.next_batch(1024).unwrap();
        assert!(next.is_empty());
    }

    #[test]
    fn terminator_framing_rejects_missing_trailing_separator() {
        let data = b"alpha\nbeta".to_vec();
        let mut reader = FramedReader::new(Cursor::new(data), Framing::Terminator(b'\n'));
        let err = reader.next_batch(1024).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Framing);
    }

    #[test]
    fn length_prefixed_framing_splits_on_uleb128_length() {
        use crate::varint::write_uleb128;
        let mut data = Vec::new();
        for rec in [b"alpha".as_slice(), b"beta".as_slice()] {
            write_uleb128(rec.len() as u64, &mut data);
            data.extend_from_slice(rec);
        }
        let mut reader = FramedReader::new(Cursor::new(data), Framing::LengthPrefixed);
        let batch = reader.next_batch(1024).unwrap();
        assert_eq!(batch, vec![b"alpha".to_vec(), b"beta".to_vec()]);
    }
}
