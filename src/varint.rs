//! ULEB128 — canonical unsigned little-endian base-128 variable-length
//! integers.
//!
//! Encoding: 7 bits of value per byte, low-to-high, with the high bit set
//! on every byte except the last. Decoding rejects a buffer that ends
//! before the continuation bit says it should (a `Framing` error) but
//! otherwise accepts any valid encoding, including non-minimal ones.

use crate::error::{Error, ErrorKind};

/// Append the ULEB128 encoding of `value` to `out`.
pub fn write_uleb128(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Decode a ULEB128 value from the front of `buf`.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn read_uleb128(buf: &[u8]) -> Result<(u64, usize), Error> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        let payload = (byte & 0x7f) as u64;
        if shift >= 64 {
            return Err(Error::new(ErrorKind::Framing, "uleb128 value overflows u64"));
        }
        value |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(Error::new(
        ErrorKind::Framing,
        "uleb128 truncated: buffer ended mid-continuation",
    ))
}

/// Read a ULEB128 value from a `Read` stream, one byte at a time.
pub fn read_uleb128_from<R: std::io::Read>(r: &mut R) -> Result<u64, Error> {
    try_read_uleb128_from(r)?.ok_or_else(|| {
        Error::new(
            ErrorKind::Framing,
            "uleb128 truncated: stream ended mid-continuation",
        )
    })
}

/// Like [`read_uleb128_from`], but distinguishes a clean end-of-stream
/// (zero bytes available before the first byte of the value) from a
/// truncation in the middle of a multi-byte encoding. Used by callers that
/// need to tell "no more records" from "this stream is corrupt".
pub fn try_read_uleb128_from<R: std::io::Read>(r: &mut R) -> Result<Option<u64>, Error> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    let mut first = true;
    loop {
        let mut byte = [0u8; 1];
        match r.read_exact(&mut byte) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                if first {
                    return Ok(None);
                }
                return Err(Error::new(
                    ErrorKind::Framing,
                    "uleb128 truncated: stream ended mid-continuation",
                ));
            }
            Err(e) => return Err(Error::from_io(e)),
        }
        first = false;
        let payload = (byte[0] & 0x7f) as u64;
        if shift >= 64 {
            return Err(Error::new(ErrorKind::Framing, "uleb128 value overflows u64"));
        }
        value |= payload << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
    }
}
