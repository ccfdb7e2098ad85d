//! Block framing: `uleb128(payload_length) || level_byte || codec_payload ||
//! crc32c(level_byte || codec_payload)`.
//!
//! `level_byte` is 0 for a data block and `1..=MAX_LEVEL` for an index block
//! at that level; `codec_payload` is whatever the active [`crate::codec`]
//! produced from the block's logical payload (`record::pack_data` /
//! `record::pack_index`). `payload_length` counts `level_byte ||
//! codec_payload` only — not the CRC.

use crate::crc::{crc32c, StreamingCrc32c};
use crate::error::{Error, ErrorKind};
use crate::varint::{read_uleb128_from, write_uleb128};
use std::io::{Read, Write};

/// Highest permitted index level. The root's level is always in `1..=MAX_LEVEL`.
pub const MAX_LEVEL: u8 = 63;

/// Level byte for a data block.
pub const DATA_LEVEL: u8 = 0;

/// A block as decoded from the stream: its level and the raw (decompressed)
/// logical payload bytes.
#[derive(Debug, Clone)]
pub struct Block {
    pub level: u8,
    pub payload: Vec<u8>,
}

/// Frame and write one block: compress `logical_payload` with `codec`,
/// write its frame, and return the total on-disk length (framing + CRC).
pub fn write_block<W: Write>(
    w: &mut W,
    level: u8,
    logical_payload: &[u8],
    codec: &dyn crate::codec::Codec,
) -> Result<u64, Error> {
    let codec_payload = codec.compress(logical_payload)?;
    write_block_compressed(w, level, &codec_payload)
}

/// Frame and write one block whose payload is already codec-compressed.
/// Used by the pipeline, which compresses off the writer thread and hands
/// the appender only the already-encoded bytes.
pub fn write_block_compressed<W: Write>(
    w: &mut W,
    level: u8,
    codec_payload: &[u8],
) -> Result<u64, Error> {
    let frame_len = 1 + codec_payload.len();
    let mut length_buf = Vec::new();
    write_uleb128(frame_len as u64, &mut length_buf);

    let mut crc = StreamingCrc32c::new();
    crc.update(&[level]);
    crc.update(codec_payload);
    let crc_value = crc.finalize();

    w.write_all(&length_buf).map_err(Error::from_io)?;
    w.write_all(&[level]).map_err(Error::from_io)?;
    w.write_all(codec_payload).map_err(Error::from_io)?;
    w.write_all(&crc_value.to_le_bytes())
        .map_err(Error::from_io)?;

    Ok((length_buf.len() + frame_len + 4) as u64)
}

/// Read one block frame, verify its CRC, and decompress its payload with
/// `codec`. Returns `Ok(None)` at a clean end-of-stream (zero bytes read
/// before the length varint); any other short read is `TruncatedFile`.
pub fn read_block<R: Read>(
    r: &mut R,
    codec: &dyn crate::codec::Codec,
) -> Result<Option<Block>, Error> {
    match read_block_raw(r)? {
        None => Ok(None),
        Some((level, codec_payload)) => {
            let payload = codec.decompress(&codec_payload)?;
            Ok(Some(Block { level, payload }))
        }
    }
}

/// Read one block frame and verify its CRC, without decompressing.
/// Returns the level byte and the raw (still codec-compressed) payload.
pub fn read_block_raw<R: Read>(r: &mut R) -> Result<Option<(u8, Vec<u8>)>, Error> {
    let frame_len = match peek_uleb128_or_eof(r)? {
        None => return Ok(None),
        Some(v) => v,
    };
    if frame_len < 1 {
        return Err(Error::new(
            ErrorKind::Framing,
            "block frame length shorter than the mandatory level byte",
        ));
    }

    let mut body = vec![0u8; frame_len as usize];
    r.read_exact(&mut body).map_err(Error::from_io)?;
    let level = body[0];
    let codec_payload = body[1..].to_vec();

    let mut crc_buf = [0u8; 4];
    r.read_exact(&mut crc_buf).map_err(Error::from_io)?;
    let stored_crc = u32::from_le_bytes(crc_buf);

    let mut crc = StreamingCrc32c::new();
    crc.update(&body);
    let computed = crc.finalize();
    if computed != stored_crc {
        return Err(Error::new(
            ErrorKind::Crc,
            format!("block CRC mismatch: stored {stored_crc:#010x}, computed {computed:#010x}"),
        ));
    }

    Ok(Some((level, codec_payload)))
}

/// Read a ULEB128 length, but treat a clean EOF on the very first byte as
/// "no more blocks" rather than a truncation error.
fn peek_uleb128_or_eof<R: Read>(r: &mut R) -> Result<Option<u64>, Error> {
    let mut first = [0u8; 1];
    match r.read(&mut first) {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) => return Err(Error::from_io(e)),
    }
    if first[0] & 0x80 == 0 {
        return Ok(Some(first[0] as u64));
    }
    let mut value: u64 = (first[0] & 0x7f) as u64;
    let mut shift: u32 = 7;
    loop {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte).map_err(Error::from_io)?;
        if shift >= 64 {
            return Err(Error::new(ErrorKind::Framing, "uleb128 value overflows u64"));
        }
        value |= ((byte[0] & 0x7f) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
    }
}

/// Compute the on-disk length a block would have, given its already
/// codec-compressed payload, without writing anything. Used by the
/// appender to record `child_length` before the write completes.
pub fn framed_length(codec_payload_len: usize) -> u64 {
    let frame_len = 1 + codec_payload_len;
    let mut length_buf = Vec::new();
    write_uleb128(frame_len as u64, &mut length_buf);
    (length_buf.len() + frame_len + 4) as u64
}

/// Standalone CRC check over a level byte + codec payload, exposed for the
/// validator (which reads raw bytes directly rather than going through
/// [`read_block`]).
pub fn verify_crc(level: u8, codec_payload: &[u8], stored_crc: u32) -> bool {
    let mut buf = Vec::with_capacity(1 + codec_payload.len());
    buf.push(level);
    buf.extend_from_slice(codec_payload);
    crc32c(&buf) == stored_crc
}
