//! Record packer — encodes the two logical payload shapes a block can hold.
//!
//! A data block's logical payload is a run of length-prefixed records; an
//! index block's is a run of `(key, child_offset, child_length)` triples.
//! Both are plain byte sequences — compression is applied afterward, by the
//! [`crate::codec`] the block picked.

use crate::error::Error;
use crate::varint::{read_uleb128, write_uleb128};

/// Encode a data block's logical payload: `uleb128(len) || bytes` per record,
/// concatenated in the order given. Callers are responsible for the
/// non-decreasing order invariant; this function does not sort or check it.
///
/// `hint` is an estimated total output size, used only to preallocate.
pub fn pack_data<I, B>(records: I, hint: usize) -> Vec<u8>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut out = Vec::with_capacity(hint);
    for record in records {
        let record = record.as_ref();
        write_uleb128(record.len() as u64, &mut out);
        out.extend_from_slice(record);
    }
    out
}

/// Decode a data block's logical payload back into its records.
pub fn unpack_data(payload: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (len, consumed) = read_uleb128(&payload[pos..])?;
        pos += consumed;
        let len = len as usize;
        let end = pos + len;
        if end > payload.len() {
            return Err(Error::new(
                crate::error::ErrorKind::Framing,
                "data record length runs past end of payload",
            ));
        }
        records.push(payload[pos..end].to_vec());
        pos = end;
    }
    Ok(records)
}

/// One decoded index entry: the stored lower-bound key plus the child
/// block's on-disk location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Vec<u8>,
    pub child_offset: u64,
    pub child_length: u64,
}

/// Encode an index block's logical payload: `uleb128(key_len) || key ||
/// uleb128(child_offset) || uleb128(child_length)` per entry.
///
/// `keys`, `offsets`, and `lengths` must be the same length and non-empty;
/// this is an appender-internal invariant, not something the caller can get
/// wrong from untrusted input, so it panics rather than returning `Error`.
pub fn pack_index<K>(keys: &[K], offsets: &[u64], lengths: &[u64], hint: usize) -> Vec<u8>
where
    K: AsRef<[u8]>,
{
    assert!(!keys.is_empty(), "pack_index: empty entry list");
    assert_eq!(keys.len(), offsets.len());
    assert_eq!(keys.len(), lengths.len());

    let mut out = Vec::with_capacity(hint);
    for i in 0..keys.len() {
        let key = keys[i].as_ref();
        write_uleb128(key.len() as u64, &mut out);
        out.extend_from_slice(key);
        write_uleb128(offsets[i], &mut out);
        write_uleb128(lengths[i], &mut out);
    }
    out
}

/// Decode an index block's logical payload back into its entries.
pub fn unpack_index(payload: &[u8]) -> Result<Vec<IndexEntry>, Error> {
    let mut entries = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (key_len, consumed) = read_uleb128(&payload[pos..])?;
        pos += consumed;
        let key_len = key_len as usize;
        let key_end = pos + key_len;
        if key_end > payload.len() {
            return Err(Error::new(
                crate::error::ErrorKind::Framing,
                "index key length runs past end of payload",
            ));
        }
        let key = payload[pos..key_end].to_vec();
        pos = key_end;

        let (child_offset, consumed) = read_uleb128(&payload[pos..])?;
        pos += consumed;
        let (child_length, consumed) = read_uleb128(&payload[pos..])?;
        pos += consumed;

        entries.push(IndexEntry {
            key,
            child_offset,
            child_length,
        });
    }
    Ok(entries)
}
