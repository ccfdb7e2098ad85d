//! Validator: opens a file, re-derives the header, then performs a
//! recursive descent from the root checking level consistency, within-block
//! order, and index key bounds, followed by a linear scan of the block
//! stream checking that every block is referenced exactly once and the
//! stream ends cleanly.

use crate::block::{read_block_raw, verify_crc};
use crate::codec::Codec;
use crate::error::{Error, ErrorKind};
use crate::header::Header;
use crate::record::{unpack_data, unpack_index};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

/// The recursive key span of a block: its first and last reachable record.
#[derive(Debug, Clone)]
struct KeySpan {
    first_key: Vec<u8>,
    last_key: Vec<u8>,
}

/// Summary returned by a successful validation run.
#[derive(Debug)]
pub struct ValidationReport {
    pub record_count: u64,
    pub block_count: u64,
    pub root_level: u8,
}

/// Validate a file end to end. Stops and returns at the first invariant
/// violation.
pub fn validate<R: Read + Seek>(mut reader: R) -> Result<ValidationReport, Error> {
    reader.seek(SeekFrom::Start(0)).map_err(Error::from_io)?;
    let (header, _magic) = Header::read(&mut reader)?;
    let codec = crate::codec::get_codec(&header.codec_name)?;

    let data_start = reader.stream_position().map_err(Error::from_io)?;

    let mut visited: HashMap<u64, u32> = HashMap::new();
    let mut record_count = 0u64;

    let (span, root_level) = visit_block(
        &mut reader,
        data_start,
        header.root_index_offset,
        header.root_index_length,
        codec.as_ref(),
        &mut visited,
        &mut record_count,
        None,
    )?;
    let _ = span;

    if root_level < 1 {
        return Err(Error::new(
            ErrorKind::Level,
            "root block is a data block: a valid file's root is always an index block",
        ));
    }

    if let Some((&offset, _)) = visited.iter().find(|(_, &count)| count > 1) {
        return Err(Error::new(
            ErrorKind::DoubleRef,
            format!("block at offset {offset} is referenced more than once"),
        ));
    }

    // Linear scan: every block in the stream must have been
    // visited exactly once, and the stream must end exactly at EOF.
    reader.seek(SeekFrom::Start(data_start)).map_err(Error::from_io)?;
    let mut offset = data_start;
    let mut block_count = 0u64;
    let mut remaining = visited.len();
    loop {
        let before = offset;
        match read_block_raw(&mut reader) {
            Ok(None) => break,
            Ok(Some((_level, codec_payload))) => {
                let frame_len = crate::block::framed_length(codec_payload.len());
                if visited.remove(&before).is_none() {
                    return Err(Error::new(
                        ErrorKind::UnrefBlock,
                        format!("block at offset {before} is never referenced from the root"),
                    ));
                }
                remaining -= 1;
                block_count += 1;
                offset = before + frame_len;
            }
            Err(e) if e.kind == ErrorKind::TruncatedFile => {
                return Err(Error::new(ErrorKind::TruncatedFile, "block stream truncated during linear scan"));
            }
            Err(e) => return Err(e),
        }
    }
    let _ = remaining;

    Ok(ValidationReport {
        record_count,
        block_count,
        root_level,
    })
}

/// Re-read, CRC-check, decompress, and recursively validate the block at
/// `base + offset`. Returns the block's recursive key span and level.
///
/// `expected_parent_level` is `Some(parent_level)` for every block except
/// the root, enforcing that a child's level is always exactly one less
/// than its parent's.
#[allow(clippy::too_many_arguments)]
fn visit_block<R: Read + Seek>(
    reader: &mut R,
    base: u64,
    offset: u64,
    declared_length: u64,
    codec: &dyn Codec,
    visited: &mut HashMap<u64, u32>,
    record_count: &mut u64,
    expected_parent_level: Option<u8>,
) -> Result<(KeySpan, u8), Error> {
    reader
        .seek(SeekFrom::Start(base + offset))
        .map_err(Error::from_io)?;

    let (level, codec_payload) = read_block_raw(reader)?
        .ok_or_else(|| Error::new(ErrorKind::TruncatedFile, "expected a block, found end of stream"))?;

    let actual_length = crate::block::framed_length(codec_payload.len());
    if actual_length != declared_length {
        return Err(Error::new(
            ErrorKind::SizeMismatch,
            format!(
                "block at offset {offset}: declared length {declared_length}, actual {actual_length}"
            ),
        ));
    }

    if let Some(parent_level) = expected_parent_level {
        if parent_level == 0 || level != parent_level - 1 {
            return Err(Error::new(
                ErrorKind::Level,
                format!("block at offset {offset} has level {level}, expected {}", parent_level.saturating_sub(1)),
            ));
        }
    }

    *visited.entry(offset).or_insert(0) += 1;

    let payload = codec.decompress(&codec_payload)?;

    if level == 0 {
        let records = unpack_data(&payload)?;
        if records.is_empty() {
            return Err(Error::new(ErrorKind::Empty, "data block with zero records"));
        }
        for i in 1..records.len() {
            if records[i] < records[i - 1] {
                return Err(Error::new(ErrorKind::SortViolation, "records within a data block are out of order"));
            }
        }
        *record_count += records.len() as u64;
        return Ok((
            KeySpan {
                first_key: records[0].clone(),
                last_key: records[records.len() - 1].clone(),
            },
            0,
        ));
    }

    let entries = unpack_index(&payload)?;
    if entries.is_empty() {
        return Err(Error::new(ErrorKind::Empty, "index block with zero entries"));
    }
    for i in 1..entries.len() {
        if entries[i].key < entries[i - 1].key {
            return Err(Error::new(ErrorKind::SortViolation, "index entries out of order"));
        }
    }

    let mut child_spans = Vec::with_capacity(entries.len());
    let mut previous_last_key: Option<Vec<u8>> = None;
    for entry in &entries {
        let (child_span, _child_level) = visit_block(
            reader,
            base,
            entry.child_offset,
            entry.child_length,
            codec,
            visited,
            record_count,
            Some(level),
        )?;

        if entry.key > child_span.first_key {
            return Err(Error::new(
                ErrorKind::IndexBounds,
                "index entry's stored key is greater than its child's first key",
            ));
        }
        if let Some(last) = &previous_last_key {
            if entry.key < *last {
                return Err(Error::new(
                    ErrorKind::IndexBounds,
                    "index entry's key is less than the previous sibling's recursive last key",
                ));
            }
        }
        previous_last_key = Some(child_span.last_key.clone());
        child_spans.push(child_span);
    }

    Ok((
        KeySpan {
            first_key: child_spans[0].first_key.clone(),
            last_key: child_spans[child_spans.len() - 1].last_key.clone(),
        },
        level,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{Writer, WriterOptions};
    use tempfile::NamedTempFile;

    fn write_sample(records: &[&[u8]]) -> std::path::PathBuf {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        std::fs::remove_file(&path).unwrap(); // Writer::create refuses existing files
        let mut writer = Writer::create(&path, WriterOptions {
            branching_factor: 2,
            ..WriterOptions::default()
        })
        .unwrap();
        for r in records {
            writer.add_data_block(vec![r.to_vec()]).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn validates_a_well_formed_file() {
        let path = write_sample(&[b"a", b"b", b"c", b"d", b"e"]);
        let file = std::fs::File::open(&path).unwrap();
        let report = validate(file).unwrap();
        assert_eq!(report.record_count, 5);
        assert!(report.root_level >= 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn detects_corrupted_block_crc() {
        let path = write_sample(&[b"a", b"b", b"c"]);
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let err = validate(file).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Crc | ErrorKind::TruncatedFile));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn detects_bad_magic() {
        let path = write_sample(&[b"a"]);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] = b'Q';
        std::fs::write(&path, &bytes).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let err = validate(file).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadMagic);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn verify_crc_helper_matches_direct_computation() {
        assert!(verify_crc(0, b"payload", crate::crc::crc32c(&{
            let mut v = vec![0u8];
            v.extend_from_slice(b"payload");
            v
        })));
    }
}
