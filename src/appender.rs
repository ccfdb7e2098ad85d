//! Block appender / bottom-up index builder.
//!
//! Owns the file positioned at the start of the block stream and, for each
//! level, a queue of pending child entries. When a level's queue reaches
//! the branching factor it emits an index block one level up; at
//! [`Appender::finish`] every remaining level is flushed the same way until
//! a level produces exactly one entry at the current top, which becomes the
//! root.

use crate::block::write_block_compressed;
use crate::codec::Codec;
use crate::error::{Error, ErrorKind};
use crate::record::pack_index;
use std::io::Write;
use std::sync::Arc;

/// One child block already on disk, pending inclusion in its parent's index.
#[derive(Debug, Clone)]
struct PendingEntry {
    first_key: Vec<u8>,
    last_key: Vec<u8>,
    offset: u64,
    length: u64,
}

/// The root block's location, returned by [`Appender::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootLocation {
    pub offset: u64,
    pub length: u64,
}

pub struct Appender<W: Write> {
    file: W,
    voffset: u64,
    branching_factor: usize,
    codec: Arc<dyn Codec>,
    level_entries: Vec<Vec<PendingEntry>>,
    wrote_any_block: bool,
}

impl<W: Write> Appender<W> {
    /// `file` must already be positioned at the start of the block stream.
    /// `codec` is the file's single codec, used here to compress index
    /// payloads as levels flush (data payloads arrive pre-compressed from
    /// the pipeline).
    pub fn new(file: W, branching_factor: usize, codec: Arc<dyn Codec>) -> Self {
        assert!(branching_factor >= 2, "branching factor must be >= 2");
        Self {
            file,
            voffset: 0,
            branching_factor,
            codec,
            level_entries: Vec::new(),
            wrote_any_block: false,
        }
    }

    /// Virtual offset the next block will be written at.
    pub fn voffset(&self) -> u64 {
        self.voffset
    }

    /// Write a data block. `codec_payload` is already compressed.
    ///
    /// Empty data blocks must never reach here — the producer/pipeline
    /// filters a zero-record batch out before it is ever packed, per the
    /// "no empty blocks in the output" rule.
    pub fn write_data_block(
        &mut self,
        first_key: &[u8],
        last_key: &[u8],
        codec_payload: &[u8],
    ) -> Result<(), Error> {
        self.write_block(0, first_key, last_key, codec_payload)
    }

    fn write_block(
        &mut self,
        level: u8,
        first_key: &[u8],
        last_key: &[u8],
        codec_payload: &[u8],
    ) -> Result<(), Error> {
        if level > crate::block::MAX_LEVEL {
            return Err(Error::new(ErrorKind::Level, "block level exceeds MAX_LEVEL"));
        }

        let block_offset = self.voffset;
        let written_len = write_block_compressed(&mut self.file, level, codec_payload)?;
        self.voffset += written_len;
        self.wrote_any_block = true;

        let level_idx = level as usize;
        if level_idx >= self.level_entries.len() {
            assert_eq!(level_idx, self.level_entries.len());
            for l in 0..level_idx {
                assert!(
                    self.level_entries[l].is_empty(),
                    "a new top level can only appear once every lower level just flushed"
                );
            }
            self.level_entries.push(Vec::new());
        }

        self.level_entries[level_idx].push(PendingEntry {
            first_key: first_key.to_vec(),
            last_key: last_key.to_vec(),
            offset: block_offset,
            length: written_len,
        });

        if self.level_entries[level_idx].len() >= self.branching_factor {
            self.flush_index(level_idx)?;
        }
        Ok(())
    }

    fn flush_index(&mut self, level: usize) -> Result<(), Error> {
        let entries = std::mem::take(&mut self.level_entries[level]);
        if entries.is_empty() {
            return Ok(());
        }
        for i in 1..entries.len() {
            if entries[i].first_key < entries[i - 1].last_key {
                return Err(Error::new(
                    ErrorKind::SortViolation,
                    format!(
                        "index entry {} at level {level} starts before entry {} ends",
                        i,
                        i - 1
                    ),
                ));
            }
        }

        let keys: Vec<&[u8]> = entries.iter().map(|e| e.first_key.as_slice()).collect();
        let offsets: Vec<u64> = entries.iter().map(|e| e.offset).collect();
        let lengths: Vec<u64> = entries.iter().map(|e| e.length).collect();
        let hint = entries.len() * 300;
        let logical_payload = pack_index(&keys, &offsets, &lengths, hint);

        let first_key = entries[0].first_key.clone();
        let last_key = entries[entries.len() - 1].last_key.clone();

        let codec_payload = self.codec.compress(&logical_payload)?;
        self.write_block((level + 1) as u8, &first_key, &last_key, &codec_payload)
    }

    /// Flush every remaining level and identify the root.
    ///
    /// Walks levels from the bottom up, flushing each; the first level whose
    /// flush produces a parent holding exactly one entry — and that parent
    /// is the current top level — is the root.
    pub fn finish(mut self) -> Result<RootLocation, Error> {
        if !self.wrote_any_block {
            return Err(Error::new(ErrorKind::Empty, "no blocks were ever written"));
        }

        let mut level = 0usize;
        loop {
            self.flush_index(level)?;
            let top = self.level_entries.len() - 1;
            if level + 1 == top && self.level_entries[top].len() == 1 {
                let root = &self.level_entries[top][0];
                return Ok(RootLocation {
                    offset: root.offset,
                    length: root.length,
                });
            }
            level += 1;
            if level as u32 > crate::block::MAX_LEVEL as u32 {
                return Err(Error::new(
                    ErrorKind::Level,
                    "index tree exceeded MAX_LEVEL while finishing",
                ));
            }
        }
    }
}
