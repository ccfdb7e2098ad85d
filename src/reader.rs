//! Minimal reader surface: open-and-validate, iterate all records in
//! order, iterate level-0 blocks. Random access and range queries are
//! out of scope — external collaborators, per the format's non-goals.

use crate::block::read_block_raw;
use crate::codec::Codec;
use crate::error::Error;
use crate::header::Header;
use crate::record::unpack_data;
use std::io::{Read, Seek, SeekFrom};

pub struct Reader<R: Read + Seek> {
    inner: R,
    header: Header,
    codec: Box<dyn Codec>,
    data_start: u64,
}

impl<R: Read + Seek> Reader<R> {
    /// Open and fully validate `inner` before returning.
    pub fn open(mut inner: R) -> Result<Self, Error> {
        crate::validator::validate(&mut inner)?;
        inner.seek(SeekFrom::Start(0)).map_err(Error::from_io)?;
        let (header, _magic) = Header::read(&mut inner)?;
        let codec = crate::codec::get_codec(&header.codec_name)?;
        let data_start = inner.stream_position().map_err(Error::from_io)?;
        Ok(Self {
            inner,
            header,
            codec,
            data_start,
        })
    }

    pub fn metadata(&self) -> &str {
        &self.header.metadata_json
    }

    pub fn uuid(&self) -> [u8; 16] {
        self.header.uuid
    }

    /// Iterate every record in the file, in lexicographic order, by
    /// streaming level-0 blocks from the start of the block stream.
    pub fn records(&mut self) -> Result<RecordIter<'_, R>, Error> {
        self.inner
            .seek(SeekFrom::Start(self.data_start))
            .map_err(Error::from_io)?;
        Ok(RecordIter {
            inner: &mut self.inner,
            codec: self.codec.as_ref(),
            buffer: Vec::new().into_iter(),
        })
    }
}

/// Streams records by reading every level-0 block in file order and
/// flattening their decoded records; index blocks are skipped.
pub struct RecordIter<'a, R: Read + Seek> {
    inner: &'a mut R,
    codec: &'a dyn Codec,
    buffer: std::vec::IntoIter<Vec<u8>>,
}

impl<'a, R: Read + Seek> Iterator for RecordIter<'a, R> {
    type Item = Result<Vec<u8>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }
            match read_block_raw(self.inner) {
                Ok(None) => return None,
                Ok(Some((level, codec_payload))) => {
                    if level != 0 {
                        continue;
                    }
                    let payload = match self.codec.decompress(&codec_payload) {
                        Ok(p) => p,
                        Err(e) => return Some(Err(e)),
                    };
                    match unpack_data(&payload) {
                        Ok(records) => self.buffer = records.into_iter(),
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{Writer, WriterOptions};
    use tempfile::NamedTempFile;

    #[test]
    fn reads_back_records_in_order() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        std::fs::remove_file(&path).unwrap();

        let mut writer = Writer::create(&path, WriterOptions {
            branching_factor: 2,
            ..WriterOptions::default()
        })
        .unwrap();
        for r in [b"alpha".as_slice(), b"beta", b"gamma", b"zeta"] {
            writer.add_data_block(vec![r.to_vec()]).unwrap();
        }
        writer.finish().unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut reader = Reader::open(file).unwrap();
        let records: Vec<Vec<u8>> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            records,
            vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec(), b"zeta".to_vec()]
        );
        let _ = std::fs::remove_file(&path);
    }
}
