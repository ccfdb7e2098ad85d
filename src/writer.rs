//! Writer façade: owns the file, the header, and the pipeline, and drives
//! the `Open → Accept records → Finish` lifecycle.

use crate::codec::get_codec;
use crate::error::{Error, ErrorKind};
use crate::framing::{Framing, FramedReader};
use crate::header::{Header, COMPLETED_MAGIC, INCOMPLETE_MAGIC};
use crate::pipeline::Pipeline;
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Writer configuration.
pub struct WriterOptions {
    pub metadata_json: String,
    pub branching_factor: usize,
    pub approx_block_size: usize,
    pub parallelism: usize,
    pub codec: String,
    pub uuid: Option<[u8; 16]>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            metadata_json: "{}".to_string(),
            branching_factor: 64,
            approx_block_size: 1 << 20,
            parallelism: num_cpus::get().max(1),
            codec: "deflate".to_string(),
            uuid: None,
        }
    }
}

/// A writer session for one file. Once `finish()` is called, every other
/// method returns a `Closed` error.
pub struct Writer {
    path: std::path::PathBuf,
    file: Option<File>,
    pipeline: Option<Pipeline>,
    header_payload_len: u32,
    approx_block_size: usize,
}

impl Writer {
    /// Create a new file at `path`. Fails with an `Exists` error if it
    /// already exists — this crate never overwrites or appends to a file
    /// that wasn't created by this call.
    pub fn create(path: impl AsRef<Path>, options: WriterOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::new(
                ErrorKind::Exists,
                format!("{} already exists", path.display()),
            ));
        }
        if !crate::codec::is_registered(&options.codec) {
            return Err(Error::new(
                ErrorKind::Codec,
                format!("unknown codec {:?}", options.codec),
            ));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(Error::from_io)?;

        let mut header = Header::provisional(options.codec.clone(), Some(options.metadata_json.clone()));
        if let Some(uuid) = options.uuid {
            header.uuid = uuid;
        }
        // Incomplete-magic alone makes this invalid; the CRC over the
        // placeholder payload is real and internally consistent, and gets
        // overwritten along with the payload itself at `finish`.
        header.write(&mut file, INCOMPLETE_MAGIC)?;
        let header_payload_len = header.encode_payload().len() as u32;

        log::debug!("opened {} with codec {:?}", path.display(), options.codec);

        let codec = get_codec(&options.codec)?;
        let block_file = file.try_clone().map_err(Error::from_io)?;

        let pipeline = Pipeline::new(
            BlockStreamHandle { file: block_file },
            options.parallelism.max(1),
            options.branching_factor.max(2),
            options.approx_block_size.max(1),
            codec.into(),
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            pipeline: Some(pipeline),
            header_payload_len,
            approx_block_size: options.approx_block_size.max(1),
        })
    }

    /// Pack `records` (already sorted) as a single data block.
    pub fn add_data_block(&mut self, records: Vec<Vec<u8>>) -> Result<(), Error> {
        let pipeline = self.pipeline.as_mut().ok_or_else(closed_error)?;
        pipeline.submit(records)
    }

    /// Feed a byte stream into the writer, splitting it into records with
    /// `framing` and batching to approximately `approx_block_size` bytes
    /// per data block.
    pub fn add_file_contents<R: Read>(&mut self, stream: R, framing: Framing) -> Result<(), Error> {
        let approx_block_size = self.approx_block_size;
        let mut reader = FramedReader::new(stream, framing);
        loop {
            let batch = reader.next_batch(approx_block_size)?;
            if batch.is_empty() {
                return Ok(());
            }
            self.add_data_block(batch)?;
        }
    }

    /// Drain the pipeline, patch the header with the real root location,
    /// flip the magic, and close the file.
    pub fn finish(mut self) -> Result<(), Error> {
        let pipeline = self.pipeline.take().ok_or_else(closed_error)?;
        let mut file = self.file.take().ok_or_else(closed_error)?;

        let root = match pipeline.finish() {
            Ok(root) => root,
            Err(e) => {
                log::warn!("writer pipeline failed, leaving {} incomplete: {e}", self.path.display());
                return Err(e);
            }
        };

        // Re-read the provisional header so we carry forward its uuid,
        // codec, and metadata exactly as written.
        file.seek(SeekFrom::Start(0)).map_err(Error::from_io)?;
        let (mut header, _) = Header::read_ignoring_magic(&mut file)?;
        header.root_index_offset = root.offset;
        header.root_index_length = root.length;

        let new_payload = header.encode_payload();
        if new_payload.len() as u32 != self.header_payload_len {
            return Err(Error::new(
                ErrorKind::HeaderLength,
                "finalised header payload length differs from the placeholder's",
            ));
        }

        file.seek(SeekFrom::Start(8)).map_err(Error::from_io)?;
        file.write_u32::<LittleEndian>(new_payload.len() as u32)
            .map_err(Error::from_io)?;
        file.write_all(&new_payload).map_err(Error::from_io)?;
        file.write_u32::<LittleEndian>(crate::crc::crc32c(&new_payload))
            .map_err(Error::from_io)?;
        file.flush().map_err(Error::from_io)?;
        file.sync_all().map_err(Error::from_io)?;

        file.seek(SeekFrom::Start(0)).map_err(Error::from_io)?;
        file.write_all(&COMPLETED_MAGIC).map_err(Error::from_io)?;
        file.flush().map_err(Error::from_io)?;
        file.sync_all().map_err(Error::from_io)?;

        log::info!("finished {} (root at voffset {})", self.path.display(), root.offset);
        Ok(())
    }
}

fn closed_error() -> Error {
    Error::new(ErrorKind::Closed, "operation on a closed writer")
}

/// Adapts a cloned `File` into a plain `Write` the pipeline's serializer
/// thread can own. The clone shares the original handle's file position, so
/// writes continue exactly where the header ended without the appender
/// needing to seek.
struct BlockStreamHandle {
    file: File,
}

impl Write for BlockStreamHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}
