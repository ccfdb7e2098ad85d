//! File header: magic, header-length, header payload, header CRC.
//!
//! ```text
//! magic(8) || header_length:u32le || header_payload || header_crc:u32le(crc32c(header_payload))
//! ```
//!
//! `header_payload` is, in order: `root_index_offset:u64le`,
//! `root_index_length:u64le`, `uuid(16)`, `codec_name` (u32le length +
//! UTF-8 bytes), `metadata` (u32le length + UTF-8 JSON-object bytes).
//!
//! The two magic values differ only in their last byte. [`Header::write`]
//! is reused for both the provisional write (incomplete-magic,
//! `root_index_offset = PLACEHOLDER_ROOT_OFFSET`) and the final patch
//! (completed-magic, real root location) — the writer façade controls which
//! magic is on disk, this module only encodes/decodes the payload.

use crate::crc::crc32c;
use crate::error::{Error, ErrorKind};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use uuid::Uuid;

/// Magic for a file that is still being written, or was abandoned mid-write.
pub const INCOMPLETE_MAGIC: [u8; 8] = *b"ZSSFILE\x00";
/// Magic for a file whose header and block stream are fully valid.
pub const COMPLETED_MAGIC: [u8; 8] = *b"ZSSFILE\x01";

/// Sentinel written in place of the real root offset while the file is open.
pub const PLACEHOLDER_ROOT_OFFSET: u64 = (1u64 << 63) - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub root_index_offset: u64,
    pub root_index_length: u64,
    pub uuid: [u8; 16],
    pub codec_name: String,
    pub metadata_json: String,
}

impl Header {
    /// A fresh provisional header: placeholder root location, a random
    /// uuid, the given codec name, and `{}` metadata unless overridden.
    pub fn provisional(codec_name: impl Into<String>, metadata_json: Option<String>) -> Self {
        Self {
            root_index_offset: PLACEHOLDER_ROOT_OFFSET,
            root_index_length: 0,
            uuid: *Uuid::new_v4().as_bytes(),
            codec_name: codec_name.into(),
            metadata_json: metadata_json.unwrap_or_else(|| "{}".to_string()),
        }
    }

    /// Encode the header payload (everything between header-length and
    /// header CRC) as on-disk bytes.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(self.root_index_offset).unwrap();
        buf.write_u64::<LittleEndian>(self.root_index_length).unwrap();
        buf.extend_from_slice(&self.uuid);
        let codec_bytes = self.codec_name.as_bytes();
        buf.write_u32::<LittleEndian>(codec_bytes.len() as u32).unwrap();
        buf.extend_from_slice(codec_bytes);
        let metadata_bytes = self.metadata_json.as_bytes();
        buf.write_u32::<LittleEndian>(metadata_bytes.len() as u32).unwrap();
        buf.extend_from_slice(metadata_bytes);
        buf
    }

    /// Decode a header payload previously produced by [`encode_payload`].
    pub fn decode_payload(payload: &[u8]) -> Result<Self, Error> {
        let mut cursor = io::Cursor::new(payload);
        let root_index_offset = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::new(ErrorKind::Framing, "header payload truncated: root-index-offset"))?;
        let root_index_length = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::new(ErrorKind::Framing, "header payload truncated: root-index-length"))?;
        let mut uuid = [0u8; 16];
        cursor
            .read_exact(&mut uuid)
            .map_err(|_| Error::new(ErrorKind::Framing, "header payload truncated: uuid"))?;

        let codec_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::new(ErrorKind::Framing, "header payload truncated: codec-name length"))?
            as usize;
        let mut codec_bytes = vec![0u8; codec_len];
        cursor
            .read_exact(&mut codec_bytes)
            .map_err(|_| Error::new(ErrorKind::Framing, "header payload truncated: codec-name"))?;
        let codec_name = String::from_utf8(codec_bytes)
            .map_err(|_| Error::new(ErrorKind::Framing, "codec-name is not valid UTF-8"))?;

        let metadata_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::new(ErrorKind::Framing, "header payload truncated: metadata length"))?
            as usize;
        let mut metadata_bytes = vec![0u8; metadata_len];
        cursor
            .read_exact(&mut metadata_bytes)
            .map_err(|_| Error::new(ErrorKind::Framing, "header payload truncated: metadata"))?;
        let metadata_json = String::from_utf8(metadata_bytes)
            .map_err(|_| Error::new(ErrorKind::Metadata, "metadata is not valid UTF-8"))?;

        Ok(Self {
            root_index_offset,
            root_index_length,
            uuid,
            codec_name,
            metadata_json,
        })
    }

    /// Parse and validate `metadata_json` as a JSON object.
    pub fn metadata_as_object(&self) -> Result<serde_json::Map<String, serde_json::Value>, Error> {
        let value: serde_json::Value = serde_json::from_str(&self.metadata_json)
            .map_err(|e| Error::new(ErrorKind::Metadata, format!("metadata is not valid JSON: {e}")))?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(Error::new(ErrorKind::Metadata, "metadata JSON is not an object")),
        }
    }

    /// Write `magic || header_length:u32le || header_payload || header_crc`.
    pub fn write<W: Write>(&self, mut w: W, magic: [u8; 8]) -> Result<(), Error> {
        let payload = self.encode_payload();
        w.write_all(&magic).map_err(Error::from_io)?;
        w.write_u32::<LittleEndian>(payload.len() as u32)
            .map_err(Error::from_io)?;
        w.write_all(&payload).map_err(Error::from_io)?;
        w.write_u32::<LittleEndian>(crc32c(&payload))
            .map_err(Error::from_io)?;
        Ok(())
    }

    /// Read and fully validate the magic, header CRC, and metadata/codec
    /// shape. Returns the parsed header plus the magic that was read, so the
    /// caller can distinguish completed/incomplete without re-reading.
    pub fn read<R: Read>(mut r: R) -> Result<(Self, [u8; 8]), Error> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic).map_err(Error::from_io)?;

        if magic == COMPLETED_MAGIC {
            // fall through
        } else if magic == INCOMPLETE_MAGIC {
            return Err(Error::new(ErrorKind::IncompleteFile, "file was never finished"));
        } else {
            return Err(Error::new(ErrorKind::BadMagic, "first 8 bytes match neither magic value"));
        }

        let header_length = r.read_u32::<LittleEndian>().map_err(Error::from_io)? as usize;
        let mut payload = vec![0u8; header_length];
        r.read_exact(&mut payload).map_err(Error::from_io)?;
        let stored_crc = r.read_u32::<LittleEndian>().map_err(Error::from_io)?;

        if crc32c(&payload) != stored_crc {
            return Err(Error::new(ErrorKind::Crc, "header CRC mismatch"));
        }

        let header = Self::decode_payload(&payload)?;
        header.metadata_as_object()?;
        if !crate::codec::is_registered(&header.codec_name) {
            return Err(Error::new(
                ErrorKind::Codec,
                format!("unknown codec {:?} named in header", header.codec_name),
            ));
        }

        Ok((header, magic))
    }

    /// Read a header without validating the magic or codec/metadata shape —
    /// used by the writer façade at `finish()` time to recover the
    /// provisional header (still under incomplete-magic) it wrote at open.
    pub fn read_ignoring_magic<R: Read>(mut r: R) -> Result<(Self, [u8; 8]), Error> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic).map_err(Error::from_io)?;

        let header_length = r.read_u32::<LittleEndian>().map_err(Error::from_io)? as usize;
        let mut payload = vec![0u8; header_length];
        r.read_exact(&mut payload).map_err(Error::from_io)?;
        let _stored_crc = r.read_u32::<LittleEndian>().map_err(Error::from_io)?;

        let header = Self::decode_payload(&payload)?;
        Ok((header, magic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magics_differ_only_in_last_byte() {
        assert_eq!(&INCOMPLETE_MAGIC[..7], &COMPLETED_MAGIC[..7]);
        assert_ne!(INCOMPLETE_MAGIC[7], COMPLETED_MAGIC[7]);
    }

    #[test]
    fn roundtrip_through_write_and_read() {
        let header = Header {
            root_index_offset: 128,
            root_index_length: 64,
            uuid: [7u8; 16],
            codec_name: "deflate".to_string(),
            metadata_json: r#"{"created_by":"test"}"#.to_string(),
        };
        let mut buf = Vec::new();
        header.write(&mut buf, COMPLETED_MAGIC).unwrap();
        let (decoded, magic) = Header::read(io::Cursor::new(buf)).unwrap();
        assert_eq!(magic, COMPLETED_MAGIC);
        assert_eq!(decoded, header);
    }

    #[test]
    fn incomplete_magic_is_incomplete_file_error() {
        let header = Header::provisional("none", None);
        let mut buf = Vec::new();
        header.write(&mut buf, INCOMPLETE_MAGIC).unwrap();
        let err = Header::read(io::Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteFile);
    }

    #[test]
    fn bad_magic_byte_is_rejected() {
        let header = Header::provisional("none", None);
        let mut buf = Vec::new();
        header.write(&mut buf, COMPLETED_MAGIC).unwrap();
        buf[0] = b'Q';
        let err = Header::read(io::Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadMagic);
    }

    #[test]
    fn non_object_metadata_is_metadata_error() {
        let header = Header {
            metadata_json: "\"just a string\"".to_string(),
            ..Header::provisional("none", None)
        };
        let mut buf = Vec::new();
        header.write(&mut buf, COMPLETED_MAGIC).unwrap();
        let err = Header::read(io::Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Metadata);
    }

    #[test]
    fn unknown_codec_name_is_codec_error() {
        let header = Header::provisional("not-a-real-codec", None);
        let mut buf = Vec::new();
        header.write(&mut buf, COMPLETED_MAGIC).unwrap();
        let err = Header::read(io::Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Codec);
    }

    #[test]
    fn corrupted_header_crc_is_detected() {
        let header = Header::provisional("deflate", None);
        let mut buf = Vec::new();
        header.write(&mut buf, COMPLETED_MAGIC).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        let err = Header::read(io::Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Crc);
    }
}
