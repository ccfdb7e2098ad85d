//! Compression registry: a process-wide mapping from codec name to a
//! `(compress, decompress)` pair.
//!
//! # Identity rules
//! A container names its codec once, in the header's `codec-name` field, as
//! plain UTF-8. Every block in the file is compressed with that one codec.
//! Opening a writer with an unregistered name fails before any bytes are
//! written; opening a file whose header names an unregistered codec fails
//! the same way, and there is no fallback — an unrecognised name is fatal,
//! not skippable.
//!
//! # Built-in codecs
//! `none` (identity) and `deflate` (via `flate2`) are the two names this
//! format requires every build to support. `zstd` and `lz4` are additionally
//! available for files that want a better ratio or higher throughput than
//! deflate.

use crate::error::{Error, ErrorKind};
use std::io::{Read, Write};

/// A compression codec: a named pair of pure compress/decompress functions.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn name(&self) -> &'static str {
        "none"
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(data.to_vec())
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(data.to_vec())
    }
}

pub struct DeflateCodec;
impl Codec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data)
            .map_err(|e| Error::new(ErrorKind::Codec, format!("deflate compress: {e}")))?;
        enc.finish()
            .map_err(|e| Error::new(ErrorKind::Codec, format!("deflate compress: {e}")))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        use flate2::read::DeflateDecoder;
        let mut dec = DeflateDecoder::new(data);
        let mut out = Vec::new();
        dec.read_to_end(&mut out)
            .map_err(|e| Error::new(ErrorKind::Codec, format!("deflate decompress: {e}")))?;
        Ok(out)
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        zstd::encode_all(data, 0)
            .map_err(|e| Error::new(ErrorKind::Codec, format!("zstd compress: {e}")))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        zstd::decode_all(data)
            .map_err(|e| Error::new(ErrorKind::Codec, format!("zstd decompress: {e}")))
    }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(lz4_flex::compress_prepend_size(data))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| Error::new(ErrorKind::Codec, format!("lz4 decompress: {e}")))
    }
}

/// Resolve a codec by the name stored on disk (or passed on the CLI).
///
/// Returns `Err(ErrorKind::Codec)` if the name isn't one of the built-ins —
/// this crate has no plugin-loading mechanism, so "unregistered" and
/// "unknown to this build" are the same failure.
pub fn get_codec(name: &str) -> Result<Box<dyn Codec>, Error> {
    match name {
        "none" => Ok(Box::new(NoneCodec)),
        "deflate" => Ok(Box::new(DeflateCodec)),
        "zstd" => Ok(Box::new(ZstdCodec)),
        "lz4" => Ok(Box::new(Lz4Codec)),
        other => Err(Error::new(
            ErrorKind::Codec,
            format!("unknown codec {other:?}"),
        )),
    }
}

/// Whether `name` is a registered codec, without allocating a codec instance.
pub fn is_registered(name: &str) -> bool {
    matches!(name, "none" | "deflate" | "zstd" | "lz4")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        for name in ["none", "deflate", "zstd", "lz4"] {
            let codec = get_codec(name).unwrap();
            let compressed = codec.compress(&data).unwrap();
            let decompressed = codec.decompress(&compressed).unwrap();
            assert_eq!(decompressed, data, "codec {name} failed to round-trip");
        }
    }

    #[test]
    fn unknown_codec_is_rejected() {
        let err = get_codec("not-a-real-codec").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Codec);
        assert!(!is_registered("not-a-real-codec"));
    }

    #[test]
    fn empty_input_roundtrips() {
        for name in ["none", "deflate", "zstd", "lz4"] {
            let codec = get_codec(name).unwrap();
            let compressed = codec.compress(&[]).unwrap();
            assert_eq!(codec.decompress(&compressed).unwrap(), Vec::<u8>::new());
        }
    }
}
