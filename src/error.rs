//! A single error type, distinguished by [`ErrorKind`] — not by Rust type.
//!
//! Every fallible operation in this crate returns `Result<T, Error>`. The
//! `kind` field is what callers (and the validator's own test suite) match
//! on; the message is for humans.

use std::fmt;
use std::io;
use thiserror::Error;

/// The fixed set of failure categories this format's structural invariants
/// can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Writer target already exists on disk.
    Exists,
    /// Unknown codec name, or a codec raised during compress/decompress.
    Codec,
    /// ULEB128 truncated, header-length mismatch, truncated length-prefixed record.
    Framing,
    /// File ends inside the header or before a complete block.
    TruncatedFile,
    /// First 8 bytes match neither magic value.
    BadMagic,
    /// Magic is the incomplete-magic: the file was never finished.
    IncompleteFile,
    /// Header or block CRC-32C mismatch.
    Crc,
    /// Metadata is not a JSON object, or the JSON itself doesn't parse.
    Metadata,
    /// Records or index spans are out of non-decreasing order.
    SortViolation,
    /// An index entry's stored key is out of bounds for its child's span.
    IndexBounds,
    /// Wrong child level, or wrong root level.
    Level,
    /// A block is never referenced from the root.
    UnrefBlock,
    /// A block is referenced more than once.
    DoubleRef,
    /// A stored child length doesn't match the block's real length.
    SizeMismatch,
    /// Writer finished without ever having written a record.
    Empty,
    /// Operation attempted on an already-closed writer.
    Closed,
    /// The finalized header payload's encoded length differs from the placeholder's.
    HeaderLength,
    /// Underlying I/O failure not covered by a more specific kind above.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Exists => "exists",
            ErrorKind::Codec => "codec",
            ErrorKind::Framing => "framing",
            ErrorKind::TruncatedFile => "truncated-file",
            ErrorKind::BadMagic => "bad-magic",
            ErrorKind::IncompleteFile => "incomplete-file",
            ErrorKind::Crc => "crc",
            ErrorKind::Metadata => "metadata",
            ErrorKind::SortViolation => "sort-violation",
            ErrorKind::IndexBounds => "index-bounds",
            ErrorKind::Level => "level",
            ErrorKind::UnrefBlock => "unref-block",
            ErrorKind::DoubleRef => "double-ref",
            ErrorKind::SizeMismatch => "size-mismatch",
            ErrorKind::Empty => "empty",
            ErrorKind::Closed => "closed",
            ErrorKind::HeaderLength => "header-length",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// The crate's single error type.
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_io(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::new(ErrorKind::TruncatedFile, e.to_string())
        } else {
            Self::new(ErrorKind::Io, e.to_string())
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::from_io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::new(io::ErrorKind::Other, e)
    }
}
