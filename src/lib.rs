//! # zss — a write-once, read-many sorted-string container format
//!
//! A single file holds a large, lexicographically sorted sequence of
//! opaque byte records. The on-disk layout is a header (magic, integrity
//! CRC, codec name, arbitrary JSON metadata) followed by a stream of
//! framed, CRC-protected blocks: data blocks holding runs of records, and
//! index blocks forming a bottom-up B+-tree-like structure over them.
//!
//! Guarantees:
//! - Every numeric field on disk is little-endian; ULEB128 where variable.
//! - Every block carries a CRC-32C over its framing byte and payload.
//! - A file is only ever valid once its magic has been flipped from the
//!   incomplete to the completed value, which happens last and after two
//!   separate flushes — a crash mid-write leaves an obviously-broken file,
//!   never a plausible-looking corrupt one.
//! - Writing is parallel (N compressor workers); appending to disk is
//!   strictly single-threaded and in record order regardless.

pub mod appender;
pub mod block;
pub mod codec;
pub mod crc;
pub mod error;
pub mod framing;
pub mod header;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod validator;
pub mod varint;
pub mod writer;

pub use error::{Error, ErrorKind};
pub use header::Header;
pub use reader::Reader;
pub use validator::{validate, ValidationReport};
pub use writer::{Writer, WriterOptions};
