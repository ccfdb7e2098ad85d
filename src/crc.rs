//! CRC-32C (Castagnoli) — streaming and one-shot, via the `crc32c` crate.
//!
//! Pulled into its own module because this format CRCs two distinct things
//! per file: the header payload, and every block's framing+payload.

/// One-shot CRC-32C over a single byte span.
pub fn crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Streaming CRC-32C accumulator for multi-part spans (e.g. a block's
/// `level_byte || codec_payload`, written as two separate `write_all` calls).
#[derive(Default)]
pub struct StreamingCrc32c {
    crc: u32,
}

impl StreamingCrc32c {
    pub fn new() -> Self {
        Self { crc: 0 }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.crc = crc32c::crc32c_append(self.crc, data);
    }

    pub fn finalize(self) -> u32 {
        self.crc
    }
}
