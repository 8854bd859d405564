//! Buffer Encoders and Decoders for the Chunk Container Format
//!
//! This module implements the two primitives the container format is written
//! and parsed with:
//!
//! - `EncBuf`: an append-only byte buffer with big-endian, varint, and
//!   checksum writers. The chunk serializer builds each section (header,
//!   block, metadata) in an `EncBuf` and appends a CRC32-Castagnoli over the
//!   section with `put_crc32c`.
//! - `DecBuf`: a cursor over a byte slice with the symmetric readers and a
//!   *sticky* error: once any primitive fails (short input, malformed
//!   varint), all subsequent reads return zero and `err()` reports the first
//!   failure. Callers read a whole batch of fields and verify once at the
//!   end, which keeps the parse code linear.
//!
//! ## Checksums
//! All checksums are CRC32-Castagnoli (polynomial 0x1EDC6F41), computed over
//! the exact bytes being protected and written big-endian immediately after
//! them.
//!
//! ## Example
//! ```ignore
//! let mut eb = EncBuf::new();
//! eb.put_be32(0x012E_E56A);
//! eb.put_uvarint(entries.len() as u64);
//! eb.put_crc32c(); // checksum over everything written since the last reset
//!
//! let mut db = DecBuf::new(eb.get());
//! let magic = db.be32();
//! let count = db.uvarint();
//! if let Some(err) = db.err() {
//!     return Err(err);
//! }
//! ```

use bytes::BufMut;

use crate::error::Error;
use crate::varint;

/// Append-only encoding buffer for building chunk sections
#[derive(Debug, Default)]
pub struct EncBuf {
    b: Vec<u8>,
}

impl EncBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            b: Vec::with_capacity(capacity),
        }
    }

    /// Clear the buffer, retaining capacity
    pub fn reset(&mut self) {
        self.b.clear();
    }

    /// The bytes written since the last reset
    pub fn get(&self) -> &[u8] {
        &self.b
    }

    pub fn len(&self) -> usize {
        self.b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    pub fn put_byte(&mut self, v: u8) {
        self.b.put_u8(v);
    }

    pub fn put_be32(&mut self, v: u32) {
        self.b.put_u32(v);
    }

    pub fn put_be64(&mut self, v: u64) {
        self.b.put_u64(v);
    }

    pub fn put_varint(&mut self, v: i64) {
        varint::encode_varint(&mut self.b, v);
    }

    pub fn put_uvarint(&mut self, v: u64) {
        varint::encode_varint_u64(&mut self.b, v);
    }

    pub fn put_bytes(&mut self, v: &[u8]) {
        self.b.put_slice(v);
    }

    /// Append a big-endian CRC32-Castagnoli over everything written since the
    /// last reset
    pub fn put_crc32c(&mut self) {
        let crc = crc32c::crc32c(&self.b);
        self.b.put_u32(crc);
    }
}

/// Decoding cursor with a sticky error state
#[derive(Debug)]
pub struct DecBuf<'a> {
    b: &'a [u8],
    err: Option<Error>,
}

impl<'a> DecBuf<'a> {
    pub fn new(b: &'a [u8]) -> Self {
        Self { b, err: None }
    }

    /// The first error encountered, if any. Reads after an error return zero.
    pub fn err(&self) -> Option<Error> {
        self.err
    }

    /// Unread bytes remaining in the cursor
    pub fn remaining(&self) -> usize {
        self.b.len()
    }

    /// CRC32-Castagnoli over the remaining unread bytes. Call before reading
    /// the section the checksum covers.
    pub fn crc32c(&self) -> u32 {
        crc32c::crc32c(self.b)
    }

    pub fn byte(&mut self) -> u8 {
        match self.take(1) {
            Some(b) => b[0],
            None => 0,
        }
    }

    pub fn be32(&mut self) -> u32 {
        match self.take(4) {
            Some(b) => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            None => 0,
        }
    }

    pub fn be64(&mut self) -> u64 {
        match self.take(8) {
            Some(b) => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(b);
                u64::from_be_bytes(bytes)
            }
            None => 0,
        }
    }

    pub fn uvarint(&mut self) -> u64 {
        if self.err.is_some() {
            return 0;
        }

        let mut value: u64 = 0;
        for i in 0..varint::MAX_VARINT_LEN {
            let Some(&b) = self.b.get(i) else {
                self.err = Some(Error::UnexpectedEof);
                return 0;
            };
            if b & 0x80 == 0 {
                if i == varint::MAX_VARINT_LEN - 1 && b > 1 {
                    self.err = Some(Error::InvalidVarint);
                    return 0;
                }
                self.b = &self.b[i + 1..];
                return value | (b as u64) << (7 * i);
            }
            value |= ((b & 0x7F) as u64) << (7 * i);
        }

        self.err = Some(Error::InvalidVarint);
        0
    }

    pub fn varint64(&mut self) -> i64 {
        let unsigned = self.uvarint();
        let value = (unsigned >> 1) as i64;
        if unsigned & 1 != 0 {
            !value
        } else {
            value
        }
    }

    pub fn bytes(&mut self, n: usize) -> &'a [u8] {
        self.take(n).unwrap_or(&[])
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.err.is_some() {
            return None;
        }
        if self.b.len() < n {
            self.err = Some(Error::UnexpectedEof);
            return None;
        }
        let (head, tail) = self.b.split_at(n);
        self.b = tail;
        Some(head)
    }
}
