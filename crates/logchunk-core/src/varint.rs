//! Variable-length Integer Encoding (Varint)
//!
//! This module provides efficient variable-length encoding for integers using
//! two techniques:
//!
//! ## Varint Encoding
//! Instead of always using 8 bytes for a u64, varints use only as many bytes as
//! needed:
//! - Small numbers (0-127) use just 1 byte
//! - Larger numbers use 2-10 bytes depending on magnitude
//! - Each byte uses 7 bits for data and 1 bit as a "continuation" flag
//!
//! ## ZigZag Encoding (for signed integers)
//! Maps signed integers to unsigned so small negative numbers are also
//! efficient:
//! - 0 → 0, -1 → 1, 1 → 2, -2 → 3, 2 → 4, etc.
//! - This means -1 encodes to 1 byte instead of 8 bytes
//!
//! ## Why This Matters
//! Every entry in a block is framed as `varint(timestamp) uvarint(line_len)
//! line_bytes`, so timestamps (large but close together once compressed) and
//! short line lengths cost a handful of bytes instead of 16.
//!
//! Two decoder families are provided:
//! - slice decoders over `bytes::Buf`, for trusted in-memory buffers
//! - `io::Read` decoders with clean end-of-stream detection, for the streaming
//!   block decode path where EOF at an entry boundary is not an error

use std::io::{self, Read};

use bytes::{Buf, BufMut};

/// Widest possible encoding of a 64-bit varint, in bytes
pub const MAX_VARINT_LEN: usize = 10;

/// Encode a signed integer as a varint (ZigZag encoding)
pub fn encode_varint(buf: &mut impl BufMut, value: i64) {
    // ZigZag encoding: maps signed integers to unsigned
    // 0 => 0, -1 => 1, 1 => 2, -2 => 3, 2 => 4, etc.
    let unsigned = ((value << 1) ^ (value >> 63)) as u64;

    encode_varint_u64(buf, unsigned);
}

/// Encode an unsigned integer as a varint
pub fn encode_varint_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Decode a varint to a signed integer
///
/// Panics on truncated or malformed input; only use on buffers that are known
/// to hold a complete varint. The chunk parse path uses `DecBuf` instead.
pub fn decode_varint(buf: &mut impl Buf) -> i64 {
    let unsigned = decode_varint_u64(buf);

    // ZigZag decoding
    let value = (unsigned >> 1) as i64;
    if (unsigned & 1) != 0 {
        !value
    } else {
        value
    }
}

/// Decode a varint to an unsigned integer
pub fn decode_varint_u64(buf: &mut impl Buf) -> u64 {
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            break;
        }

        shift += 7;

        if shift >= 64 {
            panic!("Varint too large");
        }
    }

    value
}

/// Read an unsigned varint from a reader.
///
/// Returns `Ok(None)` on a clean end-of-stream, i.e. EOF before the first
/// byte. EOF in the middle of a varint is `ErrorKind::UnexpectedEof`.
pub fn try_read_uvarint(r: &mut impl Read) -> io::Result<Option<u64>> {
    let mut value: u64 = 0;
    let mut byte = [0u8; 1];

    for i in 0..MAX_VARINT_LEN {
        loop {
            match r.read(&mut byte) {
                Ok(0) => {
                    if i == 0 {
                        return Ok(None);
                    }
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated varint",
                    ));
                }
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let b = byte[0];
        if b & 0x80 == 0 {
            // The 10th byte may only carry a single bit of payload.
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "varint overflows 64 bits",
                ));
            }
            return Ok(Some(value | (b as u64) << (7 * i)));
        }
        value |= ((b & 0x7F) as u64) << (7 * i);
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "varint overflows 64 bits",
    ))
}

/// Read a signed (ZigZag) varint from a reader; `Ok(None)` on clean EOF
pub fn try_read_varint(r: &mut impl Read) -> io::Result<Option<i64>> {
    let Some(unsigned) = try_read_uvarint(r)? else {
        return Ok(None);
    };
    let value = (unsigned >> 1) as i64;
    Ok(Some(if unsigned & 1 != 0 { !value } else { value }))
}

/// Read an unsigned varint from a reader, treating any EOF as an error
pub fn read_uvarint(r: &mut impl Read) -> io::Result<u64> {
    try_read_uvarint(r)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated varint"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_varint_small_positive() {
        let mut buf = BytesMut::new();
        encode_varint(&mut buf, 5);

        let mut cursor = buf.as_ref();
        let decoded = decode_varint(&mut cursor);
        assert_eq!(decoded, 5);
    }

    #[test]
    fn test_varint_small_negative() {
        let mut buf = BytesMut::new();
        encode_varint(&mut buf, -5);

        let mut cursor = buf.as_ref();
        let decoded = decode_varint(&mut cursor);
        assert_eq!(decoded, -5);
    }

    #[test]
    fn test_varint_zero() {
        let mut buf = BytesMut::new();
        encode_varint(&mut buf, 0);

        let mut cursor = buf.as_ref();
        let decoded = decode_varint(&mut cursor);
        assert_eq!(decoded, 0);
    }

    #[test]
    fn test_varint_large_positive() {
        let mut buf = BytesMut::new();
        encode_varint(&mut buf, 1_700_000_000_000_000_000);

        let mut cursor = buf.as_ref();
        let decoded = decode_varint(&mut cursor);
        assert_eq!(decoded, 1_700_000_000_000_000_000);
    }

    #[test]
    fn test_varint_u64() {
        let mut buf = BytesMut::new();
        encode_varint_u64(&mut buf, 12345);

        let mut cursor = buf.as_ref();
        let decoded = decode_varint_u64(&mut cursor);
        assert_eq!(decoded, 12345);
    }

    #[test]
    fn test_varint_compression() {
        // Small numbers should use fewer bytes (ZigZag encoding doubles values)
        let mut buf = BytesMut::new();
        encode_varint(&mut buf, 0);
        assert_eq!(buf.len(), 1);

        let mut buf = BytesMut::new();
        encode_varint(&mut buf, 63);
        assert_eq!(buf.len(), 1);

        let mut buf = BytesMut::new();
        encode_varint(&mut buf, 64);
        assert_eq!(buf.len(), 2);
    }

    // ---------------------------------------------------------------
    // io::Read decoders
    // ---------------------------------------------------------------

    #[test]
    fn test_try_read_uvarint_roundtrip() {
        for value in [0u64, 1, 127, 128, 16383, 16384, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint_u64(&mut buf, value);
            let mut cursor = &buf[..];
            assert_eq!(try_read_uvarint(&mut cursor).unwrap(), Some(value));
        }
    }

    #[test]
    fn test_try_read_varint_roundtrip() {
        for value in [0i64, 1, -1, 1000, -1000, i64::MAX, i64::MIN] {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            let mut cursor = &buf[..];
            assert_eq!(try_read_varint(&mut cursor).unwrap(), Some(value));
        }
    }

    #[test]
    fn test_try_read_uvarint_clean_eof() {
        let mut cursor: &[u8] = &[];
        assert_eq!(try_read_uvarint(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_try_read_uvarint_truncated() {
        // Continuation bit set but no following byte.
        let mut cursor: &[u8] = &[0x80];
        let err = try_read_uvarint(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_try_read_uvarint_overflow() {
        // 11 continuation bytes cannot fit in 64 bits.
        let mut cursor: &[u8] = &[0x80; 11];
        let err = try_read_uvarint(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_try_read_uvarint_tenth_byte_overflow() {
        // 9 continuation bytes then a final byte with more than one bit set.
        let mut buf = vec![0x80u8; 9];
        buf.push(0x02);
        let mut cursor = &buf[..];
        let err = try_read_uvarint(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_uvarint_rejects_eof() {
        let mut cursor: &[u8] = &[];
        let err = read_uvarint(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_io_and_slice_decoders_agree() {
        for value in [0u64, 300, 1 << 20, 1 << 40, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint_u64(&mut buf, value);

            let mut slice_cursor = &buf[..];
            let from_slice = decode_varint_u64(&mut slice_cursor);

            let mut io_cursor = &buf[..];
            let from_io = try_read_uvarint(&mut io_cursor).unwrap();

            assert_eq!(Some(from_slice), from_io);
        }
    }
}
