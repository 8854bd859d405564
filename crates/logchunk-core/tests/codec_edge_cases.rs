//! Edge-case tests for the codec primitives, varint encoding, and entry type.

use bytes::Bytes;
use logchunk_core::codec::{DecBuf, EncBuf};
use logchunk_core::varint::{
    decode_varint, decode_varint_u64, encode_varint, encode_varint_u64, try_read_uvarint,
    try_read_varint,
};
use logchunk_core::{Entry, Error};

// ---------------------------------------------------------------
// Varint encoding round-trip
// ---------------------------------------------------------------

#[test]
fn varint_roundtrip_zero() {
    let mut buf = Vec::new();
    encode_varint(&mut buf, 0);
    let decoded = decode_varint(&mut &buf[..]);
    assert_eq!(decoded, 0);
}

#[test]
fn varint_roundtrip_positive_small() {
    for val in 1..=127i64 {
        let mut buf = Vec::new();
        encode_varint(&mut buf, val);
        let decoded = decode_varint(&mut &buf[..]);
        assert_eq!(decoded, val, "failed for value {val}");
    }
}

#[test]
fn varint_roundtrip_negative() {
    for val in [-1i64, -2, -128, -256, -1000, -i64::MAX] {
        let mut buf = Vec::new();
        encode_varint(&mut buf, val);
        let decoded = decode_varint(&mut &buf[..]);
        assert_eq!(decoded, val, "failed for value {val}");
    }
}

#[test]
fn varint_roundtrip_large_values() {
    let values = [
        128i64,
        255,
        256,
        16383,
        16384,
        2_097_151,
        268_435_455,
        i64::MAX,
        i64::MIN + 1,
        i64::MIN,
    ];
    for val in values {
        let mut buf = Vec::new();
        encode_varint(&mut buf, val);
        let decoded = decode_varint(&mut &buf[..]);
        assert_eq!(decoded, val, "failed for value {val}");
    }
}

#[test]
fn varint_u64_roundtrip_boundaries() {
    for val in [0u64, 127, 128, 16383, 16384, u64::MAX / 2, u64::MAX] {
        let mut buf = Vec::new();
        encode_varint_u64(&mut buf, val);
        let decoded = decode_varint_u64(&mut &buf[..]);
        assert_eq!(decoded, val, "failed for value {val}");
    }
}

#[test]
fn varint_timestamp_nanoseconds() {
    // Realistic nanosecond timestamps encode and decode unchanged.
    let ts = 1_700_000_000_000_000_000i64;
    let mut buf = Vec::new();
    encode_varint(&mut buf, ts);
    assert_eq!(decode_varint(&mut &buf[..]), ts);
}

// ---------------------------------------------------------------
// io::Read decoders against slice decoders
// ---------------------------------------------------------------

#[test]
fn io_reader_matches_slice_decoder_unsigned() {
    for val in [0u64, 1, 300, 1 << 21, 1 << 42, u64::MAX] {
        let mut buf = Vec::new();
        encode_varint_u64(&mut buf, val);
        assert_eq!(try_read_uvarint(&mut &buf[..]).unwrap(), Some(val));
    }
}

#[test]
fn io_reader_matches_slice_decoder_signed() {
    for val in [0i64, -1, 1, -1_000_000, 1_000_000, i64::MIN, i64::MAX] {
        let mut buf = Vec::new();
        encode_varint(&mut buf, val);
        assert_eq!(try_read_varint(&mut &buf[..]).unwrap(), Some(val));
    }
}

#[test]
fn io_reader_clean_eof_only_at_boundary() {
    // Empty input: clean end of stream.
    assert_eq!(try_read_varint(&mut &[][..]).unwrap(), None);

    // A varint cut mid-way is an error, not a clean end.
    let mut buf = Vec::new();
    encode_varint_u64(&mut buf, 1 << 50);
    let truncated = &buf[..buf.len() - 1];
    assert!(try_read_uvarint(&mut &truncated[..]).is_err());
}

// ---------------------------------------------------------------
// DecBuf sticky errors
// ---------------------------------------------------------------

#[test]
fn decbuf_reports_first_error_after_batch() {
    let mut eb = EncBuf::new();
    eb.put_uvarint(5);
    eb.put_varint(100);
    eb.put_uvarint(200);

    // Cut the buffer short and read the full batch anyway.
    let short = &eb.get()[..2];
    let mut db = DecBuf::new(short);
    let _ = db.uvarint();
    let _ = db.varint64();
    let _ = db.uvarint();
    let _ = db.be32();
    assert_eq!(db.err(), Some(Error::UnexpectedEof));
}

#[test]
fn decbuf_no_error_on_exact_fit() {
    let mut eb = EncBuf::new();
    eb.put_be32(7);
    eb.put_uvarint(9);

    let mut db = DecBuf::new(eb.get());
    assert_eq!(db.be32(), 7);
    assert_eq!(db.uvarint(), 9);
    assert_eq!(db.err(), None);
    assert_eq!(db.remaining(), 0);
}

#[test]
fn decbuf_crc_over_remaining_bytes() {
    let mut eb = EncBuf::new();
    eb.put_uvarint(1);
    eb.put_varint(-42);
    let body = eb.get().to_vec();
    eb.put_crc32c();

    let written = eb.get();
    let stored = u32::from_be_bytes(written[body.len()..].try_into().unwrap());
    let db = DecBuf::new(&body);
    assert_eq!(db.crc32c(), stored);
}

// ---------------------------------------------------------------
// Entry serde
// ---------------------------------------------------------------

#[test]
fn entry_serde_roundtrip_vec() {
    let entries = vec![
        Entry::new(1, Bytes::from("first")),
        Entry::new(2, Bytes::from("second")),
        Entry::new(-3, Bytes::new()),
    ];
    let json = serde_json::to_string(&entries).expect("serialize");
    let back: Vec<Entry> = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(entries, back);
}
