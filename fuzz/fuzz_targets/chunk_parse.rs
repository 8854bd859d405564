#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use logchunk_storage::{Direction, Labels, MemChunk, NoopPipeline, QueryContext};

fuzz_target!(|data: &[u8]| {
    // Fuzz the chunk parse and decode path with arbitrary bytes.
    // Tests handling of:
    // - Invalid magic / version / encoding bytes
    // - Out-of-range metadata offsets and payload lengths
    // - Corrupt checksums
    // - Truncated varints in block metadata and payloads
    let Ok(chunk) = MemChunk::from_bytes(Bytes::copy_from_slice(data), 256 * 1024, 0) else {
        return;
    };

    // A parsed chunk must be iterable without panicking, whatever the bytes
    // decompress to.
    let ctx = QueryContext::new();
    let pipeline = NoopPipeline;
    if let Ok(mut it) = chunk.iterator(
        &ctx,
        i64::MIN,
        i64::MAX,
        Direction::Forward,
        &Labels::default(),
        &pipeline,
    ) {
        while it.next() {}
        let _ = it.close();
    }
});
