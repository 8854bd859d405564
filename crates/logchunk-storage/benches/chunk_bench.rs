//! Chunk Performance Benchmarks
//!
//! Measures the hot paths of the chunk: appending and cutting, streaming
//! decode, and full serialize/parse round-trips, across the supported
//! encodings.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p logchunk-storage
//!
//! # Run a specific benchmark
//! cargo bench -p logchunk-storage --bench chunk_bench chunk_append
//! ```
//!
//! ## Performance Notes
//!
//! - Decode throughput depends mostly on the decompressor; `Encoding::None`
//!   gives the upper bound for the framing layer itself
//! - Steady-state iteration allocates nothing (pooled line buffers), so the
//!   decode benchmarks primarily measure varint framing + decompression

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logchunk_storage::{
    Direction, Encoding, Entry, Labels, MemChunk, NoopPipeline, QueryContext,
};

const BLOCK_SIZE: usize = 256 * 1024;

fn create_test_entry(i: usize, line_size: usize) -> Entry {
    let mut line = format!("ts={} level=info msg=", i).into_bytes();
    line.resize(line_size, b'x');
    Entry::new(i as i64 * 1_000_000, Bytes::from(line))
}

fn build_chunk(encoding: Encoding, entry_count: usize, line_size: usize) -> MemChunk {
    let mut chunk = MemChunk::new(encoding, BLOCK_SIZE, 0);
    for i in 0..entry_count {
        chunk.append(&create_test_entry(i, line_size)).unwrap();
    }
    chunk.close().unwrap();
    chunk
}

fn bench_chunk_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_append");

    for entry_count in [1_000, 10_000] {
        for encoding in [Encoding::None, Encoding::Lz4, Encoding::Snappy] {
            group.throughput(Throughput::Elements(entry_count as u64));
            group.bench_with_input(
                BenchmarkId::new(encoding.to_string(), entry_count),
                &entry_count,
                |b, &entry_count| {
                    b.iter(|| build_chunk(encoding, entry_count, 128));
                },
            );
        }
    }

    group.finish();
}

fn bench_chunk_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_decode");

    for encoding in [Encoding::None, Encoding::Gzip, Encoding::Lz4, Encoding::Snappy] {
        let chunk = build_chunk(encoding, 10_000, 128);
        group.throughput(Throughput::Elements(10_000));
        group.bench_function(BenchmarkId::new(encoding.to_string(), 10_000), |b| {
            b.iter(|| {
                let ctx = QueryContext::new();
                let pipeline = NoopPipeline;
                let mut it = chunk
                    .iterator(
                        &ctx,
                        i64::MIN,
                        i64::MAX,
                        Direction::Forward,
                        &Labels::default(),
                        &pipeline,
                    )
                    .unwrap();
                let mut n = 0u64;
                while it.next() {
                    n += 1;
                }
                it.close().unwrap();
                n
            });
        });
    }

    group.finish();
}

fn bench_chunk_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_roundtrip");

    for encoding in [Encoding::None, Encoding::Lz4] {
        group.throughput(Throughput::Elements(1_000));
        group.bench_function(BenchmarkId::new(encoding.to_string(), 1_000), |b| {
            b.iter(|| {
                let mut chunk = build_chunk(encoding, 1_000, 128);
                let data = chunk.to_bytes().unwrap();
                MemChunk::from_bytes(Bytes::from(data), BLOCK_SIZE, 0).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_compression_ratio(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression_ratio");
    group.sample_size(10);

    for encoding in [Encoding::Gzip, Encoding::Lz4, Encoding::Snappy] {
        group.bench_function(encoding.to_string(), |b| {
            b.iter(|| {
                let chunk = build_chunk(encoding, 5_000, 256);
                let compressed = chunk.compressed_size();
                let uncompressed = chunk.uncompressed_size();
                (compressed, uncompressed)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_chunk_append,
    bench_chunk_decode,
    bench_chunk_roundtrip,
    bench_compression_ratio
);
criterion_main!(benches);
