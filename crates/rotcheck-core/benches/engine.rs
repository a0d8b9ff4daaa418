//! Benchmarks for stream generation and verification.
//!
//! Run with: cargo bench -p rotcheck-core

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rotcheck_core::verifier::{compare_chunk, MismatchLog, VerifyConfig};
use rotcheck_core::{Generator, Verifier};
use std::hint::black_box;
use std::io::Cursor;

/// Produce `size` bytes of the test stream
fn stream(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    Generator::new().fill(&mut data).unwrap();
    data
}

/// Benchmark raw generator throughput for different chunk sizes
fn bench_generator(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");

    let sizes = [
        (4 * 1024, "4KB"),
        (64 * 1024, "64KB"),
        (1024 * 1024, "1MB"),
    ];

    for (size, size_name) in sizes {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(BenchmarkId::from_parameter(size_name), |b| {
            let mut generator = Generator::new();
            let mut buf = vec![0u8; size];
            b.iter(|| generator.fill(black_box(&mut buf)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark chunk comparison on clean and dirty data
fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");

    let size = 1024 * 1024;
    let expected = stream(size);
    let mut dirty = expected.clone();
    dirty[size / 2] ^= 0x01;

    group.throughput(Throughput::Bytes(size as u64));

    group.bench_function("clean", |b| {
        b.iter(|| {
            let mut log = MismatchLog::new();
            compare_chunk(black_box(&expected), black_box(&expected), 0, &mut log);
            log.count()
        });
    });

    group.bench_function("one_flip", |b| {
        b.iter(|| {
            let mut log = MismatchLog::new();
            compare_chunk(black_box(&expected), black_box(&dirty), 0, &mut log);
            log.count()
        });
    });

    group.finish();
}

/// Benchmark a full verification pass with different chunk sizes
fn bench_verify_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify_chunk_size");

    let data_size = 16 * 1024 * 1024;
    let data = stream(data_size);

    let chunk_sizes = [
        (4 * 1024, "4KB"),
        (64 * 1024, "64KB"),
        (1024 * 1024, "1MB"),
        (4 * 1024 * 1024, "4MB"),
    ];

    group.throughput(Throughput::Bytes(data_size as u64));

    for (chunk_size, chunk_name) in chunk_sizes {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_name),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut cursor = Cursor::new(&data);
                    let config = VerifyConfig::new().chunk_size(chunk_size);
                    let mut verifier = Verifier::with_config(config);
                    verifier
                        .verify(black_box(&mut cursor), data_size as u64)
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(50);
    targets = bench_generator, bench_compare, bench_verify_chunk_sizes
}
criterion_main!(benches);
