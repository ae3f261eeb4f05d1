#![allow(clippy::unwrap_used)]

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use netsync::utils::compression::{compress, decompress, CompressionKind};

/// Text-like input; all-zero buffers flatter every codec
fn sample(size: usize) -> Vec<u8> {
    b"player moved to (12, 40) facing north; "
        .iter()
        .copied()
        .cycle()
        .take(size)
        .collect()
}

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");
    let sizes = [64usize, 512, 4096, 65536, 1024 * 1024];

    for &size in &sizes {
        let data = sample(size);
        group.throughput(Throughput::Bytes(size as u64));

        for kind in [CompressionKind::Lz4, CompressionKind::Zstd] {
            let name = format!("{kind:?}").to_lowercase();

            group.bench_function(format!("{name}_compress_{size}b"), |b| {
                b.iter_batched(
                    || data.clone(),
                    |d| compress(&d, &kind).unwrap(),
                    BatchSize::SmallInput,
                )
            });

            let compressed = compress(&data, &kind).unwrap();
            group.bench_function(format!("{name}_decompress_{size}b"), |b| {
                b.iter(|| {
                    let out = decompress(&compressed, &kind).unwrap();
                    assert_eq!(out.len(), data.len());
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_compression);
criterion_main!(benches);
