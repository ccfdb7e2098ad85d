use criterion::{black_box, criterion_group, criterion_main, Criterion};
use zss::codec::{get_codec, Codec};
use zss::crc::crc32c;
use zss::varint::write_uleb128;

fn bench_codecs(c: &mut Criterion) {
    let data = b"the quick brown fox jumps over the lazy dog ".repeat(1 << 14);
    for name in ["none", "deflate", "zstd", "lz4"] {
        let codec = get_codec(name).unwrap();
        c.bench_function(&format!("{name}_compress_1mb"), |b| {
            b.iter(|| codec.compress(black_box(&data)).unwrap())
        });
        let compressed = codec.compress(&data).unwrap();
        c.bench_function(&format!("{name}_decompress_1mb"), |b| {
            b.iter(|| codec.decompress(black_box(&compressed)).unwrap())
        });
    }
}

fn bench_crc32c(c: &mut Criterion) {
    let data = vec![0x5au8; 1 << 20];
    c.bench_function("crc32c_1mb", |b| b.iter(|| crc32c(black_box(&data))));
}

fn bench_uleb128(c: &mut Criterion) {
    c.bench_function("uleb128_encode_varied", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(10);
            for v in [0u64, 127, 128, 16_384, 4_000_000_000, u64::MAX] {
                buf.clear();
                write_uleb128(black_box(v), &mut buf);
            }
        })
    });
}

criterion_group!(benches, bench_codecs, bench_crc32c, bench_uleb128);
criterion_main!(benches);
