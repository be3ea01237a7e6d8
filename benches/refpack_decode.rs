//! Benchmarks for RefPack decoding and seeking

use assetstream_rs::RefPackStream;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Compressed stream of `len` bytes mixing literals, short and medium copies
fn build_stream(len: usize) -> Vec<u8> {
    let mut ops = vec![0xE0, b'a', b'b', b'c', b'd'];
    let mut produced = 4;
    let mut step = 0u8;

    while produced + 67 + 3 < len {
        if step % 3 == 0 {
            // 3 literals, copy 67 from distance 4
            ops.extend_from_slice(&[0xBF, 0xC0, 0x03, b'x', b'y', step]);
            produced += 3 + 67;
        } else {
            // copy 10 from distance 4
            ops.extend_from_slice(&[0x1C, 0x03]);
            produced += 10;
        }
        step = step.wrapping_add(1);
    }

    // Pad with 3-byte runs copied from distance 1
    while len - produced >= 3 {
        ops.extend_from_slice(&[0x00, 0x00]);
        produced += 3;
    }
    let remaining = len - produced;
    ops.push(0xFC | remaining as u8);
    ops.extend(std::iter::repeat(b'z').take(remaining));

    let mut stream = vec![0x90, 0xFB];
    stream.extend_from_slice(&(len as u32).to_be_bytes());
    stream.extend_from_slice(&ops);
    stream
}

fn benchmark_decode_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("refpack_decode_full");

    for size in [64 * 1024, 1024 * 1024, 8 * 1024 * 1024].iter() {
        let stream = build_stream(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &stream, |b, stream| {
            let mut out = Vec::with_capacity(*size);
            b.iter(|| {
                out.clear();
                let mut decoder = RefPackStream::new(Cursor::new(stream.as_slice())).unwrap();
                decoder.read_to_end(&mut out).unwrap();
                black_box(out.len());
            });
        });
    }

    group.finish();
}

fn benchmark_seek(c: &mut Criterion) {
    let size = 1024 * 1024;
    let stream = build_stream(size);
    let mut group = c.benchmark_group("refpack_seek");

    group.bench_function("forward_half", |b| {
        b.iter(|| {
            let mut decoder = RefPackStream::new(Cursor::new(stream.as_slice())).unwrap();
            decoder.seek(SeekFrom::Start(black_box(size as u64 / 2))).unwrap();
            let mut buf = [0u8; 256];
            decoder.read_exact(&mut buf).unwrap();
            black_box(buf);
        });
    });

    group.bench_function("backward_restart", |b| {
        let mut decoder = RefPackStream::new(Cursor::new(stream.as_slice())).unwrap();
        decoder.seek(SeekFrom::End(0)).unwrap();
        b.iter(|| {
            decoder.seek(SeekFrom::Start(black_box(4096))).unwrap();
            let mut buf = [0u8; 256];
            decoder.read_exact(&mut buf).unwrap();
            black_box(buf);
            decoder.seek(SeekFrom::End(0)).unwrap();
        });
    });

    group.finish();
}

fn benchmark_small_reads(c: &mut Criterion) {
    let stream = build_stream(256 * 1024);

    c.bench_function("refpack_read_64_byte_blocks", |b| {
        b.iter(|| {
            let mut decoder = RefPackStream::new(Cursor::new(stream.as_slice())).unwrap();
            let mut buf = [0u8; 64];
            let mut total = 0;
            while let Ok(n) = decoder.read(&mut buf) {
                if n == 0 {
                    break;
                }
                total += n;
            }
            black_box(total);
        });
    });
}

criterion_group!(
    benches,
    benchmark_decode_full,
    benchmark_seek,
    benchmark_small_reads
);
criterion_main!(benches);
