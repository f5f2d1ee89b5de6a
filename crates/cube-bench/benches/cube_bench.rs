//! Benchmarks for the cube read/write paths.
//!
//! Run with: `cargo bench`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cube_core::{Buffer, ByteOrder, PixelCodec, PixelType};
use cube_io::{AccessMode, Cube, CubeFormat, CubeSpec, IoConfig, WriteThreadMode};

const SIZE: usize = 512;

fn spec(format: CubeFormat) -> CubeSpec {
    CubeSpec {
        samples: SIZE,
        lines: SIZE,
        bands: 1,
        pixel_type: PixelType::S2,
        format,
        label_bytes: 0,
        ..Default::default()
    }
}

fn line_buffer() -> Buffer {
    Buffer::line(SIZE, PixelType::F8).expect("line buffer")
}

/// Pixel conversion throughput per stored type.
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let dns: Vec<f64> = (0..4096).map(|i| (i % 1000) as f64).collect();
    group.throughput(Throughput::Elements(dns.len() as u64));

    for ty in [PixelType::U1, PixelType::S2, PixelType::F4] {
        let codec = PixelCodec::new(ty, ByteOrder::Msb, 0.0, 1.0);
        let mut stored = vec![0u8; dns.len() * ty.size_of()];
        let mut decoded = vec![0.0f64; dns.len()];

        group.bench_with_input(BenchmarkId::new("encode", ty), &dns, |b, dns| {
            b.iter(|| codec.encode_run(black_box(dns), &mut stored))
        });
        codec.encode_run(&dns, &mut stored);
        group.bench_with_input(BenchmarkId::new("decode", ty), &stored, |b, stored| {
            b.iter(|| codec.decode_run(black_box(stored), &mut decoded, None))
        });
    }

    group.finish();
}

/// Creating a cube line by line, synchronously and through the worker.
fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_lines");
    group.sample_size(10);
    group.throughput(Throughput::Bytes((SIZE * SIZE * 2) as u64));

    for format in [CubeFormat::Bsq, CubeFormat::Tile] {
        for mode in [WriteThreadMode::Off, WriteThreadMode::Always] {
            let id = BenchmarkId::new(format.label_name(), mode);
            group.bench_function(id, |b| {
                let dir = tempfile::tempdir().expect("tempdir");
                let path = dir.path().join("bench.cub");
                let mut line = line_buffer();
                b.iter(|| {
                    let mut cube = Cube::create_with_config(&path, &spec(format), IoConfig::new(mode))
                        .expect("create");
                    for l in 1..=SIZE as i64 {
                        line.set_base_position(1, l, 1);
                        line.fill(l as f64);
                        cube.write(&line).expect("write");
                    }
                    cube.close().expect("close");
                })
            });
        }
    }

    group.finish();
}

/// Reading a cube by lines and by tiles.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    group.sample_size(20);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("read.cub");
    let mut cube = Cube::create_with_config(&path, &spec(CubeFormat::Tile), IoConfig::new(WriteThreadMode::Off))
        .expect("create");
    let label = cube.label().clone();
    cube.close().expect("close");

    let config = IoConfig::new(WriteThreadMode::Off);
    group.bench_function("lines", |b| {
        let mut cube = Cube::open_with_config(&path, label.clone(), AccessMode::ReadOnly, None, config).expect("open");
        let mut line = line_buffer();
        b.iter(|| {
            for l in 1..=SIZE as i64 {
                line.set_base_position(1, l, 1);
                cube.read(&mut line).expect("read");
            }
            black_box(line.dns()[0])
        })
    });

    group.bench_function("tiles_64", |b| {
        let mut cube = Cube::open_with_config(&path, label.clone(), AccessMode::ReadOnly, None, config).expect("open");
        let mut tile = Buffer::brick(64, 64, 1, PixelType::S2).expect("tile buffer");
        b.iter(|| {
            for ty in 0..(SIZE / 64) as i64 {
                for tx in 0..(SIZE / 64) as i64 {
                    tile.set_base_position(tx * 64 + 1, ty * 64 + 1, 1);
                    cube.read(&mut tile).expect("read");
                }
            }
            black_box(tile.dns()[0])
        })
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_write, bench_read);
criterion_main!(benches);
