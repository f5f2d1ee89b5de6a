//! End-to-end cases over small cubes, one per layout or access pattern.

use cube_core::{PixelType, SpecialPixel, HIGH_REPR_SAT8, NULL8};
use cube_io::{
    AccessMode, BoxcarPolicy, CachingPolicy, Cube, CubeFormat, CubeSpec, FilterPolicy, IoConfig,
    RegionalPolicy, UniqueIoPolicy, WriteThreadMode, MAX_FLUSH_SIZE, MIN_FLUSH_SIZE,
};
use std::path::Path;
use tempfile::tempdir;

use crate::{file_bytes, read_region, region, spec, sync_config};

#[test]
fn bsq_round_trip_u2() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.cub");
    let mut cube = Cube::create_with_config(&path, &spec(3, 2, 1, PixelType::U2, CubeFormat::Bsq), sync_config()).unwrap();

    let values = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
    cube.write(&region((1, 1, 1), (3, 2, 1), PixelType::U2, &values)).unwrap();
    assert_eq!(read_region(&mut cube, (1, 1, 1), (3, 2, 1)), values);

    let label = cube.label().clone();
    cube.close().unwrap();
    let mut cube = Cube::open_with_config(&path, label, AccessMode::ReadOnly, None, sync_config()).unwrap();
    assert_eq!(read_region(&mut cube, (1, 1, 1), (3, 2, 1)), values);
}

fn tile_spec_b() -> CubeSpec {
    CubeSpec {
        tile_samples: Some(8),
        tile_lines: Some(8),
        ..spec(16, 16, 1, PixelType::F4, CubeFormat::Tile)
    }
}

fn write_partial_overwrite(path: &Path, policy: Option<Box<dyn CachingPolicy>>) {
    let mut cube = Cube::create_with_config(path, &tile_spec_b(), sync_config()).unwrap();
    if let Some(policy) = policy {
        cube.add_caching_policy(policy).unwrap();
    }
    cube.write(&region((3, 3, 1), (10, 10, 1), PixelType::F4, &[1.5; 100])).unwrap();
    cube.close().unwrap();
}

#[test]
fn tile_partial_overwrite_f4() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("b.cub");
    let mut cube = Cube::create_with_config(&path, &tile_spec_b(), sync_config()).unwrap();
    assert_eq!(cube.handler().unwrap().chunk_count(), 4);

    cube.write(&region((3, 3, 1), (10, 10, 1), PixelType::F4, &[1.5; 100])).unwrap();
    let dns = read_region(&mut cube, (1, 1, 1), (16, 16, 1));
    for (i, &dn) in dns.iter().enumerate() {
        let (s, l) = (i % 16 + 1, i / 16 + 1);
        if (3..=12).contains(&s) && (3..=12).contains(&l) {
            assert_eq!(dn, 1.5, "pixel {s},{l}");
        } else {
            assert_eq!(dn, NULL8, "pixel {s},{l}");
        }
    }
    cube.close().unwrap();
}

#[test]
fn special_pixels_on_u1() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("c.cub");
    let mut cube = Cube::create_with_config(&path, &spec(4, 1, 1, PixelType::U1, CubeFormat::Bsq), sync_config()).unwrap();

    cube.write(&region((1, 1, 1), (4, 1, 1), PixelType::F8, &[NULL8, HIGH_REPR_SAT8, 0.0, 255.0]))
        .unwrap();
    let dns = read_region(&mut cube, (1, 1, 1), (4, 1, 1));
    let kinds: Vec<_> = dns.iter().map(|&dn| SpecialPixel::classify(dn)).collect();
    assert_eq!(
        kinds,
        [
            Some(SpecialPixel::Null),
            Some(SpecialPixel::HighReprSat),
            Some(SpecialPixel::Null),
            Some(SpecialPixel::HighReprSat),
        ]
    );
}

#[test]
fn virtual_bands_reverse() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("d.cub");
    let mut cube = Cube::create_with_config(&path, &spec(1, 1, 3, PixelType::F8, CubeFormat::Bsq), sync_config()).unwrap();
    cube.set_virtual_bands(Some(vec![3, 2, 1])).unwrap();
    cube.write(&region((1, 1, 1), (1, 1, 3), PixelType::F8, &[100.0, 200.0, 300.0])).unwrap();
    let label = cube.label().clone();
    cube.close().unwrap();

    let mut cube = Cube::open_with_config(&path, label, AccessMode::ReadOnly, None, sync_config()).unwrap();
    assert_eq!(read_region(&mut cube, (1, 1, 1), (1, 1, 3)), [300.0, 200.0, 100.0]);
}

#[test]
fn overflowing_writes_with_worker() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("e.cub");
    let config = IoConfig::new(WriteThreadMode::Optimized);
    let mut cube = Cube::create_with_config(&path, &spec(100, 100, 1, PixelType::U2, CubeFormat::Tile), config).unwrap();
    assert!(cube.handler().unwrap().worker_enabled());

    let mut line = region((1, 1, 1), (100, 1, 1), PixelType::U2, &[]);
    for i in 0..5000i64 {
        line.set_base_position(1, i % 100 + 1, 1);
        line.fill((1000 + i) as f64);
        cube.write(&line).unwrap();

        let ideal = cube.handler().unwrap().ideal_flush_size();
        assert!((MIN_FLUSH_SIZE..=MAX_FLUSH_SIZE).contains(&ideal), "flush size {ideal}");
    }

    let label = cube.label().clone();
    cube.close().unwrap();

    let mut cube = Cube::open_with_config(&path, label, AccessMode::ReadOnly, None, sync_config()).unwrap();
    let dns = read_region(&mut cube, (1, 1, 1), (100, 100, 1));
    for (l, row) in dns.chunks(100).enumerate() {
        let expected = (1000 + 4900 + l) as f64;
        assert!(row.iter().all(|&dn| dn == expected), "line {}", l + 1);
    }
}

#[test]
fn policy_independence() {
    let dir = tempdir().unwrap();
    let reference = dir.path().join("f-default.cub");
    write_partial_overwrite(&reference, None);
    let expected = file_bytes(&reference);

    let policies: Vec<(&str, Box<dyn CachingPolicy>)> = vec![
        ("regional", Box::new(RegionalPolicy::new())),
        ("filter", Box::new(FilterPolicy::new(2))),
        ("unique", Box::new(UniqueIoPolicy::new(2))),
        ("boxcar", Box::new(BoxcarPolicy::new())),
    ];
    for (name, policy) in policies {
        let path = dir.path().join(format!("f-{name}.cub"));
        write_partial_overwrite(&path, Some(policy));
        assert!(file_bytes(&path) == expected, "{name} policy changed the file");
    }
}
