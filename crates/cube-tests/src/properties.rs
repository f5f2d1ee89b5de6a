//! Properties that hold for every geometry, pixel type and access pattern.

use approx::assert_relative_eq;
use cube_core::{PixelType, SpecialPixel, HIGH_INSTR_SAT8, HIGH_REPR_SAT8, LOW_INSTR_SAT8, LOW_REPR_SAT8, NULL8};
use cube_io::{AccessMode, Cube, CubeFormat, CubeSpec, FilterPolicy, IoConfig};
use std::path::Path;
use tempfile::tempdir;

use crate::{file_bytes, read_region, region, spec, sync_config, worker_config};

fn tiled(samples: usize, lines: usize, bands: usize, ty: PixelType, tile: (usize, usize)) -> CubeSpec {
    CubeSpec {
        tile_samples: Some(tile.0),
        tile_lines: Some(tile.1),
        ..spec(samples, lines, bands, ty, CubeFormat::Tile)
    }
}

#[test]
fn round_trip_every_pixel_type() {
    let dir = tempdir().unwrap();
    for ty in PixelType::ALL {
        for format in [CubeFormat::Bsq, CubeFormat::Tile] {
            let path = dir.path().join(format!("rt-{ty}-{format}.cub"));
            let spec = CubeSpec {
                tile_samples: Some(4),
                tile_lines: Some(3),
                ..spec(7, 5, 2, ty, format)
            };
            let values: Vec<f64> = (0..70).map(|i| 5.0 + (i % 16) as f64).collect();

            let mut cube = Cube::create_with_config(&path, &spec, sync_config()).unwrap();
            cube.write(&region((1, 1, 1), (7, 5, 2), ty, &values)).unwrap();
            assert_eq!(read_region(&mut cube, (1, 1, 1), (7, 5, 2)), values, "{ty} {format}");
            let label = cube.label().clone();
            cube.close().unwrap();

            let mut cube = Cube::open_with_config(&path, label, AccessMode::ReadOnly, None, sync_config()).unwrap();
            assert_eq!(read_region(&mut cube, (1, 1, 1), (7, 5, 2)), values, "{ty} {format} reopened");
        }
    }
}

#[test]
fn scaled_integers_quantize() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scaled.cub");
    let spec = CubeSpec {
        base: 100.0,
        multiplier: 0.5,
        ..spec(3, 1, 1, PixelType::S2, CubeFormat::Bsq)
    };
    let mut cube = Cube::create_with_config(&path, &spec, sync_config()).unwrap();
    cube.write(&region((1, 1, 1), (3, 1, 1), PixelType::F8, &[150.25, 99.0, -3.5])).unwrap();
    let dns = read_region(&mut cube, (1, 1, 1), (3, 1, 1));
    assert_relative_eq!(dns[0], 150.5);
    assert_relative_eq!(dns[1], 99.0);
    assert_relative_eq!(dns[2], -3.5);
}

#[test]
fn specials_survive_every_type_that_stores_them() {
    let dir = tempdir().unwrap();
    let specials = [NULL8, LOW_REPR_SAT8, LOW_INSTR_SAT8, HIGH_INSTR_SAT8, HIGH_REPR_SAT8];
    for ty in PixelType::ALL.into_iter().filter(|&t| t != PixelType::U1) {
        let path = dir.path().join(format!("sp-{ty}.cub"));
        let mut cube = Cube::create_with_config(&path, &spec(5, 1, 1, ty, CubeFormat::Bsq), sync_config()).unwrap();
        cube.write(&region((1, 1, 1), (5, 1, 1), PixelType::F8, &specials)).unwrap();
        let dns = read_region(&mut cube, (1, 1, 1), (5, 1, 1));
        for (got, want) in dns.iter().zip(specials) {
            assert_eq!(SpecialPixel::classify(*got), SpecialPixel::classify(want), "{ty}");
        }
    }
}

#[test]
fn out_of_cube_reads_are_null() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("oob.cub");
    let mut cube = Cube::create_with_config(&path, &tiled(5, 4, 1, PixelType::S4, (2, 2)), sync_config()).unwrap();
    let values: Vec<f64> = (0..20).map(|i| i as f64 * 10.0).collect();
    cube.write(&region((1, 1, 1), (5, 4, 1), PixelType::S4, &values)).unwrap();

    let dns = read_region(&mut cube, (-1, 0, 1), (9, 6, 2));
    for (i, &dn) in dns.iter().enumerate() {
        let s = (i % 9) as i64 - 1;
        let l = ((i / 9) % 6) as i64;
        let b = (i / 54) as i64 + 1;
        if (1..=5).contains(&s) && (1..=4).contains(&l) && b == 1 {
            assert_eq!(dn, values[((l - 1) * 5 + s - 1) as usize], "pixel {s},{l},{b}");
        } else {
            assert_eq!(dn, NULL8, "pixel {s},{l},{b}");
        }
    }
}

#[test]
fn never_written_regions_read_null() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("null.cub");
    let mut cube = Cube::create_with_config(&path, &tiled(12, 12, 2, PixelType::U2, (4, 4)), sync_config()).unwrap();
    cube.write(&region((1, 1, 1), (4, 4, 1), PixelType::U2, &[7.0; 16])).unwrap();
    assert!(read_region(&mut cube, (5, 5, 1), (8, 8, 2)).iter().all(|&dn| dn == NULL8));

    let label = cube.label().clone();
    cube.close().unwrap();
    let mut cube = Cube::open_with_config(&path, label, AccessMode::ReadOnly, None, sync_config()).unwrap();
    assert!(read_region(&mut cube, (5, 5, 1), (8, 8, 2)).iter().all(|&dn| dn == NULL8));
    assert_eq!(read_region(&mut cube, (1, 1, 1), (4, 4, 1)), [7.0; 16]);
}

#[test]
fn swapped_virtual_bands() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("swap.cub");
    let mut cube = Cube::create_with_config(&path, &spec(2, 2, 2, PixelType::F4, CubeFormat::Tile), sync_config()).unwrap();
    cube.write(&region((1, 1, 1), (2, 2, 2), PixelType::F4, &[1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]))
        .unwrap();
    let label = cube.label().clone();
    cube.close().unwrap();

    let mut cube = Cube::open_with_config(&path, label, AccessMode::ReadWrite, Some(vec![2, 1]), sync_config()).unwrap();
    assert_eq!(read_region(&mut cube, (1, 1, 1), (2, 2, 1)), [2.0; 4]);
    cube.write(&region((1, 1, 2), (2, 2, 1), PixelType::F4, &[5.0; 4])).unwrap();
    cube.set_virtual_bands(None).unwrap();
    assert_eq!(read_region(&mut cube, (1, 1, 1), (2, 2, 1)), [5.0; 4]);
    assert_eq!(read_region(&mut cube, (1, 1, 2), (2, 2, 1)), [2.0; 4]);
}

/// Writes a 9x9 gradient into a 10x10 tiled cube with `writer`.
fn build(path: &Path, config: IoConfig, writer: impl Fn(&mut Cube, &[f64])) {
    let values: Vec<f64> = (0..81).map(|i| (i * 3) as f64 - 40.0).collect();
    let mut cube = Cube::create_with_config(path, &tiled(10, 10, 1, PixelType::S2, (4, 3)), config).unwrap();
    writer(&mut cube, &values);
    cube.close().unwrap();
}

fn by_lines(cube: &mut Cube, values: &[f64]) {
    for l in 0..9 {
        let row = &values[l * 9..(l + 1) * 9];
        cube.write(&region((2, l as i64 + 2, 1), (9, 1, 1), PixelType::S2, row)).unwrap();
    }
}

fn by_bricks(cube: &mut Cube, values: &[f64]) {
    for by in 0..3 {
        for bx in 0..3 {
            let mut brick = Vec::with_capacity(9);
            for l in 0..3 {
                for s in 0..3 {
                    brick.push(values[(by * 3 + l) * 9 + bx * 3 + s]);
                }
            }
            let origin = (bx as i64 * 3 + 2, by as i64 * 3 + 2, 1);
            cube.write(&region(origin, (3, 3, 1), PixelType::S2, &brick)).unwrap();
        }
    }
}

fn by_columns(cube: &mut Cube, values: &[f64]) {
    for s in (0..9).rev() {
        let column: Vec<f64> = (0..9).map(|l| values[l * 9 + s]).collect();
        cube.write(&region((s as i64 + 2, 2, 1), (1, 9, 1), PixelType::S2, &column)).unwrap();
    }
}

#[test]
fn write_order_does_not_change_file() {
    let dir = tempdir().unwrap();
    let paths = ["lines", "bricks", "columns"].map(|n| dir.path().join(format!("{n}.cub")));
    build(&paths[0], sync_config(), by_lines);
    build(&paths[1], sync_config(), by_bricks);
    build(&paths[2], sync_config(), by_columns);

    let expected = file_bytes(&paths[0]);
    assert!(file_bytes(&paths[1]) == expected);
    assert!(file_bytes(&paths[2]) == expected);
}

#[test]
fn worker_and_policies_do_not_change_file() {
    let dir = tempdir().unwrap();
    let sync = dir.path().join("sync.cub");
    let worker = dir.path().join("worker.cub");
    let filtered = dir.path().join("filtered.cub");

    build(&sync, sync_config(), by_lines);
    build(&worker, worker_config(), by_lines);
    build(&filtered, sync_config(), |cube, values| {
        cube.add_caching_policy(Box::new(FilterPolicy::new(1))).unwrap();
        by_bricks(cube, values);
    });

    let expected = file_bytes(&sync);
    assert!(file_bytes(&worker) == expected);
    assert!(file_bytes(&filtered) == expected);
}

#[test]
fn file_covers_every_chunk() {
    let dir = tempdir().unwrap();
    for (i, (s, l, b, tile)) in [(10, 10, 1, (4, 3)), (7, 13, 3, (7, 5)), (1, 1, 1, (1, 1))].into_iter().enumerate() {
        let path = dir.path().join(format!("size-{i}.cub"));
        let mut cube = Cube::create_with_config(&path, &tiled(s, l, b, PixelType::F8, tile), sync_config()).unwrap();
        let handler = cube.handler().unwrap();
        let cx = s.div_ceil(tile.0) as u64;
        let cy = l.div_ceil(tile.1) as u64;
        let required = 512 + cx * cy * b as u64 * (tile.0 * tile.1 * 8) as u64;
        assert_eq!(handler.data_size() + handler.data_start_byte(), required);
        assert!(std::fs::metadata(&path).unwrap().len() >= required);

        cube.write(&region((s as i64, l as i64, 1), (3, 3, 1), PixelType::F8, &[1.0; 9])).unwrap();
        cube.close().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() >= required);
    }
}
