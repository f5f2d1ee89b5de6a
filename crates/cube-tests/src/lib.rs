//! End-to-end tests for the cube I/O engine.
//!
//! Every test creates real cube files in a temporary directory and goes
//! through the public [`Cube`] facade, so layout, cache, codec and worker
//! are exercised together.

use std::path::Path;

use cube_core::{Buffer, PixelType};
use cube_io::{Cube, CubeFormat, CubeSpec, IoConfig, WriteThreadMode};

#[cfg(test)]
mod properties;
#[cfg(test)]
mod scenarios;

/// Every write applied in the caller's thread.
pub fn sync_config() -> IoConfig {
    IoConfig::new(WriteThreadMode::Off)
}

/// Every write routed through the background worker.
pub fn worker_config() -> IoConfig {
    IoConfig::new(WriteThreadMode::Always)
}

/// Cube parameters with a small label reserve and unit scaling.
pub fn spec(samples: usize, lines: usize, bands: usize, pixel_type: PixelType, format: CubeFormat) -> CubeSpec {
    CubeSpec {
        samples,
        lines,
        bands,
        pixel_type,
        format,
        label_bytes: 512,
        ..Default::default()
    }
}

/// A buffer positioned at `(sample, line, band)` holding `values`, or Null
/// when `values` is empty.
pub fn region(
    origin: (i64, i64, i64),
    dims: (usize, usize, usize),
    pixel_type: PixelType,
    values: &[f64],
) -> Buffer {
    let mut buffer = Buffer::brick(dims.0, dims.1, dims.2, pixel_type).unwrap();
    buffer.set_base_position(origin.0, origin.1, origin.2);
    if !values.is_empty() {
        buffer.copy_from(values).unwrap();
    }
    buffer
}

/// Reads a region as DNs.
pub fn read_region(cube: &mut Cube, origin: (i64, i64, i64), dims: (usize, usize, usize)) -> Vec<f64> {
    let mut buffer = region(origin, dims, PixelType::F8, &[]);
    cube.read(&mut buffer).unwrap();
    buffer.dns().to_vec()
}

/// Whole file contents.
pub fn file_bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
