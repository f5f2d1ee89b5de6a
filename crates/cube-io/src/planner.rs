//! Chunk-shape planning.
//!
//! Every chunk of a cube has the same shape, chosen once before any I/O.
//! Both layouts try to divide the cube extents evenly so that edge chunks
//! carry little padding.
//!
//! | Layout | Samples | Lines | Bands |
//! |--------|---------|-------|-------|
//! | BSQ | all | `find_good_size(1 GiB / (pixel * samples), lines)` | 1 |
//! | Tile | `find_good_size(2048 / pixel, samples)` | same for lines | 1 |

use std::fmt;

use cube_core::{Error, PixelType, Result};
use serde::{Deserialize, Serialize};

/// Largest BSQ chunk in bytes.
pub const BSQ_MAX_CHUNK_BYTES: usize = 1024 * 1024 * 1024;

/// Byte budget for one tile row; tile extents are `TILE_AXIS_BYTES / pixel`.
pub const TILE_AXIS_BYTES: usize = 2048;

/// Extents of every chunk in a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkShape {
    /// Samples per chunk.
    pub samples: usize,
    /// Lines per chunk.
    pub lines: usize,
    /// Bands per chunk.
    pub bands: usize,
}

impl ChunkShape {
    /// Validates and builds a shape. Every extent must be at least 1.
    pub fn new(samples: i64, lines: i64, bands: i64) -> Result<Self> {
        for (axis, value) in [("samples", samples), ("lines", lines), ("bands", bands)] {
            if value < 1 {
                return Err(Error::programmer(format!(
                    "negative and zero chunk sizes are not supported, {axis} per chunk cannot be [{value}]"
                )));
            }
        }
        Ok(Self {
            samples: samples as usize,
            lines: lines as usize,
            bands: bands as usize,
        })
    }

    /// Pixels per chunk.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.samples * self.lines * self.bands
    }

    /// Bytes per chunk for `pixel_type`.
    #[inline]
    pub fn bytes(&self, pixel_type: PixelType) -> usize {
        self.pixel_count() * pixel_type.size_of()
    }
}

impl fmt::Display for ChunkShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.samples, self.lines, self.bands)
    }
}

/// Chunk extent for an axis of `dimension` pixels, at most `max_size`.
///
/// The whole axis when it fits; otherwise the largest divisor of
/// `dimension` not above `max_size`.
pub fn find_good_size(max_size: usize, dimension: usize) -> usize {
    if dimension <= max_size {
        return dimension.max(1);
    }
    (1..=max_size.max(1))
        .rev()
        .find(|size| dimension % size == 0)
        .unwrap_or(1)
}

/// Band-sequential shape: full-width, single-band slabs of lines.
pub fn plan_bsq(samples: usize, lines: usize, pixel_type: PixelType) -> Result<ChunkShape> {
    let row_bytes = pixel_type.size_of() * samples.max(1);
    let max_lines = (BSQ_MAX_CHUNK_BYTES / row_bytes).max(1);
    ChunkShape::new(samples as i64, find_good_size(max_lines, lines) as i64, 1)
}

/// Tiled shape. Explicit tile extents win; otherwise tiles target
/// [`TILE_AXIS_BYTES`] per axis.
pub fn plan_tile(
    samples: usize,
    lines: usize,
    pixel_type: PixelType,
    tile_samples: Option<i64>,
    tile_lines: Option<i64>,
) -> Result<ChunkShape> {
    let max_size = TILE_AXIS_BYTES / pixel_type.size_of();
    let tile_samples = tile_samples.unwrap_or_else(|| find_good_size(max_size, samples) as i64);
    let tile_lines = tile_lines.unwrap_or_else(|| find_good_size(max_size, lines) as i64);
    ChunkShape::new(tile_samples, tile_lines, 1)
}
