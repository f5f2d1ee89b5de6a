//! Tiled layout.

use cube_core::Result;

use super::{CubeFormat, LayoutDriver};
use crate::label::{keys, CubeGeometry, Label, LayoutHints};
use crate::planner::{plan_tile, ChunkShape};

/// Single-band tiles; all tiles of a band precede those of the next band.
///
/// `TileSamples`/`TileLines` from the label are honored, so a cube reopens
/// with the tiling it was written with.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileDriver;

impl LayoutDriver for TileDriver {
    fn format(&self) -> CubeFormat {
        CubeFormat::Tile
    }

    fn plan(&self, geometry: &CubeGeometry, hints: &LayoutHints) -> Result<ChunkShape> {
        plan_tile(
            geometry.samples,
            geometry.lines,
            geometry.pixel_type,
            hints.tile_samples,
            hints.tile_lines,
        )
    }

    fn update_labels(&self, shape: &ChunkShape, label: &mut Label) {
        label.set(keys::FORMAT, CubeFormat::Tile.label_name());
        label.set(keys::TILE_SAMPLES, shape.samples);
        label.set(keys::TILE_LINES, shape.lines);
    }
}
