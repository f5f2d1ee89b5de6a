//! Band-sequential layout.

use cube_core::Result;

use super::{CubeFormat, LayoutDriver};
use crate::label::{keys, CubeGeometry, Label, LayoutHints};
use crate::planner::{plan_bsq, ChunkShape};

/// Lines of one band are contiguous on disk; a chunk spans the full sample
/// extent and as many lines as fit in 1 GiB.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsqDriver;

impl LayoutDriver for BsqDriver {
    fn format(&self) -> CubeFormat {
        CubeFormat::Bsq
    }

    fn plan(&self, geometry: &CubeGeometry, _hints: &LayoutHints) -> Result<ChunkShape> {
        plan_bsq(geometry.samples, geometry.lines, geometry.pixel_type)
    }

    fn update_labels(&self, _shape: &ChunkShape, label: &mut Label) {
        label.set(keys::FORMAT, CubeFormat::Bsq.label_name());
        label.remove(keys::TILE_SAMPLES);
        label.remove(keys::TILE_LINES);
    }
}
