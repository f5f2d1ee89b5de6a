//! Chunk grid arithmetic.
//!
//! Immutable once a handler is built: cube geometry, the chunk shape, and
//! the index/offset math that places chunks in the file.

use cube_core::{PixelCodec, PixelType};

use crate::chunk::ChunkIndex;
use crate::label::CubeGeometry;
use crate::planner::ChunkShape;

/// Geometry, chunk shape and derived counts of one cube.
#[derive(Debug, Clone)]
pub struct ChunkGrid {
    geometry: CubeGeometry,
    shape: ChunkShape,
    counts: (usize, usize, usize),
    codec: PixelCodec,
}

impl ChunkGrid {
    pub fn new(geometry: CubeGeometry, shape: ChunkShape) -> Self {
        let counts = (
            geometry.samples.div_ceil(shape.samples),
            geometry.lines.div_ceil(shape.lines),
            geometry.bands.div_ceil(shape.bands),
        );
        let codec = PixelCodec::new(
            geometry.pixel_type,
            geometry.byte_order,
            geometry.base,
            geometry.multiplier,
        );
        Self {
            geometry,
            shape,
            counts,
            codec,
        }
    }

    #[inline]
    pub fn geometry(&self) -> &CubeGeometry {
        &self.geometry
    }

    #[inline]
    pub fn shape(&self) -> ChunkShape {
        self.shape
    }

    #[inline]
    pub fn codec(&self) -> &PixelCodec {
        &self.codec
    }

    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.geometry.pixel_type
    }

    #[inline]
    pub fn samples(&self) -> i64 {
        self.geometry.samples as i64
    }

    #[inline]
    pub fn lines(&self) -> i64 {
        self.geometry.lines as i64
    }

    #[inline]
    pub fn bands(&self) -> i64 {
        self.geometry.bands as i64
    }

    /// Chunks along the sample axis.
    #[inline]
    pub fn chunks_in_samples(&self) -> usize {
        self.counts.0
    }

    /// Chunks along the line axis.
    #[inline]
    pub fn chunks_in_lines(&self) -> usize {
        self.counts.1
    }

    /// Chunks along the band axis.
    #[inline]
    pub fn chunks_in_bands(&self) -> usize {
        self.counts.2
    }

    /// Total number of chunks.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.counts.0 * self.counts.1 * self.counts.2
    }

    #[inline]
    pub fn bytes_per_chunk(&self) -> usize {
        self.shape.bytes(self.geometry.pixel_type)
    }

    /// Bytes of pixel data including edge padding.
    #[inline]
    pub fn data_size(&self) -> u64 {
        self.chunk_count() as u64 * self.bytes_per_chunk() as u64
    }

    /// 0-based offset of the first pixel byte.
    #[inline]
    pub fn data_start(&self) -> u64 {
        self.geometry.start_byte
    }

    /// File offset of a chunk.
    #[inline]
    pub fn chunk_offset(&self, index: ChunkIndex) -> u64 {
        self.data_start() + index as u64 * self.bytes_per_chunk() as u64
    }

    /// Index of the chunk at grid position `(cx, cy, cz)`.
    #[inline]
    pub fn index_of(&self, cx: usize, cy: usize, cz: usize) -> ChunkIndex {
        cx + cy * self.counts.0 + cz * self.counts.0 * self.counts.1
    }

    /// Index of the chunk holding an in-cube pixel.
    pub fn index_at(&self, sample: i64, line: i64, band: i64) -> ChunkIndex {
        self.index_of(
            ((sample - 1) as usize) / self.shape.samples,
            ((line - 1) as usize) / self.shape.lines,
            ((band - 1) as usize) / self.shape.bands,
        )
    }

    /// Inclusive `(start, end)` cuboid of a chunk, including padding.
    pub fn chunk_placement(&self, index: ChunkIndex) -> ((i64, i64, i64), (i64, i64, i64)) {
        let cx = index % self.counts.0;
        let rest = index / self.counts.0;
        let cy = rest % self.counts.1;
        let cz = rest / self.counts.1;

        let start = (
            (cx * self.shape.samples) as i64 + 1,
            (cy * self.shape.lines) as i64 + 1,
            (cz * self.shape.bands) as i64 + 1,
        );
        let end = (
            start.0 + self.shape.samples as i64 - 1,
            start.1 + self.shape.lines as i64 - 1,
            start.2 + self.shape.bands as i64 - 1,
        );
        (start, end)
    }
}
