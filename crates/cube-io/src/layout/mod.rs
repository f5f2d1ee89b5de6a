//! On-disk layouts.
//!
//! A layout driver decides the chunk shape and tags the label with the keys
//! a later reader needs to find the chunks again. Raw chunk transfers are the
//! same for every layout: chunk `i` lives at `start + i * bytes_per_chunk`.
//!
//! - [`BsqDriver`] - band-sequential: full-width slabs of lines
//! - [`TileDriver`] - square-ish tiles

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cube_core::{Error, Result};
use tracing::trace;

use crate::chunk::RawCubeChunk;
use crate::grid::ChunkGrid;
use crate::label::{CubeGeometry, Label, LayoutHints};
use crate::planner::ChunkShape;

mod bsq;
mod tile;

pub use bsq::BsqDriver;
pub use tile::TileDriver;

/// Cube storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CubeFormat {
    /// Band-sequential.
    Bsq,
    /// Tiled.
    #[default]
    Tile,
}

impl CubeFormat {
    /// Value of the `Format` label keyword.
    pub const fn label_name(self) -> &'static str {
        match self {
            CubeFormat::Bsq => "BandSequential",
            CubeFormat::Tile => "Tile",
        }
    }
}

impl fmt::Display for CubeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_name())
    }
}

impl FromStr for CubeFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bandsequential" | "bsq" => Ok(CubeFormat::Bsq),
            "tile" => Ok(CubeFormat::Tile),
            _ => Err(Error::user(format!("unrecognized cube format [{s}]"))),
        }
    }
}

/// Data file of a cube.
///
/// All access goes through the handler's lock, so positioned transfers are
/// plain seek + read/write.
#[derive(Debug)]
pub struct CubeFile {
    path: PathBuf,
    file: File,
}

impl CubeFile {
    /// Wraps an already opened file.
    pub fn new(path: impl Into<PathBuf>, file: File) -> Self {
        Self {
            path: path.into(),
            file,
        }
    }

    /// Opens an existing file for reading, and for writing if `writable`.
    pub fn open(path: impl AsRef<Path>, writable: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::options().read(true).write(writable).open(path)?;
        Ok(Self::new(path, file))
    }

    /// Creates (or truncates) a file for reading and writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(path, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Grows or shrinks the file.
    pub fn set_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }

    /// Fills `buf` from `offset`. A short read is an I/O error.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let bytes = buf.len() as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|e| Error::io(&self.path, bytes, offset, e))
    }

    /// Writes all of `buf` at `offset`.
    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let bytes = buf.len() as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(buf))
            .map_err(|e| Error::io(&self.path, bytes, offset, e))
    }

    /// Pushes written data to the device.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

/// Placement of chunks on disk.
pub trait LayoutDriver: Send + Sync + fmt::Debug {
    /// Layout identifier.
    fn format(&self) -> CubeFormat;

    /// Chooses the chunk shape for a cube.
    fn plan(&self, geometry: &CubeGeometry, hints: &LayoutHints) -> Result<ChunkShape>;

    /// Adds the layout keywords to a label.
    fn update_labels(&self, shape: &ChunkShape, label: &mut Label);

    /// Fills `chunk` from the file.
    fn read_raw(&self, file: &mut CubeFile, grid: &ChunkGrid, chunk: &mut RawCubeChunk) -> Result<()> {
        let offset = grid.chunk_offset(chunk.index());
        trace!(index = chunk.index(), offset, "read chunk");
        file.read_at(offset, chunk.raw_data_mut())
    }

    /// Stores `chunk` in the file.
    fn write_raw(&self, file: &mut CubeFile, grid: &ChunkGrid, chunk: &RawCubeChunk) -> Result<()> {
        let offset = grid.chunk_offset(chunk.index());
        trace!(index = chunk.index(), offset, "write chunk");
        file.write_at(offset, chunk.raw_data())
    }
}

/// Driver for a format.
pub fn driver_for(format: CubeFormat) -> Box<dyn LayoutDriver> {
    match format {
        CubeFormat::Bsq => Box::new(BsqDriver),
        CubeFormat::Tile => Box::new(TileDriver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::{ByteOrder, ErrorKind, PixelType};

    fn grid() -> ChunkGrid {
        let geometry = CubeGeometry {
            samples: 4,
            lines: 4,
            bands: 1,
            pixel_type: PixelType::U1,
            byte_order: ByteOrder::Lsb,
            base: 0.0,
            multiplier: 1.0,
            start_byte: 10,
        };
        ChunkGrid::new(geometry, ChunkShape { samples: 2, lines: 2, bands: 1 })
    }

    #[test]
    fn format_names() {
        assert_eq!("BandSequential".parse::<CubeFormat>().unwrap(), CubeFormat::Bsq);
        assert_eq!("tile".parse::<CubeFormat>().unwrap(), CubeFormat::Tile);
        assert_eq!("Bil".parse::<CubeFormat>().unwrap_err().kind(), ErrorKind::User);
    }

    #[test]
    fn raw_transfers_land_at_chunk_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = CubeFile::create(dir.path().join("c.cub")).unwrap();
        let g = grid();
        file.set_len(g.data_start() + g.data_size()).unwrap();

        let driver = driver_for(CubeFormat::Tile);
        let (start, end) = g.chunk_placement(2);
        let mut chunk = RawCubeChunk::new(2, start, end, g.bytes_per_chunk());
        chunk.set_raw_data(&[1, 2, 3, 4]).unwrap();
        driver.write_raw(&mut file, &g, &chunk).unwrap();

        let mut back = RawCubeChunk::new(2, start, end, g.bytes_per_chunk());
        driver.read_raw(&mut file, &g, &mut back).unwrap();
        assert_eq!(back.raw_data(), &[1, 2, 3, 4]);

        let mut all = vec![0u8; 26];
        file.read_at(0, &mut all).unwrap();
        assert_eq!(&all[18..22], &[1, 2, 3, 4]);
    }

    #[test]
    fn short_read_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.cub");
        let mut file = CubeFile::create(&path).unwrap();
        file.set_len(12).unwrap();

        let g = grid();
        let (start, end) = g.chunk_placement(3);
        let mut chunk = RawCubeChunk::new(3, start, end, g.bytes_per_chunk());
        let err = BsqDriver.read_raw(&mut file, &g, &mut chunk).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        let msg = err.to_string();
        assert!(msg.contains("short.cub"));
        assert!(msg.contains("22"));
    }
}
