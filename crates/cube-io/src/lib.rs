//! # cube-io
//!
//! Chunked, cached read/write engine for very large multi-band image cubes.
//!
//! A cube is a 3-D raster (samples x lines x bands) stored as fixed-size
//! chunks inside one data file. Callers read and write arbitrary rectangles
//! through a [`Buffer`](cube_core::Buffer); the engine finds the covering
//! chunks, keeps them in a bounded cache, converts between stored bytes and
//! DNs, and writes dirty chunks back.
//!
//! # Architecture
//!
//! - [`Cube`] - facade: creation defaults, access mode, band validation
//! - [`CubeIoHandler`] - the engine: chunk lookup, cache, write-back queue
//! - [`policy`] - [`CachingPolicy`] implementations deciding what to evict
//! - [`layout`] - [`LayoutDriver`]s for band-sequential and tiled files
//! - [`planner`] - chunk-shape selection
//! - [`label`] - the keywords the engine reads and writes
//! - [`config`] - write worker mode and size limits
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cube_core::{Buffer, PixelType};
//! use cube_io::{Cube, CubeSpec, CubeFormat};
//!
//! # fn main() -> cube_core::Result<()> {
//! let spec = CubeSpec {
//!     samples: 1024,
//!     lines: 1024,
//!     pixel_type: PixelType::S2,
//!     format: CubeFormat::Tile,
//!     ..Default::default()
//! };
//! let mut cube = Cube::create("out.cub", &spec)?;
//!
//! let mut tile = Buffer::brick(128, 128, 1, PixelType::F4)?;
//! tile.set_base_position(129, 1, 1);
//! tile.fill(42.0);
//! cube.write(&tile)?;
//! cube.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Threading
//!
//! A handler is driven from one thread (`&mut self`). When the write worker
//! is enabled (see [`WriteThreadMode`]) writes are batched and applied by a
//! `cube-write` thread; reads and `close` drain the queue first.
//!
//! # Dependencies
//!
//! - [`cube-core`] - pixel types, codec, buffer, errors
//! - [`byteorder`] - typed access to chunk bytes
//! - [`serde`] / [`serde_json`] - label persistence
//! - [`tracing`] - logging

pub mod chunk;
pub mod config;
mod cube;
pub mod grid;
mod handler;
pub mod label;
pub mod layout;
pub mod planner;
pub mod policy;
mod worker;

pub use chunk::{ChunkElement, ChunkIndex, RawCubeChunk};
pub use config::{IoConfig, WriteThreadMode};
pub use cube::{AccessMode, Cube, CubeSpec, DEFAULT_LABEL_BYTES};
pub use grid::ChunkGrid;
pub use handler::{CubeIoHandler, DataFileGuard, MAX_FLUSH_SIZE, MIN_FLUSH_SIZE};
pub use label::{CubeGeometry, Label, LayoutHints};
pub use layout::{CubeFile, CubeFormat, LayoutDriver};
pub use planner::ChunkShape;
pub use policy::{BoxcarPolicy, CacheResult, CachingPolicy, FilterPolicy, RegionalPolicy, UniqueIoPolicy};
pub use worker::TARGET_BATCH_MS;

pub use cube_core::{Error, ErrorKind, Result};
