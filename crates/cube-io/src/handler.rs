//! Chunked cube I/O handler.
//!
//! [`CubeIoHandler`] turns "read this rectangle" and "write this rectangle"
//! into chunk loads, pixel conversion, and chunk write-backs.
//!
//! # Architecture
//!
//! ```text
//! caller Buffer ──► find covering chunks ──► cache hit? ──► decode / encode
//!                          │                     │ miss
//!                          │                     ├─ new cube, never written ─► null prototype
//!                          │                     └─ otherwise ─► LayoutDriver::read_raw
//!                          ▼
//!                    minimize cache ──► CachingPolicy ──► free (write back if dirty)
//! ```
//!
//! Writes may be queued for the background [`WriteWorker`](crate::worker)
//! instead of being applied in the caller's thread. A read always drains the
//! queue first, so it observes every earlier write.
//!
//! # Locking
//!
//! The handler's mutable engine state ([`IoState`]: file, cache, policies,
//! virtual bands) lives behind one mutex shared with the worker. The queue of
//! pending buffers is owned by the handler itself; `&mut self` on every public
//! call makes the caller side single-threaded.

use std::collections::HashMap;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, TryLockError};

use cube_core::{Buffer, Error, PixelType, Result, NULL8};
use tracing::{debug, error, trace, warn};

use crate::chunk::{ChunkIndex, RawCubeChunk};
use crate::config::IoConfig;
use crate::grid::ChunkGrid;
use crate::label::{CubeGeometry, Label, LayoutHints};
use crate::layout::{self, CubeFile, CubeFormat, LayoutDriver};
use crate::planner::ChunkShape;
use crate::policy::{CacheResult, CachingPolicy, RegionalPolicy};
use crate::worker::WriteWorker;

/// Smallest number of buffers handed to the worker at once.
pub const MIN_FLUSH_SIZE: usize = 32;
/// Largest number of buffers handed to the worker at once.
pub const MAX_FLUSH_SIZE: usize = 5000;

/// Cache footprint above which policies are consulted.
const MINIMIZE_THRESHOLD_BYTES: usize = 1024 * 1024;
/// Chunk count above which the cache is emptied when no policy answers.
const FALLBACK_MAX_CHUNKS: usize = 100;
/// Queue length, in multiples of the flush size, that counts as overflowing.
const OVERFLOW_FACTOR: usize = 10;
/// Consecutive overflows after which the worker is abandoned.
const MAX_CONSECUTIVE_OVERFLOWS: u32 = 10;

/// One chunk plane touched by a request: chunk, physical band inside it, and
/// the caller's (virtual) band that maps to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hit {
    index: ChunkIndex,
    physical_band: i64,
    virtual_band: i64,
}

/// Chunks of the previous full-line write, reused while lines stay inside
/// the same chunk row.
#[derive(Debug)]
struct LineChunks {
    band: i64,
    first_line: i64,
    last_line: i64,
    hits: Vec<Hit>,
}

/// Engine state guarded by the data-file lock.
pub(crate) struct IoState {
    file: CubeFile,
    driver: Box<dyn LayoutDriver>,
    cache: HashMap<ChunkIndex, RawCubeChunk>,
    on_disk: Option<Vec<bool>>,
    null_chunk: Option<Vec<u8>>,
    policies: Vec<Box<dyn CachingPolicy>>,
    virtual_bands: Option<Vec<i64>>,
    last_line_chunks: Option<LineChunks>,
    clock: u64,
    deferred_error: Option<Error>,
}

impl IoState {
    fn take_deferred(&mut self) -> Result<()> {
        match self.deferred_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn physical_band(&self, virtual_band: i64) -> Option<i64> {
        match &self.virtual_bands {
            Some(map) if virtual_band >= 1 => map.get((virtual_band - 1) as usize).copied(),
            Some(_) => None,
            None => Some(virtual_band),
        }
    }

    /// Caller band that owns `physical_band`: the first mapping entry that
    /// names it.
    fn virtual_band(&self, physical_band: i64) -> Option<i64> {
        match &self.virtual_bands {
            Some(map) => map
                .iter()
                .position(|&b| b == physical_band)
                .map(|k| k as i64 + 1),
            None => Some(physical_band),
        }
    }

    fn null_prototype(&mut self, grid: &ChunkGrid) -> &[u8] {
        self.null_chunk.get_or_insert_with(|| {
            let codec = grid.codec();
            let mut bytes = vec![0u8; grid.bytes_per_chunk()];
            for px in bytes.chunks_exact_mut(codec.pixel_size()) {
                codec.encode(NULL8, px);
            }
            bytes
        })
    }

    /// Makes chunk `index` resident and marks it most recently used.
    fn load_chunk(&mut self, grid: &ChunkGrid, index: ChunkIndex) -> Result<()> {
        self.clock += 1;
        let stamp = self.clock;
        if let Some(chunk) = self.cache.get_mut(&index) {
            chunk.touch(stamp);
            return Ok(());
        }

        let (start, end) = grid.chunk_placement(index);
        let mut chunk = RawCubeChunk::new(index, start, end, grid.bytes_per_chunk());

        let never_written = self.on_disk.as_ref().is_some_and(|map| !map[index]);
        if never_written {
            chunk.set_raw_data(self.null_prototype(grid))?;
            if let Some(map) = self.on_disk.as_mut() {
                map[index] = true;
            }
            trace!(index, "null chunk");
        } else {
            self.driver.read_raw(&mut self.file, grid, &mut chunk)?;
            chunk.set_dirty(false);
        }

        chunk.touch(stamp);
        self.cache.insert(index, chunk);
        Ok(())
    }

    /// Chunk whose extent equals the buffer's, if the buffer is exactly one
    /// in-cube chunk and no band remapping is active.
    fn aligned_chunk(&self, grid: &ChunkGrid, buffer: &Buffer) -> Option<ChunkIndex> {
        if self.virtual_bands.is_some() {
            return None;
        }
        let shape = grid.shape();
        let (s, l, b) = (buffer.sample(), buffer.line_start(), buffer.band());
        let fits = buffer.sample_dimension() == shape.samples
            && buffer.line_dimension() == shape.lines
            && buffer.band_dimension() == shape.bands
            && s >= 1
            && l >= 1
            && b >= 1
            && (s - 1) as usize % shape.samples == 0
            && (l - 1) as usize % shape.lines == 0
            && (b - 1) as usize % shape.bands == 0
            && s + shape.samples as i64 - 1 <= grid.samples()
            && l + shape.lines as i64 - 1 <= grid.lines()
            && b + shape.bands as i64 - 1 <= grid.bands();
        fits.then(|| grid.index_at(s, l, b))
    }

    fn chunk_hits(grid: &ChunkGrid, index: ChunkIndex) -> Vec<Hit> {
        let ((_, _, first), (_, _, last)) = grid.chunk_placement(index);
        (first..=last)
            .map(|band| Hit {
                index,
                physical_band: band,
                virtual_band: band,
            })
            .collect()
    }

    /// Loads every chunk intersecting the buffer, band by band, each band's
    /// chunk rectangle left to right and top to bottom.
    fn find_chunks(&mut self, grid: &ChunkGrid, buffer: &Buffer) -> Result<Vec<Hit>> {
        let (s0, s1) = clip(buffer.sample(), buffer.sample_dimension(), grid.samples());
        let (l0, l1) = clip(buffer.line_start(), buffer.line_dimension(), grid.lines());
        let mut hits = Vec::new();
        if s0 > s1 || l0 > l1 {
            return Ok(hits);
        }

        let shape = grid.shape();
        let columns = (s0 - 1) as usize / shape.samples..=(s1 - 1) as usize / shape.samples;
        let rows = (l0 - 1) as usize / shape.lines..=(l1 - 1) as usize / shape.lines;

        for virtual_band in buffer.band()..buffer.band() + buffer.band_dimension() as i64 {
            let Some(physical_band) = self.physical_band(virtual_band) else {
                continue;
            };
            if physical_band < 1 || physical_band > grid.bands() {
                continue;
            }
            // a duplicated physical band belongs to its first caller band only
            if self.virtual_band(physical_band) != Some(virtual_band) {
                continue;
            }
            let cz = (physical_band - 1) as usize / shape.bands;
            for cy in rows.clone() {
                for cx in columns.clone() {
                    let index = grid.index_of(cx, cy, cz);
                    self.load_chunk(grid, index)?;
                    hits.push(Hit {
                        index,
                        physical_band,
                        virtual_band,
                    });
                }
            }
        }
        Ok(hits)
    }

    /// Copies the chunk plane of `hit` into the buffer.
    fn decode(&self, grid: &ChunkGrid, hit: &Hit, buffer: &mut Buffer) -> Result<()> {
        let chunk = self.cached(hit.index)?;
        let Some(span) = Span::new(grid, chunk, buffer, hit) else {
            return Ok(());
        };
        let codec = grid.codec();
        let n = codec.pixel_size();
        let copy_raw = buffer.pixel_type() == grid.pixel_type();
        let stored = chunk.raw_data();
        let (dns, raw) = buffer.split_mut();

        for (row, line) in (span.l0..=span.l1).enumerate() {
            let Some(c) = chunk.pixel_offset(span.s0, line, hit.physical_band) else {
                continue;
            };
            let b = span.first + row * span.stride;
            let native = if copy_raw {
                Some(&mut raw[b * n..(b + span.run) * n])
            } else {
                None
            };
            codec.decode_run(&stored[c * n..(c + span.run) * n], &mut dns[b..b + span.run], native);
        }
        Ok(())
    }

    /// Copies the buffer into the chunk plane of `hit`.
    fn encode(&mut self, grid: &ChunkGrid, hit: &Hit, buffer: &Buffer) -> Result<()> {
        let chunk = self
            .cache
            .get_mut(&hit.index)
            .ok_or_else(|| Error::programmer(format!("chunk {} is not cached", hit.index)))?;
        let Some(span) = Span::new(grid, chunk, buffer, hit) else {
            return Ok(());
        };
        let codec = grid.codec();
        let n = codec.pixel_size();
        let dns = buffer.dns();

        for (row, line) in (span.l0..=span.l1).enumerate() {
            let Some(c) = chunk.pixel_offset(span.s0, line, hit.physical_band) else {
                continue;
            };
            let b = span.first + row * span.stride;
            codec.encode_run(&dns[b..b + span.run], &mut chunk.raw_data_mut()[c * n..(c + span.run) * n]);
        }
        chunk.set_dirty(true);
        Ok(())
    }

    fn cached(&self, index: ChunkIndex) -> Result<&RawCubeChunk> {
        self.cache
            .get(&index)
            .ok_or_else(|| Error::programmer(format!("chunk {index} is not cached")))
    }

    pub(crate) fn read(&mut self, grid: &ChunkGrid, buffer: &mut Buffer) -> Result<()> {
        let result = self.read_inner(grid, buffer);
        if result.is_err() {
            buffer.fill(NULL8);
        }
        result
    }

    fn read_inner(&mut self, grid: &ChunkGrid, buffer: &mut Buffer) -> Result<()> {
        let cached_before = self.cache.len();
        let hits = match self.aligned_chunk(grid, buffer) {
            Some(index) => {
                self.load_chunk(grid, index)?;
                Self::chunk_hits(grid, index)
            }
            None => {
                buffer.fill(NULL8);
                self.find_chunks(grid, buffer)?
            }
        };

        for hit in &hits {
            self.decode(grid, hit, buffer)?;
        }

        if self.cache.len() != cached_before {
            self.minimize_cache(grid, &hits, buffer)?;
        }
        Ok(())
    }

    /// Applies one buffer to the cache in the calling thread.
    pub(crate) fn synchronous_write(&mut self, grid: &ChunkGrid, buffer: &Buffer) -> Result<()> {
        let whole_line = buffer.sample() == 1
            && buffer.sample_dimension() as i64 == grid.samples()
            && buffer.line_dimension() == 1
            && buffer.band_dimension() == 1;

        let reused = if whole_line {
            self.last_line_chunks
                .as_ref()
                .filter(|c| {
                    c.band == buffer.band()
                        && buffer.line_start() >= c.first_line
                        && buffer.line_start() <= c.last_line
                })
                .map(|c| c.hits.clone())
        } else {
            None
        };

        let hits = match reused {
            Some(hits) => {
                for hit in &hits {
                    self.load_chunk(grid, hit.index)?;
                }
                hits
            }
            None => {
                let hits = match self.aligned_chunk(grid, buffer) {
                    Some(index) => {
                        self.load_chunk(grid, index)?;
                        Self::chunk_hits(grid, index)
                    }
                    None => self.find_chunks(grid, buffer)?,
                };
                if whole_line {
                    self.last_line_chunks = hits
                        .first()
                        .and_then(|hit| self.cache.get(&hit.index))
                        .map(|chunk| LineChunks {
                            band: buffer.band(),
                            first_line: chunk.start_line(),
                            last_line: chunk.end_line(),
                            hits: hits.clone(),
                        });
                }
                hits
            }
        };

        for hit in &hits {
            self.encode(grid, hit, buffer)?;
        }
        self.minimize_cache(grid, &hits, buffer)
    }

    /// Asks the policies which chunks to drop after an operation.
    fn minimize_cache(&mut self, grid: &ChunkGrid, hits: &[Hit], requested: &Buffer) -> Result<()> {
        let cache_bytes = self.cache.len() * grid.bytes_per_chunk();
        if cache_bytes <= MINIMIZE_THRESHOLD_BYTES && self.policies.len() <= 1 {
            return Ok(());
        }

        let recommendation = {
            let mut allocated: Vec<&RawCubeChunk> = self.cache.values().collect();
            allocated.sort_by_key(|c| c.last_used());

            let mut used: Vec<ChunkIndex> = hits.iter().map(|h| h.index).collect();
            used.sort_unstable();
            used.dedup();
            let just_used: Vec<&RawCubeChunk> = used.iter().filter_map(|i| self.cache.get(i)).collect();

            let mut recommendation = None;
            for policy in self.policies.iter_mut() {
                if let CacheResult::Evict(chunks) =
                    policy.recommend_chunks_to_free(&allocated, &just_used, requested)
                {
                    trace!(policy = policy.name(), evicting = chunks.len(), "cache policy");
                    recommendation = Some(chunks);
                    break;
                }
            }
            recommendation
        };

        match recommendation {
            Some(chunks) => {
                for index in chunks {
                    self.free_chunk(grid, index)?;
                }
            }
            None if self.cache.len() > FALLBACK_MAX_CHUNKS => {
                warn!(chunks = self.cache.len(), "no caching policy applied; clearing cube cache");
                self.flush_cache(grid)?;
            }
            None => {}
        }
        Ok(())
    }

    /// Writes a chunk back if dirty, then drops it. On a failed write the
    /// chunk stays cached and dirty.
    fn free_chunk(&mut self, grid: &ChunkGrid, index: ChunkIndex) -> Result<()> {
        let Some(chunk) = self.cache.get_mut(&index) else {
            return Ok(());
        };
        if chunk.is_dirty() {
            self.driver.write_raw(&mut self.file, grid, chunk)?;
            chunk.set_dirty(false);
        }
        self.cache.remove(&index);
        self.last_line_chunks = None;
        trace!(index, "evicted chunk");
        Ok(())
    }

    /// Writes every dirty chunk and empties the cache.
    pub(crate) fn flush_cache(&mut self, grid: &ChunkGrid) -> Result<()> {
        let mut indices: Vec<ChunkIndex> = self.cache.keys().copied().collect();
        indices.sort_unstable();
        for index in indices {
            self.free_chunk(grid, index)?;
        }
        self.last_line_chunks = None;
        Ok(())
    }

    /// Fills every chunk of a new cube that was never touched with Null.
    fn write_null_data(&mut self, grid: &ChunkGrid) -> Result<()> {
        if self.on_disk.is_none() {
            return Ok(());
        }
        let prototype = self.null_prototype(grid).to_vec();
        let Some(on_disk) = self.on_disk.as_ref() else {
            return Ok(());
        };

        let mut written = 0usize;
        for (index, _) in on_disk.iter().enumerate().filter(|(_, seen)| !**seen) {
            let (start, end) = grid.chunk_placement(index);
            let mut chunk = RawCubeChunk::new(index, start, end, prototype.len());
            chunk.set_raw_data(&prototype)?;
            self.driver.write_raw(&mut self.file, grid, &chunk)?;
            written += 1;
        }
        debug!(chunks = written, "wrote null chunks");
        self.on_disk = None;
        Ok(())
    }

    /// Final write-out: untouched chunks, dirty chunks, then a device flush.
    fn finish(&mut self, grid: &ChunkGrid) -> Result<()> {
        self.write_null_data(grid)?;
        self.flush_cache(grid)?;
        self.file.flush()
    }

    pub(crate) fn flush_file(&mut self) -> Result<()> {
        self.file.flush()
    }
}

/// Intersection of a chunk plane with a buffer, clipped to the cube.
struct Span {
    s0: i64,
    l0: i64,
    l1: i64,
    run: usize,
    first: usize,
    stride: usize,
}

impl Span {
    fn new(grid: &ChunkGrid, chunk: &RawCubeChunk, buffer: &Buffer, hit: &Hit) -> Option<Self> {
        let s0 = chunk.start_sample().max(buffer.sample()).max(1);
        let s1 = chunk
            .end_sample()
            .min(buffer.sample() + buffer.sample_dimension() as i64 - 1)
            .min(grid.samples());
        let l0 = chunk.start_line().max(buffer.line_start()).max(1);
        let l1 = chunk
            .end_line()
            .min(buffer.line_start() + buffer.line_dimension() as i64 - 1)
            .min(grid.lines());
        if s0 > s1 || l0 > l1 {
            return None;
        }
        let first = buffer.index(s0, l0, hit.virtual_band)?;
        Some(Self {
            s0,
            l0,
            l1,
            run: (s1 - s0 + 1) as usize,
            first,
            stride: buffer.sample_dimension(),
        })
    }
}

fn clip(start: i64, len: usize, extent: i64) -> (i64, i64) {
    (start.max(1), (start + len as i64 - 1).min(extent))
}

fn poisoned() -> Error {
    Error::programmer("cube I/O state lock poisoned")
}

/// State shared between the handler and its write worker.
pub(crate) struct Shared {
    pub(crate) grid: ChunkGrid,
    state: Mutex<IoState>,
    pub(crate) ideal_flush_size: AtomicUsize,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl Shared {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, IoState>> {
        self.state.lock().map_err(|_| poisoned())
    }

    /// Records a worker failure for the next caller.
    pub(crate) fn defer_error(&self, err: Error) {
        error!(error = %err, "background cube write failed");
        match self.state.lock() {
            Ok(mut state) => {
                if state.deferred_error.is_none() {
                    state.deferred_error = Some(err);
                }
            }
            Err(_) => error!("cannot record write failure: state lock poisoned"),
        }
    }

    pub(crate) fn begin_task(&self) -> Result<()> {
        *self.in_flight.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }

    pub(crate) fn end_task(&self) {
        if let Ok(mut n) = self.in_flight.lock() {
            *n = n.saturating_sub(1);
        }
        self.idle.notify_all();
    }

    /// Blocks until no worker task is queued or running.
    pub(crate) fn wait_idle(&self) -> Result<()> {
        let mut n = self.in_flight.lock().map_err(|_| poisoned())?;
        while *n > 0 {
            n = self.idle.wait(n).map_err(|_| poisoned())?;
        }
        Ok(())
    }
}

/// Exclusive borrow of the data file; see [`CubeIoHandler::lock_data_file`].
pub struct DataFileGuard<'a> {
    guard: MutexGuard<'a, IoState>,
}

impl Deref for DataFileGuard<'_> {
    type Target = CubeFile;

    fn deref(&self) -> &CubeFile {
        &self.guard.file
    }
}

impl DerefMut for DataFileGuard<'_> {
    fn deref_mut(&mut self) -> &mut CubeFile {
        &mut self.guard.file
    }
}

/// Reads and writes arbitrary rectangles of one cube through a chunk cache.
///
/// # Example
///
/// ```rust,no_run
/// use cube_core::{Buffer, PixelType};
/// use cube_io::{CubeFile, CubeIoHandler, IoConfig, Label};
///
/// # fn main() -> cube_core::Result<()> {
/// let label = Label::load_json("image.cub.label.json")?;
/// let file = CubeFile::open("image.cub", false)?;
/// let mut handler = CubeIoHandler::new(Some(file), &label, None, true, IoConfig::from_env())?;
///
/// let mut line = Buffer::line(handler.samples() as usize, PixelType::F4)?;
/// line.set_base_position(1, 10, 1);
/// handler.read(&mut line)?;
/// handler.close()?;
/// # Ok(())
/// # }
/// ```
pub struct CubeIoHandler {
    shared: Arc<Shared>,
    format: CubeFormat,
    pending: Vec<Buffer>,
    worker: Option<WriteWorker>,
    consecutive_overflows: u32,
    last_operation_was_write: bool,
    closed: bool,
}

impl CubeIoHandler {
    /// Builds a handler for `file` as described by `label`.
    ///
    /// * `virtual_bands` - caller band `k` maps to physical band
    ///   `virtual_bands[k - 1]`; `None` or empty means identity
    /// * `already_on_disk` - `false` for a cube being created: the file is
    ///   sized to hold every chunk and untouched chunks are written as Null
    ///   on close
    ///
    /// A missing file, or an existing file too small for its pixel data, is
    /// a programmer error.
    pub fn new(
        file: Option<CubeFile>,
        label: &Label,
        virtual_bands: Option<Vec<i64>>,
        already_on_disk: bool,
        config: IoConfig,
    ) -> Result<Self> {
        let Some(mut file) = file else {
            return Err(Error::programmer("cannot build a cube I/O handler without a data file"));
        };

        let geometry = CubeGeometry::from_label(label)?;
        let hints = LayoutHints::from_label(label)?;
        let driver = layout::driver_for(hints.format);
        let shape = driver.plan(&geometry, &hints)?;
        let grid = ChunkGrid::new(geometry, shape);

        let required = grid.data_start() + grid.data_size();
        if already_on_disk {
            let len = file.len()?;
            if len < required {
                return Err(Error::programmer(format!(
                    "file size [{len} bytes] not big enough to hold data [{required} bytes] \
                     where the offset to the cube data is [{} bytes]",
                    grid.data_start()
                )));
            }
        } else {
            file.set_len(required)?;
        }

        debug!(
            path = %file.path().display(),
            format = %hints.format,
            shape = %shape,
            chunks = grid.chunk_count(),
            new_cube = !already_on_disk,
            "cube I/O handler ready"
        );

        let on_disk = (!already_on_disk).then(|| vec![false; grid.chunk_count()]);
        let state = IoState {
            file,
            driver,
            cache: HashMap::new(),
            on_disk,
            null_chunk: None,
            policies: vec![Box::new(RegionalPolicy::new())],
            virtual_bands: virtual_bands.filter(|v| !v.is_empty()),
            last_line_chunks: None,
            clock: 0,
            deferred_error: None,
        };
        let shared = Arc::new(Shared {
            grid,
            state: Mutex::new(state),
            ideal_flush_size: AtomicUsize::new(MIN_FLUSH_SIZE),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
        });

        let worker = if config.worker_enabled(!already_on_disk) {
            Some(WriteWorker::spawn(Arc::clone(&shared))?)
        } else {
            None
        };

        Ok(Self {
            shared,
            format: hints.format,
            pending: Vec::new(),
            worker,
            consecutive_overflows: 0,
            last_operation_was_write: false,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::programmer("cube I/O handler is closed"));
        }
        Ok(())
    }

    /// Fills `buffer` with cube data. Out-of-cube pixels read as Null.
    pub fn read(&mut self, buffer: &mut Buffer) -> Result<()> {
        self.ensure_open()?;
        if self.last_operation_was_write {
            self.flush_write_cache(true)?;
            self.last_operation_was_write = false;
        }
        let mut state = self.shared.lock()?;
        state.take_deferred()?;
        state.read(&self.shared.grid, buffer)
    }

    /// Stores `buffer` in the cube. Out-of-cube pixels are dropped.
    ///
    /// With the worker enabled the buffer is copied into the pending queue
    /// and written later; errors from that later write surface on a
    /// subsequent call.
    pub fn write(&mut self, buffer: &Buffer) -> Result<()> {
        self.ensure_open()?;
        self.last_operation_was_write = true;
        if self.worker.is_some() {
            self.pending.push(buffer.clone());
            self.flush_write_cache(false)
        } else {
            let mut state = self.shared.lock()?;
            state.take_deferred()?;
            state.synchronous_write(&self.shared.grid, buffer)
        }
    }

    /// Probes the data-file lock, surfacing any deferred worker error.
    fn probe_file_lock(&self) -> Result<bool> {
        match self.shared.state.try_lock() {
            Ok(mut state) => {
                state.take_deferred()?;
                Ok(true)
            }
            Err(TryLockError::WouldBlock) => Ok(false),
            Err(TryLockError::Poisoned(_)) => Err(poisoned()),
        }
    }

    /// Hands pending buffers to the worker when the batch is large enough,
    /// degrading to synchronous writes when the worker falls behind.
    ///
    /// An overflowing queue that finds the data file busy is drained in the
    /// caller's thread and counts as an overflow. A due flush that finds the
    /// file free ends the streak. More than
    /// `MAX_CONSECUTIVE_OVERFLOWS` in a row stops the worker for good.
    fn flush_write_cache(&mut self, force: bool) -> Result<()> {
        if self.worker.is_none() {
            return self.write_pending_synchronously();
        }

        let queued = self.pending.len();
        let ideal = self.shared.ideal_flush_size.load(Ordering::Relaxed);
        let mut should_flush = queued >= ideal || force;
        let overflowing = queued > OVERFLOW_FACTOR * ideal;
        let mut can_flush = self.probe_file_lock()?;

        let mut force_start = false;
        if overflowing && !can_flush {
            self.consecutive_overflows += 1;
            force_start = true;
        } else if should_flush && can_flush {
            self.consecutive_overflows = 0;
        }

        if self.consecutive_overflows > MAX_CONSECUTIVE_OVERFLOWS {
            warn!(queued, "cube write worker cannot keep up; switching to synchronous writes");
            self.stop_worker()?;
            return self.write_pending_synchronously();
        }

        if force_start {
            self.shared.wait_idle()?;
            debug!(queued, "write queue overflowing; draining in caller thread");
            self.shared
                .ideal_flush_size
                .store(queued.clamp(MIN_FLUSH_SIZE, MAX_FLUSH_SIZE), Ordering::Relaxed);
            return self.write_pending_synchronously();
        }

        if force && queued > 0 {
            self.shared
                .ideal_flush_size
                .store(queued.clamp(MIN_FLUSH_SIZE, MAX_FLUSH_SIZE), Ordering::Relaxed);
            should_flush = true;
            can_flush = true;
        }

        if should_flush && can_flush && queued > 0 {
            let batch = mem::take(&mut self.pending);
            if let Some(worker) = &self.worker {
                worker.submit(batch)?;
            }
        }

        if force {
            self.shared.wait_idle()?;
            self.shared.lock()?.take_deferred()?;
        }
        Ok(())
    }

    fn write_pending_synchronously(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = mem::take(&mut self.pending);
        let mut state = self.shared.lock()?;
        state.take_deferred()?;
        for buffer in &pending {
            state.synchronous_write(&self.shared.grid, buffer)?;
        }
        Ok(())
    }

    fn stop_worker(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(mut worker) => worker.shutdown(),
            None => Ok(()),
        }
    }

    /// Drains pending writes, writes Null into never-touched chunks of a new
    /// cube, writes every dirty chunk, and flushes the file.
    ///
    /// Every step is attempted; the first error is returned. Closing twice
    /// is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error: Option<Error> = None;
        let mut record = |result: Result<()>| {
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        };

        record(self.flush_write_cache(true));
        record(self.stop_worker());

        let pending = mem::take(&mut self.pending);
        match self.shared.lock() {
            Ok(mut state) => {
                record(state.take_deferred());
                for buffer in &pending {
                    record(state.synchronous_write(&self.shared.grid, buffer));
                }
                record(state.finish(&self.shared.grid));
            }
            Err(err) => record(Err(err)),
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                debug!("cube I/O handler closed");
                Ok(())
            }
        }
    }

    /// True once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Replaces the virtual band mapping. Pending writes are applied first.
    pub fn set_virtual_bands(&mut self, virtual_bands: Option<Vec<i64>>) -> Result<()> {
        self.ensure_open()?;
        self.flush_write_cache(true)?;
        let mut state = self.shared.lock()?;
        state.virtual_bands = virtual_bands.filter(|v| !v.is_empty());
        state.last_line_chunks = None;
        Ok(())
    }

    /// Installs a caching policy ahead of the existing ones.
    pub fn add_caching_policy(&mut self, policy: Box<dyn CachingPolicy>) -> Result<()> {
        debug!(policy = policy.name(), "caching policy added");
        self.shared.lock()?.policies.insert(0, policy);
        Ok(())
    }

    /// Writes every dirty chunk and empties the cache.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_write_cache(true)?;
        self.last_operation_was_write = false;
        let mut state = self.shared.lock()?;
        state.take_deferred()?;
        state.flush_cache(&self.shared.grid)
    }

    /// Chunk shape is fixed at construction; changing it is always refused.
    pub fn set_chunk_sizes(&mut self, samples: i64, lines: i64, bands: i64) -> Result<()> {
        Err(Error::programmer(format!(
            "cannot change the chunk sizes once set (requested [{samples}x{lines}x{bands}], have [{}])",
            self.shared.grid.shape()
        )))
    }

    /// Borrows the data file for side-channel I/O. Release the guard before
    /// calling back into the handler.
    pub fn lock_data_file(&self) -> Result<DataFileGuard<'_>> {
        Ok(DataFileGuard {
            guard: self.shared.lock()?,
        })
    }

    /// Adds the layout keywords to `label`.
    pub fn update_labels(&self, label: &mut Label) -> Result<()> {
        let state = self.shared.lock()?;
        state.driver.update_labels(&self.shared.grid.shape(), label);
        Ok(())
    }

    /// Number of chunks currently cached.
    pub fn cached_chunks(&self) -> Result<usize> {
        Ok(self.shared.lock()?.cache.len())
    }

    /// Current worker batch size.
    pub fn ideal_flush_size(&self) -> usize {
        self.shared.ideal_flush_size.load(Ordering::Relaxed)
    }

    /// True while writes go through the background worker.
    pub fn worker_enabled(&self) -> bool {
        self.worker.is_some()
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.shared.grid
    }

    pub fn format(&self) -> CubeFormat {
        self.format
    }

    pub fn samples(&self) -> i64 {
        self.shared.grid.samples()
    }

    pub fn lines(&self) -> i64 {
        self.shared.grid.lines()
    }

    /// Physical band count.
    pub fn bands(&self) -> i64 {
        self.shared.grid.bands()
    }

    pub fn pixel_type(&self) -> PixelType {
        self.shared.grid.pixel_type()
    }

    pub fn chunk_shape(&self) -> ChunkShape {
        self.shared.grid.shape()
    }

    /// Bytes of pixel data, padding included.
    pub fn data_size(&self) -> u64 {
        self.shared.grid.data_size()
    }

    pub fn data_start_byte(&self) -> u64 {
        self.shared.grid.data_start()
    }

    pub fn bytes_per_chunk(&self) -> usize {
        self.shared.grid.bytes_per_chunk()
    }

    pub fn chunk_count(&self) -> usize {
        self.shared.grid.chunk_count()
    }

    pub fn chunks_in_samples(&self) -> usize {
        self.shared.grid.chunks_in_samples()
    }

    pub fn chunks_in_lines(&self) -> usize {
        self.shared.grid.chunks_in_lines()
    }

    pub fn chunks_in_bands(&self) -> usize {
        self.shared.grid.chunks_in_bands()
    }

    /// Inclusive cuboid covered by chunk `index`.
    pub fn chunk_placement(&self, index: ChunkIndex) -> ((i64, i64, i64), (i64, i64, i64)) {
        self.shared.grid.chunk_placement(index)
    }
}

impl Drop for CubeIoHandler {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close() {
                error!(error = %err, "closing cube I/O handler failed");
            }
        }
    }
}
