//! Cache eviction policies.
//!
//! After every read or write the handler may ask its policies which cached
//! chunks to drop. Policies are tried in order, most recently added first,
//! until one returns something other than [`CacheResult::NotUnderstood`].
//!
//! | Policy | State | Keeps |
//! |--------|-------|-------|
//! | [`RegionalPolicy`] | none | a working set sized to the request, within 10 MiB |
//! | [`FilterPolicy`] | last N chunk sets | chunks used by any of the last N distinct requests |
//! | [`UniqueIoPolicy`] | last N chunk sets, LRU | same, with repeated requests moved to the back |
//! | [`BoxcarPolicy`] | lowest active line | chunks at or below the lowest line in use |
//!
//! Policies only see borrowed chunks and answer with chunk indices; the
//! handler does the eviction (and the write-back of dirty chunks).

use std::fmt;

use cube_core::Buffer;

use crate::chunk::{ChunkIndex, RawCubeChunk};

mod boxcar;
mod filter;
mod regional;
mod unique_io;

pub use boxcar::BoxcarPolicy;
pub use filter::FilterPolicy;
pub use regional::RegionalPolicy;
pub use unique_io::UniqueIoPolicy;

/// Outcome of asking a policy for eviction candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResult {
    /// The policy has no opinion; the next one is consulted.
    NotUnderstood,
    /// Free these chunks (possibly none).
    Evict(Vec<ChunkIndex>),
}

impl CacheResult {
    /// True unless [`CacheResult::NotUnderstood`].
    pub fn understood(&self) -> bool {
        !matches!(self, CacheResult::NotUnderstood)
    }
}

/// Strategy deciding which cached chunks to free.
pub trait CachingPolicy: Send + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Picks chunks to free.
    ///
    /// * `allocated` - every cached chunk, least recently used first
    /// * `just_used` - the chunks the last operation touched
    /// * `requested` - the buffer of the last operation
    fn recommend_chunks_to_free(
        &mut self,
        allocated: &[&RawCubeChunk],
        just_used: &[&RawCubeChunk],
        requested: &Buffer,
    ) -> CacheResult;
}

/// Sorted, deduplicated chunk indices of a chunk set.
pub(crate) fn index_set(chunks: &[&RawCubeChunk]) -> Vec<ChunkIndex> {
    let mut set: Vec<ChunkIndex> = chunks.iter().map(|c| c.index()).collect();
    set.sort_unstable();
    set.dedup();
    set
}

/// Allocated chunks absent from every remembered set.
pub(crate) fn not_remembered(allocated: &[&RawCubeChunk], remembered: &[&[ChunkIndex]]) -> Vec<ChunkIndex> {
    allocated
        .iter()
        .map(|c| c.index())
        .filter(|idx| !remembered.iter().any(|set| set.binary_search(idx).is_ok()))
        .collect()
}
