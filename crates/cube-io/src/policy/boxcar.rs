//! Boxcar (moving window) policy.

use cube_core::Buffer;

use super::{CacheResult, CachingPolicy};
use crate::chunk::RawCubeChunk;

/// Frees chunks that a top-to-bottom moving window has left behind.
///
/// Tracks the first line the window still uses. When every chunk of a
/// request starts further down the cube than that line, the line advances
/// to the topmost of them. Every cached chunk ending above it is evicted.
#[derive(Debug, Clone)]
pub struct BoxcarPolicy {
    min_line: i64,
}

impl BoxcarPolicy {
    pub fn new() -> Self {
        Self { min_line: 1 }
    }

    /// First line still considered in use.
    pub fn min_line(&self) -> i64 {
        self.min_line
    }
}

impl Default for BoxcarPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl CachingPolicy for BoxcarPolicy {
    fn name(&self) -> &'static str {
        "boxcar"
    }

    fn recommend_chunks_to_free(
        &mut self,
        allocated: &[&RawCubeChunk],
        just_used: &[&RawCubeChunk],
        _requested: &Buffer,
    ) -> CacheResult {
        if allocated.is_empty() {
            return CacheResult::NotUnderstood;
        }

        if let Some(lowest) = just_used.iter().map(|c| c.start_line()).min() {
            if lowest > self.min_line {
                self.min_line = lowest;
            }
        }

        let min_line = self.min_line;
        CacheResult::Evict(
            allocated
                .iter()
                .filter(|c| c.end_line() < min_line)
                .map(|c| c.index())
                .collect(),
        )
    }
}
