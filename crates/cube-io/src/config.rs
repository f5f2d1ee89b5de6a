//! Engine configuration.
//!
//! One process-wide setting decides whether the background write worker
//! runs. It is read once, when a handler is constructed, and captured in an
//! [`IoConfig`] so tests can pass their own.
//!
//! # Environment Variables
//!
//! - `CUBE_WRITE_THREAD` - `optimized` (default), `always` or `off`
//! - `CUBE_MAX_SIZE_GB` - largest cube [`Cube::create`](crate::Cube::create)
//!   accepts, in GiB (default 12)

use std::env;
use std::fmt;
use std::str::FromStr;

use cube_core::Error;

/// Environment variable selecting the [`WriteThreadMode`].
pub const WRITE_THREAD_ENV: &str = "CUBE_WRITE_THREAD";

/// Environment variable overriding [`DEFAULT_MAX_CUBE_SIZE_GB`].
pub const MAX_SIZE_ENV: &str = "CUBE_MAX_SIZE_GB";

/// Default largest creatable cube, in GiB.
pub const DEFAULT_MAX_CUBE_SIZE_GB: u64 = 12;

/// When the background write worker is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteThreadMode {
    /// Only while creating a new cube.
    #[default]
    Optimized,
    /// For every cube opened for writing.
    Always,
    /// Never; every write is synchronous.
    Off,
}

impl FromStr for WriteThreadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimized" => Ok(WriteThreadMode::Optimized),
            "always" => Ok(WriteThreadMode::Always),
            "off" => Ok(WriteThreadMode::Off),
            _ => Err(Error::user(format!(
                "write thread mode must be one of optimized, always, off; got [{s}]"
            ))),
        }
    }
}

impl fmt::Display for WriteThreadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteThreadMode::Optimized => "optimized",
            WriteThreadMode::Always => "always",
            WriteThreadMode::Off => "off",
        })
    }
}

/// Per-handler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoConfig {
    /// Write worker policy.
    pub write_thread: WriteThreadMode,
}

impl IoConfig {
    /// Configuration with an explicit worker policy.
    pub fn new(write_thread: WriteThreadMode) -> Self {
        Self { write_thread }
    }

    /// Reads `CUBE_WRITE_THREAD`. Unset or unparsable values give the default.
    pub fn from_env() -> Self {
        let write_thread = env::var(WRITE_THREAD_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Self { write_thread }
    }

    /// Whether a handler for a new (`is_new_cube`) or existing cube runs the
    /// write worker.
    pub fn worker_enabled(&self, is_new_cube: bool) -> bool {
        match self.write_thread {
            WriteThreadMode::Optimized => is_new_cube,
            WriteThreadMode::Always => true,
            WriteThreadMode::Off => false,
        }
    }
}

/// Largest cube size in bytes, honoring `CUBE_MAX_SIZE_GB`.
pub fn max_cube_size() -> u64 {
    let gb = env::var(MAX_SIZE_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_CUBE_SIZE_GB);
    gb.saturating_mul(1024 * 1024 * 1024)
}
