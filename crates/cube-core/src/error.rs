//! Error types for cube I/O.
//!
//! Every failure the engine reports falls into one of three kinds:
//!
//! - **Programmer** - a contract violation by the caller (bad chunk shape,
//!   wrong raw-data length, writing a read-only cube, ...)
//! - **Io** - the operating system refused or shortened a transfer
//! - **User** - the label or the request describes something unsupported
//!
//! # Usage
//!
//! ```rust
//! use cube_core::{Error, ErrorKind, Result};
//!
//! fn check_chunk_samples(samples: i64) -> Result<()> {
//!     if samples < 1 {
//!         return Err(Error::programmer(format!(
//!             "samples per chunk cannot be [{samples}]"
//!         )));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_chunk_samples(0).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Programmer);
//! ```
//!
//! # Dependencies
//!
//! - [`thiserror`] - derive macro for `Display` and `std::error::Error`

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Contract violation by the calling code.
    Programmer,
    /// Failed or short operating-system transfer.
    Io,
    /// Unsupported or incomplete input supplied by the user.
    User,
}

/// Errors produced by the cube I/O engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller broke an API contract.
    #[error("programmer error: {0}")]
    Programmer(String),

    /// A read or write of pixel data failed or transferred fewer bytes than
    /// requested.
    #[error("I/O error on [{}]: transferring {bytes} bytes at offset {offset}: {source}", path.display())]
    Io {
        /// Data file being accessed.
        path: PathBuf,
        /// Number of bytes requested.
        bytes: u64,
        /// Byte offset into the file.
        offset: u64,
        /// Underlying operating-system error.
        #[source]
        source: io::Error,
    },

    /// Opening, creating, resizing or flushing the data file failed.
    #[error("file error: {0}")]
    File(#[from] io::Error),

    /// The label or the request is not something the engine supports.
    #[error("user error: {0}")]
    User(String),
}

impl Error {
    /// Builds a [`Error::Programmer`] from any message.
    pub fn programmer(msg: impl Into<String>) -> Self {
        Error::Programmer(msg.into())
    }

    /// Builds a [`Error::User`] from any message.
    pub fn user(msg: impl Into<String>) -> Self {
        Error::User(msg.into())
    }

    /// Builds a [`Error::Io`] for a transfer of `bytes` at `offset`.
    pub fn io(path: impl Into<PathBuf>, bytes: u64, offset: u64, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            bytes,
            offset,
            source,
        }
    }

    /// Returns the error's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Programmer(_) => ErrorKind::Programmer,
            Error::Io { .. } | Error::File(_) => ErrorKind::Io,
            Error::User(_) => ErrorKind::User,
        }
    }
}
