//! # cube-core
//!
//! Leaf types for the chunked cube I/O engine.
//!
//! This crate has no file I/O. It defines what a pixel is, how it is stored
//! and how the engine reports failure:
//!
//! - [`PixelType`], [`ByteOrder`] - storage type and endianness
//! - [`special`] - the special pixel sentinel tables
//! - [`PixelCodec`] - stored bytes to DN and back
//! - [`Buffer`] - the caller's read/write rectangle
//! - [`Error`], [`ErrorKind`], [`Result`] - error taxonomy
//!
//! # Example
//!
//! ```rust
//! use cube_core::{Buffer, ByteOrder, PixelCodec, PixelType};
//! use cube_core::special::{SpecialPixel, NULL8};
//!
//! let codec = PixelCodec::new(PixelType::U1, ByteOrder::Lsb, 0.0, 1.0);
//! let mut stored = [0u8; 4];
//! codec.encode_run(&[NULL8, 7.0, 0.0, 255.0], &mut stored);
//! assert_eq!(stored, [0, 7, 0, 255]);
//!
//! let mut line = Buffer::line(4, PixelType::U1).unwrap();
//! codec.decode_run(&stored, line.dns_mut(), None);
//! assert_eq!(SpecialPixel::classify(line[3]), Some(SpecialPixel::HighReprSat));
//! ```
//!
//! # Dependencies
//!
//! - [`byteorder`] - endian-aware reads and writes in the codec
//! - [`thiserror`] - error derive
//! - [`serde`] - (de)serialization of pixel types for persisted labels

pub mod buffer;
pub mod codec;
mod error;
pub mod pixel;
pub mod special;

pub use buffer::Buffer;
pub use codec::PixelCodec;
pub use error::{Error, ErrorKind, Result};
pub use pixel::{ByteOrder, PixelType};
pub use special::{
    is_special, is_valid, SpecialPixel, HIGH_INSTR_SAT8, HIGH_REPR_SAT8, LOW_INSTR_SAT8,
    LOW_REPR_SAT8, NULL8, VALID_MAX8, VALID_MIN8,
};
