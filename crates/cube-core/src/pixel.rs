//! On-disk pixel types and byte order.
//!
//! # Types
//!
//! - [`PixelType`] - storage type of one pixel in the data file
//! - [`ByteOrder`] - endianness of multi-byte stored values
//!
//! Both round-trip through the label names the cube label uses:
//!
//! ```rust
//! use cube_core::{ByteOrder, PixelType};
//!
//! let ty: PixelType = "SignedWord".parse().unwrap();
//! assert_eq!(ty, PixelType::S2);
//! assert_eq!(ty.size_of(), 2);
//! assert_eq!(ty.label_name(), "SignedWord");
//!
//! let order: ByteOrder = "Msb".parse().unwrap();
//! assert_eq!(order, ByteOrder::Msb);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Storage type of a pixel in the cube file.
///
/// | Variant | Label name | Bytes |
/// |---------|------------|-------|
/// | `U1` | UnsignedByte | 1 |
/// | `S1` | SignedByte | 1 |
/// | `U2` | UnsignedWord | 2 |
/// | `S2` | SignedWord | 2 |
/// | `U4` | UnsignedInteger | 4 |
/// | `S4` | SignedInteger | 4 |
/// | `F4` | Real | 4 |
/// | `F8` | Double | 8 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelType {
    /// 8-bit unsigned integer.
    U1,
    /// 8-bit signed integer.
    S1,
    /// 16-bit unsigned integer.
    U2,
    /// 16-bit signed integer.
    S2,
    /// 32-bit unsigned integer.
    U4,
    /// 32-bit signed integer.
    S4,
    /// 32-bit IEEE float.
    #[default]
    F4,
    /// 64-bit IEEE float.
    F8,
}

impl PixelType {
    /// All pixel types, narrowest first.
    pub const ALL: [PixelType; 8] = [
        PixelType::U1,
        PixelType::S1,
        PixelType::U2,
        PixelType::S2,
        PixelType::U4,
        PixelType::S4,
        PixelType::F4,
        PixelType::F8,
    ];

    /// Bytes occupied by one stored pixel.
    #[inline]
    pub const fn size_of(self) -> usize {
        match self {
            PixelType::U1 | PixelType::S1 => 1,
            PixelType::U2 | PixelType::S2 => 2,
            PixelType::U4 | PixelType::S4 | PixelType::F4 => 4,
            PixelType::F8 => 8,
        }
    }

    /// True for the IEEE float types, which store DNs without scaling.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, PixelType::F4 | PixelType::F8)
    }

    /// Name used by the `Pixels/Type` label keyword.
    pub const fn label_name(self) -> &'static str {
        match self {
            PixelType::U1 => "UnsignedByte",
            PixelType::S1 => "SignedByte",
            PixelType::U2 => "UnsignedWord",
            PixelType::S2 => "SignedWord",
            PixelType::U4 => "UnsignedInteger",
            PixelType::S4 => "SignedInteger",
            PixelType::F4 => "Real",
            PixelType::F8 => "Double",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_name())
    }
}

impl FromStr for PixelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PixelType::ALL
            .into_iter()
            .find(|ty| ty.label_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::user(format!("unrecognized pixel type [{s}]")))
    }
}

/// Endianness of stored multi-byte pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Least significant byte first (little endian).
    Lsb,
    /// Most significant byte first (big endian).
    Msb,
}

impl ByteOrder {
    /// Byte order of the running machine.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Lsb
        } else {
            ByteOrder::Msb
        }
    }

    /// True when values in this order must be swapped on this machine.
    #[inline]
    pub const fn needs_swap(self) -> bool {
        !matches!(
            (self, Self::native()),
            (ByteOrder::Lsb, ByteOrder::Lsb) | (ByteOrder::Msb, ByteOrder::Msb)
        )
    }

    /// Name used by the `Pixels/ByteOrder` label keyword.
    pub const fn label_name(self) -> &'static str {
        match self {
            ByteOrder::Lsb => "Lsb",
            ByteOrder::Msb => "Msb",
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_name())
    }
}

impl FromStr for ByteOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lsb" => Ok(ByteOrder::Lsb),
            "msb" => Ok(ByteOrder::Msb),
            _ => Err(Error::user(format!("unrecognized byte order [{s}]"))),
        }
    }
}
