//! Special pixel sentinels.
//!
//! Cube DNs are `f64` in memory. A handful of reserved values mark pixels
//! that carry no measurement (Null) or that saturated the instrument or the
//! storage representation. Every stored pixel type reserves its own bit
//! patterns for the same five classes, and the codec translates between them.
//!
//! All sentinel values live in the tables below; nothing outside this module
//! spells out a sentinel bit pattern.
//!
//! # Ordering
//!
//! The in-memory sentinels are the five most negative finite doubles, so
//! `dn >= VALID_MIN8` is the validity test. Signed integer types reserve the
//! bottom of their range; unsigned types split the reservations between the
//! bottom and the top.
//!
//! | Type | Null | LowReprSat | LowInstrSat | HighInstrSat | HighReprSat | Valid range |
//! |------|------|------------|-------------|--------------|-------------|-------------|
//! | U1 | 0 | 0 | 0 | 255 | 255 | 1..=254 |
//! | S1 | -128 | -127 | -126 | -125 | -124 | -123..=127 |
//! | U2 | 0 | 1 | 2 | 65534 | 65535 | 3..=65522 |
//! | S2 | -32768 | -32767 | -32766 | -32765 | -32764 | -32752..=32767 |
//! | U4 | 0 | 1 | 2 | 2^32-2 | 2^32-1 | 3..=2^32-14 |
//! | S4 | -2^31 | -2^31+1 | -2^31+2 | -2^31+3 | -2^31+4 | -2^31+16..=2^31-1 |
//!
//! ```rust
//! use cube_core::special::{self, SpecialPixel};
//!
//! assert!(special::is_special(special::NULL8));
//! assert_eq!(SpecialPixel::classify(special::HIGH_REPR_SAT8), Some(SpecialPixel::HighReprSat));
//! assert_eq!(SpecialPixel::classify(42.0), None);
//! ```

use std::fmt;

// === In-memory (f64) sentinels ===

/// Smallest valid in-memory DN.
pub const VALID_MIN8: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFA);
/// Largest valid in-memory DN.
pub const VALID_MAX8: f64 = f64::MAX;
/// In-memory Null.
pub const NULL8: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFB);
/// In-memory low representation saturation.
pub const LOW_REPR_SAT8: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFC);
/// In-memory low instrument saturation.
pub const LOW_INSTR_SAT8: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFD);
/// In-memory high instrument saturation.
pub const HIGH_INSTR_SAT8: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFE);
/// In-memory high representation saturation.
pub const HIGH_REPR_SAT8: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFF);

/// The special pixel classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialPixel {
    /// No data.
    Null,
    /// Below the instrument's measurable range.
    LowInstrSat,
    /// Below the storage type's representable range.
    LowReprSat,
    /// Above the instrument's measurable range.
    HighInstrSat,
    /// Above the storage type's representable range.
    HighReprSat,
}

impl SpecialPixel {
    /// All five classes.
    pub const ALL: [SpecialPixel; 5] = [
        SpecialPixel::Null,
        SpecialPixel::LowInstrSat,
        SpecialPixel::LowReprSat,
        SpecialPixel::HighInstrSat,
        SpecialPixel::HighReprSat,
    ];

    /// The in-memory DN for this class.
    #[inline]
    pub const fn value(self) -> f64 {
        match self {
            SpecialPixel::Null => NULL8,
            SpecialPixel::LowInstrSat => LOW_INSTR_SAT8,
            SpecialPixel::LowReprSat => LOW_REPR_SAT8,
            SpecialPixel::HighInstrSat => HIGH_INSTR_SAT8,
            SpecialPixel::HighReprSat => HIGH_REPR_SAT8,
        }
    }

    /// Classifies an in-memory DN.
    ///
    /// Returns `None` for valid DNs. Values below [`VALID_MIN8`] that are not
    /// one of the five sentinels, and NaN, classify as `LowReprSat`.
    #[inline]
    pub fn classify(dn: f64) -> Option<SpecialPixel> {
        if dn >= VALID_MIN8 {
            return None;
        }
        let bits = dn.to_bits();
        Some(if bits == NULL8.to_bits() {
            SpecialPixel::Null
        } else if bits == LOW_INSTR_SAT8.to_bits() {
            SpecialPixel::LowInstrSat
        } else if bits == HIGH_INSTR_SAT8.to_bits() {
            SpecialPixel::HighInstrSat
        } else if bits == HIGH_REPR_SAT8.to_bits() {
            SpecialPixel::HighReprSat
        } else {
            SpecialPixel::LowReprSat
        })
    }

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            SpecialPixel::Null => "Null",
            SpecialPixel::LowInstrSat => "Lis",
            SpecialPixel::LowReprSat => "Lrs",
            SpecialPixel::HighInstrSat => "His",
            SpecialPixel::HighReprSat => "Hrs",
        }
    }
}

impl fmt::Display for SpecialPixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// True if `dn` is any special pixel (including unrecognized ones).
#[inline]
pub fn is_special(dn: f64) -> bool {
    !(dn >= VALID_MIN8)
}

/// True if `dn` is a valid measurement.
#[inline]
pub fn is_valid(dn: f64) -> bool {
    dn >= VALID_MIN8
}

// === Per-type sentinel tables ===

/// Reserved values and valid range of one stored pixel type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentinels<T> {
    /// Stored Null.
    pub null: T,
    /// Stored low representation saturation.
    pub low_repr_sat: T,
    /// Stored low instrument saturation.
    pub low_instr_sat: T,
    /// Stored high instrument saturation.
    pub high_instr_sat: T,
    /// Stored high representation saturation.
    pub high_repr_sat: T,
    /// Smallest valid stored value.
    pub valid_min: T,
    /// Largest valid stored value.
    pub valid_max: T,
}

impl<T: Copy + PartialEq> Sentinels<T> {
    /// Stored value for a special class.
    #[inline]
    pub fn raw_for(&self, special: SpecialPixel) -> T {
        match special {
            SpecialPixel::Null => self.null,
            SpecialPixel::LowInstrSat => self.low_instr_sat,
            SpecialPixel::LowReprSat => self.low_repr_sat,
            SpecialPixel::HighInstrSat => self.high_instr_sat,
            SpecialPixel::HighReprSat => self.high_repr_sat,
        }
    }

    /// Special class of an out-of-range stored value.
    ///
    /// Null wins over the saturation classes, and representation saturation
    /// wins over instrument saturation, for types where they share a value.
    /// Unrecognized patterns are `LowReprSat`.
    #[inline]
    pub fn special_for(&self, raw: T) -> SpecialPixel {
        if raw == self.null {
            SpecialPixel::Null
        } else if raw == self.high_repr_sat {
            SpecialPixel::HighReprSat
        } else if raw == self.low_repr_sat {
            SpecialPixel::LowReprSat
        } else if raw == self.low_instr_sat {
            SpecialPixel::LowInstrSat
        } else if raw == self.high_instr_sat {
            SpecialPixel::HighInstrSat
        } else {
            SpecialPixel::LowReprSat
        }
    }
}

/// `UnsignedByte` reservations.
pub const U1: Sentinels<u8> = Sentinels {
    null: 0,
    low_repr_sat: 0,
    low_instr_sat: 0,
    high_instr_sat: 255,
    high_repr_sat: 255,
    valid_min: 1,
    valid_max: 254,
};

/// `SignedByte` reservations.
pub const S1: Sentinels<i8> = Sentinels {
    null: -128,
    low_repr_sat: -127,
    low_instr_sat: -126,
    high_instr_sat: -125,
    high_repr_sat: -124,
    valid_min: -123,
    valid_max: 127,
};

/// `UnsignedWord` reservations.
pub const U2: Sentinels<u16> = Sentinels {
    null: 0,
    low_repr_sat: 1,
    low_instr_sat: 2,
    high_instr_sat: 65534,
    high_repr_sat: 65535,
    valid_min: 3,
    valid_max: 65522,
};

/// `SignedWord` reservations.
pub const S2: Sentinels<i16> = Sentinels {
    null: -32768,
    low_repr_sat: -32767,
    low_instr_sat: -32766,
    high_instr_sat: -32765,
    high_repr_sat: -32764,
    valid_min: -32752,
    valid_max: 32767,
};

/// `UnsignedInteger` reservations.
pub const U4: Sentinels<u32> = Sentinels {
    null: 0,
    low_repr_sat: 1,
    low_instr_sat: 2,
    high_instr_sat: u32::MAX - 1,
    high_repr_sat: u32::MAX,
    valid_min: 3,
    valid_max: u32::MAX - 13,
};

/// `SignedInteger` reservations.
pub const S4: Sentinels<i32> = Sentinels {
    null: i32::MIN,
    low_repr_sat: i32::MIN + 1,
    low_instr_sat: i32::MIN + 2,
    high_instr_sat: i32::MIN + 3,
    high_repr_sat: i32::MIN + 4,
    valid_min: i32::MIN + 16,
    valid_max: i32::MAX,
};

/// `Real` reservations (the five most negative finite floats).
pub const F4: Sentinels<f32> = Sentinels {
    null: f32::from_bits(0xFF7F_FFFB),
    low_repr_sat: f32::from_bits(0xFF7F_FFFC),
    low_instr_sat: f32::from_bits(0xFF7F_FFFD),
    high_instr_sat: f32::from_bits(0xFF7F_FFFE),
    high_repr_sat: f32::from_bits(0xFF7F_FFFF),
    valid_min: f32::from_bits(0xFF7F_FFFA),
    valid_max: f32::MAX,
};

/// `Double` reservations; identical to the in-memory sentinels.
pub const F8: Sentinels<f64> = Sentinels {
    null: NULL8,
    low_repr_sat: LOW_REPR_SAT8,
    low_instr_sat: LOW_INSTR_SAT8,
    high_instr_sat: HIGH_INSTR_SAT8,
    high_repr_sat: HIGH_REPR_SAT8,
    valid_min: VALID_MIN8,
    valid_max: VALID_MAX8,
};
