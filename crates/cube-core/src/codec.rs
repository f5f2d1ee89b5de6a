//! Pixel-format codec.
//!
//! Converts single stored pixels to and from the in-memory `f64` DN.
//!
//! # Decode (stored -> DN)
//!
//! 1. Read the stored value in the file's byte order.
//! 2. Inside the type's valid range: `dn = raw * multiplier + base`.
//!    Float types store the DN itself and are never scaled.
//! 3. Outside it: the matching special pixel. Unrecognized patterns are
//!    `LowReprSat`.
//!
//! # Encode (DN -> stored)
//!
//! 1. Special DNs become the type's sentinel (`LowReprSat` when unrecognized).
//! 2. Otherwise `scaled = (dn - base) / multiplier`, rounded half away from
//!    zero for integer types. Values below the valid range store
//!    `LowReprSat`, values above it `HighReprSat`.
//! 3. Write in the file's byte order.
//!
//! Every pixel type has its own branch; sentinel values come from
//! [`crate::special`].
//!
//! # Example
//!
//! ```rust
//! use cube_core::{ByteOrder, PixelCodec, PixelType};
//! use cube_core::special::NULL8;
//!
//! let codec = PixelCodec::new(PixelType::S2, ByteOrder::Msb, 100.0, 0.5);
//! let mut raw = [0u8; 2];
//!
//! codec.encode(110.0, &mut raw);
//! assert_eq!(raw, 20i16.to_be_bytes());
//! assert_eq!(codec.decode(&raw), 110.0);
//!
//! codec.encode(NULL8, &mut raw);
//! assert_eq!(raw, (-32768i16).to_be_bytes());
//! ```

use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};

use crate::pixel::{ByteOrder, PixelType};
use crate::special::{self, SpecialPixel};

/// Stored-value converter for one cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCodec {
    pixel_type: PixelType,
    byte_order: ByteOrder,
    base: f64,
    multiplier: f64,
}

impl PixelCodec {
    /// Creates a codec. `dn = raw * multiplier + base` for integer types.
    pub fn new(pixel_type: PixelType, byte_order: ByteOrder, base: f64, multiplier: f64) -> Self {
        Self {
            pixel_type,
            byte_order,
            base,
            multiplier,
        }
    }

    /// Stored pixel type.
    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// File byte order.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Additive scaling term.
    #[inline]
    pub fn base(&self) -> f64 {
        self.base
    }

    /// Multiplicative scaling term.
    #[inline]
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Bytes per stored pixel.
    #[inline]
    pub fn pixel_size(&self) -> usize {
        self.pixel_type.size_of()
    }

    #[inline]
    fn scale(&self, raw: f64) -> f64 {
        raw * self.multiplier + self.base
    }

    #[inline]
    fn unscale(&self, dn: f64) -> f64 {
        (dn - self.base) / self.multiplier
    }

    /// Decodes one stored pixel. `stored` holds at least
    /// [`pixel_size`](Self::pixel_size) bytes in file order.
    pub fn decode(&self, stored: &[u8]) -> f64 {
        match self.pixel_type {
            PixelType::U1 => {
                let raw = stored[0];
                let s = special::U1;
                if raw >= s.valid_min && raw <= s.valid_max {
                    self.scale(raw as f64)
                } else {
                    s.special_for(raw).value()
                }
            }
            PixelType::S1 => {
                let raw = stored[0] as i8;
                let s = special::S1;
                if raw >= s.valid_min {
                    self.scale(raw as f64)
                } else {
                    s.special_for(raw).value()
                }
            }
            PixelType::U2 => {
                let raw = match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::read_u16(stored),
                    ByteOrder::Msb => BigEndian::read_u16(stored),
                };
                let s = special::U2;
                if raw >= s.valid_min && raw <= s.valid_max {
                    self.scale(raw as f64)
                } else {
                    s.special_for(raw).value()
                }
            }
            PixelType::S2 => {
                let raw = match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::read_i16(stored),
                    ByteOrder::Msb => BigEndian::read_i16(stored),
                };
                let s = special::S2;
                if raw >= s.valid_min {
                    self.scale(raw as f64)
                } else {
                    s.special_for(raw).value()
                }
            }
            PixelType::U4 => {
                let raw = match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::read_u32(stored),
                    ByteOrder::Msb => BigEndian::read_u32(stored),
                };
                let s = special::U4;
                if raw >= s.valid_min && raw <= s.valid_max {
                    self.scale(raw as f64)
                } else {
                    s.special_for(raw).value()
                }
            }
            PixelType::S4 => {
                let raw = match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::read_i32(stored),
                    ByteOrder::Msb => BigEndian::read_i32(stored),
                };
                let s = special::S4;
                if raw >= s.valid_min {
                    self.scale(raw as f64)
                } else {
                    s.special_for(raw).value()
                }
            }
            PixelType::F4 => {
                let raw = match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::read_f32(stored),
                    ByteOrder::Msb => BigEndian::read_f32(stored),
                };
                let s = special::F4;
                if raw >= s.valid_min {
                    raw as f64
                } else {
                    // NaN lands here too and becomes LowReprSat
                    s.special_for(raw).value()
                }
            }
            PixelType::F8 => {
                let raw = match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::read_f64(stored),
                    ByteOrder::Msb => BigEndian::read_f64(stored),
                };
                let s = special::F8;
                if raw >= s.valid_min {
                    raw
                } else {
                    s.special_for(raw).value()
                }
            }
        }
    }

    /// Encodes one DN into `stored` (file order, at least
    /// [`pixel_size`](Self::pixel_size) bytes).
    pub fn encode(&self, dn: f64, stored: &mut [u8]) {
        let special = SpecialPixel::classify(dn);
        match self.pixel_type {
            PixelType::U1 => {
                let s = special::U1;
                stored[0] = match special {
                    Some(sp) => s.raw_for(sp),
                    None => match self.clamp_int(dn, s.valid_min as f64, s.valid_max as f64) {
                        Clamped::Low => s.low_repr_sat,
                        Clamped::High => s.high_repr_sat,
                        Clamped::Value(v) => v as u8,
                    },
                };
            }
            PixelType::S1 => {
                let s = special::S1;
                let raw = match special {
                    Some(sp) => s.raw_for(sp),
                    None => match self.clamp_int(dn, s.valid_min as f64, s.valid_max as f64) {
                        Clamped::Low => s.low_repr_sat,
                        Clamped::High => s.high_repr_sat,
                        Clamped::Value(v) => v as i8,
                    },
                };
                stored[0] = raw as u8;
            }
            PixelType::U2 => {
                let s = special::U2;
                let raw = match special {
                    Some(sp) => s.raw_for(sp),
                    None => match self.clamp_int(dn, s.valid_min as f64, s.valid_max as f64) {
                        Clamped::Low => s.low_repr_sat,
                        Clamped::High => s.high_repr_sat,
                        Clamped::Value(v) => v as u16,
                    },
                };
                match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::write_u16(stored, raw),
                    ByteOrder::Msb => BigEndian::write_u16(stored, raw),
                }
            }
            PixelType::S2 => {
                let s = special::S2;
                let raw = match special {
                    Some(sp) => s.raw_for(sp),
                    None => match self.clamp_int(dn, s.valid_min as f64, s.valid_max as f64) {
                        Clamped::Low => s.low_repr_sat,
                        Clamped::High => s.high_repr_sat,
                        Clamped::Value(v) => v as i16,
                    },
                };
                match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::write_i16(stored, raw),
                    ByteOrder::Msb => BigEndian::write_i16(stored, raw),
                }
            }
            PixelType::U4 => {
                let s = special::U4;
                let raw = match special {
                    Some(sp) => s.raw_for(sp),
                    None => match self.clamp_int(dn, s.valid_min as f64, s.valid_max as f64) {
                        Clamped::Low => s.low_repr_sat,
                        Clamped::High => s.high_repr_sat,
                        Clamped::Value(v) => v as u32,
                    },
                };
                match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::write_u32(stored, raw),
                    ByteOrder::Msb => BigEndian::write_u32(stored, raw),
                }
            }
            PixelType::S4 => {
                let s = special::S4;
                let raw = match special {
                    Some(sp) => s.raw_for(sp),
                    None => match self.clamp_int(dn, s.valid_min as f64, s.valid_max as f64) {
                        Clamped::Low => s.low_repr_sat,
                        Clamped::High => s.high_repr_sat,
                        Clamped::Value(v) => v as i32,
                    },
                };
                match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::write_i32(stored, raw),
                    ByteOrder::Msb => BigEndian::write_i32(stored, raw),
                }
            }
            PixelType::F4 => {
                let s = special::F4;
                let raw = match special {
                    Some(sp) => s.raw_for(sp),
                    None if dn < s.valid_min as f64 => s.low_repr_sat,
                    None if dn > s.valid_max as f64 => s.high_repr_sat,
                    None => dn as f32,
                };
                match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::write_f32(stored, raw),
                    ByteOrder::Msb => BigEndian::write_f32(stored, raw),
                }
            }
            PixelType::F8 => {
                let raw = match special {
                    Some(sp) => sp.value(),
                    None => dn,
                };
                match self.byte_order {
                    ByteOrder::Lsb => LittleEndian::write_f64(stored, raw),
                    ByteOrder::Msb => BigEndian::write_f64(stored, raw),
                }
            }
        }
    }

    /// Copies one stored pixel into `native`, converting file order to host
    /// order.
    #[inline]
    pub fn to_native(&self, stored: &[u8], native: &mut [u8]) {
        let n = self.pixel_size();
        native[..n].copy_from_slice(&stored[..n]);
        if self.byte_order.needs_swap() {
            native[..n].reverse();
        }
    }

    /// Decodes a run of consecutive stored pixels.
    ///
    /// Fills `dns` and, when given, the host-order copy of the stored bytes.
    pub fn decode_run(&self, stored: &[u8], dns: &mut [f64], mut native: Option<&mut [u8]>) {
        let n = self.pixel_size();
        for (i, dn) in dns.iter_mut().enumerate() {
            let px = &stored[i * n..(i + 1) * n];
            *dn = self.decode(px);
            if let Some(native) = native.as_deref_mut() {
                self.to_native(px, &mut native[i * n..(i + 1) * n]);
            }
        }
    }

    /// Encodes a run of DNs into consecutive stored pixels.
    pub fn encode_run(&self, dns: &[f64], stored: &mut [u8]) {
        let n = self.pixel_size();
        for (i, &dn) in dns.iter().enumerate() {
            self.encode(dn, &mut stored[i * n..(i + 1) * n]);
        }
    }

    /// Scales and range-checks a valid DN for an integer type.
    #[inline]
    fn clamp_int(&self, dn: f64, min: f64, max: f64) -> Clamped {
        let scaled = self.unscale(dn);
        if scaled.is_nan() || scaled < min - 0.5 {
            Clamped::Low
        } else if scaled > max + 0.5 {
            Clamped::High
        } else {
            Clamped::Value(scaled.round().clamp(min, max) as i64)
        }
    }
}

enum Clamped {
    Low,
    High,
    Value(i64),
}
