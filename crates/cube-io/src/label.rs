//! Label adapter.
//!
//! The engine consumes a handful of keywords from the cube label and writes
//! back the ones that identify the on-disk layout. [`Label`] is a flat,
//! path-addressed keyword store; the textual label format is someone
//! else's business, but the store serializes to JSON so tools can keep it
//! next to the data file.
//!
//! # Keywords
//!
//! | Path | Direction | Meaning |
//! |------|-----------|---------|
//! | `IsisCube/Core/Dimensions/Samples` | in | samples |
//! | `IsisCube/Core/Dimensions/Lines` | in | lines |
//! | `IsisCube/Core/Dimensions/Bands` | in | bands |
//! | `IsisCube/Core/Pixels/Type` | in | [`PixelType`] label name |
//! | `IsisCube/Core/Pixels/ByteOrder` | in | `Lsb` or `Msb` |
//! | `IsisCube/Core/Pixels/Base` | in | additive scale |
//! | `IsisCube/Core/Pixels/Multiplier` | in | multiplicative scale |
//! | `IsisCube/Core/StartByte` | in | 1-based offset of the pixel data |
//! | `IsisCube/Core/Format` | in/out | `BandSequential` or `Tile` |
//! | `IsisCube/Core/TileSamples` | in/out | tile width |
//! | `IsisCube/Core/TileLines` | in/out | tile height |
//!
//! # Example
//!
//! ```rust
//! use cube_io::label::{keys, Label};
//!
//! let mut label = Label::new();
//! label.set(keys::SAMPLES, 3);
//! assert_eq!(label.get_int(keys::SAMPLES).unwrap(), 3);
//! assert!(label.get_int(keys::LINES).is_err());
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use cube_core::{ByteOrder, Error, PixelType, Result};
use serde::{Deserialize, Serialize};

use crate::layout::CubeFormat;

/// Keyword paths used by the engine.
pub mod keys {
    pub const SAMPLES: &str = "IsisCube/Core/Dimensions/Samples";
    pub const LINES: &str = "IsisCube/Core/Dimensions/Lines";
    pub const BANDS: &str = "IsisCube/Core/Dimensions/Bands";
    pub const PIXEL_TYPE: &str = "IsisCube/Core/Pixels/Type";
    pub const BYTE_ORDER: &str = "IsisCube/Core/Pixels/ByteOrder";
    pub const BASE: &str = "IsisCube/Core/Pixels/Base";
    pub const MULTIPLIER: &str = "IsisCube/Core/Pixels/Multiplier";
    pub const START_BYTE: &str = "IsisCube/Core/StartByte";
    pub const FORMAT: &str = "IsisCube/Core/Format";
    pub const TILE_SAMPLES: &str = "IsisCube/Core/TileSamples";
    pub const TILE_LINES: &str = "IsisCube/Core/TileLines";
}

/// Path-addressed keyword store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    keywords: BTreeMap<String, String>,
}

impl Label {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) a keyword.
    pub fn set(&mut self, path: &str, value: impl ToString) {
        self.keywords.insert(path.to_string(), value.to_string());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.keywords.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.keywords.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.keywords.remove(path)
    }

    /// Keywords in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keywords.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A required string keyword.
    pub fn get_str(&self, path: &str) -> Result<&str> {
        self.get(path)
            .ok_or_else(|| Error::user(format!("label keyword [{path}] is missing")))
    }

    /// A required integer keyword.
    pub fn get_int(&self, path: &str) -> Result<i64> {
        let raw = self.get_str(path)?;
        raw.trim()
            .parse()
            .map_err(|_| Error::user(format!("label keyword [{path}] is not an integer: [{raw}]")))
    }

    /// An optional integer keyword; present but unparsable is still an error.
    pub fn get_int_opt(&self, path: &str) -> Result<Option<i64>> {
        if self.contains(path) {
            self.get_int(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// A required floating-point keyword.
    pub fn get_f64(&self, path: &str) -> Result<f64> {
        let raw = self.get_str(path)?;
        raw.trim()
            .parse()
            .map_err(|_| Error::user(format!("label keyword [{path}] is not a number: [{raw}]")))
    }

    /// Writes the label as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::user(format!("cannot serialize label: {e}")))?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Reads a label written by [`save_json`](Self::save_json).
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::user(format!("invalid label [{}]: {e}", path.display())))
    }
}

/// The label fields the engine needs to address pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeGeometry {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub pixel_type: PixelType,
    pub byte_order: ByteOrder,
    pub base: f64,
    pub multiplier: f64,
    /// 0-based offset of the pixel data.
    pub start_byte: u64,
}

impl CubeGeometry {
    /// Reads the geometry keywords.
    pub fn from_label(label: &Label) -> Result<Self> {
        let dim = |path: &str| -> Result<usize> {
            let value = label.get_int(path)?;
            if value < 1 {
                return Err(Error::user(format!("label keyword [{path}] must be at least 1, got [{value}]")));
            }
            Ok(value as usize)
        };
        let start_byte = label.get_int(keys::START_BYTE)?;
        if start_byte < 1 {
            return Err(Error::user(format!("StartByte must be at least 1, got [{start_byte}]")));
        }

        let pixel_type: PixelType = label.get_str(keys::PIXEL_TYPE)?.parse()?;
        let base = label.get_f64(keys::BASE)?;
        let multiplier = label.get_f64(keys::MULTIPLIER)?;
        // float pixels store DNs directly
        if pixel_type.is_float() && (base != 0.0 || multiplier != 1.0) {
            return Err(Error::user(format!(
                "{pixel_type} pixels cannot be scaled (base [{base}], multiplier [{multiplier}])"
            )));
        }

        Ok(Self {
            samples: dim(keys::SAMPLES)?,
            lines: dim(keys::LINES)?,
            bands: dim(keys::BANDS)?,
            pixel_type,
            byte_order: label.get_str(keys::BYTE_ORDER)?.parse()?,
            base,
            multiplier,
            start_byte: start_byte as u64 - 1,
        })
    }

    /// Writes the geometry keywords.
    pub fn write_to(&self, label: &mut Label) {
        label.set(keys::SAMPLES, self.samples);
        label.set(keys::LINES, self.lines);
        label.set(keys::BANDS, self.bands);
        label.set(keys::PIXEL_TYPE, self.pixel_type.label_name());
        label.set(keys::BYTE_ORDER, self.byte_order.label_name());
        label.set(keys::BASE, self.base);
        label.set(keys::MULTIPLIER, self.multiplier);
        label.set(keys::START_BYTE, self.start_byte + 1);
    }

    /// Pixel bytes without chunk padding.
    pub fn pixel_bytes(&self) -> u64 {
        self.samples as u64 * self.lines as u64 * self.bands as u64 * self.pixel_type.size_of() as u64
    }
}

/// Optional layout keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutHints {
    pub format: CubeFormat,
    pub tile_samples: Option<i64>,
    pub tile_lines: Option<i64>,
}

impl LayoutHints {
    /// Reads `Format`, `TileSamples` and `TileLines`. A missing `Format`
    /// means Tile.
    pub fn from_label(label: &Label) -> Result<Self> {
        let format = match label.get(keys::FORMAT) {
            Some(name) => name.parse()?,
            None => CubeFormat::Tile,
        };
        Ok(Self {
            format,
            tile_samples: label.get_int_opt(keys::TILE_SAMPLES)?,
            tile_lines: label.get_int_opt(keys::TILE_LINES)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::ErrorKind;

    fn core_label() -> Label {
        let mut label = Label::new();
        label.set(keys::SAMPLES, 3);
        label.set(keys::LINES, 2);
        label.set(keys::BANDS, 1);
        label.set(keys::PIXEL_TYPE, "UnsignedWord");
        label.set(keys::BYTE_ORDER, "Lsb");
        label.set(keys::BASE, 0.0);
        label.set(keys::MULTIPLIER, 1.0);
        label.set(keys::START_BYTE, 1);
        label
    }

    #[test]
    fn geometry_round_trips() {
        let geometry = CubeGeometry::from_label(&core_label()).unwrap();
        assert_eq!(geometry.samples, 3);
        assert_eq!(geometry.pixel_type, PixelType::U2);
        assert_eq!(geometry.start_byte, 0);
        assert_eq!(geometry.pixel_bytes(), 12);

        let mut label = Label::new();
        geometry.write_to(&mut label);
        assert_eq!(CubeGeometry::from_label(&label).unwrap(), geometry);
    }

    #[test]
    fn missing_and_bad_fields_are_user_errors() {
        let mut label = core_label();
        label.remove(keys::BANDS);
        assert_eq!(CubeGeometry::from_label(&label).unwrap_err().kind(), ErrorKind::User);

        let mut label = core_label();
        label.set(keys::PIXEL_TYPE, "Complex");
        assert_eq!(CubeGeometry::from_label(&label).unwrap_err().kind(), ErrorKind::User);

        let mut label = core_label();
        label.set(keys::LINES, "two");
        assert_eq!(CubeGeometry::from_label(&label).unwrap_err().kind(), ErrorKind::User);

        let mut label = core_label();
        label.set(keys::FORMAT, "Interleaved");
        assert_eq!(LayoutHints::from_label(&label).unwrap_err().kind(), ErrorKind::User);
    }

    #[test]
    fn scaled_float_labels_are_rejected() {
        let mut label = core_label();
        label.set(keys::PIXEL_TYPE, "Double");
        label.set(keys::MULTIPLIER, 2.0);
        assert_eq!(CubeGeometry::from_label(&label).unwrap_err().kind(), ErrorKind::User);

        label.set(keys::MULTIPLIER, 1.0);
        label.set(keys::BASE, -4.0);
        assert_eq!(CubeGeometry::from_label(&label).unwrap_err().kind(), ErrorKind::User);

        label.set(keys::BASE, 0.0);
        assert_eq!(CubeGeometry::from_label(&label).unwrap().pixel_type, PixelType::F8);

        let mut label = core_label();
        label.set(keys::MULTIPLIER, 2.0);
        assert_eq!(CubeGeometry::from_label(&label).unwrap().multiplier, 2.0);
    }

    #[test]
    fn layout_hints() {
        let mut label = core_label();
        assert_eq!(LayoutHints::from_label(&label).unwrap().format, CubeFormat::Tile);
        label.set(keys::FORMAT, "BandSequential");
        label.set(keys::TILE_SAMPLES, 8);
        let hints = LayoutHints::from_label(&label).unwrap();
        assert_eq!(hints.format, CubeFormat::Bsq);
        assert_eq!(hints.tile_samples, Some(8));
        assert_eq!(hints.tile_lines, None);
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.label.json");
        let label = core_label();
        label.save_json(&path).unwrap();
        assert_eq!(Label::load_json(&path).unwrap(), label);
    }
}
