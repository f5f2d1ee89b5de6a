//! Cube facade.
//!
//! [`Cube`] ties a data file, its [`Label`] and a [`CubeIoHandler`] together
//! and adds the checks that belong to the cube rather than the engine:
//! creation defaults, the size limit, access mode, and band mapping
//! validation.
//!
//! # Example
//!
//! ```rust,no_run
//! use cube_core::{Buffer, PixelType};
//! use cube_io::{AccessMode, Cube, CubeSpec};
//!
//! # fn main() -> cube_core::Result<()> {
//! let spec = CubeSpec { samples: 100, lines: 100, pixel_type: PixelType::U2, ..Default::default() };
//! let mut cube = Cube::create("dem.cub", &spec)?;
//!
//! let mut line = Buffer::line(100, PixelType::F8)?;
//! for l in 1..=100 {
//!     line.set_base_position(1, l, 1);
//!     line.fill(l as f64);
//!     cube.write(&line)?;
//! }
//! let label = cube.label().clone();
//! cube.close()?;
//!
//! let mut cube = Cube::open("dem.cub", label, AccessMode::ReadOnly, None)?;
//! cube.read(&mut line)?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use cube_core::{Buffer, ByteOrder, Error, PixelType, Result};
use tracing::debug;

use crate::config::{self, IoConfig};
use crate::handler::CubeIoHandler;
use crate::label::{keys, CubeGeometry, Label};
use crate::layout::{CubeFile, CubeFormat};
use crate::policy::CachingPolicy;

/// Bytes reserved ahead of the pixel data for an attached label.
pub const DEFAULT_LABEL_BYTES: u64 = 65_536;

/// How a cube is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Parameters of a new cube.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeSpec {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub pixel_type: PixelType,
    pub byte_order: ByteOrder,
    pub format: CubeFormat,
    /// Bytes before the pixel data.
    pub label_bytes: u64,
    /// Ignored for float pixel types.
    pub base: f64,
    /// Ignored for float pixel types.
    pub multiplier: f64,
    pub tile_samples: Option<usize>,
    pub tile_lines: Option<usize>,
}

impl Default for CubeSpec {
    fn default() -> Self {
        Self {
            samples: 512,
            lines: 512,
            bands: 1,
            pixel_type: PixelType::F4,
            byte_order: ByteOrder::native(),
            format: CubeFormat::Tile,
            label_bytes: DEFAULT_LABEL_BYTES,
            base: 0.0,
            multiplier: 1.0,
            tile_samples: None,
            tile_lines: None,
        }
    }
}

impl CubeSpec {
    /// Default spec with the given dimensions.
    pub fn new(samples: usize, lines: usize, bands: usize) -> Self {
        Self {
            samples,
            lines,
            bands,
            ..Default::default()
        }
    }

    /// Pixel bytes without chunk padding.
    pub fn pixel_bytes(&self) -> u64 {
        self.samples as u64 * self.lines as u64 * self.bands as u64 * self.pixel_type.size_of() as u64
    }

    fn label(&self) -> Label {
        let (base, multiplier) = if self.pixel_type.is_float() {
            (0.0, 1.0)
        } else {
            (self.base, self.multiplier)
        };
        let geometry = CubeGeometry {
            samples: self.samples,
            lines: self.lines,
            bands: self.bands,
            pixel_type: self.pixel_type,
            byte_order: self.byte_order,
            base,
            multiplier,
            start_byte: self.label_bytes,
        };
        let mut label = Label::new();
        geometry.write_to(&mut label);
        label.set(keys::FORMAT, self.format.label_name());
        if let Some(ts) = self.tile_samples {
            label.set(keys::TILE_SAMPLES, ts);
        }
        if let Some(tl) = self.tile_lines {
            label.set(keys::TILE_LINES, tl);
        }
        label
    }
}

/// An open cube.
pub struct Cube {
    path: PathBuf,
    label: Label,
    access: AccessMode,
    virtual_bands: Option<Vec<i64>>,
    handler: Option<CubeIoHandler>,
}

impl Cube {
    /// Creates a cube, configured from the environment.
    pub fn create(path: impl AsRef<Path>, spec: &CubeSpec) -> Result<Self> {
        Self::create_with_config(path, spec, IoConfig::from_env())
    }

    pub fn create_with_config(path: impl AsRef<Path>, spec: &CubeSpec, config: IoConfig) -> Result<Self> {
        let path = path.as_ref();
        if spec.samples == 0 || spec.lines == 0 || spec.bands == 0 {
            return Err(Error::user(format!(
                "cube dimensions must be positive, got [{}x{}x{}]",
                spec.samples, spec.lines, spec.bands
            )));
        }
        let max = config::max_cube_size();
        if spec.pixel_bytes() > max {
            return Err(Error::user(format!(
                "cube [{}] would be [{} bytes], larger than the maximum [{max} bytes]; \
                 raise {} to allow it",
                path.display(),
                spec.pixel_bytes(),
                config::MAX_SIZE_ENV
            )));
        }

        let mut label = spec.label();
        let file = CubeFile::create(path)?;
        let handler = CubeIoHandler::new(Some(file), &label, None, false, config)?;
        handler.update_labels(&mut label)?;

        debug!(
            path = %path.display(),
            samples = spec.samples,
            lines = spec.lines,
            bands = spec.bands,
            pixel_type = %spec.pixel_type,
            format = %spec.format,
            "created cube"
        );
        Ok(Self {
            path: path.to_path_buf(),
            label,
            access: AccessMode::ReadWrite,
            virtual_bands: None,
            handler: Some(handler),
        })
    }

    /// Opens an existing cube, configured from the environment.
    pub fn open(
        path: impl AsRef<Path>,
        label: Label,
        access: AccessMode,
        virtual_bands: Option<Vec<i64>>,
    ) -> Result<Self> {
        Self::open_with_config(path, label, access, virtual_bands, IoConfig::from_env())
    }

    pub fn open_with_config(
        path: impl AsRef<Path>,
        label: Label,
        access: AccessMode,
        virtual_bands: Option<Vec<i64>>,
        config: IoConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let geometry = CubeGeometry::from_label(&label)?;
        let virtual_bands = validate_bands(virtual_bands, geometry.bands)?;

        let file = CubeFile::open(path, access == AccessMode::ReadWrite)?;
        let handler = CubeIoHandler::new(Some(file), &label, virtual_bands.clone(), true, config)?;

        debug!(path = %path.display(), ?access, "opened cube");
        Ok(Self {
            path: path.to_path_buf(),
            label,
            access,
            virtual_bands,
            handler: Some(handler),
        })
    }

    fn handler_mut(&mut self) -> Result<&mut CubeIoHandler> {
        self.handler
            .as_mut()
            .ok_or_else(|| Error::programmer("cube is not open"))
    }

    /// The I/O handler of an open cube.
    pub fn handler(&self) -> Result<&CubeIoHandler> {
        self.handler
            .as_ref()
            .ok_or_else(|| Error::programmer("cube is not open"))
    }

    pub fn is_open(&self) -> bool {
        self.handler.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn read(&mut self, buffer: &mut Buffer) -> Result<()> {
        self.handler_mut()?.read(buffer)
    }

    pub fn write(&mut self, buffer: &Buffer) -> Result<()> {
        if self.access == AccessMode::ReadOnly {
            return Err(Error::programmer(format!(
                "cannot write to cube [{}]: opened read-only",
                self.path.display()
            )));
        }
        self.handler_mut()?.write(buffer)
    }

    /// Physical band behind caller band `virtual_band`.
    pub fn physical_band(&self, virtual_band: i64) -> Result<i64> {
        let out_of_range = || {
            Error::programmer(format!(
                "band [{virtual_band}] out of range [1..{}]",
                self.band_count()
            ))
        };
        if virtual_band < 1 || virtual_band as usize > self.band_count() {
            return Err(out_of_range());
        }
        match &self.virtual_bands {
            Some(map) => map.get((virtual_band - 1) as usize).copied().ok_or_else(out_of_range),
            None => Ok(virtual_band),
        }
    }

    /// Caller-visible band count.
    pub fn band_count(&self) -> usize {
        match &self.virtual_bands {
            Some(map) => map.len(),
            None => self.physical_bands(),
        }
    }

    fn physical_bands(&self) -> usize {
        self.label
            .get_int(keys::BANDS)
            .map(|b| b.max(0) as usize)
            .unwrap_or(0)
    }

    pub fn samples(&self) -> Result<i64> {
        Ok(self.handler()?.samples())
    }

    pub fn lines(&self) -> Result<i64> {
        Ok(self.handler()?.lines())
    }

    pub fn pixel_type(&self) -> Result<PixelType> {
        Ok(self.handler()?.pixel_type())
    }

    pub fn format(&self) -> Result<CubeFormat> {
        Ok(self.handler()?.format())
    }

    /// Replaces the band mapping; each entry must name a physical band.
    pub fn set_virtual_bands(&mut self, virtual_bands: Option<Vec<i64>>) -> Result<()> {
        let virtual_bands = validate_bands(virtual_bands, self.physical_bands())?;
        self.handler_mut()?.set_virtual_bands(virtual_bands.clone())?;
        self.virtual_bands = virtual_bands;
        Ok(())
    }

    pub fn add_caching_policy(&mut self, policy: Box<dyn CachingPolicy>) -> Result<()> {
        self.handler_mut()?.add_caching_policy(policy)
    }

    /// Writes every dirty chunk and drops the chunk cache.
    pub fn clear_io_cache(&mut self) -> Result<()> {
        self.handler_mut()?.clear_cache()
    }

    /// Finishes all I/O and releases the file. Closing a closed cube is a
    /// no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.handler.take() {
            Some(mut handler) => {
                handler.close()?;
                debug!(path = %self.path.display(), "closed cube");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn validate_bands(virtual_bands: Option<Vec<i64>>, bands: usize) -> Result<Option<Vec<i64>>> {
    let Some(map) = virtual_bands.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if let Some(bad) = map.iter().find(|&&b| b < 1 || b as usize > bands) {
        return Err(Error::user(format!(
            "virtual band [{bad}] names no band of a [{bands}]-band cube"
        )));
    }
    Ok(Some(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteThreadMode;
    use cube_core::{ErrorKind, NULL8};

    const SYNC: IoConfig = IoConfig {
        write_thread: WriteThreadMode::Off,
    };

    #[test]
    fn spec_defaults() {
        let spec = CubeSpec::default();
        assert_eq!((spec.samples, spec.lines, spec.bands), (512, 512, 1));
        assert_eq!(spec.pixel_type, PixelType::F4);
        assert_eq!(spec.format, CubeFormat::Tile);
        assert_eq!(spec.label_bytes, 65_536);
    }

    #[test]
    fn float_cubes_ignore_scaling() {
        let spec = CubeSpec {
            base: 5.0,
            multiplier: 2.0,
            ..CubeSpec::new(2, 2, 1)
        };
        let label = spec.label();
        assert_eq!(label.get_f64(keys::BASE).unwrap(), 0.0);
        assert_eq!(label.get_f64(keys::MULTIPLIER).unwrap(), 1.0);
        assert_eq!(label.get_int(keys::START_BYTE).unwrap(), 65_537);
    }

    #[test]
    fn create_tags_layout_and_sizes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.cub");
        let spec = CubeSpec {
            pixel_type: PixelType::U1,
            label_bytes: 100,
            ..CubeSpec::new(10, 10, 2)
        };
        let mut cube = Cube::create_with_config(&path, &spec, SYNC).unwrap();
        assert_eq!(cube.label().get(keys::FORMAT), Some("Tile"));
        assert_eq!(cube.label().get_int(keys::TILE_SAMPLES).unwrap(), 10);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 100 + 200);
        cube.close().unwrap();
        cube.close().unwrap();
        assert!(!cube.is_open());
    }

    #[test]
    fn open_validates_bands_and_access() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.cub");
        let spec = CubeSpec {
            format: CubeFormat::Bsq,
            label_bytes: 0,
            ..CubeSpec::new(2, 2, 3)
        };
        let mut cube = Cube::create_with_config(&path, &spec, SYNC).unwrap();
        let label = cube.label().clone();
        cube.close().unwrap();

        let err = Cube::open_with_config(&path, label.clone(), AccessMode::ReadOnly, Some(vec![1, 4]), SYNC)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::User);

        let mut cube =
            Cube::open_with_config(&path, label, AccessMode::ReadOnly, Some(vec![3, 1]), SYNC).unwrap();
        assert_eq!(cube.band_count(), 2);
        assert_eq!(cube.physical_band(1).unwrap(), 3);
        assert_eq!(cube.physical_band(3).unwrap_err().kind(), ErrorKind::Programmer);

        let mut buf = Buffer::brick(2, 2, 1, PixelType::F4).unwrap();
        buf.set_base_position(1, 1, 1);
        cube.read(&mut buf).unwrap();
        assert!(buf.dns().iter().all(|&dn| dn == NULL8));
        assert_eq!(cube.write(&buf).unwrap_err().kind(), ErrorKind::Programmer);
    }

    #[test]
    fn zero_dimension_is_user_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Cube::create_with_config(dir.path().join("z.cub"), &CubeSpec::new(0, 1, 1), SYNC)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::User);
    }
}
