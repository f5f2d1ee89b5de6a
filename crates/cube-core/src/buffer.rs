//! Caller-side I/O rectangle.
//!
//! A [`Buffer`] names a sub-volume of a cube by its 1-based starting
//! position and its extents, and carries two parallel arrays:
//! the DNs (`f64`) and a host-order copy of the stored bytes.
//!
//! Positions may lie partly or wholly outside the cube; out-of-cube pixels
//! read as Null and are dropped on write.
//!
//! ```rust
//! use cube_core::{Buffer, PixelType};
//!
//! let mut line = Buffer::line(100, PixelType::U2).unwrap();
//! line.set_base_position(1, 7, 2);
//! assert_eq!(line.index(10, 7, 2), Some(9));
//! assert_eq!(line.position(9), (10, 7, 2));
//! ```

use std::ops::{Index, IndexMut};

use crate::special::NULL8;
use crate::{Error, PixelType, Result};

/// Sub-volume of DNs with its position in cube coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    sample: i64,
    line: i64,
    band: i64,
    samples: usize,
    lines: usize,
    bands: usize,
    pixel_type: PixelType,
    dns: Vec<f64>,
    raw: Vec<u8>,
}

impl Buffer {
    /// Creates a buffer at position (1, 1, 1) filled with Null.
    pub fn new(samples: usize, lines: usize, bands: usize, pixel_type: PixelType) -> Result<Self> {
        if samples == 0 || lines == 0 || bands == 0 {
            return Err(Error::programmer(format!(
                "buffer dimensions must be positive, got [{samples}x{lines}x{bands}]"
            )));
        }
        let size = samples * lines * bands;
        Ok(Self {
            sample: 1,
            line: 1,
            band: 1,
            samples,
            lines,
            bands,
            pixel_type,
            dns: vec![NULL8; size],
            raw: vec![0; size * pixel_type.size_of()],
        })
    }

    /// A `samples x lines x bands` brick.
    pub fn brick(samples: usize, lines: usize, bands: usize, pixel_type: PixelType) -> Result<Self> {
        Self::new(samples, lines, bands, pixel_type)
    }

    /// A single line of `samples` pixels in one band.
    pub fn line(samples: usize, pixel_type: PixelType) -> Result<Self> {
        Self::new(samples, 1, 1, pixel_type)
    }

    /// Moves the buffer so its first pixel sits at `(sample, line, band)`.
    pub fn set_base_position(&mut self, sample: i64, line: i64, band: i64) {
        self.sample = sample;
        self.line = line;
        self.band = band;
    }

    /// Starting sample (1-based).
    #[inline]
    pub fn sample(&self) -> i64 {
        self.sample
    }

    /// Starting line (1-based).
    #[inline]
    pub fn line_start(&self) -> i64 {
        self.line
    }

    /// Starting band (1-based).
    #[inline]
    pub fn band(&self) -> i64 {
        self.band
    }

    #[inline]
    pub fn sample_dimension(&self) -> usize {
        self.samples
    }

    #[inline]
    pub fn line_dimension(&self) -> usize {
        self.lines
    }

    #[inline]
    pub fn band_dimension(&self) -> usize {
        self.bands
    }

    /// Number of pixels.
    #[inline]
    pub fn size(&self) -> usize {
        self.dns.len()
    }

    /// Pixel type of the raw slot.
    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// True when `(sample, line, band)` falls inside the buffer.
    pub fn contains(&self, sample: i64, line: i64, band: i64) -> bool {
        sample >= self.sample
            && line >= self.line
            && band >= self.band
            && sample < self.sample + self.samples as i64
            && line < self.line + self.lines as i64
            && band < self.band + self.bands as i64
    }

    /// Flat index of a cube coordinate, or `None` outside the buffer.
    pub fn index(&self, sample: i64, line: i64, band: i64) -> Option<usize> {
        if !self.contains(sample, line, band) {
            return None;
        }
        let s = (sample - self.sample) as usize;
        let l = (line - self.line) as usize;
        let b = (band - self.band) as usize;
        Some(s + self.samples * (l + self.lines * b))
    }

    /// Cube coordinate of a flat index.
    pub fn position(&self, index: usize) -> (i64, i64, i64) {
        let s = index % self.samples;
        let l = (index / self.samples) % self.lines;
        let b = index / (self.samples * self.lines);
        (self.sample + s as i64, self.line + l as i64, self.band + b as i64)
    }

    /// Sets every DN to `value`.
    pub fn fill(&mut self, value: f64) {
        self.dns.fill(value);
    }

    #[inline]
    pub fn dns(&self) -> &[f64] {
        &self.dns
    }

    #[inline]
    pub fn dns_mut(&mut self) -> &mut [f64] {
        &mut self.dns
    }

    /// Host-order stored bytes, `size() * pixel_type().size_of()` long.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    #[inline]
    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.raw
    }

    /// DNs and raw bytes borrowed together.
    #[inline]
    pub fn split_mut(&mut self) -> (&mut [f64], &mut [u8]) {
        (&mut self.dns, &mut self.raw)
    }

    /// Copies DNs from `values` (must match [`size`](Self::size)).
    pub fn copy_from(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.dns.len() {
            return Err(Error::programmer(format!(
                "buffer holds [{}] pixels, got [{}] values",
                self.dns.len(),
                values.len()
            )));
        }
        self.dns.copy_from_slice(values);
        Ok(())
    }
}

impl Index<usize> for Buffer {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.dns[index]
    }
}

impl IndexMut<usize> for Buffer {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.dns[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::special::is_special;

    #[test]
    fn new_is_null_filled() {
        let b = Buffer::new(3, 2, 2, PixelType::S2).unwrap();
        assert_eq!(b.size(), 12);
        assert_eq!(b.raw().len(), 24);
        assert!(b.dns().iter().all(|&dn| is_special(dn)));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(Buffer::new(0, 1, 1, PixelType::U1).is_err());
        assert!(Buffer::line(0, PixelType::U1).is_err());
    }

    #[test]
    fn index_and_position_are_inverse() {
        let mut b = Buffer::brick(4, 3, 2, PixelType::F4).unwrap();
        b.set_base_position(-1, 5, 2);
        for i in 0..b.size() {
            let (s, l, band) = b.position(i);
            assert_eq!(b.index(s, l, band), Some(i));
        }
        assert_eq!(b.index(-2, 5, 2), None);
        assert_eq!(b.index(3, 5, 2), None);
        assert_eq!(b.index(0, 7, 3), Some(1 + 4 * (2 + 3)));
    }

    #[test]
    fn fill_and_copy() {
        let mut b = Buffer::line(3, PixelType::F8).unwrap();
        b.fill(2.0);
        assert_eq!(b.dns(), &[2.0, 2.0, 2.0]);
        b.copy_from(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(b[2], 3.0);
        assert!(b.copy_from(&[1.0]).is_err());
    }
}
