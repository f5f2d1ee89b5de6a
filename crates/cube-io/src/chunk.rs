//! Raw cube chunks.
//!
//! A chunk is the unit of disk I/O and of cache residency: a cuboid of
//! stored pixels, kept in file byte order, laid out sample-fastest, then
//! line, then band.

use byteorder::{ByteOrder as Endian, NativeEndian};

use cube_core::{Error, Result};

/// Global chunk position, `cx + cy*Cx + cz*Cx*Cy`.
pub type ChunkIndex = usize;

/// A stored value type that can be read from or written into a chunk.
pub trait ChunkElement: Copy {
    /// Width in bytes.
    const SIZE: usize;
    /// Reads one value in host byte order.
    fn read(bytes: &[u8]) -> Self;
    /// Writes one value in host byte order.
    fn write(self, bytes: &mut [u8]);
}

macro_rules! chunk_element {
    ($ty:ty, $size:expr, $read:ident, $write:ident) => {
        impl ChunkElement for $ty {
            const SIZE: usize = $size;

            #[inline]
            fn read(bytes: &[u8]) -> Self {
                NativeEndian::$read(bytes)
            }

            #[inline]
            fn write(self, bytes: &mut [u8]) {
                NativeEndian::$write(bytes, self)
            }
        }
    };
}

impl ChunkElement for u8 {
    const SIZE: usize = 1;

    #[inline]
    fn read(bytes: &[u8]) -> Self {
        bytes[0]
    }

    #[inline]
    fn write(self, bytes: &mut [u8]) {
        bytes[0] = self;
    }
}

impl ChunkElement for i8 {
    const SIZE: usize = 1;

    #[inline]
    fn read(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    #[inline]
    fn write(self, bytes: &mut [u8]) {
        bytes[0] = self as u8;
    }
}

chunk_element!(u16, 2, read_u16, write_u16);
chunk_element!(i16, 2, read_i16, write_i16);
chunk_element!(u32, 4, read_u32, write_u32);
chunk_element!(i32, 4, read_i32, write_i32);
chunk_element!(f32, 4, read_f32, write_f32);
chunk_element!(f64, 8, read_f64, write_f64);

/// A cuboid of raw pixel bytes owned by the handler's cache.
///
/// Not `Clone`; the cache owns every chunk and policies borrow.
#[derive(Debug)]
pub struct RawCubeChunk {
    index: ChunkIndex,
    start_sample: i64,
    start_line: i64,
    start_band: i64,
    samples: usize,
    lines: usize,
    bands: usize,
    data: Vec<u8>,
    dirty: bool,
    last_used: u64,
}

impl RawCubeChunk {
    /// Creates a zero-filled, clean chunk covering the inclusive cuboid
    /// `start..=end` with `byte_count` bytes of storage.
    pub fn new(
        index: ChunkIndex,
        start: (i64, i64, i64),
        end: (i64, i64, i64),
        byte_count: usize,
    ) -> Self {
        Self {
            index,
            start_sample: start.0,
            start_line: start.1,
            start_band: start.2,
            samples: (end.0 - start.0 + 1).max(0) as usize,
            lines: (end.1 - start.1 + 1).max(0) as usize,
            bands: (end.2 - start.2 + 1).max(0) as usize,
            data: vec![0; byte_count],
            dirty: false,
            last_used: 0,
        }
    }

    #[inline]
    pub fn index(&self) -> ChunkIndex {
        self.index
    }

    #[inline]
    pub fn start_sample(&self) -> i64 {
        self.start_sample
    }

    #[inline]
    pub fn start_line(&self) -> i64 {
        self.start_line
    }

    #[inline]
    pub fn start_band(&self) -> i64 {
        self.start_band
    }

    /// Last covered sample (inclusive).
    #[inline]
    pub fn end_sample(&self) -> i64 {
        self.start_sample + self.samples as i64 - 1
    }

    /// Last covered line (inclusive).
    #[inline]
    pub fn end_line(&self) -> i64 {
        self.start_line + self.lines as i64 - 1
    }

    /// Last covered band (inclusive).
    #[inline]
    pub fn end_band(&self) -> i64 {
        self.start_band + self.bands as i64 - 1
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.lines
    }

    #[inline]
    pub fn band_count(&self) -> usize {
        self.bands
    }

    /// Size of the raw buffer in bytes.
    #[inline]
    pub fn byte_count(&self) -> usize {
        self.data.len()
    }

    /// True when the bytes differ from what is on disk.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Stored bytes in file order.
    #[inline]
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable stored bytes. Callers that change them mark the chunk dirty.
    #[inline]
    pub fn raw_data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Replaces the stored bytes and marks the chunk dirty.
    ///
    /// `bytes` must be exactly [`byte_count`](Self::byte_count) long.
    pub fn set_raw_data(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.data.len() {
            return Err(Error::programmer(format!(
                "cannot replace [{}] bytes of chunk {} with [{}] bytes",
                self.data.len(),
                self.index,
                bytes.len()
            )));
        }
        self.data.copy_from_slice(bytes);
        self.dirty = true;
        Ok(())
    }

    /// Reads the `offset`-th `T` of the chunk (host byte order).
    ///
    /// # Panics
    ///
    /// If `offset` is past the end of the chunk.
    #[inline]
    pub fn get<T: ChunkElement>(&self, offset: usize) -> T {
        T::read(&self.data[offset * T::SIZE..(offset + 1) * T::SIZE])
    }

    /// Writes the `offset`-th `T` of the chunk (host byte order) and marks
    /// the chunk dirty.
    ///
    /// # Panics
    ///
    /// If `offset` is past the end of the chunk.
    #[inline]
    pub fn set<T: ChunkElement>(&mut self, offset: usize, value: T) {
        value.write(&mut self.data[offset * T::SIZE..(offset + 1) * T::SIZE]);
        self.dirty = true;
    }

    /// Pixel offset of a cube coordinate inside this chunk, or `None` when
    /// the coordinate is outside it.
    pub fn pixel_offset(&self, sample: i64, line: i64, band: i64) -> Option<usize> {
        if sample < self.start_sample
            || line < self.start_line
            || band < self.start_band
            || sample > self.end_sample()
            || line > self.end_line()
            || band > self.end_band()
        {
            return None;
        }
        let s = (sample - self.start_sample) as usize;
        let l = (line - self.start_line) as usize;
        let b = (band - self.start_band) as usize;
        Some(s + self.samples * (l + self.lines * b))
    }

    #[inline]
    pub(crate) fn last_used(&self) -> u64 {
        self.last_used
    }

    #[inline]
    pub(crate) fn touch(&mut self, stamp: u64) {
        self.last_used = stamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::ErrorKind;

    fn chunk() -> RawCubeChunk {
        RawCubeChunk::new(5, (9, 1, 2), (16, 4, 2), 8 * 4 * 2)
    }

    #[test]
    fn geometry() {
        let c = chunk();
        assert_eq!(c.index(), 5);
        assert_eq!((c.sample_count(), c.line_count(), c.band_count()), (8, 4, 1));
        assert_eq!((c.end_sample(), c.end_line(), c.end_band()), (16, 4, 2));
        assert!(!c.is_dirty());
        assert!(c.raw_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn set_raw_data_checks_length() {
        let mut c = chunk();
        let err = c.set_raw_data(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Programmer);
        assert!(!c.is_dirty());

        c.set_raw_data(&[7; 64]).unwrap();
        assert!(c.is_dirty());
        assert_eq!(c.raw_data()[63], 7);
    }

    #[test]
    fn typed_access_uses_element_offsets() {
        let mut c = chunk();
        c.set::<i16>(3, -1234);
        assert!(c.is_dirty());
        assert_eq!(c.get::<i16>(3), -1234);
        assert_eq!(&c.raw_data()[6..8], &(-1234i16).to_ne_bytes());

        c.set::<f64>(1, 2.5);
        assert_eq!(c.get::<f64>(1), 2.5);
        c.set::<i8>(0, -3);
        assert_eq!(c.get::<u8>(0), 253);
    }

    #[test]
    fn pixel_offsets() {
        let c = chunk();
        assert_eq!(c.pixel_offset(9, 1, 2), Some(0));
        assert_eq!(c.pixel_offset(10, 2, 2), Some(9));
        assert_eq!(c.pixel_offset(8, 1, 2), None);
        assert_eq!(c.pixel_offset(9, 1, 1), None);
    }
}
