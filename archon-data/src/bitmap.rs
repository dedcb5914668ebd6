//! Minimal BMP parser for the engine's map source images (`provinces.bmp`,
//! `terrain.bmp`, `heightmap.bmp`, `normal.bmp`). These are always
//! uncompressed 24-bit or 32-bit Windows BMPs; we parse just enough of the
//! header to locate the pixel array and hand back raw rows, top-down,
//! rather than pulling in a general-purpose image codec for a format this
//! constrained.

use crate::error::DataError;
use std::path::Path;

/// An owned, decoded bitmap: pixel rows top-down, each row `width * 3` bytes
/// of tightly-packed RGB (alpha, if present in the source, is dropped).
///
/// Ownership is explicit: the caller holds this buffer for exactly as long
/// as it needs it and drops it when done; nothing aliases the backing `Vec`.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// `height` rows of `width * 3` RGB bytes, top row first.
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let bytes = std::fs::read(path).map_err(|e| DataError::FileIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, DataError> {
        if bytes.len() < 54 || &bytes[0..2] != b"BM" {
            return Err(DataError::Parse("not a BMP file (missing 'BM' signature)".into()));
        }

        let pixel_offset = read_u32_le(bytes, 10)? as usize;
        let dib_header_size = read_u32_le(bytes, 14)?;
        if dib_header_size < 40 {
            return Err(DataError::Parse(format!(
                "unsupported BMP DIB header size {dib_header_size}"
            )));
        }

        let width = read_i32_le(bytes, 18)?;
        let height_raw = read_i32_le(bytes, 22)?;
        let bpp = read_u16_le(bytes, 28)?;
        let compression = read_u32_le(bytes, 30)?;

        if compression != 0 {
            return Err(DataError::Parse(format!(
                "compressed BMP (method {compression}) is not supported"
            )));
        }
        if bpp != 24 && bpp != 32 {
            return Err(DataError::Parse(format!("unsupported bit depth {bpp}, expected 24 or 32")));
        }
        if width <= 0 {
            return Err(DataError::Parse(format!("invalid BMP width {width}")));
        }

        let width = width as u32;
        // A negative height means the bitmap is stored top-down already.
        let (height, bottom_up) = if height_raw < 0 {
            (height_raw.unsigned_abs(), false)
        } else {
            (height_raw as u32, true)
        };

        let src_bytes_per_pixel = (bpp / 8) as usize;
        let row_stride = ((width as usize * src_bytes_per_pixel + 3) / 4) * 4;

        let mut pixels = vec![0u8; width as usize * height as usize * 3];

        for y in 0..height as usize {
            let src_row = if bottom_up { height as usize - 1 - y } else { y };
            let row_start = pixel_offset + src_row * row_stride;
            let row_end = row_start + width as usize * src_bytes_per_pixel;
            if row_end > bytes.len() {
                return Err(DataError::Parse("BMP pixel data truncated".into()));
            }
            let row = &bytes[row_start..row_end];
            let dst_row = &mut pixels[y * width as usize * 3..(y + 1) * width as usize * 3];
            for x in 0..width as usize {
                let src = &row[x * src_bytes_per_pixel..];
                // BMP stores BGR(A); flip to RGB.
                dst_row[x * 3] = src[2];
                dst_row[x * 3 + 1] = src[1];
                dst_row[x * 3 + 2] = src[0];
            }
        }

        Ok(Bitmap { width, height, pixels })
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        (self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2])
    }

    /// Raw pixel rows, top-down, tightly packed RGB. Exposed for scans that
    /// want to walk memory directly instead of calling `pixel` per cell.
    #[inline]
    pub fn rows(&self) -> &[u8] {
        &self.pixels
    }

    /// Every distinct RGB color appearing in the bitmap.
    pub fn collect_unique_colors(&self) -> std::collections::HashSet<(u8, u8, u8)> {
        let mut set = std::collections::HashSet::new();
        for chunk in self.pixels.chunks_exact(3) {
            set.insert((chunk[0], chunk[1], chunk[2]));
        }
        set
    }

    /// All pixel coordinates matching `color`.
    pub fn find_pixels_with_color(&self, color: (u8, u8, u8)) -> Vec<(u32, u32)> {
        let mut matches = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.pixel(x, y) == color {
                    matches.push((x, y));
                }
            }
        }
        matches
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, DataError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| DataError::Parse("BMP header truncated".into()))
}

fn read_i32_le(bytes: &[u8], offset: usize) -> Result<i32, DataError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| DataError::Parse("BMP header truncated".into()))
}

fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16, DataError> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| DataError::Parse("BMP header truncated".into()))
}
