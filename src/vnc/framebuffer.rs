//! Canonical framebuffer.
//!
//! Holds the decoded image of the remote desktop as row-major `0x00RRGGBB` pixels
//! and applies the three rectangle update kinds to it: raw blits, solid fills and
//! copies within the buffer.
//!
//! The wire delivers raw rectangles in row-major raster order, which is also the
//! storage order here, so payload pixel `i` of a `w`-wide rectangle at `(x0, y0)`
//! lands at `(x0 + i % w, y0 + i / w)` without any transposition.

use std::fmt;

use super::error::{DecodeError, Result};
use super::protocol::{PixelFormat, Point, Rect};
use super::translate::{self, BACKGROUND};

/// The decoded remote desktop image for one session.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u16,
    height: u16,
    desktop_name: String,
    format: PixelFormat,
    pixels: Vec<u32>,
}

impl Framebuffer {
    /// Registers the server's pixel format and allocates a black framebuffer.
    ///
    /// # Errors
    ///
    /// Returns `DegeneratePixelFormat` if the format cannot be decoded.
    pub fn new(format: PixelFormat, width: u16, height: u16, desktop_name: impl Into<String>) -> Result<Self> {
        format.validate()?;
        Ok(Self {
            width,
            height,
            desktop_name: desktop_name.into(),
            format,
            pixels: vec![BACKGROUND; usize::from(width) * usize::from(height)],
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// All pixels, row-major.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// The canonical pixel at `(x, y)`, if in bounds.
    pub fn pixel(&self, x: u16, y: u16) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(self.index(x, y)).copied()
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }

    fn check_bounds(&self, rect: &Rect, what: &str) -> Result<()> {
        if rect.fits_within(self.width, self.height) {
            Ok(())
        } else {
            Err(DecodeError::InvalidRectangle(format!(
                "{} {} exceeds {}x{} framebuffer",
                what, rect, self.width, self.height
            )))
        }
    }

    fn check_payload(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(DecodeError::PayloadSizeMismatch { expected, actual })
        }
    }

    /// Decodes a block of packed pixels and writes it into `rect`.
    ///
    /// `data` holds `rect.area()` row-major words of the registered format.
    /// Nothing is written unless the rectangle and payload are both valid.
    pub fn blit_rectangle(&mut self, rect: Rect, data: &[u8]) -> Result<()> {
        self.check_bounds(&rect, "raw rectangle")?;
        let bpp = self.format.bytes_per_pixel();
        Self::check_payload(rect.area() * bpp, data.len())?;
        if rect.is_empty() {
            return Ok(());
        }

        let row_pixels = usize::from(rect.width);
        let row_bytes = row_pixels * bpp;
        for (row, src) in data.chunks_exact(row_bytes).enumerate() {
            let start = self.index(rect.x, rect.y + row as u16);
            translate::decode_row(src, &mut self.pixels[start..start + row_pixels], &self.format);
        }
        Ok(())
    }

    /// Fills `rect` with the single packed pixel in `data`.
    pub fn fill_rectangle(&mut self, rect: Rect, data: &[u8]) -> Result<()> {
        self.check_bounds(&rect, "fill rectangle")?;
        Self::check_payload(self.format.bytes_per_pixel(), data.len())?;
        let rgb = translate::decode_pixel(data, &self.format);
        self.fill_rgb(rect, rgb);
        Ok(())
    }

    /// Fills an already bounds-checked rectangle with a canonical colour.
    fn fill_rgb(&mut self, rect: Rect, rgb: u32) {
        if rect.is_empty() {
            return;
        }
        let row_pixels = usize::from(rect.width);
        for y in rect.y..rect.y + rect.height {
            let start = self.index(rect.x, y);
            self.pixels[start..start + row_pixels].fill(rgb);
        }
    }

    /// Copies the region of `dest`'s size at `source` onto `dest`.
    ///
    /// Overlapping regions produce the same result as snapshotting the source
    /// first: rows are visited bottom-up when the destination is below the
    /// source, and each row moves with `copy_within`.
    pub fn copy_rectangle(&mut self, dest: Rect, source: Point) -> Result<()> {
        let src = Rect::new(source.x, source.y, dest.width, dest.height);
        self.check_bounds(&dest, "copy destination")?;
        self.check_bounds(&src, "copy source")?;
        if dest.is_empty() {
            return Ok(());
        }

        let row_pixels = usize::from(dest.width);
        let mut copy_row = |row: u16| {
            let from = self.index(src.x, src.y + row);
            let to = self.index(dest.x, dest.y + row);
            self.pixels.copy_within(from..from + row_pixels, to);
        };
        if dest.y > src.y {
            (0..dest.height).rev().for_each(&mut copy_row);
        } else {
            (0..dest.height).for_each(&mut copy_row);
        }
        Ok(())
    }

    /// Reallocates at the new size. All previous content is discarded.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.pixels = vec![BACKGROUND; usize::from(width) * usize::from(height)];
    }
}

impl fmt::Display for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pixel Buffer [{}]", self.desktop_name)?;
        writeln!(f, " * width [{}] x height [{}]", self.width, self.height)?;
        write!(f, " * {}", self.format)
    }
}
