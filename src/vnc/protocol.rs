//! RFB pixel format and rectangle geometry.
//!
//! These are the values the protocol layer extracts from server messages before
//! handing them to the engine: the server's native pixel format (reported once at
//! server-init) and the rectangles carried by each framebuffer update.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use super::error::{DecodeError, Result};

/// Length of the RFB `PIXEL_FORMAT` record on the wire.
pub const PIXEL_FORMAT_LEN: usize = 16;

/// The server's native pixel format.
///
/// Each channel is described by a maximum value (`2^bits - 1`) and a shift giving
/// its position inside the packed pixel word. `big_endian` only affects how a
/// multi-byte word is assembled from the payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    /// Width of one packed pixel word in bits: 8, 16 or 32.
    pub bits_per_pixel: u8,
    /// Number of significant bits in the word.
    pub depth: u8,
    pub big_endian: bool,
    /// Colour-map formats are stored but decoded as true colour.
    pub true_colour: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// 16-bit little-endian 5-6-5 true colour.
    pub fn rgb565() -> Self {
        Self {
            bits_per_pixel: 16,
            depth: 16,
            big_endian: false,
            true_colour: true,
            red_max: 31,
            green_max: 63,
            blue_max: 31,
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        }
    }

    /// 32-bit little-endian 8-8-8 true colour with red in the high byte.
    pub fn rgb888() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: false,
            true_colour: true,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    /// Parses the 16-byte RFB `PIXEL_FORMAT` record.
    ///
    /// Layout: bits-per-pixel, depth, big-endian flag, true-colour flag, three
    /// big-endian `u16` maxima (red, green, blue), three `u8` shifts and three
    /// bytes of padding. The parsed format is validated before it is returned.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PIXEL_FORMAT_LEN {
            return Err(DecodeError::PayloadSizeMismatch {
                expected: PIXEL_FORMAT_LEN,
                actual: bytes.len(),
            });
        }

        let format = Self {
            bits_per_pixel: bytes[0],
            depth: bytes[1],
            big_endian: bytes[2] != 0,
            true_colour: bytes[3] != 0,
            red_max: BigEndian::read_u16(&bytes[4..6]),
            green_max: BigEndian::read_u16(&bytes[6..8]),
            blue_max: BigEndian::read_u16(&bytes[8..10]),
            red_shift: bytes[10],
            green_shift: bytes[11],
            blue_shift: bytes[12],
        };
        format.validate()?;
        Ok(format)
    }

    /// Number of payload bytes per packed pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bits_per_pixel / 8)
    }

    /// Checks that every channel can be rescaled and the word width is supported.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.bits_per_pixel, 8 | 16 | 32) {
            return Err(DecodeError::DegeneratePixelFormat(format!(
                "unsupported bits per pixel {}",
                self.bits_per_pixel
            )));
        }

        let channels = [
            ("red", self.red_max, self.red_shift),
            ("green", self.green_max, self.green_shift),
            ("blue", self.blue_max, self.blue_shift),
        ];
        for (name, max, shift) in channels {
            if max == 0 {
                return Err(DecodeError::DegeneratePixelFormat(format!("{} max is zero", name)));
            }
            if shift >= 32 {
                return Err(DecodeError::DegeneratePixelFormat(format!(
                    "{} shift {} exceeds the pixel word",
                    name, shift
                )));
            }
        }

        if !self.true_colour {
            log::warn!("Server pixel format uses a colour map; decoding pixels as true colour");
        }
        Ok(())
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} bpp, depth {}", self.bits_per_pixel, self.depth)?;
        writeln!(f, " * red max   [{}] shift [{}]", self.red_max, self.red_shift)?;
        writeln!(f, " * green max [{}] shift [{}]", self.green_max, self.green_shift)?;
        writeln!(f, " * blue max  [{}] shift [{}]", self.blue_max, self.blue_shift)?;
        write!(f, " * big endian [{}] true colour [{}]", self.big_endian, self.true_colour)
    }
}

/// A position in framebuffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned region of the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Builds a rectangle from its top-left and (exclusive) bottom-right corners.
    ///
    /// Inverted corners are rejected with `InvalidRectangle`.
    pub fn from_corners(top_left: Point, bottom_right: Point) -> Result<Self> {
        if bottom_right.x < top_left.x || bottom_right.y < top_left.y {
            return Err(DecodeError::InvalidRectangle(format!(
                "inverted corners ({},{})-({},{})",
                top_left.x, top_left.y, bottom_right.x, bottom_right.y
            )));
        }
        Ok(Self {
            x: top_left.x,
            y: top_left.y,
            width: bottom_right.x - top_left.x,
            height: bottom_right.y - top_left.y,
        })
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies entirely within a `width` x `height` framebuffer.
    ///
    /// Extents are compared in `u32` so `x + width` cannot wrap.
    pub fn fits_within(&self, width: u16, height: u16) -> bool {
        u32::from(self.x) + u32::from(self.width) <= u32::from(width)
            && u32::from(self.y) + u32::from(self.height) <= u32::from(height)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}) {}x{}", self.x, self.y, self.width, self.height)
    }
}
