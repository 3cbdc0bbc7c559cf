//! Translation from server pixel words to canonical RGB.
//!
//! The canonical pixel is `0x00RRGGBB` with each channel in 0-255, regardless of
//! the server's depth, channel layout or byte order.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::protocol::PixelFormat;

/// Canonical background colour (black).
pub const BACKGROUND: u32 = 0x0000_0000;

/// Assembles one packed pixel word from `bytes` in byte order `B`.
///
/// `bytes` must hold exactly one word (1, 2 or 4 bytes).
fn read_word<B: ByteOrder>(bytes: &[u8]) -> u32 {
    match bytes.len() {
        1 => u32::from(bytes[0]),
        2 => u32::from(B::read_u16(bytes)),
        _ => B::read_u32(bytes),
    }
}

/// Reads one packed pixel word using the format's byte order.
pub fn read_pixel(bytes: &[u8], format: &PixelFormat) -> u32 {
    if format.big_endian {
        read_word::<BigEndian>(bytes)
    } else {
        read_word::<LittleEndian>(bytes)
    }
}

/// Extracts one channel and rescales it linearly onto 0-255, truncating.
///
/// `max` is non-zero for any validated format, and `(p >> shift) & max` is at most
/// `u16::MAX`, so the product cannot overflow.
#[inline]
fn rescale(pixel: u32, shift: u8, max: u16) -> u32 {
    let max = u32::from(max);
    ((pixel >> shift) & max) * 255 / max
}

/// Converts a packed pixel value into a canonical `0x00RRGGBB` value.
pub fn pixel_to_rgb(pixel: u32, format: &PixelFormat) -> u32 {
    let red = rescale(pixel, format.red_shift, format.red_max);
    let green = rescale(pixel, format.green_shift, format.green_max);
    let blue = rescale(pixel, format.blue_shift, format.blue_max);
    (red << 16) | (green << 8) | blue
}

/// Reads and converts one pixel in a single step.
pub fn decode_pixel(bytes: &[u8], format: &PixelFormat) -> u32 {
    pixel_to_rgb(read_pixel(bytes, format), format)
}

/// Decodes a run of packed pixels from `src` into `dst`.
///
/// `src` must hold exactly `dst.len()` words of the format's width.
pub fn decode_row(src: &[u8], dst: &mut [u32], format: &PixelFormat) {
    let bpp = format.bytes_per_pixel();
    for (out, word) in dst.iter_mut().zip(src.chunks_exact(bpp)) {
        *out = decode_pixel(word, format);
    }
}

/// Splits a canonical pixel into its `(r, g, b)` bytes.
pub fn rgb_components(rgb: u32) -> (u8, u8, u8) {
    ((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}
