//! Horizontal strip chunking for image uploads
//!
//! Controllers cap how much image data one command may carry, so an image
//! is uploaded as full-width horizontal strips no taller than
//! `max_chunk_height` rows. Full-width rows are padded to the controller's
//! row stride; a narrower strip is sent as tightly packed rows with only
//! its tail padded to a whole packed word.

use embedded_graphics::prelude::{Point, Size};
use embedded_graphics::primitives::Rectangle;

use crate::error::ProtocolError;
use crate::packer::{pack, Bpp};
use crate::raster::Canvas;

/// Largest IT8951 image payload: 60 KiB minus the 20-byte area header.
pub const MAX_TRANSFER: usize = 60 * 1024 - 20;

/// One horizontal band of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strip {
    /// First row, relative to the image
    pub y: u32,
    pub height: u32,
}

/// Bands of at most `max_chunk_height` rows covering `height` rows.
pub fn strips(height: u32, max_chunk_height: u32) -> impl Iterator<Item = Strip> {
    let step = max_chunk_height.max(1);
    (0..height).step_by(step as usize).map(move |y| Strip {
        y,
        height: step.min(height - y),
    })
}

/// Rows that fit in one transfer of at most `limit` bytes.
pub fn max_chunk_height(limit: usize, pitch: usize) -> Result<u32, ProtocolError> {
    if pitch == 0 {
        return Err(ProtocolError::ZeroPitch);
    }
    Ok((limit / pitch).max(1) as u32)
}

/// Samples per row handed to the packer.
///
/// A full-width image is padded to the controller's row stride, `pitch`
/// bytes at `bpp`. A narrower image keeps its own width: the area header
/// tells the controller `w` samples per row, so rows must not be padded.
pub fn row_samples(image_width: u32, panel_width: u32, pitch: usize, bpp: Bpp) -> usize {
    if image_width == panel_width {
        let step = bpp.step();
        (pitch * 8 / bpp.bits() as usize).div_ceil(step) * step
    } else {
        image_width as usize
    }
}

/// Grayscale rows of `strip`, each padded with zeros to `row_samples`.
pub fn grayscale_strip(image: &Canvas, strip: Strip, row_samples: usize) -> Vec<u8> {
    let width = image.width() as usize;
    let region = Rectangle::new(
        Point::new(0, strip.y as i32),
        Size::new(image.width(), strip.height),
    );
    let gray = image.export_grayscale(Some(region));
    if row_samples == width {
        return gray;
    }

    let mut padded = Vec::with_capacity(row_samples * strip.height as usize);
    for row in gray.chunks_exact(width.max(1)) {
        padded.extend_from_slice(row);
        padded.resize(padded.len() + row_samples.saturating_sub(width), 0);
    }
    padded
}

/// Export, pad and pack one strip.
///
/// The packer works on whole words, so the end of the strip is zero filled
/// up to a multiple of [`Bpp::step`].
pub fn packed_strip(
    image: &Canvas,
    strip: Strip,
    row_samples: usize,
    bpp: Bpp,
    word_flip: bool,
) -> Result<Vec<u8>, ProtocolError> {
    let mut gray = grayscale_strip(image, strip, row_samples);
    let step = bpp.step();
    gray.resize(gray.len().div_ceil(step) * step, 0);
    pack(bpp, &gray, word_flip)
}
