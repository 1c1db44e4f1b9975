//! RGBA canvas handed to the panel drivers
//!
//! The canvas is plain 32bpp storage. Drivers never look at color; they ask
//! for a grayscale strip with [`Canvas::export_grayscale`] and pack that.
//! It also implements [`DrawTarget`] so text and shapes can be rendered onto
//! it with `embedded_graphics`.

use std::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use image::{Rgba, RgbaImage};
use thiserror::Error;

/// Opaque white
pub const WHITE: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);
/// Opaque black
pub const BLACK: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0xFF]);

/// A color string that is not `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid color: {0:?}")]
pub struct InvalidColor(pub String);

/// 32-bit-per-pixel image.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    /// Transparent black canvas
    pub fn new(width: u32, height: u32) -> Self {
        Canvas {
            pixels: RgbaImage::new(width, height),
        }
    }

    /// Wrap an already decoded image
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Canvas { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Paint every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = color;
        }
    }

    /// Paint every pixel with a CSS style hex color, eg. `#FFF`.
    pub fn fill_hex(&mut self, color: &str) -> Result<(), InvalidColor> {
        let rgba = parse_hex_color(color)?;
        self.fill(rgba);
        Ok(())
    }

    /// Raw RGBA bytes, `width * height * 4` long.
    pub fn export_color(&self) -> Vec<u8> {
        self.pixels.as_raw().clone()
    }

    /// One byte per pixel, optionally limited to `region`.
    ///
    /// Each sample is `alpha/255 * (0.299 R + 0.587 G + 0.114 B)` truncated
    /// to an integer. The weights are applied in fixed point (per mille) so
    /// the result is exact: opaque white is 255, not 254.
    ///
    /// A region reaching outside the canvas is clipped to it.
    pub fn export_grayscale(&self, region: Option<Rectangle>) -> Vec<u8> {
        let area = match region {
            Some(region) => region.intersection(&self.bounding_box()),
            None => self.bounding_box(),
        };

        let left = area.top_left.x.max(0) as u32;
        let top = area.top_left.y.max(0) as u32;
        let mut gray = Vec::with_capacity((area.size.width * area.size.height) as usize);

        for y in top..top + area.size.height {
            for x in left..left + area.size.width {
                gray.push(luma(self.pixels.get_pixel(x, y)));
            }
        }

        gray
    }

    /// Underlying image, eg. for saving a preview
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }
}

fn luma(&Rgba([r, g, b, a]): &Rgba<u8>) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    (u32::from(a) * weighted / (255 * 1000)) as u8
}

/// Parse `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_hex_color(color: &str) -> Result<Rgba<u8>, InvalidColor> {
    let invalid = || InvalidColor(color.to_string());
    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);

    let channels = match hex.len() {
        3 => [nibble(0), nibble(1), nibble(2), Ok(0xFF)],
        4 => [nibble(0), nibble(1), nibble(2), nibble(3)],
        6 => [byte(0), byte(2), byte(4), Ok(0xFF)],
        8 => [byte(0), byte(2), byte(4), byte(6)],
        _ => return Err(invalid()),
    };

    let mut rgba = [0u8; 4];
    for (out, channel) in rgba.iter_mut().zip(channels) {
        *out = channel.map_err(|_| invalid())?;
    }
    Ok(Rgba(rgba))
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.pixels.width(), self.pixels.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.pixels.dimensions();
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x < width && y < height {
                self.pixels
                    .put_pixel(x, y, Rgba([color.r(), color.g(), color.b(), 0xFF]));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{Primitive, PrimitiveStyle};

    #[test]
    fn fill_white_exports_white() {
        let mut canvas = Canvas::new(100, 100);
        canvas.fill_hex("#FFF").unwrap();

        let color = canvas.export_color();
        assert_eq!(color.len(), 100 * 100 * 4);
        assert!(color.iter().all(|&b| b == 255));

        let gray = canvas.export_grayscale(None);
        assert_eq!(gray.len(), 100 * 100);
        assert!(gray.iter().all(|&b| b == 255));
    }

    #[test]
    fn fill_black_keeps_alpha() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_hex("#000").unwrap();

        let color = canvas.export_color();
        let all_black = color
            .iter()
            .enumerate()
            .all(|(i, &b)| if i % 4 == 3 { b == 255 } else { b == 0 });
        assert!(all_black);
        assert!(canvas.export_grayscale(None).iter().all(|&b| b == 0));
    }

    #[test]
    fn luma_weights_and_alpha() {
        let mut canvas = Canvas::new(1, 1);
        canvas.fill(Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.export_grayscale(None), vec![76]);
        canvas.fill(Rgba([0, 255, 0, 255]));
        assert_eq!(canvas.export_grayscale(None), vec![149]);
        canvas.fill(Rgba([0, 0, 255, 255]));
        assert_eq!(canvas.export_grayscale(None), vec![29]);
        // half transparent white: 128/255 * 255
        canvas.fill(Rgba([255, 255, 255, 128]));
        assert_eq!(canvas.export_grayscale(None), vec![128]);
        // fresh canvas is fully transparent
        assert_eq!(Canvas::new(2, 1).export_grayscale(None), vec![0, 0]);
    }

    #[test]
    fn grayscale_region_is_cropped_and_clipped() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill(WHITE);
        canvas.draw_iter([Pixel(Point::new(1, 2), Rgb888::BLACK)]).unwrap();

        let region = Rectangle::new(Point::new(0, 2), Size::new(4, 2));
        let strip = canvas.export_grayscale(Some(region));
        assert_eq!(strip, vec![255, 0, 255, 255, 255, 255, 255, 255]);

        let clipped =
            canvas.export_grayscale(Some(Rectangle::new(Point::new(2, 3), Size::new(10, 10))));
        assert_eq!(clipped.len(), 2);
    }

    #[test]
    fn draws_with_embedded_graphics() {
        let mut canvas = Canvas::new(8, 8);
        canvas.fill(WHITE);
        Rectangle::new(Point::new(0, 0), Size::new(8, 4))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::BLACK))
            .draw(&mut canvas)
            .unwrap();

        let gray = canvas.export_grayscale(None);
        assert!(gray[..32].iter().all(|&b| b == 0));
        assert!(gray[32..].iter().all(|&b| b == 255));
        // out of range pixels are ignored
        canvas.draw_iter([Pixel(Point::new(-1, 9), Rgb888::BLACK)]).unwrap();
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#fff"), Ok(WHITE));
        assert_eq!(parse_hex_color("#000000"), Ok(BLACK));
        assert_eq!(parse_hex_color("#11223344"), Ok(Rgba([0x11, 0x22, 0x33, 0x44])));
        assert_eq!(parse_hex_color("#abcd"), Ok(Rgba([0xAA, 0xBB, 0xCC, 0xDD])));
        assert!(parse_hex_color("fff").is_err());
        assert!(parse_hex_color("#ggg").is_err());
        assert!(parse_hex_color("#12345").is_err());
    }
}
