//! Output format handling service
//!
//! Keeps the flattening and encoding rules for persisted images out of the
//! pipeline logic.

use crate::error::{PhotoboothError, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use std::io::Cursor;

/// Extensions accepted for uploads and shown in listings
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Flatten an RGBA image onto an opaque background
    ///
    /// Each pixel is blended as `fg * a + bg * (1 - a)`.
    #[must_use]
    pub fn flatten(rgba_image: &RgbaImage, background: [u8; 3]) -> RgbImage {
        let (width, height) = rgba_image.dimensions();
        let mut rgb_image = RgbImage::new(width, height);

        for (x, y, pixel) in rgba_image.enumerate_pixels() {
            let alpha = u16::from(pixel[3]);
            let blend = |fg: u8, bg: u8| -> u8 {
                ((u16::from(fg) * alpha + u16::from(bg) * (255 - alpha) + 127) / 255) as u8
            };
            rgb_image.put_pixel(
                x,
                y,
                Rgb([
                    blend(pixel[0], background[0]),
                    blend(pixel[1], background[1]),
                    blend(pixel[2], background[2]),
                ]),
            );
        }

        rgb_image
    }

    /// Flatten onto white and encode as PNG
    ///
    /// # Errors
    /// - `Encode` when the PNG encoder fails
    pub fn encode_final_png(rgba_image: &RgbaImage) -> Result<Vec<u8>> {
        let rgb = Self::flatten(rgba_image, [255, 255, 255]);
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| PhotoboothError::encode(format!("PNG encoding failed: {e}")))?;
        Ok(buffer.into_inner())
    }

    /// Whether `filename` has an allowed image extension (case-insensitive)
    #[must_use]
    pub fn is_allowed_image(filename: &str) -> bool {
        std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                ALLOWED_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
    }
}
