//! QR code generation and stamping

use crate::config::QrConfig;
use crate::error::{PhotoboothError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

/// Renders download links as QR codes and stamps them onto composites
#[derive(Debug, Clone)]
pub struct QrAnnotator {
    config: QrConfig,
}

impl QrAnnotator {
    #[must_use]
    pub fn new(config: QrConfig) -> Self {
        Self { config }
    }

    /// Encode `data` as a black-on-white QR raster at the configured size
    ///
    /// Uses error-correction level L and the smallest version that fits.
    ///
    /// # Errors
    /// - `Encode` when the data does not fit any QR version
    pub fn generate(&self, data: &str) -> Result<RgbaImage> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
            .map_err(|e| PhotoboothError::encode(format!("QR encoding failed: {e}")))?;

        let raster = self.rasterize(&code);
        debug!(
            version_width = code.width(),
            raster = raster.width(),
            "QR code rendered"
        );

        let rgba = DynamicImage::ImageLuma8(raster).to_rgba8();
        Ok(imageops::resize(
            &rgba,
            self.config.size,
            self.config.size,
            FilterType::Lanczos3,
        ))
    }

    fn rasterize(&self, code: &QrCode) -> GrayImage {
        let modules = code.width() as u32;
        let box_size = self.config.module_size.max(1);
        let quiet = self.config.quiet_zone;
        let edge = (modules + 2 * quiet) * box_size;

        let mut raster = GrayImage::from_pixel(edge, edge, Luma([255]));
        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let i = i as u32;
            let left = (i % modules + quiet) * box_size;
            let top = (i / modules + quiet) * box_size;
            for y in top..top + box_size {
                for x in left..left + box_size {
                    raster.put_pixel(x, y, Luma([0]));
                }
            }
        }
        raster
    }

    /// Top-left corner of the stamp on a `(width, height)` image
    ///
    /// Saturates at zero when the stamp plus margin does not fit.
    #[must_use]
    pub fn position(&self, dimensions: (u32, u32)) -> (u32, u32) {
        let offset = self.config.size + self.config.margin;
        (
            dimensions.0.saturating_sub(offset),
            dimensions.1.saturating_sub(offset),
        )
    }

    /// Stamp a QR code for `url` in the bottom-right corner of `composite`
    ///
    /// # Errors
    /// - `Encode` when the URL cannot be encoded
    pub fn annotate(&self, mut composite: RgbaImage, url: &str) -> Result<RgbaImage> {
        let qr = self.generate(url)?;
        let (x, y) = self.position(composite.dimensions());
        imageops::overlay(&mut composite, &qr, i64::from(x), i64::from(y));
        Ok(composite)
    }
}
