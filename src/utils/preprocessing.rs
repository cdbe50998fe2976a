//! Image preprocessing and mask postprocessing for segmentation models
//!
//! The forward path letterboxes an image into the model's square input and
//! normalises it to an NCHW tensor. The inverse path maps the model's output
//! map back onto the original pixel grid using the same letterbox geometry.

use crate::{
    error::{PhotoboothError, Result},
    models::PreprocessingConfig,
    types::SegmentationMask,
};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Configuration for preprocessing behavior
#[derive(Debug, Clone)]
pub struct PreprocessingOptions {
    /// Padding color for aspect ratio preservation (RGB)
    pub padding_color: [u8; 3],
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            padding_color: [255, 255, 255],
        }
    }
}

/// Placement of an image inside the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub target_size: u32,
}

impl Letterbox {
    /// Compute the aspect-preserving fit of `dimensions` into a `target_size` square
    #[must_use]
    pub fn fit(dimensions: (u32, u32), target_size: u32) -> Self {
        let (width, height) = dimensions;
        let target = target_size as f32;
        let scale = (target / width.max(1) as f32).min(target / height.max(1) as f32);

        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            scaled_width,
            scaled_height,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            target_size,
        }
    }

    /// Map an original pixel coordinate to its position in the model grid
    #[must_use]
    pub fn to_model(&self, x: u32, y: u32) -> (u32, u32) {
        let scaled_x = ((x as f32 * self.scale).round() as u32).min(self.scaled_width - 1);
        let scaled_y = ((y as f32 * self.scale).round() as u32).min(self.scaled_height - 1);
        (scaled_x + self.offset_x, scaled_y + self.offset_y)
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into a normalised NCHW tensor
    ///
    /// Converts to RGB, resizes preserving aspect ratio, centres the result on
    /// a padded square canvas and normalises each channel.
    ///
    /// # Errors
    /// - Empty input image
    /// - Target size not representable as a tensor dimension
    pub fn preprocess_image(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
        options: &PreprocessingOptions,
    ) -> Result<(Letterbox, Array4<f32>)> {
        let target_size = preprocessing_config.target_size[0];
        let rgb_image = image.to_rgb8();
        let dimensions = rgb_image.dimensions();

        if dimensions.0 == 0 || dimensions.1 == 0 {
            return Err(PhotoboothError::processing_stage_error(
                "preprocess",
                "image has no pixels",
                Some(&format!("{}x{}", dimensions.0, dimensions.1)),
            ));
        }

        let letterbox = Letterbox::fit(dimensions, target_size);

        let resized = image::imageops::resize(
            &rgb_image,
            letterbox.scaled_width,
            letterbox.scaled_height,
            image::imageops::FilterType::Triangle,
        );

        let padding = options.padding_color;
        let mut canvas = ImageBuffer::from_pixel(target_size, target_size, image::Rgb(padding));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        let target_size_usize = usize::try_from(target_size).map_err(|_| {
            PhotoboothError::internal("Target size too large for tensor allocation")
        })?;
        let tensor = Self::canvas_to_tensor(&canvas, preprocessing_config, target_size_usize);

        Ok((letterbox, tensor))
    }

    /// Preprocess with default options
    ///
    /// # Errors
    /// - See [`ImagePreprocessor::preprocess_image`]
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<(Letterbox, Array4<f32>)> {
        Self::preprocess_image(image, preprocessing_config, &PreprocessingOptions::default())
    }

    fn canvas_to_tensor(
        canvas: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
        target_size: usize,
    ) -> Array4<f32> {
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;
        let mut tensor = Array4::<f32>::zeros((1, 3, target_size, target_size));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (y, row) in canvas.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for channel in 0..3 {
                    tensor[[0, channel, y, x]] =
                        (f32::from(pixel[channel]) / 255.0 - mean[channel]) / std[channel];
                }
            }
        }

        tensor
    }

    /// Map a model output map back onto the original pixel grid
    ///
    /// Output values are clamped to `[0, 1]` and scaled to `0..=255`.
    ///
    /// # Errors
    /// - Output tensor is not a single-channel single-batch map
    pub fn tensor_to_mask(
        tensor: &Array4<f32>,
        letterbox: &Letterbox,
        original_dimensions: (u32, u32),
    ) -> Result<SegmentationMask> {
        let (n, c, mask_height, mask_width) = tensor.dim();
        if n != 1 || c != 1 {
            return Err(PhotoboothError::segmentation(format!(
                "Invalid output tensor shape {:?}",
                tensor.shape()
            )));
        }

        // Output resolution may differ from the input square
        let ratio_x = mask_width as f32 / letterbox.target_size as f32;
        let ratio_y = mask_height as f32 / letterbox.target_size as f32;

        let (width, height) = original_dimensions;
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let (mx, my) = letterbox.to_model(x, y);
                let tx = (mx as f32 * ratio_x) as usize;
                let ty = (my as f32 * ratio_y) as usize;
                let value = tensor.get([0, 0, ty, tx]).copied().unwrap_or(0.0);
                data.push((value.clamp(0.0, 1.0) * 255.0) as u8);
            }
        }

        Ok(SegmentationMask::new(data, original_dimensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn small_config(edge: u32) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [edge, edge],
            ..PreprocessingConfig::default()
        }
    }

    #[test]
    fn test_letterbox_landscape() {
        let lb = Letterbox::fit((200, 100), 100);
        assert_eq!((lb.scaled_width, lb.scaled_height), (100, 50));
        assert_eq!((lb.offset_x, lb.offset_y), (0, 25));
        assert_eq!(lb.to_model(0, 0), (0, 25));
        assert_eq!(lb.to_model(199, 99), (99, 74));
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(40, 20, Rgb([0, 0, 0])));
        let (lb, tensor) = ImagePreprocessor::preprocess_for_inference(&image, &small_config(32))
            .unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        assert_eq!(lb.offset_y, 8);
        // White padding normalises to 1.0 - 0.5, black content to -0.5
        assert!((tensor[[0, 0, 0, 0]] - 0.5).abs() < 1e-6);
        assert!((tensor[[0, 0, 16, 16]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_image_rejected() {
        let image = DynamicImage::new_rgb8(0, 0);
        assert!(ImagePreprocessor::preprocess_for_inference(&image, &small_config(32)).is_err());
    }

    #[test]
    fn test_tensor_to_mask_respects_letterbox() {
        // Foreground only inside the letterboxed content band
        let lb = Letterbox::fit((4, 2), 4);
        let mut tensor = Array4::<f32>::zeros((1, 1, 4, 4));
        for y in lb.offset_y..lb.offset_y + lb.scaled_height {
            for x in 0..4 {
                tensor[[0, 0, y as usize, x as usize]] = 1.0;
            }
        }

        let mask = ImagePreprocessor::tensor_to_mask(&tensor, &lb, (4, 2)).unwrap();
        assert_eq!(mask.dimensions, (4, 2));
        assert!(mask.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_tensor_to_mask_rejects_multichannel() {
        let lb = Letterbox::fit((4, 4), 4);
        let tensor = Array4::<f32>::zeros((1, 3, 4, 4));
        assert!(ImagePreprocessor::tensor_to_mask(&tensor, &lb, (4, 4)).is_err());
    }
}
