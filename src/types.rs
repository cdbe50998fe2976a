//! Core types shared across the pipeline and storage layers

use crate::error::{PhotoboothError, Result};
use chrono::{DateTime, Utc};
use image::{ImageBuffer, Luma, Rgba};
use serde::{Deserialize, Serialize};

/// Named storage area holding immutable files addressed by filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Source photographs as uploaded by clients
    Uploads,
    /// Final flattened composites
    Outputs,
}

impl Bucket {
    /// Public route prefix a bucket's files are served under
    #[must_use]
    pub fn route(self) -> &'static str {
        match self {
            Self::Uploads => "view-upload",
            Self::Outputs => "download",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploads => "uploads",
            Self::Outputs => "outputs",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Bucket {
    type Err = PhotoboothError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uploads" | "upload" => Ok(Self::Uploads),
            "outputs" | "output" => Ok(Self::Outputs),
            other => Err(PhotoboothError::validation(format!(
                "Unknown category '{other}'"
            ))),
        }
    }
}

/// A file held in one of the buckets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub filename: String,
    /// Public URL resolving to this file
    pub url: String,
    pub modified_at: DateTime<Utc>,
}

/// A single failure inside a bulk operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub filename: String,
    pub error: String,
}

/// Result of a best-effort bulk delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted_count: usize,
    pub errors: Vec<FileError>,
}

/// Per-pixel foreground confidence (0 = background, 255 = foreground)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Convert mask to a grayscale image
    pub fn to_image(&self) -> Result<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| PhotoboothError::segmentation("Failed to create image from mask data"))
    }

    /// Write the mask into the alpha channel of an RGBA image
    ///
    /// Pixels with zero confidence are cleared to fully transparent black.
    pub fn apply_to_image(&self, image: &mut ImageBuffer<Rgba<u8>, Vec<u8>>) -> Result<()> {
        if image.dimensions() != self.dimensions {
            return Err(PhotoboothError::segmentation(format!(
                "Image ({}x{}) and mask ({}x{}) dimensions do not match",
                image.width(),
                image.height(),
                self.dimensions.0,
                self.dimensions.1
            )));
        }

        for (pixel, &alpha) in image.pixels_mut().zip(self.data.iter()) {
            if alpha == 0 {
                *pixel = Rgba([0, 0, 0, 0]);
            } else {
                pixel[3] = alpha;
            }
        }

        Ok(())
    }

    /// Fraction of pixels with any foreground confidence
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v > 0).count();
        foreground as f32 / self.data.len() as f32
    }
}

/// Per-stage timing breakdown for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub store_upload_ms: u64,
    pub segmentation_ms: u64,
    pub frame_ms: u64,
    pub compose_ms: u64,
    pub annotate_ms: u64,
    pub store_output_ms: u64,
    pub total_ms: u64,
}
