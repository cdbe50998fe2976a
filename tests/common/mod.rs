//! Shared fixtures for integration tests
#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use photobooth::{BackendType, ServiceConfig};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

pub const ADMIN_PASSWORD: &str = "booth-admin";

/// Solid colour of frame `n`, distinct per frame
pub fn frame_color(index: u32) -> Rgba<u8> {
    let step = (index * 40) as u8;
    Rgba([step, 255 - step, 100, 255])
}

/// A temporary deployment: frames on disk, empty buckets, mock segmentation
pub struct TestEnv {
    pub dir: TempDir,
    pub config: ServiceConfig,
}

impl TestEnv {
    /// Environment with `frame_1.png` to `frame_6.png`
    pub fn new() -> Self {
        Self::with_frames(&[1, 2, 3, 4, 5, 6])
    }

    /// Environment with only the listed frames present
    pub fn with_frames(frames: &[u32]) -> Self {
        let dir = TempDir::new().unwrap();
        let frames_dir = dir.path().join("frames");
        std::fs::create_dir_all(&frames_dir).unwrap();
        for &index in frames {
            write_frame(&frames_dir, index);
        }

        let config = ServiceConfig::builder()
            .backend_type(BackendType::Mock)
            .frames_dir(frames_dir)
            .uploads_dir(dir.path().join("uploads"))
            .outputs_dir(dir.path().join("outputs"))
            .public_base_url("http://booth.test")
            .admin_password(Some(ADMIN_PASSWORD))
            .build()
            .unwrap();

        Self { dir, config }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.config.storage.uploads_dir
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.config.storage.outputs_dir
    }

    /// Names of files currently in `dir`, sorted
    pub fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn write_frame(frames_dir: &Path, index: u32) {
    // Half-size frames exercise the resample-to-canvas path
    let frame = RgbaImage::from_pixel(512, 768, frame_color(index));
    frame
        .save(frames_dir.join(format!("frame_{index}.png")))
        .unwrap();
}

/// Opaque JPEG "portrait" of the given size
pub fn jpeg_portrait(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([((x / 16) % 256) as u8, ((y / 16) % 256) as u8, 180])
    });
    encode(&DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

/// Opaque PNG "portrait" of the given size
pub fn png_portrait(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    encode(&DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

/// Whether two pixels differ by at most `tolerance` per channel
pub fn close(a: [u8; 3], b: [u8; 3], tolerance: u8) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x.abs_diff(*y) <= tolerance)
}
