//! Subject placement onto frames
//!
//! The compositor is a pure raster transform: it never touches disk and
//! always returns an image at the configured canvas size.

use crate::config::CompositionConfig;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Tight bounding box of all pixels with non-zero alpha
///
/// Returns `None` for fully transparent or empty images.
#[must_use]
pub fn alpha_bounding_box(image: &RgbaImage) -> Option<BoundingBox> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] > 0 {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Size and position of the subject on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Places a subject cutout onto a frame at a fixed canvas size
#[derive(Debug, Clone)]
pub struct Compositor {
    config: CompositionConfig,
}

impl Compositor {
    #[must_use]
    pub fn new(config: CompositionConfig) -> Self {
        Self { config }
    }

    /// Canvas dimensions `(width, height)`
    #[must_use]
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.config.canvas_width, self.config.canvas_height)
    }

    /// Fit a `(w, h)` subject inside the canvas and anchor it bottom-centre
    ///
    /// The limiting axis is scaled to `scale_factor` of the canvas and the
    /// other follows the subject's aspect ratio.
    #[must_use]
    pub fn placement(&self, subject: (u32, u32)) -> Placement {
        let (canvas_w, canvas_h) = self.canvas_size();
        let scale = f64::from(self.config.scale_factor);
        let subject_ratio = f64::from(subject.0.max(1)) / f64::from(subject.1.max(1));
        let canvas_ratio = f64::from(canvas_w) / f64::from(canvas_h);

        let (new_w, new_h) = if subject_ratio > canvas_ratio {
            let new_w = scale * f64::from(canvas_w);
            (new_w, new_w / subject_ratio)
        } else {
            let new_h = scale * f64::from(canvas_h);
            (new_h * subject_ratio, new_h)
        };

        let width = (new_w as u32).clamp(1, canvas_w);
        let height = (new_h as u32).clamp(1, canvas_h);

        Placement {
            width,
            height,
            x: (canvas_w - width) / 2,
            y: canvas_h - height,
        }
    }

    /// Composite `cutout` onto `frame`
    ///
    /// The frame is resampled to the canvas size, the cutout is trimmed to
    /// its visible pixels, scaled, bottom-aligned, centred horizontally and
    /// alpha-blended over the frame.
    #[must_use]
    pub fn compose(&self, cutout: &RgbaImage, frame: &DynamicImage) -> RgbaImage {
        let (canvas_w, canvas_h) = self.canvas_size();

        let mut canvas = if frame.width() == canvas_w && frame.height() == canvas_h {
            frame.to_rgba8()
        } else {
            imageops::resize(&frame.to_rgba8(), canvas_w, canvas_h, FilterType::Lanczos3)
        };

        let subject = match alpha_bounding_box(cutout) {
            Some(bbox) => {
                imageops::crop_imm(cutout, bbox.x, bbox.y, bbox.width, bbox.height).to_image()
            },
            None => cutout.clone(),
        };
        if subject.width() == 0 || subject.height() == 0 {
            return canvas;
        }

        let placement = self.placement(subject.dimensions());
        let scaled = imageops::resize(
            &subject,
            placement.width,
            placement.height,
            FilterType::Lanczos3,
        );

        imageops::overlay(
            &mut canvas,
            &scaled,
            i64::from(placement.x),
            i64::from(placement.y),
        );
        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn compositor() -> Compositor {
        Compositor::new(CompositionConfig::default())
    }

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(512, 768, Rgba([0, 0, 255, 255])))
    }

    #[test]
    fn test_bounding_box() {
        let mut image = RgbaImage::new(10, 10);
        image.put_pixel(2, 3, Rgba([255, 0, 0, 1]));
        image.put_pixel(7, 8, Rgba([255, 0, 0, 255]));
        assert_eq!(
            alpha_bounding_box(&image),
            Some(BoundingBox {
                x: 2,
                y: 3,
                width: 6,
                height: 6
            })
        );
        assert_eq!(alpha_bounding_box(&RgbaImage::new(5, 5)), None);
    }

    #[test]
    fn test_placement_tall_subject() {
        // Narrower than the canvas ratio: height is the limiting axis
        let p = compositor().placement((500, 1000));
        assert_eq!(p.height, 1305);
        assert_eq!(p.width, 652);
        assert_eq!(p.y, 1536 - 1305);
        assert_eq!(p.x, (1024 - 652) / 2);
    }

    #[test]
    fn test_placement_wide_subject() {
        let p = compositor().placement((2000, 500));
        assert_eq!(p.width, 870);
        assert_eq!(p.height, 217);
        assert_eq!(p.y + p.height, 1536);
    }

    #[test]
    fn test_placement_never_zero() {
        let p = compositor().placement((100_000, 1));
        assert!(p.height >= 1);
        assert!(p.width <= 1024);
    }

    #[test]
    fn test_compose_is_canvas_sized_and_bottom_aligned() {
        let mut cutout = RgbaImage::new(300, 200);
        for y in 50..150 {
            for x in 100..140 {
                cutout.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }

        let result = compositor().compose(&cutout, &frame());
        assert_eq!(result.dimensions(), (1024, 1536));

        let bbox = result
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 200 && p[2] < 50)
            .fold((u32::MAX, 0, u32::MAX, 0), |(min_x, max_x, min_y, max_y), (x, y, _)| {
                (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
            });
        assert_eq!(bbox.3, 1535);
        let left = bbox.0;
        let right = 1023 - bbox.1;
        assert!(left.abs_diff(right) <= 1);
    }

    #[test]
    fn test_transparent_cutout_leaves_frame() {
        let cutout = RgbaImage::new(64, 64);
        let result = compositor().compose(&cutout, &frame());
        assert_eq!(result.dimensions(), (1024, 1536));
        assert!(result.pixels().all(|p| p[2] == 255));
    }
}
