//! Frame registry
//!
//! Frames are pre-authored images stored as `<frames_dir>/frame_<n>.png`
//! for `n` in `1..=frame_count`.

use crate::config::FrameConfig;
use crate::error::{PhotoboothError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Index every out-of-range or missing selector falls back to
pub const DEFAULT_FRAME: u32 = 1;

/// Maps integer selectors to frame assets on disk
#[derive(Debug, Clone)]
pub struct FrameRegistry {
    frames_dir: PathBuf,
    frame_count: u32,
}

impl FrameRegistry {
    #[must_use]
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            frames_dir: config.frames_dir.clone(),
            frame_count: config.frame_count.max(1),
        }
    }

    /// Number of selectable frames
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Clamp a client-supplied selector into the valid range
    ///
    /// Anything outside `1..=frame_count` selects the default frame.
    #[must_use]
    pub fn normalize_index(&self, index: i64) -> u32 {
        match u32::try_from(index) {
            Ok(i) if (1..=self.frame_count).contains(&i) => i,
            _ => DEFAULT_FRAME,
        }
    }

    /// On-disk location of frame `index` (whether or not it exists)
    #[must_use]
    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.frames_dir.join(format!("frame_{index}.png"))
    }

    /// Resolve a selector to an existing frame file
    ///
    /// Out-of-range selectors and missing files fall back to the default
    /// frame once.
    ///
    /// # Errors
    /// - `FrameNotFound` when the default frame is missing too
    pub fn resolve_frame(&self, index: i64) -> Result<PathBuf> {
        let selected = self.normalize_index(index);
        let path = self.frame_path(selected);
        if is_file(&path) {
            debug!(frame = selected, "Frame resolved");
            return Ok(path);
        }

        if selected != DEFAULT_FRAME {
            warn!(frame = selected, "Frame file missing, falling back to default frame");
            let fallback = self.frame_path(DEFAULT_FRAME);
            if is_file(&fallback) {
                return Ok(fallback);
            }
        }

        Err(PhotoboothError::FrameNotFound(selected))
    }

    /// Resolve and decode a frame
    ///
    /// # Errors
    /// - `FrameNotFound` as for [`FrameRegistry::resolve_frame`]
    /// - Decode failures of the frame file
    pub fn load_frame(&self, index: i64) -> Result<DynamicImage> {
        let path = self.resolve_frame(index)?;
        Ok(image::open(&path)?)
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
