//! Segmentation model metadata and loading
//!
//! Models are plain ONNX files on disk. Preprocessing parameters default to
//! the ISNet convention and may be overridden by a `preprocessing.json`
//! sidecar placed next to the model file.

use crate::error::{PhotoboothError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional sidecar holding preprocessing overrides
pub const PREPROCESSING_SIDECAR: &str = "preprocessing.json";

/// Model preprocessing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Square input edge expected by the model `[width, height]`
    pub target_size: [u32; 2],
    /// Per-channel mean subtracted after scaling to `[0, 1]`
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divided after mean subtraction
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: [1024, 1024],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

impl PreprocessingConfig {
    /// Validate sizes and normalization values
    ///
    /// # Errors
    /// - Zero or non-square target size
    /// - Non-positive standard deviation
    pub fn validate(&self) -> Result<()> {
        let [w, h] = self.target_size;
        if w == 0 || h == 0 || w != h {
            return Err(PhotoboothError::model(format!(
                "Model input must be a non-empty square, got {w}x{h}"
            )));
        }
        if self.normalization_std.iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(PhotoboothError::model(
                "Normalization std values must be positive and finite",
            ));
        }
        Ok(())
    }
}

/// Descriptive model information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Model manager for a single ONNX model file
#[derive(Debug, Clone)]
pub struct ModelManager {
    model_path: PathBuf,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Create a model manager for the ONNX file at `model_path`
    ///
    /// # Errors
    /// - Model path does not exist or is not a file
    /// - Sidecar exists but cannot be read or parsed
    /// - Invalid preprocessing parameters
    pub fn from_path<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();

        if !model_path.is_file() {
            return Err(PhotoboothError::invalid_config(format!(
                "Model file does not exist: {}",
                model_path.display()
            )));
        }

        let preprocessing = Self::load_sidecar(&model_path)?.unwrap_or_default();
        preprocessing.validate()?;

        log::debug!(
            "Model manager ready for {} (input {}x{})",
            model_path.display(),
            preprocessing.target_size[0],
            preprocessing.target_size[1]
        );

        Ok(Self {
            model_path,
            preprocessing,
        })
    }

    fn load_sidecar(model_path: &Path) -> Result<Option<PreprocessingConfig>> {
        let sidecar = model_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(PREPROCESSING_SIDECAR);

        if !sidecar.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&sidecar)
            .map_err(|e| PhotoboothError::file_io_error("read preprocessing sidecar", &sidecar, &e))?;
        let config = serde_json::from_str(&content).map_err(|e| {
            PhotoboothError::model(format!("Failed to parse {}: {e}", sidecar.display()))
        })?;
        Ok(Some(config))
    }

    /// Load model data
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.model_path)
            .map_err(|e| PhotoboothError::file_io_error("read model file", &self.model_path, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file metadata cannot be read
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(&self.model_path)
            .map_err(|e| PhotoboothError::file_io_error("stat model file", &self.model_path, &e))?
            .len() as usize;

        let name = self
            .model_path
            .file_stem()
            .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned());
        let precision = if name.contains("fp16") { "fp16" } else { "fp32" }.to_string();
        let edge = self.preprocessing.target_size[0] as usize;

        Ok(ModelInfo {
            name,
            precision,
            size_bytes,
            input_shape: (1, 3, edge, edge),
            output_shape: (1, 1, edge, edge),
        })
    }

    /// Get preprocessing configuration
    #[must_use]
    pub fn preprocessing_config(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    /// Get the model file path
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}
