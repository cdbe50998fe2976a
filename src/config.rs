//! Configuration types for the photobooth service

use crate::error::{PhotoboothError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Segmentation backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
    /// Built-in deterministic backend that keeps the whole image as foreground
    Mock,
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "onnx") {
            Self::Onnx
        } else if cfg!(feature = "tract") {
            Self::Tract
        } else {
            Self::Mock
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = PhotoboothError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            "mock" => Ok(Self::Mock),
            other => Err(PhotoboothError::invalid_config(format!(
                "Unknown segmentation backend '{other}' (expected onnx, tract or mock)"
            ))),
        }
    }
}

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = PhotoboothError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(PhotoboothError::invalid_config(format!(
                "Unknown execution provider '{other}'"
            ))),
        }
    }
}

/// Canvas geometry used by the compositor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Canonical output width in pixels
    pub canvas_width: u32,
    /// Canonical output height in pixels
    pub canvas_height: u32,
    /// Fraction of the canvas the subject may occupy along its limiting axis
    pub scale_factor: f32,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1024,
            canvas_height: 1536,
            scale_factor: 0.85,
        }
    }
}

/// QR stamp geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Final edge length of the QR raster in pixels
    pub size: u32,
    /// Distance from the bottom-right corner in pixels
    pub margin: u32,
    /// Pixels per QR module before resampling
    pub module_size: u32,
    /// Quiet zone width in modules
    pub quiet_zone: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            size: 150,
            margin: 20,
            module_size: 10,
            quiet_zone: 2,
        }
    }
}

/// Segmentation model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Backend used to run the model
    pub backend_type: BackendType,
    /// Path to the ONNX model file (required for onnx and tract backends)
    pub model_path: Option<PathBuf>,
    /// Execution provider for the ONNX backend
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
    /// Inputs larger than this on either axis are downscaled before segmentation
    pub max_working_size: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            backend_type: BackendType::default(),
            model_path: None,
            execution_provider: ExecutionProvider::Auto,
            intra_threads: 0,
            inter_threads: 0,
            max_working_size: 2000,
        }
    }
}

/// Bucket locations and public URL prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded source images
    pub uploads_dir: PathBuf,
    /// Directory holding final composites
    pub outputs_dir: PathBuf,
    /// Base URL used to build download links (no trailing slash)
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            outputs_dir: PathBuf::from("outputs"),
            public_base_url: "http://localhost:5000".to_string(),
        }
    }
}

/// Frame asset location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Directory containing `frame_<n>.png` files
    pub frames_dir: PathBuf,
    /// Number of addressable frames (indices 1..=frame_count)
    pub frame_count: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            frame_count: 6,
        }
    }
}

/// HTTP listener and admin settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind_address: String,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
    /// Admin password; admin login is disabled when unset
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
    /// Admin session lifetime in seconds
    pub session_ttl_secs: u64,
    /// Allow cross-origin requests from any origin
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
            admin_password: None,
            session_ttl_secs: 12 * 60 * 60,
            cors_enabled: true,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub composition: CompositionConfig,
    pub qr: QrConfig,
    pub segmentation: SegmentationConfig,
    pub storage: StorageConfig,
    pub frames: FrameConfig,
    pub server: ServerConfig,
}

impl ServiceConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Zero-sized canvas or QR stamp
    /// - Scale factor outside `(0, 1]`
    /// - QR stamp plus margin larger than the canvas
    /// - Zero frame count or working size
    /// - Model path missing for a model-backed backend
    pub fn validate(&self) -> Result<()> {
        let c = &self.composition;
        if c.canvas_width == 0 || c.canvas_height == 0 {
            return Err(PhotoboothError::config_value_error(
                "canvas size",
                format!("{}x{}", c.canvas_width, c.canvas_height),
                "both axes > 0",
            ));
        }
        if !(c.scale_factor > 0.0 && c.scale_factor <= 1.0) {
            return Err(PhotoboothError::config_value_error(
                "scale_factor",
                c.scale_factor,
                "(0, 1]",
            ));
        }

        let q = &self.qr;
        if q.size == 0 || q.module_size == 0 {
            return Err(PhotoboothError::config_value_error(
                "qr size",
                q.size.min(q.module_size),
                "> 0",
            ));
        }
        if q.size + q.margin > c.canvas_width || q.size + q.margin > c.canvas_height {
            return Err(PhotoboothError::invalid_config(format!(
                "QR stamp ({}px + {}px margin) does not fit a {}x{} canvas",
                q.size, q.margin, c.canvas_width, c.canvas_height
            )));
        }

        if self.frames.frame_count == 0 {
            return Err(PhotoboothError::config_value_error(
                "frame_count",
                0,
                ">= 1",
            ));
        }

        let s = &self.segmentation;
        if s.max_working_size == 0 {
            return Err(PhotoboothError::config_value_error(
                "max_working_size",
                0,
                "> 0",
            ));
        }
        if s.backend_type != BackendType::Mock && s.model_path.is_none() {
            return Err(PhotoboothError::invalid_config(format!(
                "Backend '{}' requires a model path",
                s.backend_type
            )));
        }

        if self.storage.uploads_dir == self.storage.outputs_dir {
            return Err(PhotoboothError::invalid_config(
                "Uploads and outputs must be separate directories",
            ));
        }

        Ok(())
    }
}

/// Builder for `ServiceConfig`
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    #[must_use]
    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.config.composition.canvas_width = width;
        self.config.composition.canvas_height = height;
        self
    }

    #[must_use]
    pub fn scale_factor(mut self, scale_factor: f32) -> Self {
        self.config.composition.scale_factor = scale_factor;
        self
    }

    #[must_use]
    pub fn qr_size(mut self, size: u32) -> Self {
        self.config.qr.size = size;
        self
    }

    #[must_use]
    pub fn qr_margin(mut self, margin: u32) -> Self {
        self.config.qr.margin = margin;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.segmentation.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.segmentation.model_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.segmentation.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.segmentation.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.segmentation.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn max_working_size(mut self, size: u32) -> Self {
        self.config.segmentation.max_working_size = size;
        self
    }

    #[must_use]
    pub fn uploads_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.storage.uploads_dir = dir.into();
        self
    }

    #[must_use]
    pub fn outputs_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.storage.outputs_dir = dir.into();
        self
    }

    #[must_use]
    pub fn public_base_url<S: Into<String>>(mut self, url: S) -> Self {
        let url: String = url.into();
        self.config.storage.public_base_url = url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn frames_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.frames.frames_dir = dir.into();
        self
    }

    #[must_use]
    pub fn frame_count(mut self, count: u32) -> Self {
        self.config.frames.frame_count = count;
        self
    }

    #[must_use]
    pub fn bind_address<S: Into<String>>(mut self, address: S) -> Self {
        self.config.server.bind_address = address.into();
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.server.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn admin_password<S: Into<String>>(mut self, password: Option<S>) -> Self {
        self.config.server.admin_password = password.map(Into::into);
        self
    }

    #[must_use]
    pub fn session_ttl_secs(mut self, secs: u64) -> Self {
        self.config.server.session_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn cors_enabled(mut self, enabled: bool) -> Self {
        self.config.server.cors_enabled = enabled;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns `PhotoboothError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
