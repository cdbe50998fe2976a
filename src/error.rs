//! Error types for photobooth operations

use thiserror::Error;

/// Result type alias for photobooth operations
pub type Result<T> = std::result::Result<T, PhotoboothError>;

/// Error taxonomy shared by the pipeline, storage and HTTP layers
#[derive(Error, Debug)]
pub enum PhotoboothError {
    /// Bad or missing input the client can correct (missing file, disallowed extension)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A requested file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Neither the requested frame nor the default frame exists on disk
    #[error("Frame {0} not found")]
    FrameNotFound(u32),

    /// Background removal failed or produced undecodable data
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// Persisting a file to a bucket failed (disk full, permissions)
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    /// Image or QR encoding failed
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Admin endpoint reached without a valid session
    #[error("Authorization required")]
    Unauthorized,

    /// Input/output errors outside the write path
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Model loading or inference errors raised by a backend
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model file or metadata errors
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PhotoboothError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new storage write error
    pub fn storage_write<S: Into<String>>(msg: S) -> Self {
        Self::StorageWrite(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Internal(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Whether the client caused this error and may correct it
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::FrameNotFound(_) | Self::Unauthorized
        )
    }
}
