//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (hardware acceleration via CUDA or CoreML)
//! - Tract backend (pure Rust, no external dependencies)
//! - Mock backend (full-foreground mask, no model file)

use crate::config::{BackendType, SegmentationConfig};
use crate::error::{PhotoboothError, Result};
use crate::inference::InferenceBackend;

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::MockBackend;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

/// Create an uninitialized backend for the configured engine
///
/// # Errors
/// - Requested backend was not compiled in
/// - Model path missing or unreadable for model-backed engines
pub fn create_backend(config: &SegmentationConfig) -> Result<Box<dyn InferenceBackend>> {
    match config.backend_type {
        BackendType::Mock => Ok(Box::new(MockBackend::new())),
        #[cfg(feature = "onnx")]
        BackendType::Onnx => {
            let manager = model_manager(config)?;
            Ok(Box::new(OnnxBackend::with_model_manager(manager)))
        },
        #[cfg(feature = "tract")]
        BackendType::Tract => {
            let manager = model_manager(config)?;
            Ok(Box::new(TractBackend::with_model_manager(manager)))
        },
        #[allow(unreachable_patterns)]
        other => Err(PhotoboothError::invalid_config(format!(
            "Backend '{other}' is not available in this build"
        ))),
    }
}

#[cfg(any(feature = "onnx", feature = "tract"))]
fn model_manager(config: &SegmentationConfig) -> Result<crate::models::ModelManager> {
    let path = config.model_path.as_ref().ok_or_else(|| {
        PhotoboothError::invalid_config(format!(
            "Backend '{}' requires a model path",
            config.backend_type
        ))
    })?;
    crate::models::ModelManager::from_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_backend() {
        let config = SegmentationConfig {
            backend_type: BackendType::Mock,
            ..SegmentationConfig::default()
        };
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.get_model_info().unwrap().precision, "mock");
    }

    #[cfg(feature = "tract")]
    #[test]
    fn test_tract_backend_requires_model_path() {
        let config = SegmentationConfig {
            backend_type: BackendType::Tract,
            model_path: None,
            ..SegmentationConfig::default()
        };
        let err = create_backend(&config).err().unwrap();
        assert!(err.to_string().contains("requires a model path"));
    }
}
