//! Mock backend for tests and model-less deployments

use crate::config::SegmentationConfig;
use crate::error::{PhotoboothError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;

/// Mock backend that treats every pixel as foreground
///
/// Useful for exercising the pipeline without a model file. The output mask
/// keeps the full letterboxed square opaque, so the inverse transform still
/// has real work to do.
#[derive(Debug)]
pub struct MockBackend {
    edge: usize,
    initialized: bool,
}

impl MockBackend {
    /// Create a new mock backend with the default 1024 input edge
    #[must_use]
    pub fn new() -> Self {
        Self::with_edge(1024)
    }

    /// Create a mock backend with a custom square input edge
    #[must_use]
    pub fn with_edge(edge: usize) -> Self {
        Self {
            edge: edge.max(1),
            initialized: false,
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &SegmentationConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        let start = Instant::now();
        self.initialized = true;
        log::debug!("Mock backend ready ({}x{} input)", self.edge, self.edge);
        Ok(Some(start.elapsed()))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(PhotoboothError::inference("Mock backend not initialized"));
        }
        let (n, _c, h, w) = input.dim();
        Ok(Array4::<f32>::ones((n, 1, h, w)))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.edge, self.edge)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, self.edge, self.edge)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let edge = self.edge as u32;
        Ok(PreprocessingConfig {
            target_size: [edge, edge],
            ..PreprocessingConfig::default()
        })
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "Mock Backend".to_string(),
            precision: "mock".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_before_initialize_fails() {
        let mut backend = MockBackend::with_edge(8);
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());
    }

    #[test]
    fn test_full_foreground_output() {
        let mut backend = MockBackend::with_edge(16);
        backend.initialize(&SegmentationConfig::default()).unwrap();

        let input = Array4::<f32>::zeros((1, 3, 16, 16));
        let output = backend.infer(&input).unwrap();
        assert_eq!(output.dim(), (1, 1, 16, 16));
        assert!(output.iter().all(|&v| (v - 1.0).abs() < f32::EPSILON));
    }

    #[test]
    fn test_preprocessing_matches_edge() {
        let backend = MockBackend::with_edge(320);
        let config = backend.get_preprocessing_config().unwrap();
        assert_eq!(config.target_size, [320, 320]);
        assert_eq!(config.normalization_mean, [0.5, 0.5, 0.5]);
    }
}
