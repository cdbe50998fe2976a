//! ONNX Runtime backend implementation
//!
//! Supports CPU, CUDA and CoreML execution providers. Requested accelerators
//! that are not available fall back to CPU with a warning.

use crate::config::{ExecutionProvider, SegmentationConfig};
use crate::error::{PhotoboothError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl OnnxBackend {
    /// Create a new ONNX backend with specific model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// List ONNX Runtime execution providers with availability and description
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    fn cuda() -> Option<ExecutionProviderDispatch> {
        let provider = CUDAExecutionProvider::default();
        if OrtExecutionProvider::is_available(&provider).unwrap_or(false) {
            Some(provider.build())
        } else {
            None
        }
    }

    fn coreml() -> Option<ExecutionProviderDispatch> {
        let provider = CoreMLExecutionProvider::default();
        if OrtExecutionProvider::is_available(&provider).unwrap_or(false) {
            Some(CoreMLExecutionProvider::default().with_subgraphs(true).build())
        } else {
            None
        }
    }

    fn select_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let providers: Vec<_> = match requested {
            ExecutionProvider::Auto => [Self::cuda(), Self::coreml()].into_iter().flatten().collect(),
            ExecutionProvider::Cpu => Vec::new(),
            ExecutionProvider::Cuda => Self::cuda().into_iter().collect(),
            ExecutionProvider::CoreMl => Self::coreml().into_iter().collect(),
        };

        if providers.is_empty() && requested != ExecutionProvider::Cpu {
            log::warn!("Execution provider '{requested}' unavailable, falling back to CPU");
        }
        providers
    }

    fn load_model(&mut self, config: &SegmentationConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| PhotoboothError::model("No model manager available for ONNX backend"))?;
        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        let mut session_builder = Session::builder()
            .map_err(|e| {
                PhotoboothError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                PhotoboothError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        let providers = Self::select_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    PhotoboothError::inference(format!("Failed to set execution providers: {e}"))
                })?;
        }

        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| PhotoboothError::inference(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| PhotoboothError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| PhotoboothError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| PhotoboothError::inference(format!("Failed to create session from model data: {e}")))?;

        log::info!(
            "ONNX Runtime session ready: {} ({}), provider {}, {intra_threads} intra / {inter_threads} inter threads",
            model_info.name,
            model_info.precision,
            config.execution_provider
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!("Model loading complete: {}ms", model_load_time.as_millis());

        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &SegmentationConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| PhotoboothError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            PhotoboothError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs avoid depending on model-specific tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PhotoboothError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| PhotoboothError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| PhotoboothError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                PhotoboothError::inference(format!("Failed to extract output tensor: {e}"))
            })?;

        let shape = output_tensor.shape();
        let &[n, c, h, w] = shape else {
            return Err(PhotoboothError::inference(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };

        let output_array =
            Array4::from_shape_vec((n, c, h, w), output_tensor.iter().copied().collect())
                .map_err(|e| {
                    PhotoboothError::inference(format!("Failed to reshape output tensor: {e}"))
                })?;

        log::debug!(
            "Inference complete: {}ms",
            inference_start.elapsed().as_millis()
        );

        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 3, 1024, 1024), |info| info.input_shape)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 1, 1024, 1024), |info| info.output_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| PhotoboothError::internal("Model manager not initialized"))?;
        Ok(model_manager.preprocessing_config().clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| PhotoboothError::internal("Model manager not initialized"))?;
        model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
