#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Photobooth
//!
//! A photo-booth compositing service. A client uploads a portrait and picks a
//! frame; the service removes the background, places the subject on the frame
//! at a fixed canvas size, stamps a QR code linking to the result and keeps
//! both the upload and the output for later download.
//!
//! ## Pipeline
//!
//! `store upload → segment → resolve frame → compose → annotate → store output`
//!
//! Each stage is a separate component so it can be used and tested on its own:
//!
//! - [`SegmentationAdapter`]: lazily created, process-wide background remover
//!   backed by ONNX Runtime, Tract or a mock backend
//! - [`FrameRegistry`]: `frame_<n>.png` lookup with fallback to frame 1
//! - [`Compositor`]: bounding-box trim, fit, bottom-centre placement
//! - [`QrAnnotator`]: QR stamp in the bottom-right corner
//! - [`StorageManager`]: token-named files in the uploads and outputs buckets
//! - [`PipelineOrchestrator`]: runs the stages and reports progress
//!
//! ## Library usage
//!
//! ```rust,no_run
//! use photobooth::{BackendType, PipelineOrchestrator, ProcessRequest, ServiceConfig};
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let config = ServiceConfig::builder()
//!     .backend_type(BackendType::Mock)
//!     .frames_dir("assets/frames")
//!     .build()?;
//!
//! let orchestrator = PipelineOrchestrator::new(&config);
//! orchestrator.storage().ensure_layout().await?;
//!
//! let request = ProcessRequest::new(upload, "portrait.jpg").frame_index(3);
//! let outcome = orchestrator.process(request).await?;
//! println!("Download at {}", outcome.download_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tract` (default): pure Rust segmentation backend
//! - `onnx`: ONNX Runtime backend with CUDA and `CoreML` execution providers
//! - `server` (default): `photobooth-server` binary and its CLI
//! - `tracing-json`, `tracing-files`: extra log outputs for the binary

pub mod backends;
#[cfg(feature = "server")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod frames;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod qr;
pub mod segmentation;
pub mod server;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::*;
pub use compositor::{alpha_bounding_box, BoundingBox, Compositor, Placement};
pub use config::{
    BackendType, CompositionConfig, ExecutionProvider, FrameConfig, QrConfig, SegmentationConfig,
    ServerConfig, ServiceConfig, ServiceConfigBuilder, StorageConfig,
};
pub use error::{PhotoboothError, Result};
pub use frames::FrameRegistry;
pub use inference::InferenceBackend;
pub use models::{ModelInfo, ModelManager, PreprocessingConfig};
pub use pipeline::{PipelineFailure, PipelineOrchestrator, ProcessOutcome, ProcessRequest};
pub use qr::QrAnnotator;
pub use segmentation::{
    BackgroundRemover, DefaultRemoverFactory, ModelBackgroundRemover, RemoverFactory,
    SegmentationAdapter,
};
pub use server::{create_router, serve, AppState};
pub use services::{
    sanitize_filename, NoOpProgressReporter, OutputFormatHandler, PipelineStage,
    ProgressReporter, ProgressTracker, ProgressUpdate, StorageManager, TracingProgressReporter,
};
pub use tracing_config::{TracingConfig, TracingFormat, TracingOutput};
pub use types::{Bucket, DeleteReport, FileError, ProcessingTimings, SegmentationMask, StoredItem};
pub use utils::{ImagePreprocessor, PreprocessingOptions};
