//! Request pipeline orchestration
//!
//! One request moves through
//! `Received → Stored(upload) → Segmented → FrameResolved → Composited →
//! Annotated → Stored(output) → Completed` and stops at the first failing
//! stage. The upload stays on disk whatever the outcome.

use crate::compositor::Compositor;
use crate::config::ServiceConfig;
use crate::error::{PhotoboothError, Result};
use crate::frames::FrameRegistry;
use crate::qr::QrAnnotator;
use crate::segmentation::SegmentationAdapter;
use crate::services::format::OutputFormatHandler;
use crate::services::progress::{
    PipelineStage, ProgressReporter, ProgressTracker, TracingProgressReporter,
};
use crate::services::storage::StorageManager;
use crate::types::{Bucket, ProcessingTimings};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Suffix of every output filename after the shared token
pub const OUTPUT_SUFFIX: &str = "output.png";

/// Default display name echoed back when the client sends none
pub const DEFAULT_NAME: &str = "User";

/// One compositing request
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub image_bytes: Vec<u8>,
    /// Client-supplied filename of the upload
    pub filename: String,
    /// Raw frame selector; out-of-range values select frame 1
    pub frame_index: i64,
    pub name: String,
    pub number: String,
}

impl ProcessRequest {
    #[must_use]
    pub fn new(image_bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            image_bytes,
            filename: filename.into(),
            frame_index: 1,
            name: DEFAULT_NAME.to_string(),
            number: String::new(),
        }
    }

    #[must_use]
    pub fn frame_index(mut self, index: i64) -> Self {
        self.frame_index = index;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    /// Check the upload before any work is done
    ///
    /// # Errors
    /// - `Validation` for an empty filename or a disallowed extension
    pub fn validate(&self) -> Result<()> {
        if self.filename.is_empty() {
            return Err(PhotoboothError::validation("No selected file"));
        }
        if !OutputFormatHandler::is_allowed_image(&self.filename) {
            return Err(PhotoboothError::validation("Invalid file type"));
        }
        Ok(())
    }
}

/// Metadata describing a completed request
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub token: String,
    pub upload_file: String,
    pub output_file: String,
    pub download_url: String,
    /// Frame actually requested after range normalisation
    pub frame_index: u32,
    pub name: String,
    pub number: String,
    pub timings: ProcessingTimings,
}

/// Terminal failure of a request
#[derive(Debug, thiserror::Error)]
#[error("Pipeline failed at {stage}: {error}")]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    #[source]
    pub error: PhotoboothError,
}

/// Sequences segmentation, composition, annotation and storage
pub struct PipelineOrchestrator {
    segmentation: Arc<SegmentationAdapter>,
    frames: FrameRegistry,
    compositor: Compositor,
    qr: QrAnnotator,
    storage: StorageManager,
    reporter: Arc<dyn ProgressReporter>,
}

impl PipelineOrchestrator {
    /// Build an orchestrator with the default segmentation backend
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_segmentation(
            config,
            Arc::new(SegmentationAdapter::new(&config.segmentation)),
        )
    }

    /// Build an orchestrator around an existing segmentation adapter
    #[must_use]
    pub fn with_segmentation(config: &ServiceConfig, segmentation: Arc<SegmentationAdapter>) -> Self {
        Self {
            segmentation,
            frames: FrameRegistry::new(&config.frames),
            compositor: Compositor::new(config.composition.clone()),
            qr: QrAnnotator::new(config.qr.clone()),
            storage: StorageManager::new(&config.storage),
            reporter: Arc::new(TracingProgressReporter),
        }
    }

    /// Replace the progress reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    #[must_use]
    pub fn frames(&self) -> &FrameRegistry {
        &self.frames
    }

    #[must_use]
    pub fn segmentation(&self) -> &SegmentationAdapter {
        &self.segmentation
    }

    /// Run one request to completion or to its first failing stage
    ///
    /// # Errors
    /// - [`PipelineFailure`] naming the stage and its cause
    #[instrument(skip_all, fields(upload = %request.filename, frame = request.frame_index))]
    pub async fn process(
        &self,
        request: ProcessRequest,
    ) -> std::result::Result<ProcessOutcome, PipelineFailure> {
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());
        let result = self.run(request, &mut tracker).await;

        match result {
            Ok(mut outcome) => {
                outcome.timings = tracker.complete();
                info!(
                    output = %outcome.output_file,
                    total_ms = outcome.timings.total_ms,
                    "Request completed"
                );
                Ok(outcome)
            },
            Err(error) => {
                let stage = tracker
                    .current_stage()
                    .unwrap_or(PipelineStage::StoreUpload);
                tracker.fail(&error.to_string());
                Err(PipelineFailure { stage, error })
            },
        }
    }

    async fn run(
        &self,
        request: ProcessRequest,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<ProcessOutcome> {
        tracker.begin(PipelineStage::StoreUpload);
        request.validate()?;

        let ProcessRequest {
            image_bytes,
            filename,
            frame_index,
            name,
            number,
        } = request;

        let upload_file = self
            .storage
            .store(Bucket::Uploads, &image_bytes, &filename)
            .await?;
        let token = upload_file
            .split_once('_')
            .map(|(token, _)| token.to_string())
            .ok_or_else(|| PhotoboothError::internal("Stored upload has no token"))?;

        tracker.begin(PipelineStage::Segmentation);
        let cutout = self.segmentation.remove_background(image_bytes).await?;

        tracker.begin(PipelineStage::FrameResolution);
        let frames = self.frames.clone();
        let frame = blocking(move || frames.load_frame(frame_index)).await?;

        tracker.begin(PipelineStage::Composition);
        let compositor = self.compositor.clone();
        let composite = blocking(move || Ok(compositor.compose(&cutout, &frame))).await?;

        tracker.begin(PipelineStage::Annotation);
        let output_file = format!("{token}_{OUTPUT_SUFFIX}");
        let download_url = self.storage.public_url(Bucket::Outputs, &output_file);
        let qr = self.qr.clone();
        let url = download_url.clone();
        let encoded = blocking(move || {
            let annotated = qr.annotate(composite, &url)?;
            OutputFormatHandler::encode_final_png(&annotated)
        })
        .await?;

        tracker.begin(PipelineStage::StoreOutput);
        self.storage
            .store_with_token(Bucket::Outputs, &encoded, &token, OUTPUT_SUFFIX)
            .await?;

        Ok(ProcessOutcome {
            token,
            upload_file,
            output_file,
            download_url,
            frame_index: self.frames.normalize_index(frame_index),
            name,
            number,
            timings: ProcessingTimings::default(),
        })
    }
}

/// Run CPU-heavy work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PhotoboothError::internal(format!("Blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = ProcessRequest::new(vec![1, 2, 3], "me.jpg");
        assert_eq!(request.name, "User");
        assert_eq!(request.number, "");
        assert_eq!(request.frame_index, 1);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation_messages() {
        let err = ProcessRequest::new(Vec::new(), "").validate().unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: No selected file");

        let err = ProcessRequest::new(Vec::new(), "resume.pdf")
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Invalid file type");
    }

    #[test]
    fn test_failure_display() {
        let failure = PipelineFailure {
            stage: PipelineStage::Segmentation,
            error: PhotoboothError::segmentation("boom"),
        };
        assert_eq!(
            failure.to_string(),
            "Pipeline failed at segmentation: Segmentation failed: boom"
        );
    }
}
