//! Progress reporting service
//!
//! Separates stage reporting from the pipeline so frontends can observe a
//! request without the orchestrator knowing how it is displayed.

use crate::types::ProcessingTimings;
use instant::Instant;
use serde::Serialize;

/// Work stages of one compositing request, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Persisting the raw upload
    StoreUpload,
    /// Removing the background
    Segmentation,
    /// Locating and decoding the frame asset
    FrameResolution,
    /// Placing the subject on the frame
    Composition,
    /// Stamping the QR code and flattening
    Annotation,
    /// Persisting the final output
    StoreOutput,
}

impl PipelineStage {
    /// All stages in execution order
    pub const ALL: [Self; 6] = [
        Self::StoreUpload,
        Self::Segmentation,
        Self::FrameResolution,
        Self::Composition,
        Self::Annotation,
        Self::StoreOutput,
    ];

    /// Get a human-readable description of the stage
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::StoreUpload => "Storing upload",
            Self::Segmentation => "Removing background",
            Self::FrameResolution => "Loading frame",
            Self::Composition => "Compositing subject",
            Self::Annotation => "Adding QR code",
            Self::StoreOutput => "Storing output",
        }
    }

    /// Name of the state reached once this stage succeeds
    #[must_use]
    pub fn completed_state(self) -> &'static str {
        match self {
            Self::StoreUpload => "Stored(upload)",
            Self::Segmentation => "Segmented",
            Self::FrameResolution => "FrameResolved",
            Self::Composition => "Composited",
            Self::Annotation => "Annotated",
            Self::StoreOutput => "Stored(output)",
        }
    }

    /// Progress percentage reached when this stage starts
    #[must_use]
    pub fn progress_percentage(self) -> u8 {
        match self {
            Self::StoreUpload => 5,
            Self::Segmentation => 10,
            Self::FrameResolution => 70,
            Self::Composition => 75,
            Self::Annotation => 90,
            Self::StoreOutput => 95,
        }
    }

    fn record(self, timings: &mut ProcessingTimings, elapsed_ms: u64) {
        let slot = match self {
            Self::StoreUpload => &mut timings.store_upload_ms,
            Self::Segmentation => &mut timings.segmentation_ms,
            Self::FrameResolution => &mut timings.frame_ms,
            Self::Composition => &mut timings.compose_ms,
            Self::Annotation => &mut timings.annotate_ms,
            Self::StoreOutput => &mut timings.store_output_ms,
        };
        *slot = elapsed_ms;
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StoreUpload => "store_upload",
            Self::Segmentation => "segmentation",
            Self::FrameResolution => "frame_resolution",
            Self::Composition => "composition",
            Self::Annotation => "annotation",
            Self::StoreOutput => "store_output",
        };
        f.write_str(name)
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: &'static str,
    /// Elapsed time since the request started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: PipelineStage, start_time: Instant) -> Self {
        Self {
            stage,
            progress: stage.progress_percentage(),
            description: stage.description(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        }
    }
}

/// Trait for observing pipeline progress
pub trait ProgressReporter: Send + Sync {
    /// A stage is starting
    fn report_progress(&self, update: ProgressUpdate);

    /// The request completed with the given timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// The request failed at `stage`
    fn report_error(&self, stage: PipelineStage, error: &str);
}

/// No-op progress reporter for when progress reporting is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: PipelineStage, _error: &str) {}
}

/// Reporter emitting structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        tracing::debug!(
            stage = %update.stage,
            progress = update.progress,
            elapsed_ms = update.elapsed_ms,
            "{}",
            update.description
        );
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        tracing::info!(
            total_ms = timings.total_ms,
            segmentation_ms = timings.segmentation_ms,
            compose_ms = timings.compose_ms,
            "Pipeline completed"
        );
    }

    fn report_error(&self, stage: PipelineStage, error: &str) {
        tracing::error!(stage = %stage, error, "Pipeline failed");
    }
}

/// Per-request tracker that reports stages and accumulates timings
pub struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    start_time: Instant,
    stage_start: Instant,
    current_stage: Option<PipelineStage>,
    timings: ProcessingTimings,
}

impl<'a> ProgressTracker<'a> {
    #[must_use]
    pub fn new(reporter: &'a dyn ProgressReporter) -> Self {
        let now = Instant::now();
        Self {
            reporter,
            start_time: now,
            stage_start: now,
            current_stage: None,
            timings: ProcessingTimings::default(),
        }
    }

    /// Enter `stage`, closing the timing of the previous one
    pub fn begin(&mut self, stage: PipelineStage) {
        self.close_current();
        self.current_stage = Some(stage);
        self.stage_start = Instant::now();
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    fn close_current(&mut self) {
        if let Some(stage) = self.current_stage.take() {
            let elapsed = self.stage_start.elapsed().as_millis() as u64;
            stage.record(&mut self.timings, elapsed);
            tracing::trace!(state = stage.completed_state(), elapsed_ms = elapsed, "Stage done");
        }
    }

    /// Report failure of the current stage
    pub fn fail(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(PipelineStage::StoreUpload);
        self.reporter.report_error(stage, error);
    }

    /// Close the last stage and report completion
    #[must_use]
    pub fn complete(mut self) -> ProcessingTimings {
        self.close_current();
        self.timings.total_ms = self.elapsed_ms();
        self.reporter.report_completion(&self.timings);
        self.timings
    }

    /// Stage currently running
    #[must_use]
    pub fn current_stage(&self) -> Option<PipelineStage> {
        self.current_stage
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        stages: Mutex<Vec<PipelineStage>>,
        errors: Mutex<Vec<(PipelineStage, String)>>,
        completions: Mutex<usize>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.stages.lock().unwrap().push(update.stage);
        }

        fn report_completion(&self, _timings: &ProcessingTimings) {
            *self.completions.lock().unwrap() += 1;
        }

        fn report_error(&self, stage: PipelineStage, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }
    }

    #[test]
    fn test_stage_progress_is_monotonic() {
        let percentages: Vec<u8> = PipelineStage::ALL
            .iter()
            .map(|s| s.progress_percentage())
            .collect();
        assert!(percentages.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_tracker_reports_all_stages() {
        let reporter = RecordingReporter::default();
        let mut tracker = ProgressTracker::new(&reporter);
        for stage in PipelineStage::ALL {
            tracker.begin(stage);
        }
        let timings = tracker.complete();

        assert_eq!(*reporter.stages.lock().unwrap(), PipelineStage::ALL.to_vec());
        assert_eq!(*reporter.completions.lock().unwrap(), 1);
        assert!(timings.total_ms >= timings.segmentation_ms);
    }

    #[test]
    fn test_tracker_reports_failing_stage() {
        let reporter = RecordingReporter::default();
        let mut tracker = ProgressTracker::new(&reporter);
        tracker.begin(PipelineStage::StoreUpload);
        tracker.begin(PipelineStage::Segmentation);
        tracker.fail("model crashed");

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, PipelineStage::Segmentation);
        assert_eq!(tracker.current_stage(), Some(PipelineStage::Segmentation));
    }

    #[test]
    fn test_no_op_reporter() {
        let reporter = NoOpProgressReporter;
        let mut tracker = ProgressTracker::new(&reporter);
        tracker.begin(PipelineStage::Composition);
        tracker.fail("ignored");
        let _ = tracker.complete();
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::FrameResolution.to_string(), "frame_resolution");
        assert_eq!(PipelineStage::StoreOutput.completed_state(), "Stored(output)");
    }
}
