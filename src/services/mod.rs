//! Services separating I/O, formatting and progress concerns from the pipeline

pub mod format;
pub mod progress;
pub mod storage;

pub use format::OutputFormatHandler;
pub use progress::{
    NoOpProgressReporter, PipelineStage, ProgressReporter, ProgressTracker, ProgressUpdate,
    TracingProgressReporter,
};
pub use storage::{sanitize_filename, StorageManager};
