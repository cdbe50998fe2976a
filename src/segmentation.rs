//! Background segmentation adapter
//!
//! Wraps an inference backend behind [`BackgroundRemover`] and keeps one
//! process-wide handle that is created lazily on first use. Creation is
//! gated so concurrent first requests build the model once; a failed
//! creation leaves the slot empty and the next request retries.

use crate::backends::create_backend;
use crate::config::SegmentationConfig;
use crate::error::{PhotoboothError, Result};
use crate::inference::InferenceBackend;
use crate::models::PreprocessingConfig;
use crate::utils::ImagePreprocessor;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use instant::Instant;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Capability that turns a photograph into a subject cutout with alpha
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background, returning RGBA at the input's resolution
    ///
    /// # Errors
    /// - Inference or mask postprocessing failures
    fn remove_background(&self, image: &DynamicImage) -> Result<RgbaImage>;
}

/// Builds the process-wide [`BackgroundRemover`] handle
pub trait RemoverFactory: Send + Sync {
    /// Create and initialize a remover
    ///
    /// # Errors
    /// - Model loading or backend initialization failures
    fn create(&self) -> Result<Arc<dyn BackgroundRemover>>;
}

/// Remover backed by an [`InferenceBackend`]
///
/// Backends need exclusive access to their session, so inference calls are
/// serialised by a mutex.
pub struct ModelBackgroundRemover {
    backend: Mutex<Box<dyn InferenceBackend>>,
    preprocessing: PreprocessingConfig,
}

impl ModelBackgroundRemover {
    /// Initialize `backend` and wrap it
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Missing preprocessing configuration
    pub fn new(mut backend: Box<dyn InferenceBackend>, config: &SegmentationConfig) -> Result<Self> {
        if let Some(load_time) = backend.initialize(config)? {
            info!(
                backend = %config.backend_type,
                load_ms = load_time.as_millis() as u64,
                "Segmentation model loaded"
            );
        }
        let preprocessing = backend.get_preprocessing_config()?;

        Ok(Self {
            backend: Mutex::new(backend),
            preprocessing,
        })
    }
}

impl BackgroundRemover for ModelBackgroundRemover {
    fn remove_background(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let dimensions = image.dimensions();
        let (letterbox, tensor) =
            ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing)?;

        let output = {
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| PhotoboothError::internal("Segmentation backend lock poisoned"))?;
            backend.infer(&tensor)?
        };

        let mask = ImagePreprocessor::tensor_to_mask(&output, &letterbox, dimensions)?;
        debug!(
            foreground_ratio = mask.foreground_ratio(),
            "Segmentation mask computed"
        );

        let mut cutout = image.to_rgba8();
        mask.apply_to_image(&mut cutout)?;
        Ok(cutout)
    }
}

/// Factory building a [`ModelBackgroundRemover`] from configuration
#[derive(Debug, Clone)]
pub struct DefaultRemoverFactory {
    config: SegmentationConfig,
}

impl DefaultRemoverFactory {
    #[must_use]
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }
}

impl RemoverFactory for DefaultRemoverFactory {
    fn create(&self) -> Result<Arc<dyn BackgroundRemover>> {
        let backend = create_backend(&self.config)?;
        let remover = ModelBackgroundRemover::new(backend, &self.config)?;
        Ok(Arc::new(remover))
    }
}

/// Lazily initialised, process-wide segmentation entry point
pub struct SegmentationAdapter {
    factory: Arc<dyn RemoverFactory>,
    handle: OnceCell<Arc<dyn BackgroundRemover>>,
    max_working_size: u32,
}

impl std::fmt::Debug for SegmentationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationAdapter")
            .field("initialized", &self.is_initialized())
            .field("max_working_size", &self.max_working_size)
            .finish_non_exhaustive()
    }
}

impl SegmentationAdapter {
    /// Create an adapter using the default backend factory
    #[must_use]
    pub fn new(config: &SegmentationConfig) -> Self {
        Self::with_factory(
            Arc::new(DefaultRemoverFactory::new(config.clone())),
            config.max_working_size,
        )
    }

    /// Create an adapter around a custom factory
    #[must_use]
    pub fn with_factory(factory: Arc<dyn RemoverFactory>, max_working_size: u32) -> Self {
        Self {
            factory,
            handle: OnceCell::new(),
            max_working_size: max_working_size.max(1),
        }
    }

    /// Whether the model handle has been created
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.handle.initialized()
    }

    /// Get the shared remover, creating it on first call
    ///
    /// # Errors
    /// - Factory failures, reported as segmentation errors
    pub async fn handle(&self) -> Result<Arc<dyn BackgroundRemover>> {
        let remover = self
            .handle
            .get_or_try_init(|| async {
                let factory = Arc::clone(&self.factory);
                let start = Instant::now();
                let created = tokio::task::spawn_blocking(move || factory.create())
                    .await
                    .map_err(|e| PhotoboothError::segmentation(format!("Model init task failed: {e}")))?;

                match &created {
                    Ok(_) => info!(
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Segmentation handle ready"
                    ),
                    Err(e) => warn!(error = %e, "Segmentation handle creation failed, will retry"),
                }
                created.map_err(into_segmentation)
            })
            .await?;

        Ok(Arc::clone(remover))
    }

    /// Decode `raw_bytes` and return the subject cutout
    ///
    /// Inputs larger than the working size are downscaled first, so the
    /// cutout resolution may differ from the upload.
    ///
    /// # Errors
    /// - Undecodable input
    /// - Model creation or inference failures
    #[instrument(skip_all, fields(input_bytes = raw_bytes.len()))]
    pub async fn remove_background(&self, raw_bytes: Vec<u8>) -> Result<RgbaImage> {
        let remover = self.handle().await?;
        let max_working_size = self.max_working_size;

        tokio::task::spawn_blocking(move || {
            let image = image::load_from_memory(&raw_bytes).map_err(|e| {
                PhotoboothError::segmentation(format!("Failed to decode input image: {e}"))
            })?;
            let image = limit_working_size(image, max_working_size);
            remover.remove_background(&image).map_err(into_segmentation)
        })
        .await
        .map_err(|e| PhotoboothError::segmentation(format!("Segmentation task failed: {e}")))?
    }
}

/// Downscale so neither side exceeds `max_size`, preserving aspect ratio
#[must_use]
pub fn limit_working_size(image: DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_size && height <= max_size {
        return image;
    }

    debug!(width, height, max_size, "Downscaling input to working size");
    image.resize(max_size, max_size, FilterType::Lanczos3)
}

fn into_segmentation(error: PhotoboothError) -> PhotoboothError {
    match error {
        PhotoboothError::Segmentation(_) => error,
        other => PhotoboothError::segmentation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use crate::config::BackendType;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    struct FlakyFactory {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl RemoverFactory for FlakyFactory {
        fn create(&self) -> Result<Arc<dyn BackgroundRemover>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(PhotoboothError::model("model file unreadable"));
            }
            let remover = ModelBackgroundRemover::new(
                Box::new(MockBackend::with_edge(32)),
                &SegmentationConfig::default(),
            )?;
            Ok(Arc::new(remover))
        }
    }

    #[test]
    fn test_limit_working_size() {
        let image = DynamicImage::new_rgb8(4000, 3000);
        let limited = limit_working_size(image, 2000);
        assert_eq!(limited.dimensions(), (2000, 1500));

        let small = DynamicImage::new_rgb8(640, 480);
        assert_eq!(limit_working_size(small, 2000).dimensions(), (640, 480));
    }

    #[tokio::test]
    async fn test_mock_backend_keeps_subject_opaque() {
        let config = SegmentationConfig {
            backend_type: BackendType::Mock,
            ..SegmentationConfig::default()
        };
        let adapter = SegmentationAdapter::new(&config);
        assert!(!adapter.is_initialized());

        let cutout = adapter.remove_background(png_bytes(64, 48)).await.unwrap();
        assert_eq!(cutout.dimensions(), (64, 48));
        assert!(cutout.pixels().all(|p| p[3] == 255));
        assert!(adapter.is_initialized());
    }

    #[tokio::test]
    async fn test_undecodable_input_is_segmentation_error() {
        let factory = Arc::new(FlakyFactory {
            calls: AtomicUsize::new(0),
            fail_first: 0,
        });
        let adapter = SegmentationAdapter::with_factory(factory, 2000);

        let err = adapter.remove_background(b"not an image".to_vec()).await.unwrap_err();
        assert!(matches!(err, PhotoboothError::Segmentation(_)));
    }

    #[tokio::test]
    async fn test_failed_init_is_retried_then_cached() {
        let factory = Arc::new(FlakyFactory {
            calls: AtomicUsize::new(0),
            fail_first: 1,
        });
        let shared: Arc<dyn RemoverFactory> = Arc::clone(&factory) as Arc<dyn RemoverFactory>;
        let adapter = SegmentationAdapter::with_factory(shared, 2000);

        let err = adapter.remove_background(png_bytes(8, 8)).await.unwrap_err();
        assert!(matches!(err, PhotoboothError::Segmentation(_)));
        assert!(!adapter.is_initialized());

        adapter.remove_background(png_bytes(8, 8)).await.unwrap();
        adapter.remove_background(png_bytes(8, 8)).await.unwrap();
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    }
}
