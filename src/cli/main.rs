//! Photobooth service launcher
//!
//! Parses command-line arguments (with `PHOTOBOOTH_*` environment fallbacks),
//! installs tracing and runs the HTTP server until shutdown.

use super::config::CliConfigBuilder;
use crate::config::{BackendType, ExecutionProvider};
use crate::server;
use crate::tracing_config::{TracingConfig, TracingFormat};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Photo-booth compositing service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "photobooth-server")]
pub struct Cli {
    /// Socket address to listen on
    #[arg(long, env = "PHOTOBOOTH_BIND", default_value = "0.0.0.0:5000")]
    pub bind: String,

    /// Directory for uploaded photographs
    #[arg(long, env = "PHOTOBOOTH_UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Directory for final composites
    #[arg(long, env = "PHOTOBOOTH_OUTPUTS_DIR", default_value = "outputs")]
    pub outputs_dir: PathBuf,

    /// Directory containing frame_<n>.png assets
    #[arg(long, env = "PHOTOBOOTH_FRAMES_DIR", default_value = "frames")]
    pub frames_dir: PathBuf,

    /// Number of selectable frames
    #[arg(long, env = "PHOTOBOOTH_FRAME_COUNT", default_value_t = 6)]
    pub frame_count: u32,

    /// Base URL embedded in download links and QR codes
    #[arg(long, env = "PHOTOBOOTH_PUBLIC_URL", default_value = "http://localhost:5000")]
    pub public_url: String,

    /// Segmentation backend (onnx, tract, mock) [default: best compiled-in backend]
    #[arg(long, env = "PHOTOBOOTH_BACKEND")]
    pub backend: Option<BackendType>,

    /// Path to the segmentation model (.onnx); preprocessing.json is read from its directory
    #[arg(short, long, env = "PHOTOBOOTH_MODEL")]
    pub model: Option<PathBuf>,

    /// Execution provider for the onnx backend (auto, cpu, cuda, coreml)
    #[arg(short, long, env = "PHOTOBOOTH_EXECUTION_PROVIDER", default_value = "auto")]
    pub execution_provider: ExecutionProvider,

    /// Inference threads (0 = auto-detect)
    #[arg(short, long, env = "PHOTOBOOTH_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Longest edge an upload is reduced to before segmentation
    #[arg(long, env = "PHOTOBOOTH_MAX_WORKING_SIZE", default_value_t = 2000)]
    pub max_working_size: u32,

    /// Output canvas width
    #[arg(long, env = "PHOTOBOOTH_CANVAS_WIDTH", default_value_t = 1024)]
    pub canvas_width: u32,

    /// Output canvas height
    #[arg(long, env = "PHOTOBOOTH_CANVAS_HEIGHT", default_value_t = 1536)]
    pub canvas_height: u32,

    /// Fraction of the canvas the subject may occupy
    #[arg(long, env = "PHOTOBOOTH_SCALE_FACTOR", default_value_t = 0.85)]
    pub scale_factor: f32,

    /// QR code edge in pixels
    #[arg(long, env = "PHOTOBOOTH_QR_SIZE", default_value_t = 150)]
    pub qr_size: u32,

    /// QR code distance from the bottom-right corner
    #[arg(long, env = "PHOTOBOOTH_QR_MARGIN", default_value_t = 20)]
    pub qr_margin: u32,

    /// Maximum request body size in MiB
    #[arg(long, env = "PHOTOBOOTH_MAX_UPLOAD_MB", default_value_t = 16)]
    pub max_upload_mb: usize,

    /// Admin password; admin routes are unreachable without one
    #[arg(long, env = "PHOTOBOOTH_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Admin session lifetime in seconds
    #[arg(long, env = "PHOTOBOOTH_SESSION_TTL", default_value_t = 43_200)]
    pub session_ttl: u64,

    /// Disable permissive CORS headers
    #[arg(long, env = "PHOTOBOOTH_NO_CORS")]
    pub no_cors: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (console, compact, json)
    #[arg(long, env = "PHOTOBOOTH_LOG_FORMAT", default_value = "console")]
    pub log_format: TracingFormat,

    /// Also write logs to this file (daily rotation)
    #[cfg(feature = "tracing-files")]
    #[arg(long, env = "PHOTOBOOTH_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Main entry point
///
/// # Errors
/// - Invalid arguments or configuration
/// - Tracing installation, directory creation or socket binding failures
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = init_tracing(&cli)?;

    let config = CliConfigBuilder::from_cli(&cli)?;
    info!(
        bind = %config.server.bind_address,
        backend = %config.segmentation.backend_type,
        frames = %config.frames.frames_dir.display(),
        "Starting photobooth service"
    );

    server::serve(config)
        .await
        .context("Photobooth service failed")?;

    Ok(())
}

fn init_tracing(cli: &Cli) -> Result<crate::tracing_config::TracingGuard> {
    #[allow(unused_mut)]
    let mut logging = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format);

    #[cfg(feature = "tracing-files")]
    if let Some(path) = &cli.log_file {
        logging = logging.with_output(crate::tracing_config::TracingOutput::Both(path.clone()));
    }

    logging
        .init()
        .context("Failed to initialize tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_backend_and_provider() {
        let cli = Cli::try_parse_from([
            "photobooth-server",
            "--backend",
            "mock",
            "--execution-provider",
            "cpu",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.backend, Some(BackendType::Mock));
        assert_eq!(cli.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["photobooth-server", "--backend", "coreml"]).is_err());
    }
}
