//! Conversion from CLI arguments to `ServiceConfig`

use crate::cli::main_impl::Cli;
use crate::config::ServiceConfig;
use anyhow::{Context, Result};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build and validate the service configuration from parsed arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServiceConfig> {
        let backend = cli.backend.unwrap_or_default();
        let mut builder = ServiceConfig::builder()
            .bind_address(cli.bind.clone())
            .uploads_dir(cli.uploads_dir.clone())
            .outputs_dir(cli.outputs_dir.clone())
            .frames_dir(cli.frames_dir.clone())
            .frame_count(cli.frame_count)
            .public_base_url(cli.public_url.trim_end_matches('/'))
            .backend_type(backend)
            .execution_provider(cli.execution_provider)
            .intra_threads(cli.threads)
            .max_working_size(cli.max_working_size)
            .canvas_size(cli.canvas_width, cli.canvas_height)
            .scale_factor(cli.scale_factor)
            .qr_size(cli.qr_size)
            .qr_margin(cli.qr_margin)
            .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
            .admin_password(cli.admin_password.clone())
            .session_ttl_secs(cli.session_ttl)
            .cors_enabled(!cli.no_cors);

        if let Some(model) = &cli.model {
            builder = builder.model_path(model.clone());
        }

        builder.build().context("Invalid service configuration")
    }
}
