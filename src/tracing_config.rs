//! Tracing subscriber setup for the service binary
//!
//! Library code only emits events; the binary decides where they go.

#[cfg(feature = "server")]
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default)
    Console,
    /// Compact console output without colors, for CI and log collectors
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

impl std::str::FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "pretty" => Ok(Self::Console),
            "compact" => Ok(Self::Compact),
            #[cfg(feature = "tracing-json")]
            "json" => Ok(Self::Json),
            other => Err(format!("Unsupported log format '{other}'")),
        }
    }
}

/// Configuration for tracing output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Output to stderr (default)
    Console,
    /// Output to a daily rolling file
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
    /// Output to both console and file
    #[cfg(feature = "tracing-files")]
    Both(std::path::PathBuf),
}

/// Tracing configuration builder
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
        }
    }
}

/// Keeps background log writers alive; drop it only at shutdown
#[derive(Debug, Default)]
#[must_use]
pub struct TracingGuard {
    #[cfg(feature = "tracing-files")]
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info,tower_http=info",
            1 => "debug,tower_http=debug",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    ///
    /// `RUST_LOG` wins over both the explicit filter and the verbosity.
    ///
    /// # Errors
    /// - Invalid filter directives
    /// - A global subscriber is already installed
    #[cfg(feature = "server")]
    pub fn init(self) -> anyhow::Result<TracingGuard> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(
                self.env_filter
                    .as_deref()
                    .unwrap_or_else(|| self.verbosity_to_filter()),
            )?,
        };

        #[allow(unused_mut)]
        let mut guard = TracingGuard::default();
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        match &self.output {
            TracingOutput::Console => layers.push(console_layer(self.format)),
            #[cfg(feature = "tracing-files")]
            TracingOutput::File(path) => {
                let (layer, file_guard) = file_layer(self.format, path);
                layers.push(layer);
                guard._file = Some(file_guard);
            },
            #[cfg(feature = "tracing-files")]
            TracingOutput::Both(path) => {
                layers.push(console_layer(self.format));
                let (layer, file_guard) = file_layer(self.format, path);
                layers.push(layer);
                guard._file = Some(file_guard);
            },
        }

        Registry::default().with(layers).with(filter).try_init()?;
        Ok(guard)
    }
}

#[cfg(feature = "server")]
fn console_layer(format: TracingFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        TracingFormat::Console => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .compact()
            .boxed(),
        TracingFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(false)
            .compact()
            .boxed(),
        #[cfg(feature = "tracing-json")]
        TracingFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    }
}

#[cfg(all(feature = "server", feature = "tracing-files"))]
fn file_layer(
    format: TracingFormat,
    path: &std::path::Path,
) -> (
    Box<dyn Layer<Registry> + Send + Sync>,
    tracing_appender::non_blocking::WorkerGuard,
) {
    use tracing_appender::{non_blocking, rolling};

    let file_appender = rolling::daily(
        path.parent().unwrap_or_else(|| std::path::Path::new(".")),
        path.file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("photobooth.log")),
    );
    let (writer, guard) = non_blocking(file_appender);

    let layer = match format {
        TracingFormat::Console | TracingFormat::Compact => fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .compact()
            .boxed(),
        #[cfg(feature = "tracing-json")]
        TracingFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    };
    (layer, guard)
}
