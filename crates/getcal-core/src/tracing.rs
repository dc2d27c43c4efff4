//! Log setup for the `getcal` binary.
//!
//! Diagnostics are written to stderr; stdout is reserved for the summary line
//! and the dry-run text. `RUST_LOG` directives are added on top of the
//! preset's `getcal=<level>`; a `getcal=` directive there wins.
//!
//! ```ignore
//! use getcal_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::cli())?;
//! ```

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Target prefix shared by the getcal crates.
const TARGET: &str = "getcal";

/// Failure to install the log subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// Another subscriber is already installed.
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// How each log line is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, for reading by eye.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// Log subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for the getcal crates unless `RUST_LOG` names them.
    pub level: Level,
    /// Line layout.
    pub format: LogFormat,
    /// Print the source file and line.
    pub show_source: bool,
    /// Print the module path.
    pub show_target: bool,
    /// Print a timestamp.
    pub timestamps: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::cli()
    }
}

impl TracingConfig {
    /// Warnings and errors only, one bare line each.
    #[must_use]
    pub fn cli() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            show_source: false,
            show_target: false,
            timestamps: false,
        }
    }

    /// Everything down to DEBUG, with module path and source location.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            show_source: true,
            show_target: true,
            ..Self::cli()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// `getcal=<level>` followed by `env`; unparsable directives are
    /// dropped with a note on stderr.
    fn filter(&self, env: Option<&str>) -> EnvFilter {
        let mut directives = format!("{}={}", TARGET, self.level);
        if let Some(extra) = env.map(str::trim).filter(|extra| !extra.is_empty()) {
            directives.push(',');
            directives.push_str(extra);
        }
        EnvFilter::builder().parse_lossy(directives)
    }

    fn layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.show_source)
            .with_line_number(self.show_source)
            .with_target(self.show_target);

        match (self.format, self.timestamps) {
            (LogFormat::Pretty, true) => layer.pretty().boxed(),
            (LogFormat::Pretty, false) => layer.pretty().without_time().boxed(),
            (LogFormat::Compact, true) => layer.compact().boxed(),
            (LogFormat::Compact, false) => layer.compact().without_time().boxed(),
            (LogFormat::Json, true) => layer.json().boxed(),
            (LogFormat::Json, false) => layer.json().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = tracing_subscriber::registry()
        .with(config.filter(env.as_deref()))
        .with(config.layer());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
