//! Logging infrastructure for corral.
//!
//! Provides consistent tracing configuration for the server and the tool
//! server subprocess (which must keep stdout clean for the JSON-RPC stream,
//! so everything goes to stderr or a file).
//!
//! # Environment Variables
//!
//! - `CORRAL_LOG` - Log filter (overrides RUST_LOG)
//! - `CORRAL_LOG_LEVEL` - Log level: error, warn, info, debug, trace
//! - `CORRAL_LOG_FORMAT` - Output format: pretty, compact, json
//! - `CORRAL_LOG_FILE` - Path to log file (in addition to stderr)
//! - `RUST_LOG` - Standard Rust log filter (fallback)

use std::path::PathBuf;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format (default for development)
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for log aggregation systems
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "full" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Unknown log format: '{}'. Valid options: pretty, compact, json",
                s
            )),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level (default: INFO)
    pub level: Level,
    /// Log format (default: Pretty)
    pub format: LogFormat,
    /// Path to log file (None = stderr only)
    pub file_path: Option<PathBuf>,
    /// Custom filter string (overrides level if set)
    pub filter: Option<String>,
    /// Show target module in logs (default: true)
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            file_path: None,
            filter: None,
            show_target: true,
        }
    }
}

impl LogConfig {
    /// Apply environment variable overrides to this config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(filter) = std::env::var("CORRAL_LOG") {
            self.filter = Some(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            self.filter = Some(filter);
        }

        if let Ok(level) = std::env::var("CORRAL_LOG_LEVEL")
            && let Ok(level) = Level::from_str(&level)
        {
            self.level = level;
        }

        if let Ok(format) = std::env::var("CORRAL_LOG_FORMAT")
            && let Ok(format) = format.parse()
        {
            self.format = format;
        }

        if let Ok(path) = std::env::var("CORRAL_LOG_FILE") {
            self.file_path = Some(PathBuf::from(path));
        }

        self
    }

    /// Override the base level from a level name, keeping everything else.
    pub fn with_level_name(mut self, name: &str) -> Self {
        if let Ok(level) = Level::from_str(name) {
            self.level = level;
        }
        self
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.filter {
            Some(filter) => EnvFilter::new(filter),
            None => EnvFilter::new(format!("corral={},warn", self.level)),
        }
    }
}

/// Guard that must be held for the lifetime of the program when logging to a
/// file; dropping it flushes buffered log lines.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize the global tracing subscriber.
///
/// Returns a guard that must be kept alive; init is a no-op if a subscriber
/// is already installed (useful in tests).
pub fn init(config: LogConfig) -> LogGuard {
    let filter = config.env_filter();

    let (file_layer, file_guard) = match &config.file_path {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "corral.log".to_string());
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(config.show_target);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.show_target);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    let result = match config.format {
        LogFormat::Pretty => registry.with(stderr_layer).try_init(),
        LogFormat::Compact => registry.with(stderr_layer.compact()).try_init(),
        LogFormat::Json => registry.with(stderr_layer.json()).try_init(),
    };

    if result.is_err() {
        // A subscriber is already installed; keep it.
        tracing::debug!("tracing subscriber already initialized");
    }

    LogGuard {
        _file_guard: file_guard,
    }
}
