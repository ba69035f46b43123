//! Environment-driven configuration.
//!
//! Every knob can be set through the environment; unset or unparsable values
//! fall back to the documented defaults. Queue bounds are clamped to their
//! minimums so a misconfigured deployment degrades instead of failing.

use std::time::Duration;

use crate::error::{CorralError, Result};
use crate::queue::QueueConfig;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Log level name (error, warn, info, debug, trace).
    pub log_level: String,
    pub queue: QueueConfig,
    pub tool_server: ToolServerSettings,
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub weather: WeatherSettings,
}

/// How to launch and talk to the co-resident tool server.
#[derive(Debug, Clone)]
pub struct ToolServerSettings {
    /// Command line used to spawn the tool server. Empty means "this
    /// executable with the `tool-server` subcommand".
    pub command: Vec<String>,
    /// Bound on the spawn + initialize handshake.
    pub startup_timeout: Duration,
    /// Per-call deadline; kept at or below the queue processing timeout.
    pub call_timeout: Duration,
}

impl Default for ToolServerSettings {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            startup_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Chat-completions endpoint used for query routing and result formatting.
/// Routing falls back to keyword heuristics when no endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub temperature: f32,
}

impl LlmSettings {
    /// True when enough is configured to actually call the endpoint.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty() && !self.deployment.is_empty()
    }
}

/// Web-search provider settings.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub api_key: String,
    pub max_results: usize,
    pub search_depth: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: 5,
            search_depth: "advanced".to_string(),
        }
    }
}

/// Weather provider settings.
#[derive(Debug, Clone)]
pub struct WeatherSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let port = get_env("PORT", "8080")
            .parse::<u16>()
            .map_err(|e| CorralError::Config(format!("PORT: {}", e)))?;

        let queue = QueueConfig {
            max_workers: get_env_usize("QUEUE_MAX_WORKERS", 3).max(1),
            queue_capacity: get_env_usize("QUEUE_SIZE", 100).max(1),
            enqueue_timeout: Duration::from_secs(get_env_u64("QUEUE_TIMEOUT", 10).max(1)),
            processing_timeout: Duration::from_secs(
                get_env_u64("QUEUE_REQUEST_TIMEOUT", 30).max(1),
            ),
        };

        let tool_server = ToolServerSettings {
            command: std::env::var("TOOL_SERVER_COMMAND")
                .map(|raw| raw.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            startup_timeout: Duration::from_secs(get_env_u64("TOOL_SERVER_STARTUP_TIMEOUT", 10)),
            // Bounded by the manager's processing timeout.
            call_timeout: queue.processing_timeout,
        };

        Ok(Self {
            host: get_env("HOST", "0.0.0.0"),
            port,
            log_level: get_env("LOG_LEVEL", "info"),
            queue,
            tool_server,
            llm: LlmSettings {
                endpoint: get_env("LLM_ENDPOINT", ""),
                api_key: get_env("LLM_API_KEY", ""),
                deployment: get_env("LLM_DEPLOYMENT", ""),
                api_version: get_env("LLM_API_VERSION", "2023-08-01-preview"),
                temperature: get_env_f32("LLM_TEMPERATURE", 0.0),
            },
            search: SearchSettings {
                api_key: get_env("SEARCH_API_KEY", ""),
                max_results: get_env_usize("SEARCH_MAX_RESULTS", 5),
                search_depth: get_env("SEARCH_DEPTH", "advanced"),
            },
            weather: WeatherSettings {
                api_key: get_env("WEATHER_API_KEY", ""),
                base_url: get_env(
                    "WEATHER_BASE_URL",
                    "https://api.openweathermap.org/data/2.5",
                ),
                timeout: Duration::from_secs(get_env_u64("WEATHER_TIMEOUT", 10)),
            },
        })
    }
}

fn get_env(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn get_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
