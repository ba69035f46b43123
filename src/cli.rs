//! Command-line interface definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::LogConfig;
use crate::version;

/// corral - agent chat gateway
#[derive(Parser, Debug)]
#[command(name = "corral")]
#[command(author, version = version::clap_version(), long_version = version::long_version().leak() as &'static str, about, long_about = None)]
pub struct Cli {
    /// Log level: error, warn, info, debug, trace.
    #[arg(long, env = "CORRAL_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format: pretty, compact, json.
    #[arg(long, env = "CORRAL_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Log to file (in addition to stderr).
    #[arg(long, env = "CORRAL_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway.
    Serve(ServeArgs),

    /// Run the stdio tool server (spawned by the gateway; JSON-RPC on
    /// stdin/stdout, logs on stderr).
    ToolServer,
}

/// Arguments for the serve command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Host address to bind to (overrides HOST).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides PORT).
    #[arg(long, short)]
    pub port: Option<u16>,
}

impl Cli {
    /// Resolve the effective logging configuration: defaults, then the
    /// configured level, then environment, then explicit flags.
    pub fn log_config(&self, default_level: &str) -> LogConfig {
        let mut config = LogConfig::default()
            .with_level_name(default_level)
            .with_env_overrides();

        if let Some(level) = &self.log_level {
            config = config.with_level_name(level);
        }
        if let Some(format) = &self.log_format
            && let Ok(format) = format.parse()
        {
            config.format = format;
        }
        if let Some(path) = &self.log_file {
            config.file_path = Some(path.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["corral", "serve", "--port", "9000"]);
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.port, Some(9000)),
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_parse_tool_server() {
        let cli = Cli::parse_from(["corral", "tool-server"]);
        assert!(matches!(cli.command, Commands::ToolServer));
    }

    #[test]
    fn test_log_flags_win_over_defaults() {
        let cli = Cli::parse_from([
            "corral",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "serve",
        ]);
        let config = cli.log_config("info");
        assert_eq!(config.level, tracing::Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
    }
}
