//! corral - agent chat gateway

mod agent;
mod cli;
mod config;
mod error;
mod llm;
mod logging;
mod processor;
mod providers;
mod queue;
mod server;
mod tool;
mod version;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use cli::{Cli, Commands, ServeArgs};
use config::Config;
use processor::QueryProcessor;

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Serve(args) => cmd_serve(&cli, args),
        Commands::ToolServer => cmd_tool_server(&cli),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

/// Start the HTTP gateway: tool client, agent workflow, queue, then axum.
fn cmd_serve(cli: &Cli, args: &ServeArgs) -> Result<()> {
    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let _log_guard = logging::init(cli.log_config(&config.log_level));

    let rt = tokio::runtime::Runtime::new().context("failed to create Tokio runtime")?;
    rt.block_on(run_gateway(config))
}

async fn run_gateway(config: Config) -> Result<()> {
    info!(version = version::VERSION, "starting corral");

    // The tool server is co-resident; failing to start it is fatal and the
    // process exits non-zero before binding the HTTP port.
    let tools = Arc::new(tool::ToolClient::new(config.tool_server.clone()));
    tools
        .start()
        .await
        .context("failed to start tool server process")?;

    let workflow = agent::AgentWorkflow::new(&config, Arc::clone(&tools))
        .context("failed to build agent workflow")?;
    if let Err(e) = workflow.validate() {
        warn!(error = %e, "workflow validation failed, continuing startup");
    }
    let processor: Arc<dyn QueryProcessor> = Arc::new(workflow);

    let queue = Arc::new(queue::QueueManager::new(
        config.queue.clone(),
        Arc::clone(&processor),
    ));
    queue.start().context("failed to start queue manager")?;

    let state = Arc::new(server::AppState {
        queue: Arc::clone(&queue),
        processor,
    });
    let server_config = server::ServerConfig {
        host: config.host.clone(),
        port: config.port,
    };

    let served = server::run_server(&server_config, state).await;

    // Drain order: stop admissions and workers first so no new tool calls
    // start, then shut the tool server down.
    queue.stop().await;
    tools.stop().await;
    info!("shutdown complete");

    served.context("HTTP server failed")?;
    Ok(())
}

/// Run the stdio tool server until stdin closes.
fn cmd_tool_server(cli: &Cli) -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    // stdout carries JSON-RPC frames; logging stays on stderr (or a file).
    let _log_guard = logging::init(cli.log_config(&config.log_level));

    let rt = tokio::runtime::Runtime::new().context("failed to create Tokio runtime")?;
    rt.block_on(tool::server::run(&config))
        .context("tool server failed")?;
    Ok(())
}
