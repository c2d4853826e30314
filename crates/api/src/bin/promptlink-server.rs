//! Relay server entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use promptlink_api::RelayServer;
use promptlink_common::SystemConfig;

#[derive(Parser)]
#[command(name = "promptlink-server")]
#[command(version)]
#[command(about = "Multi-model prompt relay server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate configuration
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("info");
    promptlink_common::init_tracing_with_level(log_level)?;

    let mut config = SystemConfig::from_file(&cli.config).map_err(|e| {
        error!(path = %cli.config, "Failed to load configuration: {}", e);
        e
    })?;

    info!(
        agents = config.agents.len(),
        active = config.active_agent_count(),
        "Configuration loaded"
    );
    for agent in &config.agents {
        info!("  - {} ({}){}", agent.id, agent.model, if agent.active { "" } else { " [inactive]" });
    }

    match cli.command {
        Some(Commands::ValidateConfig) => {
            println!("✓ Configuration is valid");
            println!("  Agents: {} ({} active)", config.agents.len(), config.active_agent_count());
            println!("  Aggregator: {}", config.orchestration.aggregator_model);
            Ok(())
        }
        Some(Commands::Serve { host, port }) => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            RelayServer::new(config)?.run().await
        }
        None => RelayServer::new(config)?.run().await,
    }
}
