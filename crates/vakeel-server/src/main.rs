//! vakeel-way
//!
//! Liveness aggregator server. Remote agents stream service identifiers
//! as heartbeats over gRPC; when heartbeats for a service stop, the
//! configured webhook receives a `{"trigger": "down"}` notification, and
//! the next heartbeat raises it again with `{"trigger": "up"}`.
//!
//! ## Usage
//!
//! ```bash
//! vakeel-way serve --config /etc/vakeel-way/config.yaml
//! ```
//!
//! Logging defaults to the configured `log.level`; `RUST_LOG` overrides
//! it with a full filter directive.

use anyhow::Result;
use clap::{Parser, Subcommand};
use vakeel_server::{AppBuilder, Config};

#[derive(Parser)]
#[command(name = "vakeel-way")]
#[command(version, about = "Heartbeat collector server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the server
    Serve {
        /// Path to the configuration file
        #[arg(long, default_value = "/etc/vakeel-way/config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(&config).await,
    }
}

async fn serve(path: &str) -> Result<()> {
    let config = Config::load(path)?;

    init_tracing(&config)?;

    let app = AppBuilder::new(config).build().await?;
    app.serve().await?;

    Ok(())
}

fn init_tracing(config: &Config) -> Result<()> {
    let directive = config.log.directive()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive)),
        )
        .init();

    Ok(())
}
