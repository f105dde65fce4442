//! pulsed — the PulseGrid daemon.
//!
//! One binary, two modes:
//!
//! ```text
//! pulsed server — collector: ingestion API, aggregation, persistence
//! pulsed agent  — node agent: sample host metrics, deliver to a collector
//! ```
//!
//! # Usage
//!
//! ```text
//! pulsed server --addr 127.0.0.1:8080 --store-file /var/lib/pulsegrid/metrics.json
//! pulsed agent  --endpoint http://collector:8080/update
//! ```

use clap::{Parser, Subcommand};

mod agent_mode;
mod collector;

#[derive(Parser)]
#[command(name = "pulsed", about = "PulseGrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the collector: ingestion API, aggregation, and persistence.
    Server(collector::ServerArgs),
    /// Run the node agent: sample host metrics and deliver them.
    Agent(agent_mode::AgentArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pulsed=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Server(args) => collector::run(args).await,
        Command::Agent(args) => agent_mode::run(args).await,
    }
}
