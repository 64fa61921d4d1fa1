//! Colloquy entry point.
//!
//! Binary name: `colloquy`
//!
//! Parses CLI arguments, initializes tracing, then either serves the HTTP API
//! or runs a single reconciliation pass.

mod cli;
mod http;
mod state;

use clap::Parser;

use colloquy_observe::{LogFormat, TracingOptions};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        enable_otel: cli.otel,
        ..TracingOptions::default()
    }
    .with_verbosity(cli.verbose);
    colloquy_observe::init_tracing(&options)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = match cli.command {
        Commands::Serve { host, port } => cli::serve::serve(&host, port).await,
        Commands::Reconcile { json } => cli::reconcile::reconcile(json).await,
    };

    colloquy_observe::shutdown_tracing();
    result
}
