//! voltedge binary.
//!
//! Operator entry point for the edge AI agent: test inference, force
//! model or prediction syncs, and inspect system status.

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use voltedge_core::cli::commands::Commands;
use voltedge_core::cli::handlers::{
    handle_status, handle_sync_model, handle_sync_predictions, handle_test_inference,
};
use voltedge_core::config::{Args, EdgeConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub args: Args,

    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_target(true)
        .init();

    // Configuration errors are the one fatal class: fail before any
    // component starts.
    let config = EdgeConfig::load(&cli.args)?;

    match cli.command {
        Commands::TestInference(cmd) => handle_test_inference(config, cmd).await?,
        Commands::SyncModel => handle_sync_model(config).await?,
        Commands::SyncPredictions => handle_sync_predictions(config).await?,
        Commands::Status => handle_status(config).await?,
    }

    Ok(())
}
