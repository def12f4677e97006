//! Operator CLI commands.

use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Run one inference cycle with sample telemetry data
    TestInference(TestInferenceCommand),
    /// Force a model sync from the remote artifact store
    SyncModel,
    /// Upload queued predictions to the central store
    SyncPredictions,
    /// Print connectivity, model, and queue status
    Status,
}

/// Sample telemetry for an inference test run.
#[derive(Debug, Args)]
pub struct TestInferenceCommand {
    /// Site ID for the prediction
    #[arg(short = 's', long, default_value = "site-123")]
    pub site_id: String,

    /// Power consumption in kWh
    #[arg(short = 'c', long, default_value_t = 3.5)]
    pub consumption: f64,

    /// Solar production in kWh
    #[arg(short = 'p', long, default_value_t = 2.1)]
    pub production: f64,

    /// Battery state of charge (0-100)
    #[arg(short = 'b', long, default_value_t = 75.0)]
    pub battery: f64,

    /// Grid power in kW
    #[arg(short = 'g', long, default_value_t = 1.2)]
    pub grid: f64,

    /// Ambient temperature in degrees Celsius
    #[arg(short = 't', long, default_value_t = 22.0)]
    pub temperature: f64,
}
