pub mod cli;
pub mod config;
pub mod edge;
pub mod fallback;
pub mod inference;
pub mod models;
pub mod storage;
pub mod sync;
pub mod telemetry;

// Re-export commonly used types
pub use edge::{CloudSyncReport, EdgeAi, EdgeStatus};
pub use inference::{ForecastType, InferenceEngine, PredictionResult};
pub use models::{ModelMetadata, ModelVersion};
pub use telemetry::TelemetryInput;
