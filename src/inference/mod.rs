//! Forecast inference against the currently active model.
//!
//! The engine holds one active (artifact, metadata) pair and executes
//! forecasts against it. Model execution itself sits behind the
//! [`ForecastRuntime`] trait so the built-in runtime can be swapped for a
//! real model runtime without touching the surrounding contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod engine;
pub mod runtime;

pub use engine::InferenceEngine;
pub use runtime::{Forecast, ForecastRuntime, LinearForecastRuntime};

/// What quantity a forecast describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastType {
    Consumption,
    Production,
    Battery,
}

impl fmt::Display for ForecastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastType::Consumption => write!(f, "consumption"),
            ForecastType::Production => write!(f, "production"),
            ForecastType::Battery => write!(f, "battery"),
        }
    }
}

impl FromStr for ForecastType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "consumption" => Ok(ForecastType::Consumption),
            "production" => Ok(ForecastType::Production),
            "battery" => Ok(ForecastType::Battery),
            other => Err(anyhow::anyhow!("unknown forecast type: {}", other)),
        }
    }
}

/// One finished forecast, keyed by a unique id.
///
/// Created only by the inference engine. The single permitted mutation
/// afterwards is [`PredictionResult::mark_synced`], flipped once the
/// remote store confirms persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub id: Uuid,
    pub site_id: String,
    pub timestamp: DateTime<Utc>,
    pub forecast_type: ForecastType,
    /// Forecast samples, one per future time step.
    pub values: Vec<f32>,
    /// Model confidence in [0, 1].
    pub confidence: f32,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub is_synced: bool,
}

impl PredictionResult {
    pub fn mark_synced(&mut self) {
        self.is_synced = true;
    }
}
