//! Inference engine holding the active model.

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::inference::runtime::ForecastRuntime;
use crate::inference::{ForecastType, PredictionResult};
use crate::models::ModelMetadata;
use crate::telemetry::TelemetryInput;

/// An installed (artifact, metadata) pair.
///
/// Constructed fully before being swapped in, so a reader holding the Arc
/// always sees metadata that belongs to the artifact next to it.
struct ActiveModel {
    artifact: Bytes,
    metadata: ModelMetadata,
}

/// Executes forecasts against the currently active model.
///
/// Install is a single writer (`load_model` takes the write lock to swap
/// the snapshot); inference calls are concurrent readers that clone the
/// Arc under the read lock and compute outside it.
pub struct InferenceEngine {
    active: RwLock<Option<Arc<ActiveModel>>>,
    runtime: Arc<dyn ForecastRuntime>,
    forecast_type: ForecastType,
}

impl InferenceEngine {
    pub fn new(runtime: Arc<dyn ForecastRuntime>, forecast_type: ForecastType) -> Self {
        Self {
            active: RwLock::new(None),
            runtime,
            forecast_type,
        }
    }

    /// Atomically replace the active model.
    ///
    /// The artifact is validated against the metadata before the swap;
    /// a validation failure leaves any previously active model in place.
    pub async fn load_model(&self, artifact: Bytes, metadata: ModelMetadata) -> Result<()> {
        self.runtime
            .validate(&artifact, &metadata)
            .with_context(|| format!("refusing to install model {}", metadata.version))?;

        let installed = Arc::new(ActiveModel {
            artifact,
            metadata: metadata.clone(),
        });

        let mut active = self.active.write().await;
        let previous = active.replace(installed);
        drop(active);

        match previous {
            Some(old) => tracing::info!(
                from = %old.metadata.version,
                to = %metadata.version,
                "model replaced"
            ),
            None => tracing::info!(version = %metadata.version, "model loaded"),
        }
        Ok(())
    }

    /// Drop the active model, releasing the artifact.
    pub async fn unload(&self) {
        let mut active = self.active.write().await;
        if active.take().is_some() {
            tracing::info!("active model released");
        }
    }

    pub async fn is_model_loaded(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Metadata of the active model, if one is loaded.
    pub async fn model_metadata(&self) -> Option<ModelMetadata> {
        self.active.read().await.as_ref().map(|m| m.metadata.clone())
    }

    /// Run one forecast over a telemetry sample.
    ///
    /// Returns `None` when no model is loaded or execution fails; both are
    /// expected conditions on an edge device and must not disturb the
    /// telemetry pipeline, so they log instead of erroring.
    pub async fn run_inference(&self, telemetry: &TelemetryInput) -> Option<PredictionResult> {
        let snapshot = self.active.read().await.clone();
        let Some(model) = snapshot else {
            tracing::warn!(site_id = %telemetry.site_id, "inference requested but no model is loaded");
            return None;
        };

        let features: Vec<f32> = model
            .metadata
            .features
            .iter()
            .map(|name| telemetry.feature_value(name) as f32)
            .collect();

        match self.runtime.forecast(&model.artifact, &model.metadata, &features) {
            Ok(forecast) => Some(PredictionResult {
                id: Uuid::new_v4(),
                site_id: telemetry.site_id.clone(),
                timestamp: telemetry.timestamp,
                forecast_type: self.forecast_type,
                values: forecast.values,
                confidence: forecast.confidence.clamp(0.0, 1.0),
                model_version: model.metadata.version.clone(),
                created_at: Utc::now(),
                is_synced: false,
            }),
            Err(e) => {
                tracing::error!(
                    site_id = %telemetry.site_id,
                    model_version = %model.metadata.version,
                    error = %e,
                    "inference failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::runtime::LinearForecastRuntime;
    use std::collections::HashMap;

    fn engine() -> InferenceEngine {
        InferenceEngine::new(Arc::new(LinearForecastRuntime), ForecastType::Consumption)
    }

    fn meta(version: &str, horizon: usize) -> ModelMetadata {
        ModelMetadata {
            version: version.to_string(),
            created_at: Utc::now(),
            input_shape: vec![1, 2],
            output_shape: vec![1, horizon],
            features: vec!["power_consumption".to_string(), "temperature".to_string()],
            description: None,
            performance_metrics: HashMap::new(),
        }
    }

    fn weights(horizon: usize) -> Bytes {
        // horizon rows of [w0, w1, bias]
        let mut buf = Vec::new();
        for step in 0..horizon {
            for w in [1.0f32, 0.5, step as f32] {
                buf.extend_from_slice(&w.to_le_bytes());
            }
        }
        Bytes::from(buf)
    }

    fn telemetry() -> TelemetryInput {
        TelemetryInput {
            timestamp: Utc::now(),
            site_id: "s1".to_string(),
            power_consumption: 2.0,
            solar_production: None,
            battery_soc: None,
            grid_power: None,
            temperature: Some(10.0),
            extensions: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_inference_without_model_returns_none() {
        let engine = engine();
        assert!(!engine.is_model_loaded().await);
        assert!(engine.run_inference(&telemetry()).await.is_none());
    }

    #[tokio::test]
    async fn test_load_then_infer() {
        let engine = engine();
        engine.load_model(weights(3), meta("1.0.0", 3)).await.unwrap();
        assert!(engine.is_model_loaded().await);

        let result = engine.run_inference(&telemetry()).await.unwrap();
        assert_eq!(result.values.len(), 3);
        // row 0: 1*2.0 + 0.5*10.0 + 0 = 7.0
        assert!((result.values[0] - 7.0).abs() < f32::EPSILON);
        assert_eq!(result.model_version, "1.0.0");
        assert!(!result.is_synced);
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[tokio::test]
    async fn test_invalid_artifact_keeps_previous_model() {
        let engine = engine();
        engine.load_model(weights(2), meta("1.0.0", 2)).await.unwrap();

        // Artifact sized for the wrong horizon must be refused
        let err = engine.load_model(weights(2), meta("1.0.1", 5)).await;
        assert!(err.is_err());

        let metadata = engine.model_metadata().await.unwrap();
        assert_eq!(metadata.version, "1.0.0");
    }

    #[tokio::test]
    async fn test_unload_releases_model() {
        let engine = engine();
        engine.load_model(weights(2), meta("1.0.0", 2)).await.unwrap();
        engine.unload().await;
        assert!(!engine.is_model_loaded().await);
        assert!(engine.run_inference(&telemetry()).await.is_none());
    }
}
