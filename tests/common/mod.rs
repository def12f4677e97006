#![allow(dead_code)]

//! Shared fakes and fixtures for integration tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use voltedge_core::fallback::OnlineProbe;
use voltedge_core::inference::{
    ForecastType, InferenceEngine, LinearForecastRuntime, PredictionResult,
};
use voltedge_core::models::ModelMetadata;
use voltedge_core::storage::{ModelArtifactStore, RemoteResultsStore};
use voltedge_core::telemetry::TelemetryInput;

/// In-memory artifact store with failure injection and fetch counters.
pub struct FakeArtifactStore {
    metadata: Mutex<ModelMetadata>,
    artifact: Mutex<Bytes>,
    pub metadata_fetches: AtomicUsize,
    pub artifact_fetches: AtomicUsize,
    pub fail_metadata: AtomicBool,
    pub fail_artifact: AtomicBool,
    pub artifact_delay: Mutex<Option<Duration>>,
}

impl FakeArtifactStore {
    pub fn new(metadata: ModelMetadata, artifact: Bytes) -> Self {
        Self {
            metadata: Mutex::new(metadata),
            artifact: Mutex::new(artifact),
            metadata_fetches: AtomicUsize::new(0),
            artifact_fetches: AtomicUsize::new(0),
            fail_metadata: AtomicBool::new(false),
            fail_artifact: AtomicBool::new(false),
            artifact_delay: Mutex::new(None),
        }
    }

    /// Publish a new (metadata, artifact) pair to the fake remote.
    pub fn publish(&self, metadata: ModelMetadata, artifact: Bytes) {
        *self.metadata.lock() = metadata;
        *self.artifact.lock() = artifact;
    }
}

#[async_trait]
impl ModelArtifactStore for FakeArtifactStore {
    async fn fetch_metadata(&self) -> Result<ModelMetadata> {
        self.metadata_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_metadata.load(Ordering::SeqCst) {
            bail!("metadata endpoint unreachable");
        }
        Ok(self.metadata.lock().clone())
    }

    async fn fetch_artifact(&self) -> Result<Bytes> {
        self.artifact_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.artifact_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_artifact.load(Ordering::SeqCst) {
            bail!("artifact download failed");
        }
        Ok(self.artifact.lock().clone())
    }
}

/// In-memory results store with per-item and blanket failure injection.
#[derive(Default)]
pub struct FakeResultsStore {
    pub accepted: Mutex<Vec<PredictionResult>>,
    pub attempts: AtomicUsize,
    pub fail_all: AtomicBool,
    pub fail_ids: Mutex<HashSet<Uuid>>,
    pub persist_delay: Mutex<Option<Duration>>,
}

impl FakeResultsStore {
    pub fn accepted_ids(&self) -> HashSet<Uuid> {
        self.accepted.lock().iter().map(|r| r.id).collect()
    }
}

#[async_trait]
impl RemoteResultsStore for FakeResultsStore {
    async fn persist(&self, result: &PredictionResult) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.persist_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all.load(Ordering::SeqCst) {
            bail!("results store unavailable");
        }
        if self.fail_ids.lock().contains(&result.id) {
            bail!("results store rejected {}", result.id);
        }
        self.accepted.lock().push(result.clone());
        Ok(())
    }
}

/// Probe returning a switchable static answer.
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl OnlineProbe for StaticProbe {
    async fn probe(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Metadata for a model with the given version, horizon, and features.
pub fn metadata(version: &str, horizon: usize, features: &[&str]) -> ModelMetadata {
    ModelMetadata {
        version: version.to_string(),
        created_at: Utc::now(),
        input_shape: vec![1, features.len()],
        output_shape: vec![1, horizon],
        features: features.iter().map(|f| f.to_string()).collect(),
        description: None,
        performance_metrics: HashMap::new(),
    }
}

/// Weight blob matching `metadata` for the built-in linear runtime:
/// every feature weight set to `weight`, every bias to `bias`.
pub fn linear_artifact(metadata: &ModelMetadata, weight: f32, bias: f32) -> Bytes {
    let width = metadata.features.len() + 1;
    let mut buf = Vec::new();
    for _ in 0..metadata.horizon() {
        for col in 0..width {
            let value = if col == width - 1 { bias } else { weight };
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
    Bytes::from(buf)
}

pub fn telemetry(site_id: &str) -> TelemetryInput {
    TelemetryInput {
        timestamp: Utc::now(),
        site_id: site_id.to_string(),
        power_consumption: 3.5,
        solar_production: Some(2.1),
        battery_soc: Some(75.0),
        grid_power: Some(1.2),
        temperature: Some(22.0),
        extensions: HashMap::new(),
    }
}

pub fn engine() -> Arc<InferenceEngine> {
    Arc::new(InferenceEngine::new(
        Arc::new(LinearForecastRuntime),
        ForecastType::Consumption,
    ))
}

/// Prediction fixture for queue/drain tests that do not need the engine.
pub fn prediction(site_id: &str) -> PredictionResult {
    PredictionResult {
        id: Uuid::new_v4(),
        site_id: site_id.to_string(),
        timestamp: Utc::now(),
        forecast_type: ForecastType::Consumption,
        values: vec![0.5; 24],
        confidence: 0.9,
        model_version: "1.0.0".to_string(),
        created_at: Utc::now(),
        is_synced: false,
    }
}
