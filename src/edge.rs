//! Edge AI orchestrator.
//!
//! The single entry point tying the engine, sync agent, and fallback
//! manager together. Built once at process start and injected into
//! whatever surface drives it (CLI today, ingestion pipelines tomorrow);
//! there is deliberately no global instance.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EdgeConfig;
use crate::fallback::{FallbackManager, HttpProbe, ResultQueue};
use crate::inference::{InferenceEngine, LinearForecastRuntime, PredictionResult};
use crate::models::ModelMetadata;
use crate::storage::{HttpArtifactStore, HttpResultsStore};
use crate::sync::ModelSyncAgent;
use crate::telemetry::TelemetryInput;

/// Timeout for persisting a single prediction; small payloads, so much
/// tighter than the artifact download bound.
const PERSIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one operator-facing cloud sync: each half reports
/// independently so a model-sync failure never hides a successful drain
/// (or vice versa).
#[derive(Debug, Clone)]
pub struct CloudSyncReport {
    pub model_updated: bool,
    pub model_sync_error: Option<String>,
    pub predictions_synced: usize,
}

/// Snapshot of the system for diagnostics.
#[derive(Debug, Clone)]
pub struct EdgeStatus {
    pub online: bool,
    pub model_loaded: bool,
    pub model_metadata: Option<ModelMetadata>,
    pub queue_length: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

pub struct EdgeAi {
    engine: Arc<InferenceEngine>,
    sync_agent: Arc<ModelSyncAgent>,
    fallback: Arc<FallbackManager>,
    sync_interval: Duration,
}

impl EdgeAi {
    /// Wire up all components from configuration.
    pub async fn from_config(config: &EdgeConfig) -> Result<Self> {
        let paths = config.paths()?;
        let forecast_type = config
            .inference
            .forecast_type
            .parse()
            .context("inference.forecast_type is invalid")?;

        let engine = Arc::new(InferenceEngine::new(
            Arc::new(LinearForecastRuntime),
            forecast_type,
        ));

        let artifact_store = Arc::new(HttpArtifactStore::new(
            &config.remote.endpoint,
            &config.remote.bucket,
            &config.remote.artifact_object,
            &config.remote.metadata_object,
            config.download_timeout(),
        )?);

        let results_store = Arc::new(HttpResultsStore::new(&config.remote.endpoint, PERSIST_TIMEOUT)?);
        let probe = Arc::new(HttpProbe::new(
            results_store.health_url(),
            config.probe_timeout(),
        )?);

        let queue = if config.queue.durable {
            ResultQueue::open(paths.queue_path()?).await?
        } else {
            tracing::info!("durable queue disabled by configuration, backlog will not survive restarts");
            ResultQueue::in_memory()
        };

        let fallback = Arc::new(FallbackManager::new(probe, results_store, queue));
        let sync_agent = Arc::new(
            ModelSyncAgent::new(artifact_store, engine.clone(), paths, config.sync_options()).await?,
        );

        Ok(Self {
            engine,
            sync_agent,
            fallback,
            sync_interval: config.sync_interval(),
        })
    }

    /// Assemble from prebuilt components; the injection seam tests and
    /// embedders use.
    pub fn with_components(
        engine: Arc<InferenceEngine>,
        sync_agent: Arc<ModelSyncAgent>,
        fallback: Arc<FallbackManager>,
        sync_interval: Duration,
    ) -> Self {
        Self {
            engine,
            sync_agent,
            fallback,
            sync_interval,
        }
    }

    /// Start the background sync timer.
    pub fn start(&self) {
        self.sync_agent.clone().start(self.sync_interval);
    }

    /// Run one telemetry sample through the pipeline.
    ///
    /// Lazily loads the locally installed model on first use. Returns
    /// `None` when no model can be made ready or inference fails; the
    /// telemetry path must keep running regardless, so neither case is an
    /// error. The produced result is handed to the fallback manager,
    /// which sends it directly or queues it depending on connectivity.
    pub async fn process_telemetry(&self, telemetry: &TelemetryInput) -> Option<PredictionResult> {
        if !self.engine.is_model_loaded().await {
            match self.sync_agent.load_installed_model().await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(
                        site_id = %telemetry.site_id,
                        "cannot process telemetry: no model installed"
                    );
                    return None;
                }
                Err(e) => {
                    tracing::error!(
                        site_id = %telemetry.site_id,
                        error = %e,
                        "cannot process telemetry: installed model failed to load"
                    );
                    return None;
                }
            }
        }

        let result = self.engine.run_inference(telemetry).await?;
        let result = self.fallback.submit(result).await;

        // While the link is up, opportunistically flush any backlog
        if result.is_synced && self.fallback.queue_length() > 0 {
            self.fallback.sync_queued_predictions().await;
        }

        Some(result)
    }

    /// Operator-facing combined sync: model first, then the queued
    /// predictions. Each half tolerates the other failing.
    pub async fn sync_with_cloud(&self) -> CloudSyncReport {
        let (model_updated, model_sync_error) = match self.sync_agent.sync_model().await {
            Ok(updated) => (updated, None),
            Err(e) => {
                tracing::error!(error = %e, "model sync failed during cloud sync");
                (false, Some(format!("{:#}", e)))
            }
        };

        let predictions_synced = self.fallback.sync_queued_predictions().await;

        CloudSyncReport {
            model_updated,
            model_sync_error,
            predictions_synced,
        }
    }

    pub async fn status(&self) -> EdgeStatus {
        EdgeStatus {
            online: self.fallback.check_is_online().await,
            model_loaded: self.engine.is_model_loaded().await,
            model_metadata: self.sync_agent.model_metadata(),
            queue_length: self.fallback.queue_length(),
            last_sync: self.sync_agent.last_sync_time(),
        }
    }

    /// Stop the sync timer, flush durable queue state, and release the
    /// engine's active model.
    pub async fn shutdown(&self) {
        self.sync_agent.stop().await;
        if let Err(e) = self.fallback.flush().await {
            tracing::warn!(error = %e, "failed to flush queue during shutdown");
        }
        self.engine.unload().await;
        tracing::info!("edge AI shut down");
    }

    pub fn engine(&self) -> &Arc<InferenceEngine> {
        &self.engine
    }

    pub fn sync_agent(&self) -> &Arc<ModelSyncAgent> {
        &self.sync_agent
    }

    pub fn fallback(&self) -> &Arc<FallbackManager> {
        &self.fallback
    }
}
