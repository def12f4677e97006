//! Model synchronization agent.
//!
//! Keeps the locally installed model eventually consistent with the
//! latest remote artifact without ever blocking telemetry processing.
//! A sync cycle is compare -> download -> install, strictly sequential;
//! scheduled and manual triggers share a single-flight guard so two
//! cycles can never overlap.

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::inference::InferenceEngine;
use crate::models::{compare_versions, ModelMetadata, VersionDrift};
use crate::storage::{EdgePaths, ModelArtifactStore};

/// Retry and rollback policy for sync cycles.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Bounded retry budget for one cycle.
    pub max_retries: u32,
    /// Fixed delay between retries.
    pub retry_delay: Duration,
    /// Whether a remote version older than the installed one may be
    /// installed. Off by default; an unexpected rollback usually means a
    /// publishing mistake upstream.
    pub allow_rollback: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            allow_rollback: false,
        }
    }
}

/// Observable sync progress.
#[derive(Debug, Default)]
struct SyncState {
    last_sync: Option<DateTime<Utc>>,
    retry_count: u32,
    local_metadata: Option<ModelMetadata>,
}

struct TimerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct ModelSyncAgent {
    store: Arc<dyn ModelArtifactStore>,
    engine: Arc<InferenceEngine>,
    paths: EdgePaths,
    options: SyncOptions,
    state: Mutex<SyncState>,
    /// Single-flight guard: a second caller finds it held and backs off.
    in_flight: tokio::sync::Mutex<()>,
    timer: Mutex<Option<TimerHandle>>,
}

impl ModelSyncAgent {
    /// Create the agent, picking up any previously installed metadata so
    /// a restart resumes with the correct local version.
    pub async fn new(
        store: Arc<dyn ModelArtifactStore>,
        engine: Arc<InferenceEngine>,
        paths: EdgePaths,
        options: SyncOptions,
    ) -> Result<Self> {
        let local_metadata = read_local_metadata(&paths).await;
        if let Some(meta) = &local_metadata {
            tracing::info!(version = %meta.version, "found installed model metadata");
        }
        Ok(Self {
            store,
            engine,
            paths,
            options,
            state: Mutex::new(SyncState {
                local_metadata,
                ..SyncState::default()
            }),
            in_flight: tokio::sync::Mutex::new(()),
            timer: Mutex::new(None),
        })
    }

    /// Start the periodic sync timer: an immediate check, then one every
    /// `interval`. Idempotent while running.
    pub fn start(self: Arc<Self>, interval: Duration) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            tracing::debug!("sync timer already running");
            return;
        }

        let (shutdown, mut rx) = watch::channel(false);
        let agent = Arc::clone(&self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = agent.sync_model().await {
                            tracing::error!(error = %e, "scheduled model sync failed");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("model sync timer stopped");
        });

        *timer = Some(TimerHandle { shutdown, task });
        tracing::info!(interval_secs = interval.as_secs(), "model sync timer started");
    }

    /// Stop the timer. An in-flight cycle finishes first; the select in
    /// the timer loop only observes shutdown between cycles, so install
    /// is never interrupted mid-write.
    pub async fn stop(&self) {
        let handle = self.timer.lock().take();
        if let Some(TimerHandle { shutdown, task }) = handle {
            let _ = shutdown.send(true);
            if let Err(e) = task.await {
                tracing::error!(error = %e, "sync timer task did not shut down cleanly");
            }
        }
    }

    /// Run one sync cycle. Returns true when a new model was installed.
    ///
    /// Non-reentrant: if a cycle is already in flight the call returns
    /// `Ok(false)` without starting a second one. Transient failures are
    /// retried with a fixed delay up to the configured budget, then the
    /// cycle is abandoned until the next scheduled tick.
    pub async fn sync_model(&self) -> Result<bool> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("model sync already in flight, skipping");
            return Ok(false);
        };

        let mut attempt: u32 = 0;
        loop {
            match self.sync_cycle().await {
                Ok(updated) => {
                    let mut state = self.state.lock();
                    state.retry_count = 0;
                    state.last_sync = Some(Utc::now());
                    return Ok(updated);
                }
                Err(e) => {
                    attempt += 1;
                    self.state.lock().retry_count = attempt;
                    if attempt >= self.options.max_retries {
                        tracing::warn!(
                            error = %e,
                            attempts = attempt,
                            "model sync abandoned until next scheduled check"
                        );
                        self.state.lock().retry_count = 0;
                        return Ok(false);
                    }
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.options.max_retries,
                        retry_delay_secs = self.options.retry_delay.as_secs(),
                        "model sync failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                }
            }
        }
    }

    async fn sync_cycle(&self) -> Result<bool> {
        let remote = self
            .store
            .fetch_metadata()
            .await
            .context("failed to fetch remote model metadata")?;

        let local_version = self.state.lock().local_metadata.as_ref().map(|m| m.version.clone());

        match compare_versions(local_version.as_deref(), &remote.version) {
            VersionDrift::UpToDate => {
                tracing::debug!(version = %remote.version, "model is up to date");
                return Ok(false);
            }
            VersionDrift::Rollback if !self.options.allow_rollback => {
                tracing::warn!(
                    local = local_version.as_deref().unwrap_or("none"),
                    remote = %remote.version,
                    "remote publishes an older model version, refusing rollback"
                );
                return Ok(false);
            }
            VersionDrift::Rollback => {
                tracing::warn!(
                    local = local_version.as_deref().unwrap_or("none"),
                    remote = %remote.version,
                    "rolling back to older remote model version"
                );
            }
            VersionDrift::UpdateAvailable => {
                tracing::info!(
                    local = local_version.as_deref().unwrap_or("none"),
                    remote = %remote.version,
                    "new model version available"
                );
            }
        }

        let artifact = self
            .store
            .fetch_artifact()
            .await
            .context("failed to download model artifact")?;

        // Install into the engine first: validation runs before anything
        // touches disk, so a malformed artifact can never replace the
        // active files.
        self.engine
            .load_model(artifact.clone(), remote.clone())
            .await
            .context("downloaded model failed validation")?;

        self.persist_installed(&artifact, &remote)
            .await
            .context("failed to persist installed model")?;

        self.state.lock().local_metadata = Some(remote.clone());
        tracing::info!(version = %remote.version, "model updated");
        Ok(true)
    }

    /// Write the (artifact, metadata) pair under the models directory:
    /// temp file, flush, rename over the active path — artifact first,
    /// metadata second. A crash in between is caught on the next startup
    /// when the pair fails validation against each other.
    async fn persist_installed(&self, artifact: &Bytes, metadata: &ModelMetadata) -> Result<()> {
        let artifact_path = self.paths.artifact_path()?;
        write_atomic(&artifact_path, artifact).await?;

        let metadata_path = self.paths.metadata_path()?;
        let json = serde_json::to_vec_pretty(metadata).context("failed to serialize model metadata")?;
        write_atomic(&metadata_path, &json).await?;
        Ok(())
    }

    /// Load the locally installed pair into the engine, if one exists.
    /// Used for lazy first-use loading; a missing install is `Ok(false)`.
    pub async fn load_installed_model(&self) -> Result<bool> {
        let artifact_path = self.paths.artifact_path()?;
        let metadata_path = self.paths.metadata_path()?;
        if !artifact_path.exists() || !metadata_path.exists() {
            tracing::info!("no locally installed model");
            return Ok(false);
        }

        let content = tokio::fs::read_to_string(&metadata_path)
            .await
            .with_context(|| format!("failed to read {:?}", metadata_path))?;
        let metadata: ModelMetadata =
            serde_json::from_str(&content).context("installed model metadata is not valid JSON")?;
        let artifact = Bytes::from(
            tokio::fs::read(&artifact_path)
                .await
                .with_context(|| format!("failed to read {:?}", artifact_path))?,
        );

        self.engine
            .load_model(artifact, metadata.clone())
            .await
            .context("installed model failed validation")?;
        self.state.lock().local_metadata = Some(metadata);
        Ok(true)
    }

    /// Metadata of the model this agent believes is installed.
    pub fn model_metadata(&self) -> Option<ModelMetadata> {
        self.state.lock().local_metadata.clone()
    }

    /// Timestamp of the last completed sync cycle.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_sync
    }

    /// Retry count of the cycle currently in flight (0 when idle).
    pub fn retry_count(&self) -> u32 {
        self.state.lock().retry_count
    }
}

async fn read_local_metadata(paths: &EdgePaths) -> Option<ModelMetadata> {
    let path = paths.metadata_path().ok()?;
    if !path.exists() {
        return None;
    }
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable installed model metadata");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "failed to read installed model metadata");
            None
        }
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("failed to create {:?}", tmp))?;
        file.write_all(contents).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to move {:?} into place", tmp))?;
    Ok(())
}
