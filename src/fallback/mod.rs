//! Offline fallback: connectivity tracking and at-least-once delivery.
//!
//! The manager never blocks the inference path on the network. Results
//! are either sent directly (when the central store is reachable) or
//! appended to the durable queue; a drain pass flushes the backlog with
//! snapshot-and-swap semantics so items queued mid-drain are neither
//! lost nor double-processed.

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod connectivity;
pub mod queue;

pub use connectivity::{HttpProbe, OnlineProbe};
pub use queue::ResultQueue;

use crate::inference::PredictionResult;
use crate::storage::RemoteResultsStore;

/// How long a probe result counts as the current network state. The
/// cached state is the cheap local signal; the active probe runs only
/// when it expires.
const DEFAULT_PROBE_CACHE_TTL: Duration = Duration::from_secs(5);

pub struct FallbackManager {
    probe: Arc<dyn OnlineProbe>,
    results: Arc<dyn RemoteResultsStore>,
    queue: ResultQueue,
    last_probe: Mutex<Option<(Instant, bool)>>,
    probe_cache_ttl: Duration,
}

impl FallbackManager {
    pub fn new(
        probe: Arc<dyn OnlineProbe>,
        results: Arc<dyn RemoteResultsStore>,
        queue: ResultQueue,
    ) -> Self {
        Self {
            probe,
            results,
            queue,
            last_probe: Mutex::new(None),
            probe_cache_ttl: DEFAULT_PROBE_CACHE_TTL,
        }
    }

    /// Override how long a probe result is trusted as current.
    pub fn with_probe_cache_ttl(mut self, ttl: Duration) -> Self {
        self.probe_cache_ttl = ttl;
        self
    }

    /// Current connectivity: cached last-known state with a short TTL,
    /// refreshed by a short-timeout active probe.
    pub async fn check_is_online(&self) -> bool {
        if let Some((at, online)) = *self.last_probe.lock() {
            if at.elapsed() < self.probe_cache_ttl {
                return online;
            }
        }

        let online = self.probe.probe().await;
        *self.last_probe.lock() = Some((Instant::now(), online));
        online
    }

    /// Forget the cached network state so the next check probes again.
    fn invalidate_probe_cache(&self) {
        *self.last_probe.lock() = None;
    }

    /// Append a result to the offline buffer. Never fails or blocks on
    /// the network.
    pub async fn queue_prediction(&self, mut result: PredictionResult) {
        result.is_synced = false;
        self.queue.push(result).await;
        tracing::debug!(queue_length = self.queue.len(), "prediction queued");
    }

    /// Deliver a fresh result: send directly when online, queue otherwise.
    /// The returned copy reflects whether persistence was confirmed.
    pub async fn submit(&self, mut result: PredictionResult) -> PredictionResult {
        if self.check_is_online().await {
            match self.results.persist(&result).await {
                Ok(()) => {
                    result.mark_synced();
                    return result;
                }
                Err(e) => {
                    tracing::warn!(id = %result.id, error = %e, "direct send failed, queueing");
                    self.invalidate_probe_cache();
                }
            }
        } else {
            tracing::info!(id = %result.id, "offline, queueing prediction");
        }

        self.queue_prediction(result.clone()).await;
        result
    }

    /// Drain the queue to the remote store.
    ///
    /// Offline this is a no-op returning 0 with the queue untouched.
    /// Online, the current buffer is swapped out for processing; items
    /// that fail persistence are requeued, and if connectivity drops
    /// mid-drain the unprocessed remainder goes back to the live queue
    /// ahead of anything queued concurrently.
    pub async fn sync_queued_predictions(&self) -> usize {
        if !self.check_is_online().await {
            tracing::debug!("skipping drain, offline");
            return 0;
        }

        let batch = self.queue.take_all();
        if batch.is_empty() {
            return 0;
        }
        tracing::info!(count = batch.len(), "draining queued predictions");

        let mut synced = 0usize;
        let mut undelivered = Vec::new();
        let mut remaining = batch.into_iter();

        while let Some(item) = remaining.next() {
            match self.results.persist(&item).await {
                Ok(()) => synced += 1,
                Err(e) => {
                    tracing::warn!(id = %item.id, error = %e, "persist failed, requeueing item");
                    undelivered.push(item);

                    // Distinguish a bad item from a dead link: reprobe, and
                    // on a batch-level outage return the remainder untried.
                    self.invalidate_probe_cache();
                    if !self.check_is_online().await {
                        tracing::warn!("connectivity lost mid-drain, requeueing remainder");
                        undelivered.extend(remaining);
                        break;
                    }
                }
            }
        }

        self.queue.restore_front(undelivered).await;
        tracing::info!(
            synced,
            remaining = self.queue.len(),
            "drain finished"
        );
        synced
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    /// Flush the durable queue state to disk.
    pub async fn flush(&self) -> Result<()> {
        self.queue.flush().await
    }
}
