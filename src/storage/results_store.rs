//! Remote results store.
//!
//! An addressable collection accepting finished predictions keyed by id.
//! Persisting the same id twice must be safe on the server side; delivery
//! here is at-least-once by design.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use crate::inference::PredictionResult;

/// Addressable store accepting finished predictions keyed by id.
#[async_trait]
pub trait RemoteResultsStore: Send + Sync {
    /// Persist one prediction. An `Err` means the result was not durably
    /// accepted and must stay queued.
    async fn persist(&self, result: &PredictionResult) -> Result<()>;
}

/// HTTP-backed results store: `PUT {endpoint}/predictions/{id}`.
pub struct HttpResultsStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpResultsStore {
    pub fn new(endpoint: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for results store")?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Health endpoint used by the connectivity probe.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.endpoint)
    }
}

#[async_trait]
impl RemoteResultsStore for HttpResultsStore {
    async fn persist(&self, result: &PredictionResult) -> Result<()> {
        let url = format!("{}/predictions/{}", self.endpoint, result.id);
        let response = self
            .client
            .put(&url)
            .json(result)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "persisting prediction {} returned HTTP {}",
                result.id,
                response.status()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_health_url() {
        let store = HttpResultsStore::new("http://edge.example/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.health_url(), "http://edge.example/health");
    }
}
