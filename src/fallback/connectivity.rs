//! Connectivity probing.
//!
//! The edge target has no browser online/offline events, so reachability
//! sits behind a trait: poll implementations probe on demand, and a
//! subscription-style source can cache pushed state behind the same call.
//! A connected-but-unreachable network must read as offline, which is why
//! the default implementation actively probes the results endpoint with a
//! short timeout instead of trusting link state.

use async_trait::async_trait;
use std::time::Duration;

/// Source of the current online/offline state.
#[async_trait]
pub trait OnlineProbe: Send + Sync {
    /// True when the central store is reachable right now.
    async fn probe(&self) -> bool;
}

/// Probes a health endpoint with a short timeout.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build probe client: {}", e))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl OnlineProbe for HttpProbe {
    async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "connectivity probe failed");
                false
            }
        }
    }
}
