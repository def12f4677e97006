//! Remote model artifact store.
//!
//! The store is a bucket holding two objects: the opaque artifact blob
//! and its metadata JSON. The trait is the seam tests substitute fakes
//! behind; the HTTP implementation talks to the central object storage
//! endpoint.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::models::ModelMetadata;

/// Versioned remote blob storage holding a model artifact and its
/// metadata object.
#[async_trait]
pub trait ModelArtifactStore: Send + Sync {
    /// Fetch the published metadata object.
    async fn fetch_metadata(&self) -> Result<ModelMetadata>;

    /// Fetch the artifact blob. This is the long transfer; callers bound
    /// it with the download timeout, not the probe timeout.
    async fn fetch_artifact(&self) -> Result<Bytes>;
}

/// HTTP-backed artifact store: `GET {endpoint}/storage/{bucket}/{object}`.
pub struct HttpArtifactStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    artifact_object: String,
    metadata_object: String,
}

impl HttpArtifactStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        artifact_object: impl Into<String>,
        metadata_object: impl Into<String>,
        download_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()
            .context("failed to build HTTP client for artifact store")?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            artifact_object: artifact_object.into(),
            metadata_object: metadata_object.into(),
        })
    }

    fn object_url(&self, object: &str) -> String {
        format!("{}/storage/{}/{}", self.endpoint, self.bucket, object)
    }

    async fn get(&self, object: &str) -> Result<reqwest::Response> {
        let url = self.object_url(object);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        if !response.status().is_success() {
            return Err(anyhow!("fetching {} returned HTTP {}", url, response.status()));
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelArtifactStore for HttpArtifactStore {
    async fn fetch_metadata(&self) -> Result<ModelMetadata> {
        let response = self.get(&self.metadata_object).await?;
        response
            .json::<ModelMetadata>()
            .await
            .context("remote model metadata is not valid JSON")
    }

    async fn fetch_artifact(&self) -> Result<Bytes> {
        let response = self.get(&self.artifact_object).await?;
        response
            .bytes()
            .await
            .context("artifact download was interrupted")
    }
}
