//! Configuration management for the voltedge agent.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/voltedge/config.toml`)
//! 3. User-specified configuration file
//! 4. Environment variables (prefixed with `VOLTEDGE_`)
//! 5. Command-line arguments

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::EdgePaths;
use crate::sync::SyncOptions;

/// Global command-line arguments shared by every subcommand.
#[derive(Debug, Default, clap::Args)]
pub struct Args {
    /// Configuration file path
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Base directory for models and the offline buffer
    #[clap(long)]
    pub base_dir: Option<PathBuf>,

    /// Remote endpoint for the artifact and results stores
    #[clap(long)]
    pub endpoint: Option<String>,

    /// Sync interval in seconds
    #[clap(long)]
    pub sync_interval: Option<u64>,
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Local storage configuration
    #[serde(default)]
    pub storage: StorageSettings,
    /// Model sync behavior
    #[serde(default)]
    pub sync: SyncSettings,
    /// Remote store endpoints
    pub remote: RemoteSettings,
    /// Inference settings
    #[serde(default)]
    pub inference: InferenceSettings,
    /// Offline queue settings
    #[serde(default)]
    pub queue: QueueSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Base directory; defaults to the XDG data home when unset.
    #[serde(default)]
    pub base_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between scheduled sync checks
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// Bounded retry budget for one sync cycle
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between retries, in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Allow installing a remote version older than the local one
    #[serde(default)]
    pub allow_rollback: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            allow_rollback: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Central endpoint serving object storage and the results collection
    pub endpoint: String,
    /// Bucket holding the model objects
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Object path of the model artifact
    #[serde(default = "default_artifact_object")]
    pub artifact_object: String,
    /// Object path of the model metadata JSON
    #[serde(default = "default_metadata_object")]
    pub metadata_object: String,
    /// Connectivity probe timeout, in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Artifact download timeout, in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Forecast type tag stamped on produced predictions. The forecast
    /// horizon itself is not configured here; it always comes from the
    /// installed model's metadata.
    #[serde(default = "default_forecast_type")]
    pub forecast_type: String,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            forecast_type: default_forecast_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Disk-backed queue surviving restarts; disable only for
    /// short-lived sessions.
    #[serde(default = "default_queue_durable")]
    pub durable: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            durable: default_queue_durable(),
        }
    }
}

impl EdgeConfig {
    /// Load configuration from all sources
    pub fn load(args: &Args) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name("/etc/voltedge/config.toml").required(false));

        // Load user config if specified
        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        // Add environment variables
        builder = builder.add_source(config::Environment::with_prefix("VOLTEDGE").separator("__"));

        // Build config
        let mut config: EdgeConfig = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        // Override with command line args
        if let Some(base_dir) = &args.base_dir {
            config.storage.base_dir = Some(base_dir.display().to_string());
        }
        if let Some(endpoint) = &args.endpoint {
            config.remote.endpoint = endpoint.clone();
        }
        if let Some(interval) = args.sync_interval {
            config.sync.interval_secs = interval;
        }

        config.validate()?;
        Ok(config)
    }

    /// Contract checks that must hold before any component starts.
    /// Violations here are the one error class that is allowed to be
    /// fatal.
    pub fn validate(&self) -> Result<()> {
        if self.remote.endpoint.trim().is_empty() {
            bail!("remote.endpoint must not be empty");
        }
        reqwest::Url::parse(&self.remote.endpoint)
            .with_context(|| format!("remote.endpoint '{}' is not a valid URL", self.remote.endpoint))?;
        if self.sync.interval_secs == 0 {
            bail!("sync.interval_secs must be positive");
        }
        if self.sync.max_retries == 0 {
            bail!("sync.max_retries must be at least 1");
        }
        if self.remote.probe_timeout_secs >= self.remote.download_timeout_secs {
            bail!("remote.probe_timeout_secs must be shorter than remote.download_timeout_secs");
        }
        self.inference
            .forecast_type
            .parse::<crate::inference::ForecastType>()
            .context("inference.forecast_type is invalid")?;
        Ok(())
    }

    /// Resolve the local directory layout.
    pub fn paths(&self) -> Result<EdgePaths> {
        match &self.storage.base_dir {
            Some(base) => Ok(EdgePaths::new(base)),
            None => EdgePaths::from_xdg(),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.probe_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.download_timeout_secs)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            max_retries: self.sync.max_retries,
            retry_delay: Duration::from_secs(self.sync.retry_delay_secs),
            allow_rollback: self.sync.allow_rollback,
        }
    }
}

fn default_sync_interval() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_bucket() -> String {
    "models".to_string()
}

fn default_artifact_object() -> String {
    "energy_forecast/model.bin".to_string()
}

fn default_metadata_object() -> String {
    "energy_forecast/model.json".to_string()
}

fn default_probe_timeout() -> u64 {
    3
}

fn default_download_timeout() -> u64 {
    120
}

fn default_forecast_type() -> String {
    "consumption".to_string()
}

fn default_queue_durable() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let args = Args::default();
        let config = EdgeConfig::load(&args).unwrap();

        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.retry_delay_secs, 5);
        assert!(!config.sync.allow_rollback);
        assert_eq!(config.remote.probe_timeout_secs, 3);
        assert!(config.queue.durable);
        assert_eq!(config.inference.forecast_type, "consumption");
    }

    #[test]
    fn test_cli_overrides_win() {
        let args = Args {
            base_dir: Some(PathBuf::from("/tmp/edge")),
            endpoint: Some("http://central.example".to_string()),
            sync_interval: Some(60),
            ..Args::default()
        };
        let config = EdgeConfig::load(&args).unwrap();

        assert_eq!(config.storage.base_dir.as_deref(), Some("/tmp/edge"));
        assert_eq!(config.remote.endpoint, "http://central.example");
        assert_eq!(config.sync.interval_secs, 60);
    }

    #[test]
    fn test_validate_rejects_bad_contract() {
        let args = Args::default();
        let mut config = EdgeConfig::load(&args).unwrap();

        config.sync.interval_secs = 0;
        assert!(config.validate().is_err());

        config.sync.interval_secs = 300;
        config.remote.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());

        config.remote.endpoint = "http://ok.example".to_string();
        config.remote.probe_timeout_secs = 300;
        assert!(config.validate().is_err());
    }
}
