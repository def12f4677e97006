//! Local directory layout.
//!
//! Everything the agent persists lives under one base directory:
//! `models/` holds the active artifact and its metadata file, `buffer/`
//! the durable result queue. The base defaults to the XDG data home and
//! is created on first use.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

/// Application name for XDG directories
const APP_NAME: &str = "voltedge";

/// Active artifact file name inside `models/`.
const ARTIFACT_FILE: &str = "model.bin";
/// Active metadata file name inside `models/`.
const METADATA_FILE: &str = "model.json";
/// Durable queue file name inside `buffer/`.
const QUEUE_FILE: &str = "queue.jsonl";

/// Resolves and creates the agent's on-disk layout.
#[derive(Debug, Clone)]
pub struct EdgePaths {
    base: PathBuf,
}

impl EdgePaths {
    /// Use an explicit base directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve the default base directory from the XDG data home.
    pub fn from_xdg() -> Result<Self> {
        let base_dirs = BaseDirectories::with_prefix(APP_NAME)
            .map_err(|e| anyhow!("failed to resolve XDG base directories: {}", e))?;
        Ok(Self {
            base: base_dirs.get_data_home(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Models directory, created on first use.
    pub fn models_dir(&self) -> Result<PathBuf> {
        let dir = self.base.join("models");
        ensure_dir_exists(&dir)?;
        Ok(dir)
    }

    /// Buffer directory for the durable queue, created on first use.
    pub fn buffer_dir(&self) -> Result<PathBuf> {
        let dir = self.base.join("buffer");
        ensure_dir_exists(&dir)?;
        Ok(dir)
    }

    /// Path of the active model artifact.
    pub fn artifact_path(&self) -> Result<PathBuf> {
        Ok(self.models_dir()?.join(ARTIFACT_FILE))
    }

    /// Path of the active model metadata file.
    pub fn metadata_path(&self) -> Result<PathBuf> {
        Ok(self.models_dir()?.join(METADATA_FILE))
    }

    /// Path of the durable result queue.
    pub fn queue_path(&self) -> Result<PathBuf> {
        Ok(self.buffer_dir()?.join(QUEUE_FILE))
    }
}

fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {:?}", path))?;
    }
    Ok(())
}
