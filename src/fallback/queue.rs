//! Durable FIFO buffer for unsynced predictions.
//!
//! The queue mirrors an in-memory deque to a JSON-lines file so a device
//! that reboots while offline resumes with its backlog intact. Appends
//! are O(1); the file is compacted by rewrite-and-rename whenever the
//! queue shrinks. Memory-only operation exists for short-lived sessions
//! and is an explicit configuration choice, not a default.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::inference::PredictionResult;

pub struct ResultQueue {
    items: Mutex<VecDeque<PredictionResult>>,
    /// Durable backing file; `None` means memory-only.
    path: Option<PathBuf>,
    /// Serializes file writes; the in-memory deque has its own lock.
    file_guard: tokio::sync::Mutex<()>,
}

impl ResultQueue {
    /// Open a durable queue, replaying any backlog left on disk.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let mut items = VecDeque::new();
        if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read queue file {:?}", path))?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<PredictionResult>(line) {
                    Ok(result) => items.push_back(result),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping corrupt queue line");
                    }
                }
            }
            if !items.is_empty() {
                tracing::info!(count = items.len(), "restored queued predictions from disk");
            }
        }
        Ok(Self {
            items: Mutex::new(items),
            path: Some(path),
            file_guard: tokio::sync::Mutex::new(()),
        })
    }

    /// Memory-only queue; the backlog does not survive a restart.
    pub fn in_memory() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            path: None,
            file_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Append one result. Never fails: a durable-write error degrades to
    /// memory-only for that item and is logged.
    pub async fn push(&self, result: PredictionResult) {
        let line = match serde_json::to_string(&result) {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::error!(id = %result.id, error = %e, "failed to serialize queued prediction");
                None
            }
        };

        self.items.lock().push_back(result);

        if let (Some(path), Some(line)) = (&self.path, line) {
            let _guard = self.file_guard.lock().await;
            if let Err(e) = append_line(path, &line).await {
                tracing::warn!(error = %e, "durable queue append failed, item is memory-only until next flush");
            }
        }
    }

    /// Atomically take the entire queue contents for a drain pass. Items
    /// pushed after this call land in the live queue and are untouched.
    pub fn take_all(&self) -> Vec<PredictionResult> {
        let mut items = self.items.lock();
        std::mem::take(&mut *items).into()
    }

    /// Return undelivered items to the head of the queue, ahead of
    /// anything queued during the drain, then compact the backing file.
    pub async fn restore_front(&self, undelivered: Vec<PredictionResult>) {
        if !undelivered.is_empty() {
            let mut items = self.items.lock();
            for result in undelivered.into_iter().rev() {
                items.push_front(result);
            }
        }
        if let Err(e) = self.flush().await {
            tracing::warn!(error = %e, "failed to compact queue file after drain");
        }
    }

    /// Rewrite the backing file to match the in-memory queue.
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let lines: Vec<String> = {
            let items = self.items.lock();
            items
                .iter()
                .filter_map(|r| serde_json::to_string(r).ok())
                .collect()
        };

        let _guard = self.file_guard.lock().await;
        let tmp = path.with_extension("jsonl.tmp");
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("failed to write queue file {:?}", tmp))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("failed to replace queue file {:?}", path))?;
        Ok(())
    }
}

async fn append_line(path: &PathBuf, line: &str) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("failed to open queue file {:?}", path))?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ForecastType;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn prediction(site: &str) -> PredictionResult {
        PredictionResult {
            id: Uuid::new_v4(),
            site_id: site.to_string(),
            timestamp: Utc::now(),
            forecast_type: ForecastType::Consumption,
            values: vec![1.0, 2.0, 3.0],
            confidence: 0.9,
            model_version: "1.0.0".to_string(),
            created_at: Utc::now(),
            is_synced: false,
        }
    }

    #[tokio::test]
    async fn test_push_take_preserves_order() {
        let queue = ResultQueue::in_memory();
        queue.push(prediction("a")).await;
        queue.push(prediction("b")).await;
        assert_eq!(queue.len(), 2);

        let taken = queue.take_all();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].site_id, "a");
        assert_eq!(taken[1].site_id, "b");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_restore_front_goes_ahead_of_new_items() {
        let queue = ResultQueue::in_memory();
        queue.push(prediction("old-1")).await;
        queue.push(prediction("old-2")).await;

        let batch = queue.take_all();
        // A producer races the drain
        queue.push(prediction("new")).await;

        queue.restore_front(batch).await;
        let all = queue.take_all();
        assert_eq!(all[0].site_id, "old-1");
        assert_eq!(all[1].site_id, "old-2");
        assert_eq!(all[2].site_id, "new");
    }

    #[tokio::test]
    async fn test_durable_queue_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("queue.jsonl");

        let queue = ResultQueue::open(path.clone()).await.unwrap();
        queue.push(prediction("a")).await;
        queue.push(prediction("b")).await;
        drop(queue);

        let reopened = ResultQueue::open(path).await.unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped_on_replay() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("queue.jsonl");

        let queue = ResultQueue::open(path.clone()).await.unwrap();
        queue.push(prediction("good")).await;
        drop(queue);

        // Simulate a torn write at the tail of the file
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"id\":\"truncat");
        std::fs::write(&path, content).unwrap();

        let reopened = ResultQueue::open(path).await.unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[tokio::test]
    async fn test_flush_compacts_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("queue.jsonl");

        let queue = ResultQueue::open(path.clone()).await.unwrap();
        queue.push(prediction("a")).await;
        queue.push(prediction("b")).await;
        let _ = queue.take_all();
        queue.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.trim().is_empty());
    }
}
