//! Durable run checkpoints.
//!
//! One JSON blob per run identifier, written with temp-file-then-rename so
//! a concurrent load never observes a torn write. Saving is best-effort: a
//! checkpoint is an optimization, never a correctness requirement, so save
//! failures are logged and swallowed.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::schema::{Document, StructuredResult};

/// File-backed checkpoint storage, keyed by run identifier.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new(".checkpoints")
    }
}

impl CheckpointStore {
    /// Creates a store rooted at `dir`.
    ///
    /// The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: Uuid) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    /// Persists the state for a run. Never fails; I/O problems are logged.
    pub async fn save<T: Serialize>(&self, run_id: Uuid, state: &T) {
        if let Err(error) = self.try_save(run_id, state).await {
            tracing::warn!(run_id = %run_id, error = %error, "Failed to save checkpoint");
        } else {
            tracing::debug!(run_id = %run_id, "Checkpoint saved");
        }
    }

    async fn try_save<T: Serialize>(
        &self,
        run_id: Uuid,
        state: &T,
    ) -> Result<(), crate::errors::DocflowError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(state)?;

        // Unique temp name so concurrent saves for the same run cannot
        // interleave; the rename is atomic on the same filesystem.
        let tmp = self.dir.join(format!("{run_id}.{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, self.path_for(run_id)).await?;
        Ok(())
    }

    /// Loads the state for a run.
    ///
    /// Returns `None` when no checkpoint exists or the blob cannot be
    /// decoded (logged).
    pub async fn load<T: DeserializeOwned>(&self, run_id: Uuid) -> Option<T> {
        let path = self.path_for(run_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
            Err(error) => {
                tracing::warn!(run_id = %run_id, error = %error, "Failed to read checkpoint");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(error) => {
                tracing::warn!(run_id = %run_id, error = %error, "Failed to decode checkpoint");
                None
            }
        }
    }

    /// Removes the checkpoint for a run, if present.
    pub async fn clear(&self, run_id: Uuid) {
        if let Err(error) = tokio::fs::remove_file(self.path_for(run_id)).await {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(run_id = %run_id, error = %error, "Failed to clear checkpoint");
            }
        }
    }
}

/// The engine's own checkpoint blob, saved after each successful stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// The run identifier.
    pub run_id: Uuid,
    /// The originating task string.
    pub task: String,
    /// Names of the stages completed so far, in order.
    pub completed_stages: Vec<String>,
    /// The working document list at the last progress point.
    pub documents: Vec<Document>,
    /// Structured results accumulated so far.
    pub structured_results: Vec<StructuredResult>,
    /// When the checkpoint was written.
    pub saved_at: DateTime<Utc>,
}

impl RunCheckpoint {
    /// Creates a checkpoint for the given progress point.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        task: impl Into<String>,
        completed_stages: Vec<String>,
        documents: Vec<Document>,
        structured_results: Vec<StructuredResult>,
    ) -> Self {
        Self {
            run_id,
            task: task.into(),
            completed_stages,
            documents,
            structured_results,
            saved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, CheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let (_dir, store) = store();
        let run_id = Uuid::new_v4();

        let state = json!({"completed": ["fetch", "clean"], "cursor": 42});
        store.save(run_id, &state).await;

        let loaded: serde_json::Value = store.load(run_id).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_load_absent_is_none() {
        let (_dir, store) = store();
        let loaded: Option<serde_json::Value> = store.load(Uuid::new_v4()).await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_state() {
        let (_dir, store) = store();
        let run_id = Uuid::new_v4();

        store.save(run_id, &json!({"x": 1})).await;
        store.clear(run_id).await;

        let loaded: Option<serde_json::Value> = store.load(run_id).await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_clear_absent_is_noop() {
        let (_dir, store) = store();
        store.clear(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (_dir, store) = store();
        let run_id = Uuid::new_v4();

        store.save(run_id, &json!({"version": 1})).await;
        store.save(run_id, &json!({"version": 2})).await;

        let loaded: serde_json::Value = store.load(run_id).await.unwrap();
        assert_eq!(loaded["version"], json!(2));
    }

    #[tokio::test]
    async fn test_undecodable_blob_is_none() {
        let (_dir, store) = store();
        let run_id = Uuid::new_v4();

        tokio::fs::create_dir_all(store.dir()).await.unwrap();
        tokio::fs::write(store.dir().join(format!("{run_id}.json")), b"not json")
            .await
            .unwrap();

        let loaded: Option<serde_json::Value> = store.load(run_id).await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_run_checkpoint_round_trip() {
        let (_dir, store) = store();
        let run_id = Uuid::new_v4();

        let checkpoint = RunCheckpoint::new(
            run_id,
            "gather news",
            vec!["source_news".to_string()],
            vec![Document::text("article")],
            Vec::new(),
        );
        store.save(run_id, &checkpoint).await;

        let loaded: RunCheckpoint = store.load(run_id).await.unwrap();
        assert_eq!(loaded.task, "gather news");
        assert_eq!(loaded.completed_stages, vec!["source_news".to_string()]);
        assert_eq!(loaded.documents.len(), 1);
    }
}
