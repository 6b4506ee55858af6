//! JSON file checkpoint store.
//!
//! Layout: `<root>/<swarm_id>/<timestamp>.json`, where the timestamp is UTC
//! with nanoseconds so file names sort chronologically.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::errors::{RuntimeError, RuntimeResult};
use crate::domain::models::SwarmCheckpoint;
use crate::domain::ports::CheckpointStore;

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";

#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn swarm_dir(&self, swarm_id: Uuid) -> PathBuf {
        self.root.join(swarm_id.to_string())
    }

    fn checkpoint_path(&self, swarm_id: Uuid, timestamp: DateTime<Utc>) -> PathBuf {
        self.swarm_dir(swarm_id)
            .join(format!("{}.json", timestamp.format(STAMP_FORMAT)))
    }

    async fn read(&self, path: &Path) -> RuntimeResult<Option<SwarmCheckpoint>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RuntimeError::Checkpoint(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

fn parse_stamp(path: &Path) -> Option<DateTime<Utc>> {
    if path.extension()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let naive = NaiveDateTime::parse_from_str(stem, STAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &SwarmCheckpoint) -> RuntimeResult<()> {
        let dir = self.swarm_dir(checkpoint.swarm_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.checkpoint_path(checkpoint.swarm_id, checkpoint.timestamp);
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        // write-then-rename so readers never see a partial file
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await?;

        tracing::debug!(
            swarm_id = %checkpoint.swarm_id,
            path = %path.display(),
            "checkpoint written"
        );
        Ok(())
    }

    async fn latest(&self, swarm_id: Uuid) -> RuntimeResult<Option<SwarmCheckpoint>> {
        match self.list(swarm_id).await?.last() {
            Some(timestamp) => self.get(swarm_id, *timestamp).await,
            None => Ok(None),
        }
    }

    async fn get(
        &self,
        swarm_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> RuntimeResult<Option<SwarmCheckpoint>> {
        self.read(&self.checkpoint_path(swarm_id, timestamp)).await
    }

    async fn list(&self, swarm_id: Uuid) -> RuntimeResult<Vec<DateTime<Utc>>> {
        let mut entries = match tokio::fs::read_dir(self.swarm_dir(swarm_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut stamps = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(stamp) = parse_stamp(&entry.path()) {
                stamps.push(stamp);
            }
        }
        stamps.sort_unstable();
        Ok(stamps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BestSolution, Swarm};
    use crate::optimization::AlgorithmConfig;
    use serde_json::json;

    fn populated_swarm() -> Swarm {
        let mut swarm = Swarm::new("persisted", AlgorithmConfig::default());
        swarm.add_member("a1");
        swarm.set_shared("phase", json!({"step": 2}));
        swarm.allocate_task(Some("t1".to_string()), json!([1, 2])).unwrap();
        swarm.allocate_task(Some("t2".to_string()), json!(null)).unwrap();
        swarm.claim_task("t2", "a1").unwrap();
        swarm.current_iteration = 12;
        swarm.best_known_solution = Some(BestSolution {
            position: vec![0.5, -0.25],
            fitness: 0.3125,
            iteration: 12,
        });
        swarm
    }

    #[tokio::test]
    async fn test_round_trip_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let checkpoint = populated_swarm().to_checkpoint();

        store.save(&checkpoint).await.unwrap();
        let loaded = store
            .get(checkpoint.swarm_id, checkpoint.timestamp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, checkpoint);
        assert_eq!(store.latest(checkpoint.swarm_id).await.unwrap(), Some(checkpoint));
    }

    #[tokio::test]
    async fn test_list_is_chronological_and_ignores_strays() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let swarm = populated_swarm();

        let early = swarm.to_checkpoint();
        let mut late = swarm.to_checkpoint();
        late.timestamp = early.timestamp + chrono::Duration::milliseconds(5);
        late.current_iteration = 99;
        store.save(&late).await.unwrap();
        store.save(&early).await.unwrap();
        tokio::fs::write(store.swarm_dir(swarm.id).join("notes.txt"), b"x")
            .await
            .unwrap();

        assert_eq!(
            store.list(swarm.id).await.unwrap(),
            vec![early.timestamp, late.timestamp]
        );
        assert_eq!(
            store.latest(swarm.id).await.unwrap().unwrap().current_iteration,
            99
        );
    }

    #[tokio::test]
    async fn test_missing_swarm_has_no_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let id = Uuid::new_v4();
        assert!(store.list(id).await.unwrap().is_empty());
        assert!(store.latest(id).await.unwrap().is_none());
        assert!(store.get(id, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let checkpoint = populated_swarm().to_checkpoint();
        store.save(&checkpoint).await.unwrap();
        let path = store.checkpoint_path(checkpoint.swarm_id, checkpoint.timestamp);
        tokio::fs::write(&path, b"{not json").await.unwrap();

        assert!(matches!(
            store.latest(checkpoint.swarm_id).await,
            Err(RuntimeError::Serialization(_))
        ));
    }
}
