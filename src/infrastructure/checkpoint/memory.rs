//! In-memory checkpoint store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::RuntimeResult;
use crate::domain::models::SwarmCheckpoint;
use crate::domain::ports::CheckpointStore;

/// Checkpoints held in a map, ordered by timestamp per swarm.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<Uuid, BTreeMap<DateTime<Utc>, SwarmCheckpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &SwarmCheckpoint) -> RuntimeResult<()> {
        self.checkpoints
            .write()
            .await
            .entry(checkpoint.swarm_id)
            .or_default()
            .insert(checkpoint.timestamp, checkpoint.clone());
        Ok(())
    }

    async fn latest(&self, swarm_id: Uuid) -> RuntimeResult<Option<SwarmCheckpoint>> {
        Ok(self
            .checkpoints
            .read()
            .await
            .get(&swarm_id)
            .and_then(|by_time| by_time.values().next_back().cloned()))
    }

    async fn get(
        &self,
        swarm_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> RuntimeResult<Option<SwarmCheckpoint>> {
        Ok(self
            .checkpoints
            .read()
            .await
            .get(&swarm_id)
            .and_then(|by_time| by_time.get(&timestamp).cloned()))
    }

    async fn list(&self, swarm_id: Uuid) -> RuntimeResult<Vec<DateTime<Utc>>> {
        Ok(self
            .checkpoints
            .read()
            .await
            .get(&swarm_id)
            .map(|by_time| by_time.keys().copied().collect())
            .unwrap_or_default())
    }
}
