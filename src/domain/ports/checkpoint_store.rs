//! Checkpoint store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::RuntimeResult;
use crate::domain::models::SwarmCheckpoint;

/// Storage for swarm checkpoints, one record per `(swarm_id, timestamp)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint.
    async fn save(&self, checkpoint: &SwarmCheckpoint) -> RuntimeResult<()>;

    /// Most recent checkpoint for a swarm, by timestamp.
    async fn latest(&self, swarm_id: Uuid) -> RuntimeResult<Option<SwarmCheckpoint>>;

    /// Checkpoint written at an exact timestamp.
    async fn get(
        &self,
        swarm_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> RuntimeResult<Option<SwarmCheckpoint>>;

    /// Timestamps of every checkpoint for a swarm, oldest first.
    async fn list(&self, swarm_id: Uuid) -> RuntimeResult<Vec<DateTime<Utc>>>;
}
