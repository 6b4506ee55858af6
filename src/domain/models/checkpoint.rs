//! Checkpoint record: a point-in-time snapshot of one swarm.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::swarm::{BestSolution, SwarmStatus, SwarmTask};
use crate::optimization::AlgorithmConfig;

/// Serializable fields of a swarm at `timestamp`. The live background run is
/// never part of a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmCheckpoint {
    pub swarm_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub status: SwarmStatus,
    pub created_at: DateTime<Utc>,
    pub algorithm: AlgorithmConfig,
    pub members: BTreeSet<String>,
    pub shared_state: HashMap<String, serde_json::Value>,
    pub pending_tasks: HashMap<String, SwarmTask>,
    pub assigned_tasks: HashMap<String, SwarmTask>,
    pub completed_tasks: HashMap<String, SwarmTask>,
    pub current_iteration: usize,
    pub best_known_solution: Option<BestSolution>,
}
