//! Swarm domain model.
//!
//! A swarm is one managed optimization run together with its member agents,
//! shared key/value state and task queue. The record here is plain data plus
//! the state rules; the runtime actor owns the live instance.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{RuntimeError, RuntimeResult};
use crate::domain::models::checkpoint::SwarmCheckpoint;
use crate::domain::models::problem::Direction;
use crate::domain::models::result::{OptimizationResult, TerminationReason};
use crate::optimization::AlgorithmConfig;

/// Shared-state key holding the elected leader.
pub const LEADER_KEY: &str = "leader";

/// Lifecycle status of a swarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmStatus {
    #[default]
    Created,
    Running,
    Stopped,
    Error,
}

impl SwarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<SwarmStatus> {
        match self {
            Self::Created => vec![Self::Running, Self::Stopped],
            Self::Running => vec![Self::Stopped, Self::Error],
            Self::Stopped => vec![Self::Running],
            Self::Error => vec![Self::Running, Self::Stopped],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for SwarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work handed out to member agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmTask {
    pub id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SwarmTask {
    pub fn new(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            payload,
            created_at: Utc::now(),
            claimed_by: None,
            claimed_at: None,
            result: None,
            completed_at: None,
        }
    }
}

/// Best solution the swarm has seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestSolution {
    pub position: Vec<f64>,
    pub fitness: f64,
    pub iteration: usize,
}

/// Condensed outcome of the last finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub algorithm_name: String,
    pub best_fitness: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub success: bool,
    pub message: String,
    pub termination: TerminationReason,
    pub finished_at: DateTime<Utc>,
}

impl From<&OptimizationResult> for RunSummary {
    fn from(result: &OptimizationResult) -> Self {
        Self {
            algorithm_name: result.algorithm_name.clone(),
            best_fitness: result.best_fitness,
            iterations: result.iterations,
            evaluations: result.evaluations,
            success: result.success,
            message: result.message.clone(),
            termination: result.termination,
            finished_at: Utc::now(),
        }
    }
}

/// Outcome of removing an agent from a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub removed: bool,
    pub leader_cleared: bool,
}

/// Swarm record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swarm {
    pub id: Uuid,
    pub name: String,
    pub status: SwarmStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub algorithm: AlgorithmConfig,
    pub members: BTreeSet<String>,
    pub shared_state: HashMap<String, serde_json::Value>,
    pub pending_tasks: HashMap<String, SwarmTask>,
    pub assigned_tasks: HashMap<String, SwarmTask>,
    pub completed_tasks: HashMap<String, SwarmTask>,
    pub current_iteration: usize,
    pub best_known_solution: Option<BestSolution>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_run: Option<RunSummary>,
}

impl Swarm {
    /// Create a swarm in the `Created` state.
    pub fn new(name: impl Into<String>, algorithm: AlgorithmConfig) -> Self {
        Self::with_id(Uuid::new_v4(), name, algorithm)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>, algorithm: AlgorithmConfig) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            status: SwarmStatus::Created,
            created_at: now,
            updated_at: now,
            algorithm,
            members: BTreeSet::new(),
            shared_state: HashMap::new(),
            pending_tasks: HashMap::new(),
            assigned_tasks: HashMap::new(),
            completed_tasks: HashMap::new(),
            current_iteration: 0,
            best_known_solution: None,
            last_error: None,
            last_run: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    pub fn transition_to(&mut self, to: SwarmStatus) -> RuntimeResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(RuntimeError::InvalidStateTransition {
                from: self.status,
                to,
                reason: format!("{} swarms cannot become {}", self.status, to),
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    pub fn leader(&self) -> Option<&str> {
        self.shared_state.get(LEADER_KEY).and_then(|v| v.as_str())
    }

    /// Returns `true` if the agent was not already a member.
    pub fn add_member(&mut self, agent_id: impl Into<String>) -> bool {
        let inserted = self.members.insert(agent_id.into());
        if inserted {
            self.touch();
        }
        inserted
    }

    pub fn remove_member(&mut self, agent_id: &str) -> Removal {
        let removed = self.members.remove(agent_id);
        let leader_cleared = removed && self.leader() == Some(agent_id);
        if leader_cleared {
            self.shared_state.remove(LEADER_KEY);
        }
        if removed {
            self.touch();
        }
        Removal {
            removed,
            leader_cleared,
        }
    }

    /// Set a shared-state key, returning the previous value.
    pub fn set_shared(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.touch();
        self.shared_state.insert(key.into(), value)
    }

    fn task_id_in_use(&self, task_id: &str) -> bool {
        self.pending_tasks.contains_key(task_id)
            || self.assigned_tasks.contains_key(task_id)
            || self.completed_tasks.contains_key(task_id)
    }

    /// Add a pending task. A caller-supplied id must not be in use.
    pub fn allocate_task(
        &mut self,
        task_id: Option<String>,
        payload: serde_json::Value,
    ) -> RuntimeResult<SwarmTask> {
        let id = match task_id {
            Some(id) if self.task_id_in_use(&id) => return Err(RuntimeError::DuplicateTask(id)),
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        let task = SwarmTask::new(id.clone(), payload);
        self.pending_tasks.insert(id, task.clone());
        self.touch();
        Ok(task)
    }

    /// Move a pending task to assigned, recording the claimant.
    pub fn claim_task(&mut self, task_id: &str, agent_id: &str) -> RuntimeResult<SwarmTask> {
        if let Some(assigned) = self.assigned_tasks.get(task_id) {
            return Err(RuntimeError::TaskAlreadyClaimed {
                task_id: task_id.to_string(),
                claimed_by: assigned.claimed_by.clone().unwrap_or_default(),
            });
        }
        let mut task = self
            .pending_tasks
            .remove(task_id)
            .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))?;
        task.claimed_by = Some(agent_id.to_string());
        task.claimed_at = Some(Utc::now());
        self.assigned_tasks.insert(task.id.clone(), task.clone());
        self.touch();
        Ok(task)
    }

    /// Move an assigned task to completed. Only the claimant may complete it.
    pub fn complete_task(
        &mut self,
        task_id: &str,
        agent_id: &str,
        result: serde_json::Value,
    ) -> RuntimeResult<SwarmTask> {
        let claimed_by_caller = self
            .assigned_tasks
            .get(task_id)
            .is_some_and(|t| t.claimed_by.as_deref() == Some(agent_id));
        if !claimed_by_caller {
            return Err(RuntimeError::TaskNotAssigned {
                task_id: task_id.to_string(),
                agent_id: agent_id.to_string(),
            });
        }
        let mut task = self
            .assigned_tasks
            .remove(task_id)
            .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))?;
        task.result = Some(result);
        task.completed_at = Some(Utc::now());
        self.completed_tasks.insert(task.id.clone(), task.clone());
        self.touch();
        Ok(task)
    }

    /// Record progress reported by the running algorithm. Non-finite fitness
    /// never becomes the best-known solution.
    pub fn record_progress(
        &mut self,
        iteration: usize,
        position: &[f64],
        fitness: f64,
        direction: Direction,
    ) {
        self.current_iteration = iteration;
        let improved = fitness.is_finite()
            && self
                .best_known_solution
                .as_ref()
                .is_none_or(|best| direction.is_better(fitness, best.fitness));
        if improved {
            self.best_known_solution = Some(BestSolution {
                position: position.to_vec(),
                fitness,
                iteration,
            });
        }
        self.touch();
    }

    /// Snapshot every serializable field.
    pub fn to_checkpoint(&self) -> SwarmCheckpoint {
        SwarmCheckpoint {
            swarm_id: self.id,
            timestamp: Utc::now(),
            name: self.name.clone(),
            status: self.status,
            created_at: self.created_at,
            algorithm: self.algorithm.clone(),
            members: self.members.clone(),
            shared_state: self.shared_state.clone(),
            pending_tasks: self.pending_tasks.clone(),
            assigned_tasks: self.assigned_tasks.clone(),
            completed_tasks: self.completed_tasks.clone(),
            current_iteration: self.current_iteration,
            best_known_solution: self.best_known_solution.clone(),
        }
    }

    /// Overwrite the mutable run state from a checkpoint.
    pub fn apply_checkpoint(&mut self, checkpoint: &SwarmCheckpoint) {
        self.shared_state = checkpoint.shared_state.clone();
        self.pending_tasks = checkpoint.pending_tasks.clone();
        self.assigned_tasks = checkpoint.assigned_tasks.clone();
        self.completed_tasks = checkpoint.completed_tasks.clone();
        self.current_iteration = checkpoint.current_iteration;
        self.best_known_solution = checkpoint.best_known_solution.clone();
        self.touch();
    }

    /// Rebuild a swarm from a checkpoint. The swarm starts out `Created`,
    /// since no background run survives a checkpoint.
    pub fn from_checkpoint(checkpoint: &SwarmCheckpoint) -> Self {
        let mut swarm = Self::with_id(
            checkpoint.swarm_id,
            checkpoint.name.clone(),
            checkpoint.algorithm.clone(),
        );
        swarm.created_at = checkpoint.created_at;
        swarm.members = checkpoint.members.clone();
        swarm.apply_checkpoint(checkpoint);
        swarm
    }

    pub fn summary(&self) -> SwarmSummary {
        SwarmSummary {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            algorithm: self.algorithm.id().to_string(),
            members: self.members.iter().cloned().collect(),
            leader: self.leader().map(str::to_string),
            pending_tasks: self.pending_tasks.len(),
            assigned_tasks: self.assigned_tasks.len(),
            completed_tasks: self.completed_tasks.len(),
            current_iteration: self.current_iteration,
            best_known_solution: self.best_known_solution.clone(),
            last_error: self.last_error.clone(),
            last_run: self.last_run.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Status view returned by `get_swarm_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSummary {
    pub id: Uuid,
    pub name: String,
    pub status: SwarmStatus,
    pub algorithm: String,
    pub members: Vec<String>,
    pub leader: Option<String>,
    pub pending_tasks: usize,
    pub assigned_tasks: usize,
    pub completed_tasks: usize,
    pub current_iteration: usize,
    pub best_known_solution: Option<BestSolution>,
    pub last_error: Option<String>,
    pub last_run: Option<RunSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::de::DeConfig;
    use serde_json::json;

    fn swarm() -> Swarm {
        Swarm::new("test", AlgorithmConfig::DifferentialEvolution(DeConfig::default()))
    }

    #[test]
    fn test_status_transitions() {
        assert!(SwarmStatus::Created.can_transition_to(SwarmStatus::Running));
        assert!(SwarmStatus::Running.can_transition_to(SwarmStatus::Error));
        assert!(SwarmStatus::Error.can_transition_to(SwarmStatus::Running));
        assert!(SwarmStatus::Stopped.can_transition_to(SwarmStatus::Running));
        assert!(!SwarmStatus::Stopped.can_transition_to(SwarmStatus::Error));
        assert!(!SwarmStatus::Created.can_transition_to(SwarmStatus::Error));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut s = swarm();
        let err = s.transition_to(SwarmStatus::Error).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidStateTransition { .. }));
        assert_eq!(s.status, SwarmStatus::Created);
    }

    #[test]
    fn test_membership_is_idempotent() {
        let mut s = swarm();
        assert!(s.add_member("a"));
        assert!(!s.add_member("a"));
        assert_eq!(s.members.len(), 1);
        assert!(s.remove_member("a").removed);
        assert!(!s.remove_member("a").removed);
    }

    #[test]
    fn test_removing_leader_clears_it() {
        let mut s = swarm();
        s.add_member("a");
        s.add_member("b");
        s.set_shared(LEADER_KEY, json!("a"));
        let removal = s.remove_member("b");
        assert!(!removal.leader_cleared);
        let removal = s.remove_member("a");
        assert!(removal.leader_cleared);
        assert!(s.leader().is_none());
    }

    #[test]
    fn test_task_lifecycle() {
        let mut s = swarm();
        s.allocate_task(Some("t1".into()), json!({"x": 1})).unwrap();
        assert_eq!(s.pending_tasks.len(), 1);

        s.claim_task("t1", "agent-a").unwrap();
        assert!(s.pending_tasks.is_empty());
        assert_eq!(s.assigned_tasks.len(), 1);

        let err = s.claim_task("t1", "agent-b").unwrap_err();
        assert!(matches!(err, RuntimeError::TaskAlreadyClaimed { .. }));

        let err = s.complete_task("t1", "agent-b", json!(null)).unwrap_err();
        assert!(matches!(err, RuntimeError::TaskNotAssigned { .. }));
        assert_eq!(s.assigned_tasks.len(), 1);

        let done = s.complete_task("t1", "agent-a", json!({"ok": true})).unwrap();
        assert_eq!(done.result, Some(json!({"ok": true})));
        assert!(s.assigned_tasks.is_empty());
        assert_eq!(s.completed_tasks.len(), 1);

        let err = s.complete_task("t1", "agent-a", json!(null)).unwrap_err();
        assert!(matches!(err, RuntimeError::TaskNotAssigned { .. }));
    }

    #[test]
    fn test_claim_unknown_task() {
        let mut s = swarm();
        let err = s.claim_task("missing", "a").unwrap_err();
        assert_eq!(err, RuntimeError::TaskNotFound("missing".into()));
    }

    #[test]
    fn test_duplicate_task_id_rejected() {
        let mut s = swarm();
        s.allocate_task(Some("t1".into()), json!(null)).unwrap();
        let err = s.allocate_task(Some("t1".into()), json!(null)).unwrap_err();
        assert_eq!(err, RuntimeError::DuplicateTask("t1".into()));
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let mut s = swarm();
        s.add_member("a");
        s.set_shared("k", json!([1, 2]));
        s.allocate_task(Some("t1".into()), json!(1)).unwrap();
        s.allocate_task(Some("t2".into()), json!(2)).unwrap();
        s.claim_task("t2", "a").unwrap();
        s.record_progress(7, &[0.5, 0.25], 0.3125, Direction::Minimize);

        let checkpoint = s.to_checkpoint();
        let mut fresh = Swarm::with_id(s.id, "fresh", s.algorithm.clone());
        fresh.apply_checkpoint(&checkpoint);

        assert_eq!(fresh.shared_state, s.shared_state);
        assert_eq!(fresh.pending_tasks, s.pending_tasks);
        assert_eq!(fresh.assigned_tasks, s.assigned_tasks);
        assert_eq!(fresh.completed_tasks, s.completed_tasks);
        assert_eq!(fresh.current_iteration, 7);
        assert_eq!(fresh.best_known_solution, s.best_known_solution);
    }

    #[test]
    fn test_record_progress_keeps_best() {
        let mut s = swarm();
        s.record_progress(1, &[1.0], 1.0, Direction::Minimize);
        s.record_progress(2, &[2.0], 4.0, Direction::Minimize);
        assert_eq!(s.current_iteration, 2);
        assert_eq!(s.best_known_solution.as_ref().unwrap().fitness, 1.0);
    }
}
