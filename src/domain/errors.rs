//! Domain errors for the metaswarm system.

use thiserror::Error;
use uuid::Uuid;

use super::models::swarm::SwarmStatus;

/// Errors raised while constructing a problem or an algorithm configuration.
///
/// These never enter a run: every constructor validates up front.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid dimensions: {0}. Must be at least 1")]
    InvalidDimensions(usize),

    #[error("Bounds length {actual} does not match dimensions {expected}")]
    BoundsLengthMismatch { expected: usize, actual: usize },

    #[error("Invalid bounds for dimension {dimension}: min {min} must be finite and less than max {max}")]
    InvalidBounds { dimension: usize, min: f64, max: f64 },

    #[error("Problem must define at least one objective")]
    NoObjectives,

    #[error("Direction count {directions} does not match objective count {objectives}")]
    DirectionMismatch { objectives: usize, directions: usize },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Algorithm {algorithm} requires {requirement}")]
    UnsupportedProblem { algorithm: &'static str, requirement: String },
}

impl ConfigError {
    /// Shorthand for an out-of-range or otherwise invalid parameter.
    pub fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Errors returned by swarm runtime operations.
///
/// Not-found and state errors leave the swarm untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Swarm not found: {0}")]
    SwarmNotFound(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task {task_id} already claimed by {claimed_by}")]
    TaskAlreadyClaimed { task_id: String, claimed_by: String },

    #[error("Task {task_id} is not assigned to agent {agent_id}")]
    TaskNotAssigned { task_id: String, agent_id: String },

    #[error("Task id already in use: {0}")]
    DuplicateTask(String),

    #[error("Swarm {0} has no members")]
    NoMembers(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: SwarmStatus,
        to: SwarmStatus,
        reason: String,
    },

    #[error("No checkpoint found for swarm {0}")]
    CheckpointNotFound(Uuid),

    #[error("No problem registered for swarm {0}")]
    ProblemNotRegistered(Uuid),

    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Swarm {0} is not accepting commands")]
    ActorUnavailable(Uuid),

    #[error("Agent {agent_id} is not authorized to {action}")]
    Unauthorized { agent_id: String, action: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Checkpoint(err.to_string())
    }
}

/// Faults raised inside an optimization run.
///
/// Runs do not recover from these; they abort and the result reports the fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizationError {
    #[error("Objective {objective} returned NaN at {position:?}")]
    NanFitness { objective: usize, position: Vec<f64> },

    #[error("Constraint {constraint} returned NaN at {position:?}")]
    NanConstraint { constraint: usize, position: Vec<f64> },

    #[error("Invalid sampling weights: {0}")]
    InvalidWeights(String),
}
