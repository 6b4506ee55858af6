//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - CheckpointStore: persistence of swarm checkpoints
//! - AgentDirectory: agent liveness lookups for the fault tolerance supervisor
//! - Authorizer: access checks applied by the command dispatcher
//!
//! These traits keep the runtime independent of specific infrastructure implementations.

pub mod agent_directory;
pub mod authorizer;
pub mod checkpoint_store;

pub use agent_directory::{AgentDirectory, AgentInfo, AgentStatus};
pub use authorizer::Authorizer;
pub use checkpoint_store::CheckpointStore;

#[cfg(test)]
pub use agent_directory::MockAgentDirectory;
