//! Service layer.
//!
//! - **swarm_runtime**: per-swarm actors driving optimization runs
//! - **fault_tolerance**: health checks, periodic checkpoints and recovery
//! - **event_bus**: broadcast of swarm notifications
//! - **command_bus**: the `{command, params, id}` request dispatcher

pub mod command_bus;
pub mod event_bus;
pub mod fault_tolerance;
pub mod swarm_runtime;

pub use command_bus::{
    CommandDispatcher, CommandEnvelope, CommandError, CommandRequest, CommandResponse,
    CommandSource, SwarmRequest,
};
pub use event_bus::{EventBus, EventBusConfig, EventPayload, SwarmNotification};
pub use fault_tolerance::{FaultToleranceSupervisor, HealthReport, RecoveryAction};
pub use swarm_runtime::{LeaderScorer, SwarmRuntime};
