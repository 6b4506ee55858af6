pub mod candidate;
pub mod checkpoint;
pub mod config;
pub mod problem;
pub mod result;
pub mod swarm;

pub use candidate::{Candidate, ConstrainedFitness, Population};
pub use checkpoint::SwarmCheckpoint;
pub use config::{Config, FaultToleranceConfig, LoggingConfig, RuntimeConfig};
pub use problem::{Bound, Constraint, Direction, Objective, ProblemSpec, ProblemSpecBuilder};
pub use result::{OptimizationResult, ParetoPoint, TerminationReason};
pub use swarm::{
    BestSolution, Removal, RunSummary, Swarm, SwarmStatus, SwarmSummary, SwarmTask, LEADER_KEY,
};
