//! metaswarm - metaheuristic optimization with coordinated swarms
//!
//! A family of population-based optimizers (DE, PSO, GA, ACO, GWO, WOA and
//! hybrid DE/PSO variants for multi-objective and constrained problems)
//! behind one strategy trait, plus a runtime that drives them inside
//! long-lived swarms of cooperating agents.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Optimization** (`optimization`): the algorithms and their configuration
//! - **Service Layer** (`services`): swarm runtime, fault tolerance, events, command dispatch
//! - **Infrastructure Layer** (`infrastructure`): checkpoint stores, agent directory, config, logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use metaswarm::optimization::problems::ProblemRequest;
//! use metaswarm::optimization::{AlgorithmConfig, OptimizationStrategy};
//!
//! let problem = ProblemRequest::new("sphere", 2).build()?;
//! let strategy = AlgorithmConfig::default_for("differential_evolution")
//!     .expect("known id")
//!     .build()?;
//! let result = strategy.optimize(&problem, None);
//! println!("{} -> {}", result.algorithm_name, result.best_fitness);
//! # Ok::<(), metaswarm::domain::ConfigError>(())
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod optimization;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ConfigError, OptimizationError, RuntimeError, RuntimeResult};
pub use domain::models::{
    Config, Direction, OptimizationResult, ProblemSpec, Swarm, SwarmStatus, SwarmSummary,
};
pub use infrastructure::config::ConfigLoader;
pub use optimization::{list_algorithms, AlgorithmConfig, OptimizationStrategy};
pub use services::{CommandDispatcher, FaultToleranceSupervisor, SwarmRuntime};
