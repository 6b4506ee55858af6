//! Optimization algorithm family.
//!
//! Every strategy implements [`OptimizationStrategy`]. Strategies are built
//! from a validated [`AlgorithmConfig`] and run synchronously; the runtime
//! moves them onto the blocking pool.

pub mod aco;
pub mod catalog;
pub(crate) mod common;
pub mod config;
pub mod constrained;
pub mod de;
pub mod ga;
pub mod gwo;
pub mod hybrid;
pub mod multi_objective;
pub mod pareto;
pub mod problems;
pub mod pso;
pub mod woa;

pub use catalog::{list_algorithms, AlgorithmDescriptor, ParameterSpec};
pub use config::AlgorithmConfig;

use crate::domain::models::{OptimizationResult, ProblemSpec};

/// State handed to the per-iteration callback.
#[derive(Debug)]
pub struct IterationSnapshot<'a> {
    /// 1-based number of the iteration just completed.
    pub iteration: usize,
    pub best_position: &'a [f64],
    pub best_fitness: f64,
    pub population: &'a [Vec<f64>],
}

/// Per-iteration observer. Returning `false` stops the run.
pub type IterationCallback<'a> = dyn FnMut(&IterationSnapshot<'_>) -> bool + Send + 'a;

/// Uniform contract of every algorithm.
pub trait OptimizationStrategy: Send + Sync {
    /// Fixed human-readable algorithm name.
    fn name(&self) -> &'static str;

    /// Run against `problem` until termination.
    fn optimize(
        &self,
        problem: &ProblemSpec,
        callback: Option<&mut IterationCallback<'_>>,
    ) -> OptimizationResult;
}
