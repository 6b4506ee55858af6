//! Optimization result produced once per run.

use serde::{Deserialize, Serialize};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Convergence criterion met.
    Converged,
    /// `max_iterations` reached.
    MaxIterations,
    /// The iteration callback asked to stop.
    Stopped,
    /// A NaN objective or constraint value aborted the run.
    NumericalError,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::MaxIterations => "max_iterations",
            Self::Stopped => "stopped",
            Self::NumericalError => "numerical_error",
        }
    }
}

/// One member of a Pareto front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoPoint {
    pub position: Vec<f64>,
    pub objectives: Vec<f64>,
    pub crowding_distance: f64,
}

/// Outcome of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub best_position: Vec<f64>,
    pub best_fitness: f64,
    /// Best fitness after each executed iteration.
    pub convergence_curve: Vec<f64>,
    pub iterations: usize,
    pub evaluations: usize,
    pub algorithm_name: String,
    pub success: bool,
    pub message: String,
    pub termination: TerminationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_violation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_objectives: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pareto_front: Option<Vec<ParetoPoint>>,
}

impl OptimizationResult {
    pub fn converged(&self) -> bool {
        self.termination == TerminationReason::Converged
    }
}
