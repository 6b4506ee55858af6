//! Constrained hybrid DE/PSO.
//!
//! Reuses the hybrid loop with a constraint-aware comparator. A run only
//! counts as successful when its final incumbent is feasible.

use serde::{Deserialize, Serialize};

use super::common::{ensure_positive, ensure_range, Evaluator, RunTracker};
use super::hybrid::{run_hybrid, HybridConfig, Selection};
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{ConstrainedFitness, Direction, OptimizationResult, ProblemSpec};

pub const NAME: &str = "Constrained Hybrid DE/PSO";

/// How constrained candidates are compared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ConstraintHandler {
    /// Fitness worsened by `factor * violation^exponent`.
    Penalty {
        #[serde(default = "default_penalty_factor")]
        factor: f64,
        #[serde(default = "default_penalty_exponent")]
        exponent: f64,
        /// Grow the factor linearly up to `factor * max_multiplier`.
        #[serde(default)]
        adaptive: bool,
        #[serde(default = "default_max_multiplier")]
        max_multiplier: f64,
    },
    /// Feasible beats infeasible; feasible pairs compare fitness; infeasible
    /// pairs compare violation.
    #[default]
    FeasibilityRules,
}

const fn default_penalty_factor() -> f64 {
    1000.0
}

const fn default_penalty_exponent() -> f64 {
    2.0
}

const fn default_max_multiplier() -> f64 {
    10.0
}

impl ConstraintHandler {
    pub fn penalty(factor: f64) -> Self {
        Self::Penalty {
            factor,
            exponent: default_penalty_exponent(),
            adaptive: false,
            max_multiplier: default_max_multiplier(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Self::Penalty {
            factor,
            exponent,
            max_multiplier,
            ..
        } = self
        {
            ensure_positive("penalty_factor", *factor)?;
            ensure_positive("penalty_exponent", *exponent)?;
            ensure_range("max_multiplier", *max_multiplier, 1.0, f64::MAX)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstrainedConfig {
    pub hybrid: HybridConfig,
    pub handler: ConstraintHandler,
}

impl ConstrainedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hybrid.validate()?;
        self.handler.validate()
    }
}

/// Comparator substituted into the hybrid loop.
#[derive(Debug, Clone)]
pub(crate) struct ConstrainedSelection {
    direction: Direction,
    handler: ConstraintHandler,
    factor: f64,
}

impl ConstrainedSelection {
    pub(crate) fn new(direction: Direction, handler: ConstraintHandler) -> Self {
        let factor = match &handler {
            ConstraintHandler::Penalty { factor, .. } => *factor,
            ConstraintHandler::FeasibilityRules => 0.0,
        };
        Self {
            direction,
            handler,
            factor,
        }
    }

    fn penalized(&self, fitness: &ConstrainedFitness, exponent: f64) -> f64 {
        let penalty = self.factor * fitness.violation.powf(exponent);
        match self.direction {
            Direction::Minimize => fitness.fitness + penalty,
            Direction::Maximize => fitness.fitness - penalty,
        }
    }
}

impl Selection for ConstrainedSelection {
    type Fitness = ConstrainedFitness;

    fn evaluate(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        position: &[f64],
    ) -> Result<ConstrainedFitness, OptimizationError> {
        let fitness = evaluator.primary(position)?;
        let violation = evaluator.violation(position)?;
        Ok(ConstrainedFitness { fitness, violation })
    }

    fn is_better(&self, candidate: &ConstrainedFitness, incumbent: &ConstrainedFitness) -> bool {
        match &self.handler {
            ConstraintHandler::Penalty { exponent, .. } => self.direction.is_better(
                self.penalized(candidate, *exponent),
                self.penalized(incumbent, *exponent),
            ),
            ConstraintHandler::FeasibilityRules => {
                match (candidate.is_feasible(), incumbent.is_feasible()) {
                    (true, true) => self.direction.is_better(candidate.fitness, incumbent.fitness),
                    (true, false) => true,
                    (false, true) => false,
                    (false, false) => candidate.violation < incumbent.violation,
                }
            }
        }
    }

    fn scalar(&self, fitness: &ConstrainedFitness) -> f64 {
        fitness.fitness
    }

    fn begin_iteration(&mut self, iteration: usize, max_iterations: usize) {
        if let ConstraintHandler::Penalty {
            factor,
            adaptive: true,
            max_multiplier,
            ..
        } = &self.handler
        {
            let progress = if max_iterations > 1 {
                iteration as f64 / (max_iterations - 1) as f64
            } else {
                1.0
            };
            self.factor = factor * (1.0 + (max_multiplier - 1.0) * progress.min(1.0));
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstrainedHybrid {
    config: ConstrainedConfig,
}

impl ConstrainedHybrid {
    pub fn new(config: ConstrainedConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl OptimizationStrategy for ConstrainedHybrid {
    fn name(&self) -> &'static str {
        NAME
    }

    fn optimize(
        &self,
        problem: &ProblemSpec,
        mut callback: Option<&mut IterationCallback<'_>>,
    ) -> OptimizationResult {
        let direction = problem.primary_direction();
        let mut selection = ConstrainedSelection::new(direction, self.config.handler.clone());
        let mut evaluator = Evaluator::new(problem);
        let mut tracker = RunTracker::new(direction);
        let mut best = None;
        let outcome = run_hybrid(
            &self.config.hybrid,
            &mut selection,
            problem,
            &mut evaluator,
            &mut tracker,
            &mut callback,
            &mut best,
        );

        let mut result = tracker.finish(NAME, evaluator.evaluations(), outcome);
        let violation = best.as_ref().map(|b| b.fitness.violation);
        result.constraint_violation = violation;
        if result.success {
            if let Some(v) = violation.filter(|v| *v > 0.0) {
                result.success = false;
                result.message = format!(
                    "{}; no feasible solution found (violation {v})",
                    result.message
                );
            }
        }
        tracing::debug!(
            algorithm = NAME,
            success = result.success,
            violation = ?result.constraint_violation,
            "run finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(fitness: f64, violation: f64) -> ConstrainedFitness {
        ConstrainedFitness { fitness, violation }
    }

    /// minimize x^2 + y^2 subject to x + y >= 1
    fn half_plane() -> ProblemSpec {
        ProblemSpec::builder(2)
            .uniform_bounds(-2.0, 2.0)
            .objective(Direction::Minimize, |x: &[f64]| x[0] * x[0] + x[1] * x[1])
            .constraint(|x: &[f64]| 1.0 - x[0] - x[1])
            .build()
            .unwrap()
    }

    fn hybrid() -> HybridConfig {
        HybridConfig {
            population_size: 30,
            max_iterations: 80,
            tolerance: 0.0,
            seed: Some(12),
            ..HybridConfig::default()
        }
    }

    #[test]
    fn test_feasibility_rules_ordering() {
        let rules =
            ConstrainedSelection::new(Direction::Minimize, ConstraintHandler::FeasibilityRules);
        assert!(rules.is_better(&fit(100.0, 0.0), &fit(-100.0, 0.1)));
        assert!(!rules.is_better(&fit(-100.0, 0.1), &fit(100.0, 0.0)));
        assert!(rules.is_better(&fit(1.0, 0.0), &fit(2.0, 0.0)));
        assert!(rules.is_better(&fit(9.0, 0.2), &fit(1.0, 0.5)));
        assert!(!rules.is_better(&fit(1.0, 0.0), &fit(1.0, 0.0)));
    }

    #[test]
    fn test_penalty_sign_follows_direction() {
        let min = ConstrainedSelection::new(Direction::Minimize, ConstraintHandler::penalty(10.0));
        assert!(min.is_better(&fit(5.0, 0.0), &fit(1.0, 1.0)));
        let max = ConstrainedSelection::new(Direction::Maximize, ConstraintHandler::penalty(10.0));
        assert!(max.is_better(&fit(1.0, 0.0), &fit(5.0, 1.0)));
    }

    #[test]
    fn test_adaptive_penalty_grows_linearly() {
        let handler = ConstraintHandler::Penalty {
            factor: 2.0,
            exponent: 1.0,
            adaptive: true,
            max_multiplier: 5.0,
        };
        let mut selection = ConstrainedSelection::new(Direction::Minimize, handler);
        selection.begin_iteration(0, 11);
        assert_eq!(selection.factor, 2.0);
        selection.begin_iteration(5, 11);
        assert!((selection.factor - 6.0).abs() < 1e-12);
        selection.begin_iteration(10, 11);
        assert!((selection.factor - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_feasibility_rules_reach_feasible_optimum() {
        let constrained = ConstrainedHybrid::new(ConstrainedConfig {
            hybrid: hybrid(),
            handler: ConstraintHandler::FeasibilityRules,
        })
        .unwrap();
        let result = constrained.optimize(&half_plane(), None);
        assert!(result.success, "{}", result.message);
        assert_eq!(result.constraint_violation, Some(0.0));
        assert!(result.best_fitness < 0.6, "best {}", result.best_fitness);
        assert!(result.best_position[0] + result.best_position[1] >= 1.0);
        // constraint calls are not objective evaluations
        assert_eq!(result.evaluations, 30 * 81);
    }

    #[test]
    fn test_infeasible_problem_is_not_success() {
        let impossible = ProblemSpec::builder(1)
            .uniform_bounds(0.0, 1.0)
            .objective(Direction::Minimize, |x: &[f64]| x[0])
            .constraint(|x: &[f64]| 2.0 - x[0])
            .build()
            .unwrap();
        let constrained = ConstrainedHybrid::new(ConstrainedConfig {
            hybrid: HybridConfig {
                max_iterations: 10,
                ..hybrid()
            },
            handler: ConstraintHandler::FeasibilityRules,
        })
        .unwrap();
        let result = constrained.optimize(&impossible, None);
        assert!(!result.success);
        assert!(result.constraint_violation.unwrap() > 0.0);
    }
}
