//! Multi-objective hybrid DE/PSO.
//!
//! Runs the hybrid operators under Pareto dominance and keeps a bounded
//! archive of non-dominated points; PSO leaders come from the archive. A
//! scalarized mode instead folds the objectives into one and delegates to
//! the scalar hybrid.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{
    ensure_at_least, ensure_range, random_position, seeded_rng, Evaluator, RunTracker,
};
use super::hybrid::{de_trial, AdaptiveController, HybridConfig, HybridDePso};
use super::pareto::{dominates, ParetoArchive};
use super::pso::{initial_velocity, pso_move};
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{
    Direction, Objective, OptimizationResult, ParetoPoint, ProblemSpec, TerminationReason,
};

pub const NAME: &str = "Multi-Objective Hybrid DE/PSO";

/// Folding of several objectives into one minimized scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Scalarization {
    /// Weighted sum of the objectives, maximized ones negated. Weights are
    /// normalized to sum to one.
    WeightedSum { weights: Vec<f64> },
    /// Optimize `primary` while every other objective stays within its
    /// bound; the primary's own entry in `bounds` is ignored.
    EpsilonConstraint { primary: usize, bounds: Vec<f64> },
}

impl Scalarization {
    fn validate_for(&self, problem: &ProblemSpec) -> Result<(), ConfigError> {
        let objectives = problem.objective_count();
        let unsupported = |requirement: String| ConfigError::UnsupportedProblem {
            algorithm: NAME,
            requirement,
        };
        match self {
            Self::WeightedSum { weights } => {
                if weights.len() != objectives {
                    return Err(unsupported(format!(
                        "{} weights for {objectives} objectives",
                        weights.len()
                    )));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0)
                    || weights.iter().sum::<f64>() <= 0.0
                {
                    return Err(ConfigError::parameter(
                        "weights",
                        "weights must be non-negative with a positive sum",
                    ));
                }
            }
            Self::EpsilonConstraint { primary, bounds } => {
                if *primary >= objectives {
                    return Err(unsupported(format!(
                        "primary objective {primary} of {objectives}"
                    )));
                }
                if bounds.len() != objectives {
                    return Err(unsupported(format!(
                        "{} bounds for {objectives} objectives",
                        bounds.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Scalar minimized in place of the objective vector.
    pub fn scalarize(&self, values: &[f64], directions: &[Direction]) -> f64 {
        match self {
            Self::WeightedSum { weights } => {
                let total: f64 = weights.iter().sum();
                values
                    .iter()
                    .zip(directions)
                    .zip(weights)
                    .map(|((v, d), w)| (w / total) * d.to_minimization(*v))
                    .sum()
            }
            Self::EpsilonConstraint { primary, bounds } => {
                let violated = values.iter().zip(directions).zip(bounds).enumerate().any(
                    |(i, ((v, d), bound))| {
                        i != *primary
                            && match d {
                                Direction::Minimize => v > bound,
                                Direction::Maximize => v < bound,
                            }
                    },
                );
                if violated {
                    f64::INFINITY
                } else {
                    directions[*primary].to_minimization(values[*primary])
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoConfig {
    /// Operator, adaptation and termination settings.
    pub hybrid: HybridConfig,
    pub archive_size: usize,
    /// Probability that a leader tournament is decided by crowding distance.
    pub crowding_distance_weight: f64,
    /// Probability the first drawn member wins an undecided tournament.
    pub leader_selection_pressure: f64,
    pub scalarization: Option<Scalarization>,
}

impl Default for MoConfig {
    fn default() -> Self {
        Self {
            hybrid: HybridConfig::default(),
            archive_size: 100,
            crowding_distance_weight: 0.5,
            leader_selection_pressure: 0.7,
            scalarization: None,
        }
    }
}

impl MoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hybrid.validate()?;
        ensure_at_least("archive_size", self.archive_size, 1)?;
        ensure_range("crowding_distance_weight", self.crowding_distance_weight, 0.0, 1.0)?;
        ensure_range(
            "leader_selection_pressure",
            self.leader_selection_pressure,
            0.0,
            1.0,
        )?;
        Ok(())
    }

    pub fn validate_for(&self, problem: &ProblemSpec) -> Result<(), ConfigError> {
        match &self.scalarization {
            Some(scalarization) => scalarization.validate_for(problem),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultiObjectiveHybrid {
    config: MoConfig,
}

impl MultiObjectiveHybrid {
    pub fn new(config: MoConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    fn run(
        &self,
        problem: &ProblemSpec,
        archive: &mut ParetoArchive,
        evaluator: &mut Evaluator<'_>,
        tracker: &mut RunTracker,
        callback: &mut Option<&mut IterationCallback<'_>>,
    ) -> Result<TerminationReason, OptimizationError> {
        let cfg = &self.config.hybrid;
        let bounds = problem.bounds();
        let directions = problem.directions();
        let mut rng = seeded_rng(cfg.seed);
        let mut controller = AdaptiveController::new(cfg);

        let n = cfg.population_size;
        let mut positions = Vec::with_capacity(n);
        let mut objectives = Vec::with_capacity(n);
        let mut velocities = Vec::with_capacity(n);
        for _ in 0..n {
            let position = random_position(bounds, &mut rng);
            let values = evaluator.all(&position)?;
            archive.offer(&position, &values);
            positions.push(position);
            objectives.push(values);
            velocities.push(initial_velocity(bounds, &mut rng));
        }
        let mut personal_bests: Vec<(Vec<f64>, Vec<f64>)> = positions
            .iter()
            .cloned()
            .zip(objectives.iter().cloned())
            .collect();
        publish(archive, tracker);

        for t in 0..cfg.max_iterations {
            let snapshot = positions.clone();
            let coefficients = controller.coefficients(cfg);
            let mut changed = false;

            for i in 0..n {
                if controller.choose_de(&mut rng) {
                    let trial = de_trial(&snapshot, i, &controller, bounds, &mut rng);
                    let values = evaluator.all(&trial)?;
                    changed |= archive.offer(&trial, &values);
                    if dominates(&values, &objectives[i], directions) {
                        positions[i] = trial;
                        objectives[i] = values;
                    }
                } else {
                    let leader = archive
                        .select_leader(
                            self.config.crowding_distance_weight,
                            self.config.leader_selection_pressure,
                            &mut rng,
                        )
                        .map(|l| l.position.clone())
                        .unwrap_or_else(|| personal_bests[i].0.clone());
                    pso_move(
                        &mut positions[i],
                        &mut velocities[i],
                        &personal_bests[i].0,
                        &leader,
                        coefficients,
                        bounds,
                        &mut rng,
                    );
                    let values = evaluator.all(&positions[i])?;
                    changed |= archive.offer(&positions[i], &values);
                    objectives[i] = values;
                }

                let (_, best_values) = &personal_bests[i];
                let replace = if dominates(&objectives[i], best_values, directions) {
                    true
                } else if dominates(best_values, &objectives[i], directions) {
                    false
                } else {
                    rng.gen::<f64>() < 0.5
                };
                if replace {
                    personal_bests[i] = (positions[i].clone(), objectives[i].clone());
                }
            }

            publish(archive, tracker);
            controller.end_iteration(t + 1, !changed);

            if !tracker.close_iteration(callback, || positions.clone()) {
                return Ok(TerminationReason::Stopped);
            }
            if cfg.tolerance > 0.0 && !changed && archive.is_full() {
                return Ok(TerminationReason::Converged);
            }
        }
        Ok(TerminationReason::MaxIterations)
    }

    fn optimize_pareto(
        &self,
        problem: &ProblemSpec,
        mut callback: Option<&mut IterationCallback<'_>>,
    ) -> OptimizationResult {
        let mut archive =
            ParetoArchive::new(problem.directions().to_vec(), self.config.archive_size);
        let mut evaluator = Evaluator::new(problem);
        let mut tracker = RunTracker::new(problem.primary_direction());
        let outcome = self.run(problem, &mut archive, &mut evaluator, &mut tracker, &mut callback);
        tracing::debug!(
            algorithm = NAME,
            iterations = tracker.iterations(),
            front_size = archive.len(),
            "run finished"
        );

        let best_objectives = archive.best_on(0).map(|b| b.objectives.clone());
        let mut result = tracker.finish(NAME, evaluator.evaluations(), outcome);
        result.best_objectives = best_objectives;
        result.pareto_front = Some(archive.into_members());
        result
    }

    fn optimize_scalarized(
        &self,
        problem: &ProblemSpec,
        scalarization: &Scalarization,
        callback: Option<&mut IterationCallback<'_>>,
    ) -> OptimizationResult {
        if let Err(err) = scalarization.validate_for(problem) {
            return rejected(err);
        }

        let objectives: Vec<Objective> = problem.objectives().to_vec();
        let directions = problem.directions().to_vec();
        let folding = scalarization.clone();
        let scalar = problem.with_single_objective(Direction::Minimize, move |x: &[f64]| {
            let values: Vec<f64> = objectives.iter().map(|f| f(x)).collect();
            folding.scalarize(&values, &directions)
        });

        let inner = match HybridDePso::new(self.config.hybrid.clone()) {
            Ok(inner) => inner,
            Err(err) => return rejected(err),
        };
        let mut result = inner.optimize(&scalar, callback);
        let count = problem.objective_count();
        result.algorithm_name = NAME.to_string();
        result.evaluations *= count;

        if !result.best_position.is_empty() {
            let values: Vec<f64> = problem
                .objectives()
                .iter()
                .map(|f| f(&result.best_position))
                .collect();
            result.evaluations += count;
            result.pareto_front = Some(vec![ParetoPoint {
                position: result.best_position.clone(),
                objectives: values.clone(),
                crowding_distance: f64::INFINITY,
            }]);
            result.best_objectives = Some(values);
        } else {
            result.pareto_front = Some(Vec::new());
        }
        result
    }
}

fn publish(archive: &ParetoArchive, tracker: &mut RunTracker) {
    if let Some(best) = archive.best_on(0) {
        tracker.set_best(&best.position, best.objectives[0]);
    }
}

fn rejected(err: ConfigError) -> OptimizationResult {
    OptimizationResult {
        best_position: Vec::new(),
        best_fitness: f64::INFINITY,
        convergence_curve: Vec::new(),
        iterations: 0,
        evaluations: 0,
        algorithm_name: NAME.to_string(),
        success: false,
        message: err.to_string(),
        termination: TerminationReason::NumericalError,
        constraint_violation: None,
        best_objectives: None,
        pareto_front: None,
    }
}

impl OptimizationStrategy for MultiObjectiveHybrid {
    fn name(&self) -> &'static str {
        NAME
    }

    fn optimize(
        &self,
        problem: &ProblemSpec,
        callback: Option<&mut IterationCallback<'_>>,
    ) -> OptimizationResult {
        match &self.config.scalarization {
            Some(scalarization) => self.optimize_scalarized(problem, scalarization, callback),
            None => self.optimize_pareto(problem, callback),
        }
    }
}
