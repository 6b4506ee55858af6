//! Hybrid adaptive DE/PSO.
//!
//! Each individual takes either a DE step (greedy acceptance) or a PSO step
//! (unconditional) per iteration. With adaptive control on, the inertia
//! weight decays, `F`/`CR` follow the convergence signal, and the DE share
//! drifts toward whichever operator was chosen more often.
//!
//! Comparisons go through [`Selection`] so the constrained variant can swap
//! in its comparator without duplicating the loop.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{
    clamp_position, ensure_at_least, ensure_positive, ensure_range, random_position, seeded_rng,
    Evaluator, RunTracker,
};
use super::de::{binomial_crossover, mutate, DeStrategy};
use super::pso::{initial_velocity, pso_move, Coefficients};
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{
    Bound, Candidate, Direction, OptimizationResult, Population, ProblemSpec, TerminationReason,
};

pub const NAME: &str = "Hybrid DE/PSO";

/// Inertia floor of the linear decay.
const FINAL_INERTIA: f64 = 0.4;
/// Step applied to `F`, `CR` and the DE share.
const ADAPT_STEP: f64 = 0.05;
/// Iterations between DE-share re-evaluations.
const RATIO_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    pub mutation_factor: f64,
    pub crossover_rate: f64,
    pub inertia_weight: f64,
    pub cognitive_coefficient: f64,
    pub social_coefficient: f64,
    /// Probability of a DE step per individual per iteration.
    pub hybrid_ratio: f64,
    pub adaptive: bool,
    /// Best-fitness change below which an iteration counts as converging.
    /// Zero disables the convergence stop.
    pub tolerance: f64,
    /// Consecutive converging iterations that end the run.
    pub convergence_patience: usize,
    pub seed: Option<u64>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            population_size: 40,
            max_iterations: 1000,
            mutation_factor: 0.8,
            crossover_rate: 0.9,
            inertia_weight: 0.7,
            cognitive_coefficient: 1.5,
            social_coefficient: 1.5,
            hybrid_ratio: 0.5,
            adaptive: true,
            tolerance: 1e-8,
            convergence_patience: 1,
            seed: None,
        }
    }
}

impl HybridConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_at_least(
            "population_size",
            self.population_size,
            DeStrategy::Rand1.min_population(),
        )?;
        ensure_at_least("max_iterations", self.max_iterations, 1)?;
        ensure_range("mutation_factor", self.mutation_factor, 0.0, 2.0)?;
        ensure_range("crossover_rate", self.crossover_rate, 0.0, 1.0)?;
        ensure_range("inertia_weight", self.inertia_weight, 0.0, 2.0)?;
        ensure_positive("cognitive_coefficient", self.cognitive_coefficient)?;
        ensure_positive("social_coefficient", self.social_coefficient)?;
        ensure_range("hybrid_ratio", self.hybrid_ratio, 0.0, 1.0)?;
        ensure_range("tolerance", self.tolerance, 0.0, f64::MAX)?;
        ensure_at_least("convergence_patience", self.convergence_patience, 1)?;
        Ok(())
    }
}

/// Live operator parameters of one run.
#[derive(Debug, Clone)]
pub(crate) struct AdaptiveController {
    enabled: bool,
    max_iterations: usize,
    initial_inertia: f64,
    pub mutation_factor: f64,
    pub crossover_rate: f64,
    pub inertia: f64,
    pub hybrid_ratio: f64,
    de_selected: usize,
    pso_selected: usize,
}

impl AdaptiveController {
    pub(crate) fn new(config: &HybridConfig) -> Self {
        Self {
            enabled: config.adaptive,
            max_iterations: config.max_iterations,
            initial_inertia: config.inertia_weight,
            mutation_factor: config.mutation_factor,
            crossover_rate: config.crossover_rate,
            inertia: config.inertia_weight,
            hybrid_ratio: config.hybrid_ratio,
            de_selected: 0,
            pso_selected: 0,
        }
    }

    /// Draw the operator for one individual; `true` means DE.
    pub(crate) fn choose_de<R: Rng>(&mut self, rng: &mut R) -> bool {
        let de = rng.gen::<f64>() < self.hybrid_ratio;
        if de {
            self.de_selected += 1;
        } else {
            self.pso_selected += 1;
        }
        de
    }

    pub(crate) fn coefficients(&self, config: &HybridConfig) -> Coefficients {
        Coefficients {
            inertia: self.inertia,
            cognitive: config.cognitive_coefficient,
            social: config.social_coefficient,
        }
    }

    /// Adapt after the 1-based `iteration` completed.
    pub(crate) fn end_iteration(&mut self, iteration: usize, converging: bool) {
        if !self.enabled {
            return;
        }
        let progress = iteration as f64 / self.max_iterations as f64;
        self.inertia = self.initial_inertia - (self.initial_inertia - FINAL_INERTIA) * progress;

        if converging {
            self.mutation_factor = (self.mutation_factor + ADAPT_STEP).min(1.0);
            self.crossover_rate = (self.crossover_rate - ADAPT_STEP).max(0.1);
        } else {
            self.mutation_factor = (self.mutation_factor - ADAPT_STEP).max(0.1);
            self.crossover_rate = (self.crossover_rate + ADAPT_STEP).min(1.0);
        }

        if iteration % RATIO_WINDOW == 0 {
            if self.de_selected > self.pso_selected {
                self.hybrid_ratio += ADAPT_STEP;
            } else if self.pso_selected > self.de_selected {
                self.hybrid_ratio -= ADAPT_STEP;
            }
            self.hybrid_ratio = self.hybrid_ratio.clamp(0.1, 0.9);
            self.de_selected = 0;
            self.pso_selected = 0;
        }
    }
}

/// DE/rand/1/bin trial for individual `i`.
pub(crate) fn de_trial<R: Rng>(
    positions: &[Vec<f64>],
    i: usize,
    controller: &AdaptiveController,
    bounds: &[Bound],
    rng: &mut R,
) -> Vec<f64> {
    let mutant = mutate(
        DeStrategy::Rand1,
        positions,
        i,
        i,
        controller.mutation_factor,
        rng,
    );
    let mut trial = binomial_crossover(&positions[i], &mutant, controller.crossover_rate, rng);
    clamp_position(bounds, &mut trial);
    trial
}

/// Fitness evaluation and comparison used by the hybrid loop.
pub(crate) trait Selection {
    type Fitness: Clone;

    /// Evaluate one position.
    fn evaluate(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        position: &[f64],
    ) -> Result<Self::Fitness, OptimizationError>;

    /// Strictly better; ties keep the incumbent.
    fn is_better(&self, candidate: &Self::Fitness, incumbent: &Self::Fitness) -> bool;

    /// Value recorded in the convergence curve.
    fn scalar(&self, fitness: &Self::Fitness) -> f64;

    /// Hook called before the 0-based `iteration` starts.
    fn begin_iteration(&mut self, _iteration: usize, _max_iterations: usize) {}
}

/// Plain single-objective comparison under one direction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScalarSelection {
    pub direction: Direction,
}

impl Selection for ScalarSelection {
    type Fitness = f64;

    fn evaluate(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        position: &[f64],
    ) -> Result<f64, OptimizationError> {
        evaluator.primary(position)
    }

    fn is_better(&self, candidate: &f64, incumbent: &f64) -> bool {
        self.direction.is_better(*candidate, *incumbent)
    }

    fn scalar(&self, fitness: &f64) -> f64 {
        *fitness
    }
}

/// The shared DE/PSO loop. The global best is left in `best`.
pub(crate) fn run_hybrid<S: Selection>(
    config: &HybridConfig,
    selection: &mut S,
    problem: &ProblemSpec,
    evaluator: &mut Evaluator<'_>,
    tracker: &mut RunTracker,
    callback: &mut Option<&mut IterationCallback<'_>>,
    best: &mut Option<Candidate<S::Fitness>>,
) -> Result<TerminationReason, OptimizationError> {
    let bounds = problem.bounds();
    let mut rng = seeded_rng(config.seed);
    let mut controller = AdaptiveController::new(config);

    selection.begin_iteration(0, config.max_iterations);
    let mut members = Vec::with_capacity(config.population_size);
    let mut velocities = Vec::with_capacity(config.population_size);
    for _ in 0..config.population_size {
        let position = random_position(bounds, &mut rng);
        let fitness = selection.evaluate(evaluator, &position)?;
        let candidate = Candidate::new(position, fitness);
        promote(selection, best, &candidate);
        members.push(candidate);
        velocities.push(initial_velocity(bounds, &mut rng));
    }
    let mut population = Population::new(members, velocities);
    publish(selection, tracker, best);
    let mut previous = tracker.best_fitness();
    let mut stalled = 0;

    for t in 0..config.max_iterations {
        selection.begin_iteration(t, config.max_iterations);
        let positions = population.positions();
        let coefficients = controller.coefficients(config);
        let global = match best.as_ref() {
            Some(b) => b.position.clone(),
            None => positions[0].clone(),
        };

        for i in 0..population.len() {
            if controller.choose_de(&mut rng) {
                let trial = de_trial(&positions, i, &controller, bounds, &mut rng);
                let fitness = selection.evaluate(evaluator, &trial)?;
                if selection.is_better(&fitness, &population.members[i].fitness) {
                    population.members[i] = Candidate::new(trial, fitness);
                }
            } else {
                let Population {
                    members,
                    velocities,
                    personal_bests,
                } = &mut population;
                let particle = &mut members[i];
                pso_move(
                    &mut particle.position,
                    &mut velocities[i],
                    &personal_bests[i].position,
                    &global,
                    coefficients,
                    bounds,
                    &mut rng,
                );
                particle.fitness = selection.evaluate(evaluator, &particle.position)?;
            }
        }

        for i in 0..population.len() {
            let current = &population.members[i];
            if selection.is_better(&current.fitness, &population.personal_bests[i].fitness) {
                population.personal_bests[i] = current.clone();
            }
            promote(selection, best, current);
        }
        publish(selection, tracker, best);

        let current = tracker.best_fitness();
        let converging = (current - previous).abs() < config.tolerance;
        previous = current;
        controller.end_iteration(t + 1, converging);
        stalled = if converging { stalled + 1 } else { 0 };

        if !tracker.close_iteration(callback, || population.positions()) {
            return Ok(TerminationReason::Stopped);
        }
        if config.tolerance > 0.0 && stalled >= config.convergence_patience {
            return Ok(TerminationReason::Converged);
        }
    }
    Ok(TerminationReason::MaxIterations)
}

fn promote<S: Selection>(
    selection: &S,
    best: &mut Option<Candidate<S::Fitness>>,
    candidate: &Candidate<S::Fitness>,
) {
    let replace = match best.as_ref() {
        Some(incumbent) => selection.is_better(&candidate.fitness, &incumbent.fitness),
        None => true,
    };
    if replace {
        *best = Some(candidate.clone());
    }
}

fn publish<S: Selection>(
    selection: &S,
    tracker: &mut RunTracker,
    best: &Option<Candidate<S::Fitness>>,
) {
    if let Some(b) = best {
        tracker.set_best(&b.position, selection.scalar(&b.fitness));
    }
}

#[derive(Debug, Clone)]
pub struct HybridDePso {
    config: HybridConfig,
}

impl HybridDePso {
    pub fn new(config: HybridConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }
}

impl OptimizationStrategy for HybridDePso {
    fn name(&self) -> &'static str {
        NAME
    }

    fn optimize(
        &self,
        problem: &ProblemSpec,
        mut callback: Option<&mut IterationCallback<'_>>,
    ) -> OptimizationResult {
        let direction = problem.primary_direction();
        let mut selection = ScalarSelection { direction };
        let mut evaluator = Evaluator::new(problem);
        let mut tracker = RunTracker::new(direction);
        let mut best = None;
        let outcome = run_hybrid(
            &self.config,
            &mut selection,
            problem,
            &mut evaluator,
            &mut tracker,
            &mut callback,
            &mut best,
        );
        tracing::debug!(
            algorithm = NAME,
            iterations = tracker.iterations(),
            best_fitness = tracker.best_fitness(),
            "run finished"
        );
        tracker.finish(NAME, evaluator.evaluations(), outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(dimensions: usize) -> ProblemSpec {
        ProblemSpec::uniform(dimensions, -5.0, 5.0, Direction::Minimize, |x: &[f64]| {
            x.iter().map(|v| v * v).sum()
        })
        .unwrap()
    }

    #[test]
    fn test_controller_nudges_parameters() {
        let config = HybridConfig {
            max_iterations: 100,
            ..HybridConfig::default()
        };
        let mut controller = AdaptiveController::new(&config);
        controller.end_iteration(1, true);
        assert!((controller.mutation_factor - 0.85).abs() < 1e-12);
        assert!((controller.crossover_rate - 0.85).abs() < 1e-12);
        controller.end_iteration(2, false);
        assert!((controller.mutation_factor - 0.8).abs() < 1e-12);
        assert!((controller.crossover_rate - 0.9).abs() < 1e-12);
        assert!((controller.inertia - (0.7 - 0.3 * 0.02)).abs() < 1e-12);
    }

    #[test]
    fn test_controller_caps_and_floors() {
        let config = HybridConfig {
            mutation_factor: 0.98,
            crossover_rate: 0.12,
            ..HybridConfig::default()
        };
        let mut controller = AdaptiveController::new(&config);
        controller.end_iteration(1, true);
        assert_eq!(controller.mutation_factor, 1.0);
        assert_eq!(controller.crossover_rate, 0.1);
    }

    #[test]
    fn test_ratio_moves_toward_dominant_operator() {
        let config = HybridConfig {
            hybrid_ratio: 0.88,
            ..HybridConfig::default()
        };
        let mut controller = AdaptiveController::new(&config);
        controller.de_selected = 7;
        controller.pso_selected = 3;
        controller.end_iteration(10, false);
        assert_eq!(controller.hybrid_ratio, 0.9);
        assert_eq!(controller.de_selected, 0);

        controller.pso_selected = 4;
        controller.end_iteration(20, false);
        assert!((controller.hybrid_ratio - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_disabled_controller_is_inert() {
        let config = HybridConfig {
            adaptive: false,
            ..HybridConfig::default()
        };
        let mut controller = AdaptiveController::new(&config);
        controller.end_iteration(10, true);
        assert_eq!(controller.mutation_factor, config.mutation_factor);
        assert_eq!(controller.inertia, config.inertia_weight);
        assert_eq!(controller.hybrid_ratio, config.hybrid_ratio);
    }

    #[test]
    fn test_runs_full_budget_without_tolerance() {
        let hybrid = HybridDePso::new(HybridConfig {
            population_size: 20,
            max_iterations: 60,
            tolerance: 0.0,
            seed: Some(4),
            ..HybridConfig::default()
        })
        .unwrap();
        let result = hybrid.optimize(&sphere(3), None);
        assert!(result.success);
        assert_eq!(result.termination, TerminationReason::MaxIterations);
        assert_eq!(result.convergence_curve.len(), 60);
        assert_eq!(result.evaluations, 20 * 61);
        assert!(result.convergence_curve.windows(2).all(|w| w[1] <= w[0]));
        assert!(result.best_fitness < 0.1, "best {}", result.best_fitness);
    }

    #[test]
    fn test_stagnation_converges() {
        let flat = ProblemSpec::uniform(2, -1.0, 1.0, Direction::Minimize, |_: &[f64]| 1.0)
            .unwrap();
        let hybrid = HybridDePso::new(HybridConfig {
            population_size: 10,
            max_iterations: 50,
            convergence_patience: 3,
            seed: Some(1),
            ..HybridConfig::default()
        })
        .unwrap();
        let result = hybrid.optimize(&flat, None);
        assert!(result.converged());
        assert_eq!(result.iterations, 3);
    }
}
