//! Particle Swarm Optimization.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{
    clamp_position, ensure_at_least, ensure_positive, ensure_range, random_position, seeded_rng,
    Evaluator, RunTracker,
};
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{
    Bound, Candidate, OptimizationResult, Population, ProblemSpec, TerminationReason,
};

pub const NAME: &str = "Particle Swarm Optimization";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsoConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    /// Inertia weight `w`.
    pub inertia_weight: f64,
    /// Cognitive coefficient `c1`.
    pub cognitive_coefficient: f64,
    /// Social coefficient `c2`.
    pub social_coefficient: f64,
    pub seed: Option<u64>,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_iterations: 1000,
            inertia_weight: 0.729,
            cognitive_coefficient: 1.49445,
            social_coefficient: 1.49445,
            seed: None,
        }
    }
}

impl PsoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_at_least("population_size", self.population_size, 2)?;
        ensure_at_least("max_iterations", self.max_iterations, 1)?;
        ensure_range("inertia_weight", self.inertia_weight, 0.0, 2.0)?;
        ensure_positive("cognitive_coefficient", self.cognitive_coefficient)?;
        ensure_positive("social_coefficient", self.social_coefficient)?;
        Ok(())
    }
}

/// Initial velocity, uniform in `±0.1 * width` per dimension.
pub(crate) fn initial_velocity<R: Rng>(bounds: &[Bound], rng: &mut R) -> Vec<f64> {
    bounds
        .iter()
        .map(|b| {
            let span = 0.1 * b.width();
            rng.gen_range(-span..=span)
        })
        .collect()
}

/// Coefficients of one velocity update.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Coefficients {
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
}

/// Velocity and position update for one particle, clamped to the bounds.
pub(crate) fn pso_move<R: Rng>(
    position: &mut [f64],
    velocity: &mut [f64],
    personal_best: &[f64],
    global_best: &[f64],
    coefficients: Coefficients,
    bounds: &[Bound],
    rng: &mut R,
) {
    for d in 0..position.len() {
        let r1: f64 = rng.gen();
        let r2: f64 = rng.gen();
        velocity[d] = coefficients.inertia * velocity[d]
            + coefficients.cognitive * r1 * (personal_best[d] - position[d])
            + coefficients.social * r2 * (global_best[d] - position[d]);
        position[d] += velocity[d];
    }
    clamp_position(bounds, position);
}

#[derive(Debug, Clone)]
pub struct ParticleSwarm {
    config: PsoConfig,
}

impl ParticleSwarm {
    pub fn new(config: PsoConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    fn run(
        &self,
        problem: &ProblemSpec,
        evaluator: &mut Evaluator<'_>,
        tracker: &mut RunTracker,
        callback: &mut Option<&mut IterationCallback<'_>>,
    ) -> Result<TerminationReason, OptimizationError> {
        let cfg = &self.config;
        let bounds = problem.bounds();
        let direction = problem.primary_direction();
        let mut rng = seeded_rng(cfg.seed);

        let mut members = Vec::with_capacity(cfg.population_size);
        let mut velocities = Vec::with_capacity(cfg.population_size);
        for _ in 0..cfg.population_size {
            let position = random_position(bounds, &mut rng);
            let fitness = evaluator.primary(&position)?;
            tracker.offer(&position, fitness);
            members.push(Candidate::new(position, fitness));
            velocities.push(initial_velocity(bounds, &mut rng));
        }
        let mut swarm = Population::new(members, velocities);
        let coefficients = Coefficients {
            inertia: cfg.inertia_weight,
            cognitive: cfg.cognitive_coefficient,
            social: cfg.social_coefficient,
        };

        for _ in 0..cfg.max_iterations {
            for i in 0..swarm.len() {
                let global_best = tracker.best_position().to_vec();
                let Population {
                    members,
                    velocities,
                    personal_bests,
                } = &mut swarm;
                let particle = &mut members[i];
                pso_move(
                    &mut particle.position,
                    &mut velocities[i],
                    &personal_bests[i].position,
                    &global_best,
                    coefficients,
                    bounds,
                    &mut rng,
                );
                particle.fitness = evaluator.primary(&particle.position)?;
                if direction.is_better(particle.fitness, personal_bests[i].fitness) {
                    personal_bests[i] = particle.clone();
                }
                tracker.offer(&particle.position, particle.fitness);
            }

            if !tracker.close_iteration(callback, || swarm.positions()) {
                return Ok(TerminationReason::Stopped);
            }
        }
        Ok(TerminationReason::MaxIterations)
    }
}

impl OptimizationStrategy for ParticleSwarm {
    fn name(&self) -> &'static str {
        NAME
    }

    fn optimize(
        &self,
        problem: &ProblemSpec,
        mut callback: Option<&mut IterationCallback<'_>>,
    ) -> OptimizationResult {
        let mut evaluator = Evaluator::new(problem);
        let mut tracker = RunTracker::new(problem.primary_direction());
        let outcome = self.run(problem, &mut evaluator, &mut tracker, &mut callback);
        tracker.finish(NAME, evaluator.evaluations(), outcome)
    }
}
