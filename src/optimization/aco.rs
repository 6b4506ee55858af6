//! Continuous Ant Colony Optimization (ACO_R).
//!
//! A fitness-sorted solution archive stands in for the pheromone table. Each
//! ant picks a guide by rank weight and samples every coordinate from a
//! Gaussian centred on it, with a spread proportional to the archive's
//! mean distance from the guide in that coordinate.

use std::f64::consts::PI;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::common::{
    clamp_position, ensure_at_least, ensure_positive, random_position, rank, seeded_rng,
    Evaluator, RunTracker,
};
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{Candidate, Direction, OptimizationResult, ProblemSpec, TerminationReason};

pub const NAME: &str = "Ant Colony Optimization";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcoConfig {
    /// Solution archive size `k`.
    pub archive_size: usize,
    /// Samples drawn per iteration.
    pub ants: usize,
    pub max_iterations: usize,
    /// Locality of the rank weighting; small values favour the best members.
    pub q: f64,
    /// Pheromone evaporation analogue scaling the sampling spread.
    pub xi: f64,
    pub seed: Option<u64>,
}

impl Default for AcoConfig {
    fn default() -> Self {
        Self {
            archive_size: 50,
            ants: 20,
            max_iterations: 1000,
            q: 0.1,
            xi: 0.85,
            seed: None,
        }
    }
}

impl AcoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_at_least("archive_size", self.archive_size, 2)?;
        ensure_at_least("ants", self.ants, 1)?;
        ensure_at_least("max_iterations", self.max_iterations, 1)?;
        ensure_positive("q", self.q)?;
        ensure_positive("xi", self.xi)?;
        Ok(())
    }

    /// Rank weights `w_l`, best member first.
    pub(crate) fn rank_weights(&self) -> Vec<f64> {
        let k = self.archive_size as f64;
        let qk = self.q * k;
        (0..self.archive_size)
            .map(|l| {
                let l = l as f64;
                (-(l * l) / (2.0 * qk * qk)).exp() / (qk * (2.0 * PI).sqrt())
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct AntColony {
    config: AcoConfig,
}

impl AntColony {
    pub fn new(config: AcoConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    fn sample<R: Rng>(&self, archive: &[Candidate<f64>], guide: usize, rng: &mut R) -> Vec<f64> {
        let k = archive.len() as f64;
        let centre = &archive[guide].position;
        centre
            .iter()
            .enumerate()
            .map(|(d, mu)| {
                let spread: f64 = archive.iter().map(|s| (s.position[d] - mu).abs()).sum();
                let sigma = self.config.xi * spread / (k - 1.0);
                let z: f64 = rng.sample(StandardNormal);
                mu + sigma * z
            })
            .collect()
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
        let guides = WeightedIndex::new(cfg.rank_weights())
            .map_err(|e| OptimizationError::InvalidWeights(e.to_string()))?;

        let mut archive = Vec::with_capacity(cfg.archive_size);
        for _ in 0..cfg.archive_size {
            let position = random_position(bounds, &mut rng);
            let fitness = evaluator.primary(&position)?;
            tracker.offer(&position, fitness);
            archive.push(Candidate::new(position, fitness));
        }
        sort_archive(&mut archive, direction);

        for _ in 0..cfg.max_iterations {
            for _ in 0..cfg.ants {
                let guide = guides.sample(&mut rng);
                let mut position = self.sample(&archive, guide, &mut rng);
                clamp_position(bounds, &mut position);
                let fitness = evaluator.primary(&position)?;
                tracker.offer(&position, fitness);
                let worst = archive.len() - 1;
                if direction.is_better(fitness, archive[worst].fitness) {
                    archive[worst] = Candidate::new(position, fitness);
                    sort_archive(&mut archive, direction);
                }
            }

            let positions = || archive.iter().map(|c| c.position.clone()).collect::<Vec<_>>();
            if !tracker.close_iteration(callback, positions) {
                return Ok(TerminationReason::Stopped);
            }
        }
        Ok(TerminationReason::MaxIterations)
    }
}

fn sort_archive(archive: &mut [Candidate<f64>], direction: Direction) {
    archive.sort_by(|a, b| rank(direction, a.fitness, b.fitness));
}

impl OptimizationStrategy for AntColony {
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
