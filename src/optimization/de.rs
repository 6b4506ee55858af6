//! Differential Evolution.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{
    best_index, clamp_position, distinct_indices, ensure_at_least, ensure_range, random_position,
    seeded_rng, Evaluator, RunTracker,
};
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{OptimizationResult, ProblemSpec, TerminationReason};

pub const NAME: &str = "Differential Evolution";

/// Mutation scheme. All variants use binomial crossover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeStrategy {
    /// `x_a + F(x_b - x_c)`
    #[default]
    Rand1,
    /// `best + F(x_b - x_c)`
    Best1,
    /// `x_a + F(x_b - x_c) + F(x_d - x_e)`
    Rand2,
    /// `best + F(x_b - x_c) + F(x_d - x_e)`
    Best2,
    /// `x_i + F(best - x_i) + F(x_b - x_c)`
    CurrentToBest1,
}

impl DeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rand1 => "rand1",
            Self::Best1 => "best1",
            Self::Rand2 => "rand2",
            Self::Best2 => "best2",
            Self::CurrentToBest1 => "current_to_best1",
        }
    }

    /// Random donors drawn besides the target.
    fn donors(self) -> usize {
        match self {
            Self::Rand1 => 3,
            Self::Best1 | Self::CurrentToBest1 => 2,
            Self::Rand2 => 5,
            Self::Best2 => 4,
        }
    }

    /// Smallest population that leaves enough distinct donors.
    pub fn min_population(self) -> usize {
        self.donors() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    /// Differential weight `F`.
    pub mutation_factor: f64,
    /// Crossover probability `CR`.
    pub crossover_rate: f64,
    pub strategy: DeStrategy,
    pub seed: Option<u64>,
}

impl Default for DeConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_iterations: 1000,
            mutation_factor: 0.8,
            crossover_rate: 0.9,
            strategy: DeStrategy::default(),
            seed: None,
        }
    }
}

impl DeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_at_least(
            "population_size",
            self.population_size,
            self.strategy.min_population(),
        )?;
        ensure_at_least("max_iterations", self.max_iterations, 1)?;
        ensure_range("mutation_factor", self.mutation_factor, 0.0, 2.0)?;
        ensure_range("crossover_rate", self.crossover_rate, 0.0, 1.0)?;
        Ok(())
    }
}

/// Build the mutant vector for target `i`.
pub(crate) fn mutate<R: Rng>(
    strategy: DeStrategy,
    positions: &[Vec<f64>],
    i: usize,
    best: usize,
    f: f64,
    rng: &mut R,
) -> Vec<f64> {
    let donors = distinct_indices(positions.len(), i, strategy.donors(), rng);
    let diff = |base: &[f64], b: usize, c: usize| -> Vec<f64> {
        base.iter()
            .zip(&positions[b])
            .zip(&positions[c])
            .map(|((x, xb), xc)| x + f * (xb - xc))
            .collect()
    };
    match strategy {
        DeStrategy::Rand1 => diff(&positions[donors[0]], donors[1], donors[2]),
        DeStrategy::Best1 => diff(&positions[best], donors[0], donors[1]),
        DeStrategy::Rand2 => {
            let partial = diff(&positions[donors[0]], donors[1], donors[2]);
            diff(&partial, donors[3], donors[4])
        }
        DeStrategy::Best2 => {
            let partial = diff(&positions[best], donors[0], donors[1]);
            diff(&partial, donors[2], donors[3])
        }
        DeStrategy::CurrentToBest1 => {
            let toward_best: Vec<f64> = positions[i]
                .iter()
                .zip(&positions[best])
                .map(|(x, b)| x + f * (b - x))
                .collect();
            diff(&toward_best, donors[0], donors[1])
        }
    }
}

/// Binomial crossover; coordinate `j_rand` always comes from the mutant.
pub(crate) fn binomial_crossover<R: Rng>(
    target: &[f64],
    mutant: &[f64],
    crossover_rate: f64,
    rng: &mut R,
) -> Vec<f64> {
    let j_rand = rng.gen_range(0..target.len());
    target
        .iter()
        .zip(mutant)
        .enumerate()
        .map(|(j, (x, v))| {
            if j == j_rand || rng.gen::<f64>() < crossover_rate {
                *v
            } else {
                *x
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    config: DeConfig,
}

impl DifferentialEvolution {
    pub fn new(config: DeConfig) -> Result<Self, ConfigError> {
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

        let mut positions: Vec<Vec<f64>> = (0..cfg.population_size)
            .map(|_| random_position(bounds, &mut rng))
            .collect();
        let mut fitness = Vec::with_capacity(cfg.population_size);
        for x in &positions {
            let f = evaluator.primary(x)?;
            tracker.offer(x, f);
            fitness.push(f);
        }

        for _ in 0..cfg.max_iterations {
            let best = best_index(&fitness, direction);
            let mut next_positions = positions.clone();
            let mut next_fitness = fitness.clone();
            for i in 0..positions.len() {
                let mutant = mutate(cfg.strategy, &positions, i, best, cfg.mutation_factor, &mut rng);
                let mut trial =
                    binomial_crossover(&positions[i], &mutant, cfg.crossover_rate, &mut rng);
                clamp_position(bounds, &mut trial);
                let f = evaluator.primary(&trial)?;
                if direction.is_better(f, fitness[i]) {
                    tracker.offer(&trial, f);
                    next_positions[i] = trial;
                    next_fitness[i] = f;
                }
            }
            positions = next_positions;
            fitness = next_fitness;

            if !tracker.close_iteration(callback, || positions.clone()) {
                return Ok(TerminationReason::Stopped);
            }
        }
        Ok(TerminationReason::MaxIterations)
    }
}

impl OptimizationStrategy for DifferentialEvolution {
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
        tracing::debug!(
            algorithm = NAME,
            iterations = tracker.iterations(),
            best_fitness = tracker.best_fitness(),
            "run finished"
        );
        tracker.finish(NAME, evaluator.evaluations(), outcome)
    }
}
