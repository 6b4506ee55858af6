//! Real-coded Genetic Algorithm: tournament selection, simulated-binary
//! crossover, polynomial mutation and elitism.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{
    clamp_position, ensure_at_least, ensure_range, random_position, rank, seeded_rng, Evaluator,
    RunTracker,
};
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{
    Bound, Candidate, Direction, OptimizationResult, ProblemSpec, TerminationReason,
};

pub const NAME: &str = "Genetic Algorithm";

const SBX_ETA: f64 = 15.0;
const MUTATION_ETA: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    /// Probability that a parent pair is recombined.
    pub crossover_rate: f64,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    /// Tournament size as a fraction of the population.
    pub selection_pressure: f64,
    pub elitism_count: usize,
    pub seed: Option<u64>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_iterations: 1000,
            crossover_rate: 0.9,
            mutation_rate: 0.1,
            selection_pressure: 0.1,
            elitism_count: 2,
            seed: None,
        }
    }
}

impl GaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_at_least("population_size", self.population_size, 2)?;
        ensure_at_least("max_iterations", self.max_iterations, 1)?;
        ensure_range("crossover_rate", self.crossover_rate, 0.0, 1.0)?;
        ensure_range("mutation_rate", self.mutation_rate, 0.0, 1.0)?;
        ensure_range("selection_pressure", self.selection_pressure, 0.0, 1.0)?;
        if self.elitism_count >= self.population_size {
            return Err(ConfigError::parameter(
                "elitism_count",
                format!(
                    "{} must be smaller than population_size {}",
                    self.elitism_count, self.population_size
                ),
            ));
        }
        Ok(())
    }

    pub fn tournament_size(&self) -> usize {
        ((self.selection_pressure * self.population_size as f64).round() as usize)
            .clamp(2, self.population_size)
    }
}

fn tournament<'a, R: Rng>(
    population: &'a [Candidate<f64>],
    size: usize,
    direction: Direction,
    rng: &mut R,
) -> &'a Candidate<f64> {
    let mut winner = &population[rng.gen_range(0..population.len())];
    for _ in 1..size {
        let challenger = &population[rng.gen_range(0..population.len())];
        if direction.is_better(challenger.fitness, winner.fitness) {
            winner = challenger;
        }
    }
    winner
}

fn sbx<R: Rng>(p1: &[f64], p2: &[f64], rng: &mut R) -> (Vec<f64>, Vec<f64>) {
    let exponent = 1.0 / (SBX_ETA + 1.0);
    p1.iter()
        .zip(p2)
        .map(|(a, b)| {
            let u: f64 = rng.gen();
            let beta = if u <= 0.5 {
                (2.0 * u).powf(exponent)
            } else {
                (1.0 / (2.0 * (1.0 - u))).powf(exponent)
            };
            (
                0.5 * ((1.0 + beta) * a + (1.0 - beta) * b),
                0.5 * ((1.0 - beta) * a + (1.0 + beta) * b),
            )
        })
        .unzip()
}

fn polynomial_mutation<R: Rng>(genes: &mut [f64], bounds: &[Bound], rate: f64, rng: &mut R) {
    let exponent = 1.0 / (MUTATION_ETA + 1.0);
    for (x, bound) in genes.iter_mut().zip(bounds) {
        if rng.gen::<f64>() >= rate {
            continue;
        }
        let u: f64 = rng.gen();
        let delta = if u < 0.5 {
            (2.0 * u).powf(exponent) - 1.0
        } else {
            1.0 - (2.0 * (1.0 - u)).powf(exponent)
        };
        *x += delta * bound.width();
    }
}

#[derive(Debug, Clone)]
pub struct GeneticAlgorithm {
    config: GaConfig,
}

impl GeneticAlgorithm {
    pub fn new(config: GaConfig) -> Result<Self, ConfigError> {
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
        let tournament_size = cfg.tournament_size();
        let mut rng = seeded_rng(cfg.seed);

        let mut population = Vec::with_capacity(cfg.population_size);
        for _ in 0..cfg.population_size {
            let position = random_position(bounds, &mut rng);
            let fitness = evaluator.primary(&position)?;
            tracker.offer(&position, fitness);
            population.push(Candidate::new(position, fitness));
        }

        for _ in 0..cfg.max_iterations {
            population.sort_by(|a, b| rank(direction, a.fitness, b.fitness));
            let mut next: Vec<Candidate<f64>> =
                population.iter().take(cfg.elitism_count).cloned().collect();

            while next.len() < cfg.population_size {
                let p1 = tournament(&population, tournament_size, direction, &mut rng);
                let p2 = tournament(&population, tournament_size, direction, &mut rng);
                let (mut c1, mut c2) = if rng.gen::<f64>() < cfg.crossover_rate {
                    sbx(&p1.position, &p2.position, &mut rng)
                } else {
                    (p1.position.clone(), p2.position.clone())
                };
                for child in [&mut c1, &mut c2] {
                    polynomial_mutation(child, bounds, cfg.mutation_rate, &mut rng);
                    clamp_position(bounds, child);
                }
                for child in [c1, c2] {
                    if next.len() == cfg.population_size {
                        break;
                    }
                    let fitness = evaluator.primary(&child)?;
                    tracker.offer(&child, fitness);
                    next.push(Candidate::new(child, fitness));
                }
            }
            population = next;

            let positions = || population.iter().map(|c| c.position.clone()).collect::<Vec<_>>();
            if !tracker.close_iteration(callback, positions) {
                return Ok(TerminationReason::Stopped);
            }
        }
        Ok(TerminationReason::MaxIterations)
    }
}

impl OptimizationStrategy for GeneticAlgorithm {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tournament_size_has_floor_of_two() {
        let cfg = GaConfig {
            population_size: 10,
            selection_pressure: 0.01,
            ..GaConfig::default()
        };
        assert_eq!(cfg.tournament_size(), 2);
        let cfg = GaConfig {
            population_size: 50,
            selection_pressure: 0.2,
            ..GaConfig::default()
        };
        assert_eq!(cfg.tournament_size(), 10);
    }

    #[test]
    fn test_elites_survive_and_count_evaluations() {
        let problem = ProblemSpec::uniform(2, -3.0, 3.0, Direction::Minimize, |x: &[f64]| {
            x.iter().map(|v| v * v).sum()
        })
        .unwrap();
        let ga = GeneticAlgorithm::new(GaConfig {
            population_size: 20,
            max_iterations: 40,
            elitism_count: 2,
            seed: Some(21),
            ..GaConfig::default()
        })
        .unwrap();
        let result = ga.optimize(&problem, None);
        assert!(result.success);
        assert_eq!(result.evaluations, 20 + 18 * 40);
        assert!(result.convergence_curve.windows(2).all(|w| w[1] <= w[0]));
        assert!(result.best_fitness < 0.5);
    }

    #[test]
    fn test_elitism_must_leave_room_for_offspring() {
        let cfg = GaConfig {
            population_size: 4,
            elitism_count: 4,
            ..GaConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
