//! Grey Wolf Optimizer.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{
    clamp_position, ensure_at_least, random_position, rank, seeded_rng, Evaluator, RunTracker,
};
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{Direction, OptimizationResult, ProblemSpec, TerminationReason};

pub const NAME: &str = "Grey Wolf Optimizer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GwoConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    pub seed: Option<u64>,
}

impl Default for GwoConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            max_iterations: 1000,
            seed: None,
        }
    }
}

impl GwoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // alpha, beta, delta plus at least one follower
        ensure_at_least("population_size", self.population_size, 4)?;
        ensure_at_least("max_iterations", self.max_iterations, 1)?;
        Ok(())
    }
}

/// Control parameter `a`, decreasing linearly from 2 to 0.
pub(crate) fn control_parameter(iteration: usize, max_iterations: usize) -> f64 {
    2.0 - 2.0 * iteration as f64 / max_iterations as f64
}

/// Indices of the three best individuals, best first.
fn leaders(fitness: &[f64], direction: Direction) -> [usize; 3] {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| rank(direction, fitness[a], fitness[b]));
    [order[0], order[1], order[2]]
}

#[derive(Debug, Clone)]
pub struct GreyWolf {
    config: GwoConfig,
}

impl GreyWolf {
    pub fn new(config: GwoConfig) -> Result<Self, ConfigError> {
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

        let mut wolves: Vec<Vec<f64>> = (0..cfg.population_size)
            .map(|_| random_position(bounds, &mut rng))
            .collect();
        let mut fitness = Vec::with_capacity(cfg.population_size);
        for x in &wolves {
            let f = evaluator.primary(x)?;
            tracker.offer(x, f);
            fitness.push(f);
        }

        for t in 0..cfg.max_iterations {
            let a = control_parameter(t, cfg.max_iterations);
            let pack = leaders(&fitness, direction);
            let leader_positions: Vec<Vec<f64>> =
                pack.iter().map(|&l| wolves[l].clone()).collect();

            for i in 0..wolves.len() {
                if pack.contains(&i) {
                    continue;
                }
                let wolf = &mut wolves[i];
                for d in 0..wolf.len() {
                    let mut pull = 0.0;
                    for leader in &leader_positions {
                        let big_a = 2.0 * a * rng.gen::<f64>() - a;
                        let big_c = 2.0 * rng.gen::<f64>();
                        let distance = (big_c * leader[d] - wolf[d]).abs();
                        pull += leader[d] - big_a * distance;
                    }
                    wolf[d] = pull / 3.0;
                }
                clamp_position(bounds, wolf);
                fitness[i] = evaluator.primary(wolf)?;
                tracker.offer(wolf, fitness[i]);
            }

            if !tracker.close_iteration(callback, || wolves.clone()) {
                return Ok(TerminationReason::Stopped);
            }
        }
        Ok(TerminationReason::MaxIterations)
    }
}

impl OptimizationStrategy for GreyWolf {
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
    fn test_control_parameter_decays_to_zero() {
        assert_eq!(control_parameter(0, 100), 2.0);
        assert!((control_parameter(50, 100) - 1.0).abs() < 1e-12);
        assert_eq!(control_parameter(100, 100), 0.0);
    }

    #[test]
    fn test_leaders_respect_direction() {
        let fitness = [3.0, 1.0, 4.0, 1.5, 9.0];
        assert_eq!(leaders(&fitness, Direction::Minimize), [1, 3, 0]);
        assert_eq!(leaders(&fitness, Direction::Maximize), [4, 2, 0]);
    }

    #[test]
    fn test_pack_closes_in_on_optimum() {
        let problem = ProblemSpec::uniform(4, -10.0, 10.0, Direction::Minimize, |x: &[f64]| {
            x.iter().map(|v| v * v).sum()
        })
        .unwrap();
        let gwo = GreyWolf::new(GwoConfig {
            population_size: 20,
            max_iterations: 100,
            seed: Some(17),
        })
        .unwrap();
        let result = gwo.optimize(&problem, None);
        assert!(result.success);
        assert_eq!(result.evaluations, 20 + 17 * 100);
        assert!(result.best_fitness < 1e-3, "best {}", result.best_fitness);
    }
}
