//! Whale Optimization Algorithm.

use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{
    clamp_position, distinct_indices, ensure_at_least, ensure_positive, random_position,
    seeded_rng, Evaluator, RunTracker,
};
use super::gwo::control_parameter;
use super::{IterationCallback, OptimizationStrategy};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{OptimizationResult, ProblemSpec, TerminationReason};

pub const NAME: &str = "Whale Optimization Algorithm";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WoaConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    /// Shape `b` of the logarithmic spiral.
    pub spiral_constant: f64,
    pub seed: Option<u64>,
}

impl Default for WoaConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            max_iterations: 1000,
            spiral_constant: 1.0,
            seed: None,
        }
    }
}

impl WoaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_at_least("population_size", self.population_size, 2)?;
        ensure_at_least("max_iterations", self.max_iterations, 1)?;
        ensure_positive("spiral_constant", self.spiral_constant)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WhaleOptimization {
    config: WoaConfig,
}

impl WhaleOptimization {
    pub fn new(config: WoaConfig) -> Result<Self, ConfigError> {
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
        let mut rng = seeded_rng(cfg.seed);

        let mut whales: Vec<Vec<f64>> = (0..cfg.population_size)
            .map(|_| random_position(bounds, &mut rng))
            .collect();
        for x in &whales {
            let f = evaluator.primary(x)?;
            tracker.offer(x, f);
        }

        for t in 0..cfg.max_iterations {
            let a = control_parameter(t, cfg.max_iterations);
            for i in 0..whales.len() {
                let best = tracker.best_position().to_vec();
                let big_a = 2.0 * a * rng.gen::<f64>() - a;
                let big_c = 2.0 * rng.gen::<f64>();
                let p: f64 = rng.gen();
                let l: f64 = rng.gen_range(-1.0..=1.0);

                let next: Vec<f64> = if p < 0.5 {
                    let target = if big_a.abs() < 1.0 {
                        best
                    } else {
                        let other = distinct_indices(whales.len(), i, 1, &mut rng)[0];
                        whales[other].clone()
                    };
                    whales[i]
                        .iter()
                        .zip(&target)
                        .map(|(x, g)| g - big_a * (big_c * g - x).abs())
                        .collect()
                } else {
                    let spiral = (cfg.spiral_constant * l).exp() * (2.0 * PI * l).cos();
                    whales[i]
                        .iter()
                        .zip(&best)
                        .map(|(x, g)| (g - x).abs() * spiral + g)
                        .collect()
                };

                let whale = &mut whales[i];
                *whale = next;
                clamp_position(bounds, whale);
                let f = evaluator.primary(whale)?;
                tracker.offer(whale, f);
            }

            if !tracker.close_iteration(callback, || whales.clone()) {
                return Ok(TerminationReason::Stopped);
            }
        }
        Ok(TerminationReason::MaxIterations)
    }
}

impl OptimizationStrategy for WhaleOptimization {
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
