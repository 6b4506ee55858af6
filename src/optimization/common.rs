//! Shared run machinery: objective evaluation with counting, incumbent and
//! convergence-curve tracking, and the sampling helpers every strategy uses.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{IterationCallback, IterationSnapshot};
use crate::domain::errors::{ConfigError, OptimizationError};
use crate::domain::models::{Bound, Direction, OptimizationResult, ProblemSpec, TerminationReason};

/// Seeded generator for reproducible runs, entropy-seeded otherwise.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Uniform random point inside the bounds.
pub(crate) fn random_position<R: Rng>(bounds: &[Bound], rng: &mut R) -> Vec<f64> {
    bounds
        .iter()
        .map(|b| rng.gen_range(b.min..=b.max))
        .collect()
}

/// Clamp every coordinate back into its bound.
pub(crate) fn clamp_position(bounds: &[Bound], position: &mut [f64]) {
    for (x, bound) in position.iter_mut().zip(bounds) {
        *x = bound.clamp(*x);
    }
}

/// `count` distinct indices from `0..n`, none equal to `exclude`.
pub(crate) fn distinct_indices<R: Rng>(
    n: usize,
    exclude: usize,
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    rand::seq::index::sample(rng, n - 1, count)
        .into_iter()
        .map(|j| if j >= exclude { j + 1 } else { j })
        .collect()
}

/// Index of the best fitness under `direction`; ties keep the earliest.
pub(crate) fn best_index(fitness: &[f64], direction: Direction) -> usize {
    let mut best = 0;
    for (i, f) in fitness.iter().enumerate().skip(1) {
        if direction.is_better(*f, fitness[best]) {
            best = i;
        }
    }
    best
}

/// Best-first ordering under `direction`.
pub(crate) fn rank(direction: Direction, a: f64, b: f64) -> Ordering {
    let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match direction {
        Direction::Minimize => ordering,
        Direction::Maximize => ordering.reverse(),
    }
}

pub(crate) fn ensure_at_least(
    name: &'static str,
    value: usize,
    min: usize,
) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::parameter(
            name,
            format!("{value} must be at least {min}"),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_range(
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::parameter(
            name,
            format!("{value} must be within [{min}, {max}]"),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::parameter(name, format!("{value} must be positive")));
    }
    Ok(())
}

/// Objective evaluation that counts calls and rejects NaN.
pub(crate) struct Evaluator<'p> {
    problem: &'p ProblemSpec,
    evaluations: usize,
}

impl<'p> Evaluator<'p> {
    pub(crate) fn new(problem: &'p ProblemSpec) -> Self {
        Self {
            problem,
            evaluations: 0,
        }
    }

    pub(crate) fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Value of the objective at `index`; one evaluation.
    pub(crate) fn objective(
        &mut self,
        index: usize,
        position: &[f64],
    ) -> Result<f64, OptimizationError> {
        let value = (self.problem.objectives()[index])(position);
        self.evaluations += 1;
        if value.is_nan() {
            return Err(OptimizationError::NanFitness {
                objective: index,
                position: position.to_vec(),
            });
        }
        Ok(value)
    }

    /// Value of the primary objective.
    pub(crate) fn primary(&mut self, position: &[f64]) -> Result<f64, OptimizationError> {
        self.objective(0, position)
    }

    /// Every objective; one evaluation per objective.
    pub(crate) fn all(&mut self, position: &[f64]) -> Result<Vec<f64>, OptimizationError> {
        (0..self.problem.objective_count())
            .map(|i| self.objective(i, position))
            .collect()
    }

    /// Summed positive excess of every constraint. Not counted as an evaluation.
    pub(crate) fn violation(&self, position: &[f64]) -> Result<f64, OptimizationError> {
        let mut total = 0.0;
        for (i, constraint) in self.problem.constraints().iter().enumerate() {
            let value = constraint(position);
            if value.is_nan() {
                return Err(OptimizationError::NanConstraint {
                    constraint: i,
                    position: position.to_vec(),
                });
            }
            total += value.max(0.0);
        }
        Ok(total)
    }
}

/// Incumbent and convergence curve of one run.
pub(crate) struct RunTracker {
    direction: Direction,
    best_position: Vec<f64>,
    best_fitness: f64,
    curve: Vec<f64>,
}

impl RunTracker {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            direction,
            best_position: Vec::new(),
            best_fitness: direction.worst(),
            curve: Vec::new(),
        }
    }

    pub(crate) fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    pub(crate) fn best_position(&self) -> &[f64] {
        &self.best_position
    }

    /// Replace the incumbent on strict improvement. The first offer always wins.
    pub(crate) fn offer(&mut self, position: &[f64], fitness: f64) -> bool {
        if self.best_position.is_empty() || self.direction.is_better(fitness, self.best_fitness) {
            self.best_position = position.to_vec();
            self.best_fitness = fitness;
            return true;
        }
        false
    }

    /// Replace the incumbent unconditionally; callers own the comparison.
    pub(crate) fn set_best(&mut self, position: &[f64], fitness: f64) {
        self.best_position = position.to_vec();
        self.best_fitness = fitness;
    }

    pub(crate) fn iterations(&self) -> usize {
        self.curve.len()
    }

    /// Record the iteration's best and consult the callback.
    ///
    /// Returns `false` when the callback asked to stop.
    pub(crate) fn close_iteration<P>(
        &mut self,
        callback: &mut Option<&mut IterationCallback<'_>>,
        population: P,
    ) -> bool
    where
        P: FnOnce() -> Vec<Vec<f64>>,
    {
        self.curve.push(self.best_fitness);
        match callback {
            Some(cb) => {
                let population = population();
                let snapshot = IterationSnapshot {
                    iteration: self.curve.len(),
                    best_position: &self.best_position,
                    best_fitness: self.best_fitness,
                    population: &population,
                };
                (*cb)(&snapshot)
            }
            None => true,
        }
    }

    /// Build the final result from how the run ended.
    pub(crate) fn finish(
        self,
        algorithm_name: &str,
        evaluations: usize,
        outcome: Result<TerminationReason, OptimizationError>,
    ) -> OptimizationResult {
        let iterations = self.curve.len();
        let (success, termination, message) = match outcome {
            Ok(reason) => (true, reason, describe(reason, iterations)),
            Err(err) => (false, TerminationReason::NumericalError, err.to_string()),
        };
        OptimizationResult {
            best_position: self.best_position,
            best_fitness: self.best_fitness,
            convergence_curve: self.curve,
            iterations,
            evaluations,
            algorithm_name: algorithm_name.to_string(),
            success,
            message,
            termination,
            constraint_violation: None,
            best_objectives: None,
            pareto_front: None,
        }
    }
}

fn describe(reason: TerminationReason, iterations: usize) -> String {
    match reason {
        TerminationReason::Converged => format!("Converged after {iterations} iterations"),
        TerminationReason::MaxIterations => {
            format!("Reached maximum iterations ({iterations})")
        }
        TerminationReason::Stopped => format!("Stopped by callback after {iterations} iterations"),
        TerminationReason::NumericalError => "Aborted on numerical error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_indices_excludes_target() {
        let mut rng = seeded_rng(Some(7));
        for _ in 0..200 {
            let picked = distinct_indices(5, 2, 3, &mut rng);
            assert_eq!(picked.len(), 3);
            assert!(!picked.contains(&2));
            assert!(picked.iter().all(|&i| i < 5));
            let mut sorted = picked.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 3);
        }
    }

    #[test]
    fn test_tracker_strict_improvement() {
        let mut tracker = RunTracker::new(Direction::Minimize);
        assert!(tracker.offer(&[1.0], 5.0));
        assert!(!tracker.offer(&[2.0], 5.0));
        assert_eq!(tracker.best_position(), &[1.0]);
        assert!(tracker.offer(&[3.0], 4.0));
        assert_eq!(tracker.best_fitness(), 4.0);
    }

    #[test]
    fn test_tracker_accepts_first_infinite_offer() {
        let mut tracker = RunTracker::new(Direction::Minimize);
        assert!(tracker.offer(&[1.0], f64::INFINITY));
        assert_eq!(tracker.best_position(), &[1.0]);
    }

    #[test]
    fn test_close_iteration_honours_callback() {
        let mut tracker = RunTracker::new(Direction::Minimize);
        tracker.offer(&[0.0], 1.0);
        let mut seen = Vec::new();
        let mut cb = |s: &IterationSnapshot<'_>| {
            seen.push(s.iteration);
            s.iteration < 2
        };
        let mut callback: Option<&mut IterationCallback<'_>> = Some(&mut cb);
        assert!(tracker.close_iteration(&mut callback, Vec::new));
        assert!(!tracker.close_iteration(&mut callback, Vec::new));
        drop(callback);
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(tracker.iterations(), 2);
    }

    #[test]
    fn test_evaluator_counts_and_rejects_nan() {
        let problem = ProblemSpec::uniform(1, -1.0, 1.0, Direction::Minimize, |x: &[f64]| {
            if x[0] > 0.5 {
                f64::NAN
            } else {
                x[0]
            }
        })
        .unwrap();
        let mut evaluator = Evaluator::new(&problem);
        assert_eq!(evaluator.primary(&[0.0]).unwrap(), 0.0);
        assert!(evaluator.primary(&[0.9]).is_err());
        assert_eq!(evaluator.evaluations(), 2);
    }
}
