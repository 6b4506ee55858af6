//! Candidate and population models.
//!
//! A candidate owns its position; archives and personal-best slots always
//! hold clones, since they evolve independently of the population.

use serde::{Deserialize, Serialize};

/// Fitness of a constrained candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstrainedFitness {
    pub fitness: f64,
    pub violation: f64,
}

impl ConstrainedFitness {
    pub fn is_feasible(&self) -> bool {
        self.violation <= 0.0
    }
}

/// One point in the search space plus its cached fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate<F> {
    pub position: Vec<f64>,
    pub fitness: F,
}

impl<F> Candidate<F> {
    pub fn new(position: Vec<f64>, fitness: F) -> Self {
        Self { position, fitness }
    }
}

/// Working set of one run: candidates, PSO velocities, and personal bests.
#[derive(Debug, Clone)]
pub struct Population<F> {
    pub members: Vec<Candidate<F>>,
    pub velocities: Vec<Vec<f64>>,
    pub personal_bests: Vec<Candidate<F>>,
}

impl<F: Clone> Population<F> {
    /// Build a population whose personal bests start at the initial members.
    pub fn new(members: Vec<Candidate<F>>, velocities: Vec<Vec<f64>>) -> Self {
        let personal_bests = members.clone();
        Self {
            members,
            velocities,
            personal_bests,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Positions in population order, as handed to iteration callbacks.
    pub fn positions(&self) -> Vec<Vec<f64>> {
        self.members.iter().map(|c| c.position.clone()).collect()
    }
}
