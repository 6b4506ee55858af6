//! Problem specification domain model.
//!
//! A problem is an immutable description of what to optimize: the bounded
//! search space, one or more objectives with their directions, and optional
//! inequality constraints (`g(x) <= 0` is feasible).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ConfigError;

/// Objective function over a position.
pub type Objective = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Constraint function over a position. Values `<= 0` are feasible.
pub type Constraint = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Optimization direction of one objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Minimize,
    Maximize,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimize => "minimize",
            Self::Maximize => "maximize",
        }
    }

    /// Strict improvement: ties never replace the incumbent.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Minimize => candidate < incumbent,
            Self::Maximize => candidate > incumbent,
        }
    }

    /// At least as good as `other`.
    pub fn is_at_least_as_good(self, candidate: f64, other: f64) -> bool {
        match self {
            Self::Minimize => candidate <= other,
            Self::Maximize => candidate >= other,
        }
    }

    /// The value every real fitness improves upon.
    pub fn worst(self) -> f64 {
        match self {
            Self::Minimize => f64::INFINITY,
            Self::Maximize => f64::NEG_INFINITY,
        }
    }

    /// Map a value into minimization space.
    pub fn to_minimization(self, value: f64) -> f64 {
        match self {
            Self::Minimize => value,
            Self::Maximize => -value,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed interval of one search dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub min: f64,
    pub max: f64,
}

impl Bound {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl From<(f64, f64)> for Bound {
    fn from((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }
}

/// Immutable optimization problem.
#[derive(Clone)]
pub struct ProblemSpec {
    dimensions: usize,
    bounds: Vec<Bound>,
    objectives: Vec<Objective>,
    directions: Vec<Direction>,
    constraints: Vec<Constraint>,
}

impl ProblemSpec {
    /// Start building a problem with the given dimensionality.
    pub fn builder(dimensions: usize) -> ProblemSpecBuilder {
        ProblemSpecBuilder {
            dimensions,
            bounds: Vec::new(),
            objectives: Vec::new(),
            directions: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Single-objective problem with identical bounds on every dimension.
    pub fn uniform<F>(
        dimensions: usize,
        min: f64,
        max: f64,
        direction: Direction,
        objective: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::builder(dimensions)
            .uniform_bounds(min, max)
            .objective(direction, objective)
            .build()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn objective_count(&self) -> usize {
        self.objectives.len()
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Direction of the primary (first) objective.
    pub fn primary_direction(&self) -> Direction {
        self.directions[0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_constrained(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// Whether every coordinate lies within its bound.
    pub fn contains(&self, position: &[f64]) -> bool {
        position.len() == self.dimensions
            && position
                .iter()
                .zip(&self.bounds)
                .all(|(x, bound)| bound.contains(*x))
    }

    /// Derive a single-objective problem over the same space and constraints.
    pub fn with_single_objective<F>(&self, direction: Direction, objective: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            dimensions: self.dimensions,
            bounds: self.bounds.clone(),
            objectives: vec![Arc::new(objective)],
            directions: vec![direction],
            constraints: self.constraints.clone(),
        }
    }
}

impl fmt::Debug for ProblemSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemSpec")
            .field("dimensions", &self.dimensions)
            .field("bounds", &self.bounds)
            .field("objectives", &self.objectives.len())
            .field("directions", &self.directions)
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

/// Builder for [`ProblemSpec`]; validation happens in [`ProblemSpecBuilder::build`].
pub struct ProblemSpecBuilder {
    dimensions: usize,
    bounds: Vec<Bound>,
    objectives: Vec<Objective>,
    directions: Vec<Direction>,
    constraints: Vec<Constraint>,
}

impl ProblemSpecBuilder {
    /// Per-dimension bounds.
    pub fn bounds<I, B>(mut self, bounds: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bound>,
    {
        self.bounds = bounds.into_iter().map(Into::into).collect();
        self
    }

    /// The same bound on every dimension.
    pub fn uniform_bounds(mut self, min: f64, max: f64) -> Self {
        self.bounds = vec![Bound::new(min, max); self.dimensions];
        self
    }

    /// Add an objective with its direction.
    pub fn objective<F>(mut self, direction: Direction, objective: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.objectives.push(Arc::new(objective));
        self.directions.push(direction);
        self
    }

    /// Add an already shared objective.
    pub fn shared_objective(mut self, direction: Direction, objective: Objective) -> Self {
        self.objectives.push(objective);
        self.directions.push(direction);
        self
    }

    /// Add an inequality constraint `g(x) <= 0`.
    pub fn constraint<F>(mut self, constraint: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn build(self) -> Result<ProblemSpec, ConfigError> {
        if self.dimensions == 0 {
            return Err(ConfigError::InvalidDimensions(self.dimensions));
        }
        if self.bounds.len() != self.dimensions {
            return Err(ConfigError::BoundsLengthMismatch {
                expected: self.dimensions,
                actual: self.bounds.len(),
            });
        }
        for (dimension, bound) in self.bounds.iter().enumerate() {
            if !bound.min.is_finite() || !bound.max.is_finite() || bound.min >= bound.max {
                return Err(ConfigError::InvalidBounds {
                    dimension,
                    min: bound.min,
                    max: bound.max,
                });
            }
        }
        if self.objectives.is_empty() {
            return Err(ConfigError::NoObjectives);
        }
        if self.directions.len() != self.objectives.len() {
            return Err(ConfigError::DirectionMismatch {
                objectives: self.objectives.len(),
                directions: self.directions.len(),
            });
        }

        Ok(ProblemSpec {
            dimensions: self.dimensions,
            bounds: self.bounds,
            objectives: self.objectives,
            directions: self.directions,
            constraints: self.constraints,
        })
    }
}
