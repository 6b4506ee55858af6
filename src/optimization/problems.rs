//! Named benchmark problems.
//!
//! Swarms created over the command interface or the CLI cannot carry code,
//! so they name one of these instead.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ConfigError;
use crate::domain::models::{Direction, ProblemSpec};

/// Benchmarks by name with their conventional search range.
pub const BENCHMARKS: &[(&str, f64, f64, &str)] = &[
    ("sphere", -5.12, 5.12, "Sum of squares; unimodal, optimum 0 at the origin"),
    ("rastrigin", -5.12, 5.12, "Highly multimodal; optimum 0 at the origin"),
    ("rosenbrock", -5.0, 10.0, "Curved valley; optimum 0 at (1, ..., 1)"),
    ("ackley", -32.768, 32.768, "Nearly flat outer region; optimum 0 at the origin"),
    ("zdt1", 0.0, 1.0, "Two-objective convex front; needs at least 2 dimensions"),
];

/// Problem reference as it appears in requests and config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRequest {
    pub name: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Uniform `(min, max)` for every dimension; the benchmark's own range
    /// when absent.
    #[serde(default)]
    pub bounds: Option<(f64, f64)>,
}

const fn default_dimensions() -> usize {
    2
}

impl ProblemRequest {
    pub fn new(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            dimensions,
            bounds: None,
        }
    }

    /// Build the problem.
    pub fn build(&self) -> Result<ProblemSpec, ConfigError> {
        let (min, max) = match (self.bounds, range_of(&self.name)) {
            (Some(bounds), Some(_)) => bounds,
            (None, Some(range)) => range,
            (_, None) => {
                return Err(ConfigError::parameter(
                    "problem",
                    format!(
                        "unknown problem {}; expected one of: {}",
                        self.name,
                        BENCHMARKS
                            .iter()
                            .map(|(name, ..)| *name)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                ))
            }
        };

        let builder = ProblemSpec::builder(self.dimensions).uniform_bounds(min, max);
        let builder = match self.name.as_str() {
            "sphere" => builder.objective(Direction::Minimize, sphere),
            "rastrigin" => builder.objective(Direction::Minimize, rastrigin),
            "rosenbrock" => builder.objective(Direction::Minimize, rosenbrock),
            "ackley" => builder.objective(Direction::Minimize, ackley),
            _ => {
                if self.dimensions < 2 {
                    return Err(ConfigError::UnsupportedProblem {
                        algorithm: "zdt1",
                        requirement: "at least 2 dimensions".to_string(),
                    });
                }
                builder
                    .objective(Direction::Minimize, |x: &[f64]| x[0])
                    .objective(Direction::Minimize, zdt1_second)
            }
        };
        builder.build()
    }
}

fn range_of(name: &str) -> Option<(f64, f64)> {
    BENCHMARKS
        .iter()
        .find(|(benchmark, ..)| *benchmark == name)
        .map(|(_, min, max, _)| (*min, *max))
}

pub fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

pub fn rastrigin(x: &[f64]) -> f64 {
    10.0 * x.len() as f64
        + x.iter()
            .map(|v| v * v - 10.0 * (2.0 * PI * v).cos())
            .sum::<f64>()
}

pub fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

pub fn ackley(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let squares = x.iter().map(|v| v * v).sum::<f64>() / n;
    let cosines = x.iter().map(|v| (2.0 * PI * v).cos()).sum::<f64>() / n;
    -20.0 * (-0.2 * squares.sqrt()).exp() - cosines.exp() + 20.0 + std::f64::consts::E
}

fn zdt1_second(x: &[f64]) -> f64 {
    let g = 1.0 + 9.0 * x[1..].iter().sum::<f64>() / (x.len() - 1) as f64;
    g * (1.0 - (x[0] / g).sqrt())
}
