//! Tagged algorithm configuration.
//!
//! The `algorithm` key selects the strategy; the remaining keys are that
//! strategy's parameters, each defaulted when absent:
//!
//! ```yaml
//! algorithm: differential_evolution
//! population_size: 20
//! strategy: best1
//! ```

use serde::{Deserialize, Serialize};

use super::aco::{AcoConfig, AntColony};
use super::constrained::{ConstrainedConfig, ConstrainedHybrid};
use super::de::{DeConfig, DifferentialEvolution};
use super::ga::{GaConfig, GeneticAlgorithm};
use super::gwo::{GreyWolf, GwoConfig};
use super::hybrid::{HybridConfig, HybridDePso};
use super::multi_objective::{MoConfig, MultiObjectiveHybrid};
use super::pso::{ParticleSwarm, PsoConfig};
use super::woa::{WhaleOptimization, WoaConfig};
use super::OptimizationStrategy;
use crate::domain::errors::ConfigError;
use crate::domain::models::ProblemSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum AlgorithmConfig {
    DifferentialEvolution(DeConfig),
    ParticleSwarm(PsoConfig),
    GeneticAlgorithm(GaConfig),
    AntColony(AcoConfig),
    GreyWolf(GwoConfig),
    WhaleOptimization(WoaConfig),
    HybridDePso(HybridConfig),
    MultiObjectiveHybrid(MoConfig),
    ConstrainedHybrid(ConstrainedConfig),
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self::HybridDePso(HybridConfig::default())
    }
}

impl AlgorithmConfig {
    /// Stable identifier, identical to the serialized tag.
    pub fn id(&self) -> &'static str {
        match self {
            Self::DifferentialEvolution(_) => "differential_evolution",
            Self::ParticleSwarm(_) => "particle_swarm",
            Self::GeneticAlgorithm(_) => "genetic_algorithm",
            Self::AntColony(_) => "ant_colony",
            Self::GreyWolf(_) => "grey_wolf",
            Self::WhaleOptimization(_) => "whale_optimization",
            Self::HybridDePso(_) => "hybrid_de_pso",
            Self::MultiObjectiveHybrid(_) => "multi_objective_hybrid",
            Self::ConstrainedHybrid(_) => "constrained_hybrid",
        }
    }

    /// Default configuration for an identifier.
    pub fn default_for(id: &str) -> Option<Self> {
        let config = match id {
            "differential_evolution" => Self::DifferentialEvolution(DeConfig::default()),
            "particle_swarm" => Self::ParticleSwarm(PsoConfig::default()),
            "genetic_algorithm" => Self::GeneticAlgorithm(GaConfig::default()),
            "ant_colony" => Self::AntColony(AcoConfig::default()),
            "grey_wolf" => Self::GreyWolf(GwoConfig::default()),
            "whale_optimization" => Self::WhaleOptimization(WoaConfig::default()),
            "hybrid_de_pso" => Self::HybridDePso(HybridConfig::default()),
            "multi_objective_hybrid" => Self::MultiObjectiveHybrid(MoConfig::default()),
            "constrained_hybrid" => Self::ConstrainedHybrid(ConstrainedConfig::default()),
            _ => return None,
        };
        Some(config)
    }

    pub fn max_iterations(&self) -> usize {
        match self {
            Self::DifferentialEvolution(c) => c.max_iterations,
            Self::ParticleSwarm(c) => c.max_iterations,
            Self::GeneticAlgorithm(c) => c.max_iterations,
            Self::AntColony(c) => c.max_iterations,
            Self::GreyWolf(c) => c.max_iterations,
            Self::WhaleOptimization(c) => c.max_iterations,
            Self::HybridDePso(c) => c.max_iterations,
            Self::MultiObjectiveHybrid(c) => c.hybrid.max_iterations,
            Self::ConstrainedHybrid(c) => c.hybrid.max_iterations,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::DifferentialEvolution(c) => c.validate(),
            Self::ParticleSwarm(c) => c.validate(),
            Self::GeneticAlgorithm(c) => c.validate(),
            Self::AntColony(c) => c.validate(),
            Self::GreyWolf(c) => c.validate(),
            Self::WhaleOptimization(c) => c.validate(),
            Self::HybridDePso(c) => c.validate(),
            Self::MultiObjectiveHybrid(c) => c.validate(),
            Self::ConstrainedHybrid(c) => c.validate(),
        }
    }

    /// Parameter validation plus the checks that depend on the problem.
    pub fn validate_for(&self, problem: &ProblemSpec) -> Result<(), ConfigError> {
        self.validate()?;
        match self {
            Self::MultiObjectiveHybrid(c) => c.validate_for(problem),
            _ => Ok(()),
        }
    }

    /// Construct the strategy.
    pub fn build(&self) -> Result<Box<dyn OptimizationStrategy>, ConfigError> {
        let strategy: Box<dyn OptimizationStrategy> = match self {
            Self::DifferentialEvolution(c) => Box::new(DifferentialEvolution::new(c.clone())?),
            Self::ParticleSwarm(c) => Box::new(ParticleSwarm::new(c.clone())?),
            Self::GeneticAlgorithm(c) => Box::new(GeneticAlgorithm::new(c.clone())?),
            Self::AntColony(c) => Box::new(AntColony::new(c.clone())?),
            Self::GreyWolf(c) => Box::new(GreyWolf::new(c.clone())?),
            Self::WhaleOptimization(c) => Box::new(WhaleOptimization::new(c.clone())?),
            Self::HybridDePso(c) => Box::new(HybridDePso::new(c.clone())?),
            Self::MultiObjectiveHybrid(c) => Box::new(MultiObjectiveHybrid::new(c.clone())?),
            Self::ConstrainedHybrid(c) => Box::new(ConstrainedHybrid::new(c.clone())?),
        };
        Ok(strategy)
    }
}
