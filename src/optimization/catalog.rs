//! Algorithm catalog: identifiers, display names and parameter schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{aco, constrained, de, ga, gwo, hybrid, multi_objective, pso, woa, AlgorithmConfig};

/// One configurable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    /// `integer`, `float`, `boolean`, `string` or `object`.
    #[serde(rename = "type")]
    pub kind: String,
    pub default: Value,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

type Param = (&'static str, &'static str, &'static str);

const SEED: Param = ("seed", "integer", "RNG seed for reproducible runs; entropy when null");

const HYBRID_PARAMS: &[Param] = &[
    ("population_size", "integer", "Number of individuals"),
    ("max_iterations", "integer", "Iteration budget"),
    ("mutation_factor", "float", "Initial DE differential weight F"),
    ("crossover_rate", "float", "Initial DE crossover probability CR"),
    ("inertia_weight", "float", "Initial PSO inertia weight"),
    ("cognitive_coefficient", "float", "PSO pull toward the personal best"),
    ("social_coefficient", "float", "PSO pull toward the global best"),
    ("hybrid_ratio", "float", "Initial probability of a DE step"),
    ("adaptive", "boolean", "Adapt F, CR, inertia and the DE share during the run"),
    ("tolerance", "float", "Best-fitness change counted as converging; 0 disables"),
    ("convergence_patience", "integer", "Converging iterations that end the run"),
    SEED,
];

fn descriptor(
    config: AlgorithmConfig,
    name: &str,
    description: &str,
    params: &[Param],
) -> AlgorithmDescriptor {
    let defaults = serde_json::to_value(&config).unwrap_or(Value::Null);
    let parameters = params
        .iter()
        .map(|(param, kind, help)| ParameterSpec {
            name: (*param).to_string(),
            kind: (*kind).to_string(),
            default: defaults.get(*param).cloned().unwrap_or(Value::Null),
            description: (*help).to_string(),
        })
        .collect();
    AlgorithmDescriptor {
        id: config.id().to_string(),
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Every supported strategy, in a stable order.
pub fn list_algorithms() -> Vec<AlgorithmDescriptor> {
    vec![
        descriptor(
            AlgorithmConfig::DifferentialEvolution(de::DeConfig::default()),
            de::NAME,
            "Population-based search driven by scaled difference vectors",
            &[
                ("population_size", "integer", "Number of individuals"),
                ("max_iterations", "integer", "Generation budget"),
                ("mutation_factor", "float", "Differential weight F"),
                ("crossover_rate", "float", "Binomial crossover probability CR"),
                (
                    "strategy",
                    "string",
                    "rand1, best1, rand2, best2 or current_to_best1",
                ),
                SEED,
            ],
        ),
        descriptor(
            AlgorithmConfig::ParticleSwarm(pso::PsoConfig::default()),
            pso::NAME,
            "Particles steered by inertia, personal memory and the swarm best",
            &[
                ("population_size", "integer", "Number of particles"),
                ("max_iterations", "integer", "Iteration budget"),
                ("inertia_weight", "float", "Velocity carried between iterations"),
                ("cognitive_coefficient", "float", "Pull toward the personal best"),
                ("social_coefficient", "float", "Pull toward the global best"),
                SEED,
            ],
        ),
        descriptor(
            AlgorithmConfig::GeneticAlgorithm(ga::GaConfig::default()),
            ga::NAME,
            "Real-coded evolution with tournament selection, SBX and polynomial mutation",
            &[
                ("population_size", "integer", "Number of individuals"),
                ("max_iterations", "integer", "Generation budget"),
                ("crossover_rate", "float", "Probability a parent pair is recombined"),
                ("mutation_rate", "float", "Per-gene mutation probability"),
                ("selection_pressure", "float", "Tournament size as a population fraction"),
                ("elitism_count", "integer", "Best individuals copied unchanged"),
                SEED,
            ],
        ),
        descriptor(
            AlgorithmConfig::AntColony(aco::AcoConfig::default()),
            aco::NAME,
            "Continuous ant colony sampling around a ranked solution archive",
            &[
                ("archive_size", "integer", "Solution archive size k"),
                ("ants", "integer", "Samples per iteration"),
                ("max_iterations", "integer", "Iteration budget"),
                ("q", "float", "Rank weighting locality"),
                ("xi", "float", "Sampling spread scale"),
                SEED,
            ],
        ),
        descriptor(
            AlgorithmConfig::GreyWolf(gwo::GwoConfig::default()),
            gwo::NAME,
            "Pack hunting led by the three best wolves",
            &[
                ("population_size", "integer", "Number of wolves"),
                ("max_iterations", "integer", "Iteration budget"),
                SEED,
            ],
        ),
        descriptor(
            AlgorithmConfig::WhaleOptimization(woa::WoaConfig::default()),
            woa::NAME,
            "Encircling, exploration and bubble-net spiral moves",
            &[
                ("population_size", "integer", "Number of whales"),
                ("max_iterations", "integer", "Iteration budget"),
                ("spiral_constant", "float", "Logarithmic spiral shape b"),
                SEED,
            ],
        ),
        descriptor(
            AlgorithmConfig::HybridDePso(hybrid::HybridConfig::default()),
            hybrid::NAME,
            "Per-individual choice between DE and PSO steps with adaptive control",
            HYBRID_PARAMS,
        ),
        descriptor(
            AlgorithmConfig::MultiObjectiveHybrid(multi_objective::MoConfig::default()),
            multi_objective::NAME,
            "Hybrid DE/PSO over Pareto dominance with a crowding-pruned archive",
            &[
                ("hybrid", "object", "Hybrid DE/PSO settings"),
                ("archive_size", "integer", "Maximum Pareto archive size"),
                (
                    "crowding_distance_weight",
                    "float",
                    "Probability leader tournaments use crowding distance",
                ),
                (
                    "leader_selection_pressure",
                    "float",
                    "Probability the first drawn member wins otherwise",
                ),
                (
                    "scalarization",
                    "object",
                    "Optional weighted_sum or epsilon_constraint folding",
                ),
            ],
        ),
        descriptor(
            AlgorithmConfig::ConstrainedHybrid(constrained::ConstrainedConfig::default()),
            constrained::NAME,
            "Hybrid DE/PSO with penalty or feasibility-rule comparison",
            &[
                ("hybrid", "object", "Hybrid DE/PSO settings"),
                ("handler", "object", "penalty or feasibility_rules"),
            ],
        ),
    ]
}
