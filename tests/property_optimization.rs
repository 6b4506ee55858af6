use metaswarm::domain::models::{Direction, ProblemSpec};
use metaswarm::optimization::aco::AcoConfig;
use metaswarm::optimization::constrained::{ConstrainedConfig, ConstrainedHybrid, ConstraintHandler};
use metaswarm::optimization::de::DeConfig;
use metaswarm::optimization::ga::GaConfig;
use metaswarm::optimization::gwo::GwoConfig;
use metaswarm::optimization::hybrid::HybridConfig;
use metaswarm::optimization::pareto::{dominates, ParetoArchive};
use metaswarm::optimization::pso::PsoConfig;
use metaswarm::optimization::woa::WoaConfig;
use metaswarm::optimization::{AlgorithmConfig, IterationSnapshot, OptimizationStrategy};
use proptest::prelude::*;

const POPULATION: usize = 12;
const ITERATIONS: usize = 15;

fn base_algorithm(index: usize, seed: u64) -> AlgorithmConfig {
    let seed = Some(seed);
    match index {
        0 => AlgorithmConfig::DifferentialEvolution(DeConfig {
            population_size: POPULATION,
            max_iterations: ITERATIONS,
            seed,
            ..DeConfig::default()
        }),
        1 => AlgorithmConfig::ParticleSwarm(PsoConfig {
            population_size: POPULATION,
            max_iterations: ITERATIONS,
            seed,
            ..PsoConfig::default()
        }),
        2 => AlgorithmConfig::GeneticAlgorithm(GaConfig {
            population_size: POPULATION,
            max_iterations: ITERATIONS,
            elitism_count: 2,
            seed,
            ..GaConfig::default()
        }),
        3 => AlgorithmConfig::AntColony(AcoConfig {
            archive_size: POPULATION,
            ants: POPULATION,
            max_iterations: ITERATIONS,
            seed,
            ..AcoConfig::default()
        }),
        4 => AlgorithmConfig::GreyWolf(GwoConfig {
            population_size: POPULATION,
            max_iterations: ITERATIONS,
            seed,
        }),
        _ => AlgorithmConfig::WhaleOptimization(WoaConfig {
            population_size: POPULATION,
            max_iterations: ITERATIONS,
            seed,
            ..WoaConfig::default()
        }),
    }
}

fn shifted_sphere(dimensions: usize, min: f64, width: f64, direction: Direction) -> ProblemSpec {
    let center = min + width / 3.0;
    ProblemSpec::uniform(dimensions, min, min + width, direction, move |x: &[f64]| {
        x.iter().map(|v| (v - center).powi(2)).sum()
    })
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: every position a base metaheuristic reports lies inside the bounds
    #[test]
    fn prop_positions_stay_within_bounds(
        index in 0usize..6,
        seed in any::<u64>(),
        dimensions in 1usize..5,
        min in -10.0f64..0.0,
        width in 0.5f64..10.0,
    ) {
        let problem = shifted_sphere(dimensions, min, width, Direction::Minimize);
        let strategy = base_algorithm(index, seed).build().unwrap();

        let mut escaped = false;
        let mut check = |snapshot: &IterationSnapshot<'_>| {
            escaped |= !problem.contains(snapshot.best_position);
            escaped |= snapshot.population.iter().any(|p| !problem.contains(p));
            true
        };
        let result = strategy.optimize(&problem, Some(&mut check));

        prop_assert!(!escaped, "{} left the bounds", strategy.name());
        prop_assert!(problem.contains(&result.best_position));
    }

    /// Property: the best fitness never regresses and every individual is evaluated
    #[test]
    fn prop_best_never_regresses(
        index in 0usize..6,
        seed in any::<u64>(),
        maximize in any::<bool>(),
    ) {
        let direction = if maximize { Direction::Maximize } else { Direction::Minimize };
        let problem = shifted_sphere(3, -5.0, 10.0, direction);
        let result = base_algorithm(index, seed).build().unwrap().optimize(&problem, None);

        prop_assert!(result.evaluations >= POPULATION);
        prop_assert!(result.convergence_curve.len() <= ITERATIONS);
        for pair in result.convergence_curve.windows(2) {
            prop_assert!(direction.is_at_least_as_good(pair[1], pair[0]), "{:?}", pair);
        }
        if let Some(last) = result.convergence_curve.last() {
            prop_assert_eq!(*last, result.best_fitness);
        }
    }

    /// Property: the archive stays mutually non-dominated and within its size bound
    #[test]
    fn prop_archive_non_dominated_and_bounded(
        points in prop::collection::vec((0.0f64..10.0, 0.0f64..10.0), 1..80),
        max_size in 1usize..15,
    ) {
        let directions = vec![Direction::Minimize, Direction::Minimize];
        let mut archive = ParetoArchive::new(directions.clone(), max_size);
        for (i, (a, b)) in points.iter().enumerate() {
            archive.offer(&[i as f64], &[*a, *b]);
            prop_assert!(archive.len() <= max_size);
        }
        let members = archive.members();
        prop_assert!(!members.is_empty());
        for x in members {
            for y in members {
                prop_assert!(!dominates(&x.objectives, &y.objectives, &directions));
            }
        }
    }

    /// Property: under feasibility rules a feasible optimum is reported when one is reachable
    #[test]
    fn prop_feasibility_rules_report_feasible_best(
        threshold in 0.0f64..1.5,
        seed in any::<u64>(),
    ) {
        let problem = ProblemSpec::builder(2)
            .uniform_bounds(0.0, 2.0)
            .objective(Direction::Minimize, |x: &[f64]| x[0] * x[0] + x[1] * x[1])
            .constraint(move |x: &[f64]| threshold - x[0] - x[1])
            .build()
            .unwrap();
        let constrained = ConstrainedHybrid::new(ConstrainedConfig {
            hybrid: HybridConfig {
                population_size: 20,
                max_iterations: 30,
                tolerance: 0.0,
                seed: Some(seed),
                ..HybridConfig::default()
            },
            handler: ConstraintHandler::FeasibilityRules,
        })
        .unwrap();

        let result = constrained.optimize(&problem, None);
        prop_assert_eq!(result.constraint_violation, Some(0.0));
        prop_assert!(result.success);
        prop_assert!(result.best_position[0] + result.best_position[1] >= threshold - 1e-12);
    }
}
