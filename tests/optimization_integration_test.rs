//! End-to-end runs of the optimizers on benchmark problems.

use metaswarm::domain::models::{Direction, ProblemSpec, TerminationReason};
use metaswarm::optimization::de::{DeConfig, DifferentialEvolution};
use metaswarm::optimization::hybrid::{HybridConfig, HybridDePso};
use metaswarm::optimization::multi_objective::{MoConfig, MultiObjectiveHybrid};
use metaswarm::optimization::pareto::dominates;
use metaswarm::optimization::problems::ProblemRequest;
use metaswarm::optimization::{list_algorithms, AlgorithmConfig, OptimizationStrategy};

#[test]
fn test_de_solves_2d_sphere_in_50_iterations() {
    let problem = ProblemSpec::uniform(2, -5.0, 5.0, Direction::Minimize, |x: &[f64]| {
        x.iter().map(|v| v * v).sum()
    })
    .unwrap();
    let de = DifferentialEvolution::new(DeConfig {
        population_size: 20,
        max_iterations: 50,
        seed: Some(42),
        ..DeConfig::default()
    })
    .unwrap();

    let result = de.optimize(&problem, None);
    assert!(result.best_fitness < 1e-3, "best {}", result.best_fitness);
    assert_eq!(result.iterations, 50);
    assert_eq!(result.convergence_curve.len(), 50);
    assert!(result.evaluations >= 20);
}

#[test]
fn test_every_catalog_algorithm_runs_on_a_benchmark() {
    for descriptor in list_algorithms() {
        let dimensions = 3;
        let name = if descriptor.id == "multi_objective_hybrid" {
            "zdt1"
        } else {
            "sphere"
        };
        let problem = ProblemRequest::new(name, dimensions).build().unwrap();
        let config = AlgorithmConfig::default_for(&descriptor.id).unwrap();
        config.validate_for(&problem).unwrap();

        let result = config.build().unwrap().optimize(&problem, None);
        assert_eq!(result.algorithm_name, descriptor.name);
        assert!(problem.contains(&result.best_position), "{}", descriptor.id);
        assert_ne!(result.termination, TerminationReason::NumericalError);
    }
}

#[test]
fn test_callback_stop_truncates_curve() {
    let problem = ProblemRequest::new("rastrigin", 4).build().unwrap();
    let hybrid = HybridDePso::new(HybridConfig {
        seed: Some(8),
        tolerance: 0.0,
        ..HybridConfig::default()
    })
    .unwrap();

    let mut seen = 0;
    let mut stop_at_five = |snapshot: &metaswarm::optimization::IterationSnapshot<'_>| {
        seen = snapshot.iteration;
        snapshot.iteration < 5
    };
    let result = hybrid.optimize(&problem, Some(&mut stop_at_five));
    assert_eq!(seen, 5);
    assert_eq!(result.termination, TerminationReason::Stopped);
    assert_eq!(result.convergence_curve.len(), 5);
}

#[test]
fn test_zdt1_front_is_mutually_non_dominated() {
    let problem = ProblemRequest::new("zdt1", 5).build().unwrap();
    let mo = MultiObjectiveHybrid::new(MoConfig {
        hybrid: HybridConfig {
            population_size: 30,
            max_iterations: 40,
            tolerance: 0.0,
            seed: Some(4),
            ..HybridConfig::default()
        },
        archive_size: 25,
        ..MoConfig::default()
    })
    .unwrap();

    let result = mo.optimize(&problem, None);
    let front = result.pareto_front.expect("multi-objective runs report a front");
    assert!(!front.is_empty());
    assert!(front.len() <= 25);
    for a in &front {
        for b in &front {
            assert!(!dominates(&a.objectives, &b.objectives, problem.directions()));
        }
    }
}
