//! Local optimization runs against a benchmark problem.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::progress::create_progress_bar;
use crate::cli::output::{format_position, output, CommandOutput};
use crate::domain::models::{OptimizationResult, ParetoPoint};
use crate::optimization::problems::ProblemRequest;
use crate::optimization::{AlgorithmConfig, IterationSnapshot};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Benchmark problem name
    #[arg(short, long, default_value = "sphere")]
    pub problem: String,

    /// Problem dimensionality
    #[arg(short, long, default_value = "2")]
    pub dimensions: usize,

    /// Algorithm id
    #[arg(short, long, default_value = "hybrid_de_pso")]
    pub algorithm: String,

    /// YAML algorithm configuration; overrides --algorithm
    #[arg(short = 'f', long)]
    pub algorithm_file: Option<PathBuf>,

    /// Include the convergence curve in the output
    #[arg(long)]
    pub curve: bool,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub problem: String,
    pub dimensions: usize,
    pub algorithm: String,
    pub success: bool,
    pub termination: String,
    pub message: String,
    pub best_fitness: f64,
    pub best_position: Vec<f64>,
    pub iterations: usize,
    pub evaluations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_violation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pareto_front: Option<Vec<ParetoPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergence_curve: Option<Vec<f64>>,
}

impl RunOutput {
    fn new(problem: &ProblemRequest, result: OptimizationResult, curve: bool) -> Self {
        Self {
            problem: problem.name.clone(),
            dimensions: problem.dimensions,
            algorithm: result.algorithm_name,
            success: result.success,
            termination: result.termination.as_str().to_string(),
            message: result.message,
            best_fitness: result.best_fitness,
            best_position: result.best_position,
            iterations: result.iterations,
            evaluations: result.evaluations,
            constraint_violation: result.constraint_violation,
            pareto_front: result.pareto_front,
            convergence_curve: curve.then_some(result.convergence_curve),
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} on {} ({}-D)", self.algorithm, self.problem, self.dimensions),
            format!(
                "Result: {} ({})",
                if self.success { "success" } else { "failed" },
                self.termination
            ),
            format!("Best fitness: {:.6e}", self.best_fitness),
            format!("Best position: {}", format_position(&self.best_position)),
            format!(
                "Iterations: {}  Evaluations: {}",
                self.iterations, self.evaluations
            ),
        ];
        if let Some(violation) = self.constraint_violation {
            lines.push(format!("Constraint violation: {violation}"));
        }
        if let Some(front) = &self.pareto_front {
            lines.push(format!("Pareto front: {} members", front.len()));
        }
        if let Some(curve) = &self.convergence_curve {
            lines.push("\nConvergence:".to_string());
            for (i, best) in curve.iter().enumerate() {
                lines.push(format!("  {:>5}  {best:.6e}", i + 1));
            }
        }
        lines.push(format!("\n{}", self.message));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

async fn load_algorithm(args: &RunArgs) -> Result<AlgorithmConfig> {
    match &args.algorithm_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_yaml::from_str(&raw)
                .with_context(|| format!("Invalid algorithm configuration in {}", path.display()))
        }
        None => AlgorithmConfig::default_for(&args.algorithm)
            .ok_or_else(|| anyhow!("Unknown algorithm: {}", args.algorithm)),
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let config = load_algorithm(&args).await?;
    let request = ProblemRequest::new(args.problem.clone(), args.dimensions);
    let problem = request.build().context("Invalid problem")?;
    config
        .validate_for(&problem)
        .with_context(|| format!("Invalid {} configuration", config.id()))?;
    let strategy = config.build()?;

    tracing::info!(
        algorithm = config.id(),
        problem = %request.name,
        dimensions = request.dimensions,
        max_iterations = config.max_iterations(),
        "starting local run"
    );

    let bar = create_progress_bar(config.max_iterations() as u64, json_mode);
    let progress = bar.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut on_iteration = |snapshot: &IterationSnapshot<'_>| {
            progress.set_position(snapshot.iteration as u64);
            progress.set_message(format!("best {:.6e}", snapshot.best_fitness));
            true
        };
        strategy.optimize(&problem, Some(&mut on_iteration))
    })
    .await
    .context("Optimization run panicked")?;
    bar.finish_and_clear();

    output(&RunOutput::new(&request, result, args.curve), json_mode);
    Ok(())
}
