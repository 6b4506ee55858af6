//! Algorithm catalog commands.

use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::table::{list_table, render_list};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::optimization::{list_algorithms, AlgorithmDescriptor};

#[derive(Args, Debug)]
pub struct AlgorithmsArgs {
    /// Show the parameters of one algorithm
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AlgorithmListOutput {
    pub algorithms: Vec<AlgorithmDescriptor>,
    pub total: usize,
}

impl CommandOutput for AlgorithmListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "name", "params", "description"]);
        for algorithm in &self.algorithms {
            table.add_row(vec![
                algorithm.id.clone(),
                algorithm.name.clone(),
                algorithm.parameters.len().to_string(),
                truncate(&algorithm.description, 60),
            ]);
        }
        render_list("algorithm", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.algorithms).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct AlgorithmDetailOutput {
    pub algorithm: AlgorithmDescriptor,
}

impl CommandOutput for AlgorithmDetailOutput {
    fn to_human(&self) -> String {
        let algorithm = &self.algorithm;
        let mut table = list_table(&["parameter", "type", "default", "description"]);
        for param in &algorithm.parameters {
            table.add_row(vec![
                param.name.clone(),
                param.kind.clone(),
                truncate(&param.default.to_string(), 30),
                param.description.clone(),
            ]);
        }
        format!(
            "{} ({})\n{}\n\n{}",
            algorithm.name, algorithm.id, algorithm.description, table
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.algorithm).unwrap_or_default()
    }
}

pub fn execute(args: AlgorithmsArgs, json_mode: bool) -> Result<()> {
    let algorithms = list_algorithms();
    match args.id {
        Some(id) => {
            let algorithm = algorithms
                .into_iter()
                .find(|a| a.id == id)
                .ok_or_else(|| anyhow!("Unknown algorithm: {id}"))?;
            output(&AlgorithmDetailOutput { algorithm }, json_mode);
        }
        None => {
            let total = algorithms.len();
            output(&AlgorithmListOutput { algorithms, total }, json_mode);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_output_mentions_every_id() {
        let algorithms = list_algorithms();
        let total = algorithms.len();
        let human = AlgorithmListOutput { algorithms, total }.to_human();
        assert!(human.starts_with("9 algorithms:"));
        assert!(human.contains("whale_optimization"));
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        let err = execute(
            AlgorithmsArgs {
                id: Some("tabu_search".to_string()),
            },
            true,
        )
        .unwrap_err();
        assert!(err.to_string().contains("tabu_search"));
    }
}
