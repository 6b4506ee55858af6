//! Benchmark problem listing.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::table::{list_table, render_list};
use crate::cli::output::{output, CommandOutput};
use crate::optimization::problems::BENCHMARKS;

#[derive(Debug, Serialize)]
pub struct ProblemOutput {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ProblemListOutput {
    pub problems: Vec<ProblemOutput>,
}

impl CommandOutput for ProblemListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["name", "range", "description"]);
        for problem in &self.problems {
            table.add_row(vec![
                problem.name.clone(),
                format!("[{}, {}]", problem.min, problem.max),
                problem.description.clone(),
            ]);
        }
        render_list("problem", &table, self.problems.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.problems).unwrap_or_default()
    }
}

pub fn execute(json_mode: bool) -> Result<()> {
    let problems = BENCHMARKS
        .iter()
        .map(|(name, min, max, description)| ProblemOutput {
            name: (*name).to_string(),
            min: *min,
            max: *max,
            description: (*description).to_string(),
        })
        .collect();
    output(&ProblemListOutput { problems }, json_mode);
    Ok(())
}
