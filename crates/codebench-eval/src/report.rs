//! Cross-grader report of one grading run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use codebench_core::Result;

use crate::grading::{mean, GradingOutput};
use crate::problem::ProblemDefinition;

/// Outputs of every grader that ran, plus the ones that refused the problem set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
    pub outputs: Vec<GradingOutput>,

    /// Identifiers of graders whose capability check failed.
    #[serde(default)]
    pub skipped: Vec<String>,

    pub timestamp: String,
}

/// Averages for one grader, serialized into the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraderSummary {
    pub grader_identifier: String,
    pub overall: f64,
    pub by_model: BTreeMap<String, f64>,
    pub by_tag: BTreeMap<String, f64>,
    pub by_problem: BTreeMap<String, f64>,
}

impl GradingReport {
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            skipped: Vec::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn add_output(&mut self, output: GradingOutput) {
        self.outputs.push(output);
    }

    pub fn add_skipped(&mut self, grader_identifier: &str) {
        self.skipped.push(grader_identifier.to_string());
    }

    pub fn output(&self, grader_identifier: &str) -> Option<&GradingOutput> {
        self.outputs
            .iter()
            .find(|o| o.grader_identifier == grader_identifier)
    }

    /// Mean score per model for one output.
    pub fn average_by_model(output: &GradingOutput) -> BTreeMap<String, f64> {
        group_mean(
            output
                .solution_grades
                .iter()
                .map(|g| (g.model_identifier.clone(), g.score)),
        )
    }

    /// Mean score per problem for one output.
    pub fn average_by_problem(output: &GradingOutput) -> BTreeMap<String, f64> {
        group_mean(
            output
                .solution_grades
                .iter()
                .map(|g| (g.problem_identifier.clone(), g.score)),
        )
    }

    /// Mean score per tag; a grade counts toward every tag of its problem.
    pub fn average_by_tag(
        output: &GradingOutput,
        problems: &[ProblemDefinition],
    ) -> BTreeMap<String, f64> {
        let tags: HashMap<&str, &[String]> = problems
            .iter()
            .map(|p| (p.identifier.as_str(), p.tags.as_slice()))
            .collect();

        group_mean(output.solution_grades.iter().flat_map(|g| {
            tags.get(g.problem_identifier.as_str())
                .copied()
                .unwrap_or_default()
                .iter()
                .map(move |tag| (tag.clone(), g.score))
        }))
    }

    /// Per-grader averages.
    pub fn summarize(&self, problems: &[ProblemDefinition]) -> Vec<GraderSummary> {
        self.outputs
            .iter()
            .map(|output| GraderSummary {
                grader_identifier: output.grader_identifier.clone(),
                overall: output.average_score(),
                by_model: Self::average_by_model(output),
                by_tag: Self::average_by_tag(output, problems),
                by_problem: Self::average_by_problem(output),
            })
            .collect()
    }

    pub fn print_summary(&self, problems: &[ProblemDefinition]) {
        println!("═══════════════════════════════════════════════════════════");
        println!("  Grading Summary");
        println!("═══════════════════════════════════════════════════════════");
        println!();

        for summary in self.summarize(problems) {
            println!(
                "{:<30} {:>10.4}  (overall)",
                summary.grader_identifier, summary.overall
            );
            println!("{}", "-".repeat(64));
            for (model, score) in &summary.by_model {
                println!("  model {:<24} {:>10.4}", model, score);
            }
            for (tag, score) in &summary.by_tag {
                println!("  tag   {:<24} {:>10.4}", tag, score);
            }
            println!();
        }

        if !self.skipped.is_empty() {
            println!("Skipped graders: {}", self.skipped.join(", "));
            println!();
        }
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for GradingReport {
    fn default() -> Self {
        Self::new()
    }
}

fn group_mean(pairs: impl Iterator<Item = (String, f64)>) -> BTreeMap<String, f64> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (key, score) in pairs {
        groups.entry(key).or_default().push(score);
    }
    groups
        .into_iter()
        .map(|(key, scores)| (key, mean(scores.into_iter())))
        .collect()
}
