//! Lint-based code quality rating.
//!
//! The rating tool is a black box behind [`QualityRater`]; `LintRater` runs a
//! pylint-compatible command and scrapes its "rated at X/10" line.

use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use codebench_core::logging::log_solution_graded;
use codebench_core::{LintConfig, Result};

use super::{run_tool_on_source, solutions_for, Grader};
use crate::grading::{GradingOutput, Issue, IssueCategory, SolutionGrade};
use crate::problem::{LLMSolution, ProblemDefinition};

/// Rates source code on a normalized [0, 1] scale.
pub trait QualityRater: Send + Sync {
    /// `Ok(None)` when the tool ran but reported no rating.
    fn quality_rating(&self, code: &str) -> Result<Option<f64>>;
}

/// Extract a pylint-style score and normalize it to [0, 1].
pub fn parse_lint_rating(output: &str) -> Option<f64> {
    static RATING: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = RATING
        .get_or_init(|| Regex::new(r"Your code has been rated at (-?[0-9]+(?:\.[0-9]+)?)/10").ok())
        .as_ref()?;
    let raw: f64 = pattern.captures(output)?.get(1)?.as_str().parse().ok()?;
    Some((raw / 10.0).clamp(0.0, 1.0))
}

/// Runs a lint command on the code written to a temporary `.py` file.
pub struct LintRater {
    command: String,
    args: Vec<String>,
}

impl LintRater {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn from_config(config: &LintConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl QualityRater for LintRater {
    fn quality_rating(&self, code: &str) -> Result<Option<f64>> {
        // Lint exit codes encode message categories, not failure
        let output = run_tool_on_source(&self.command, &self.args, code)?;
        Ok(parse_lint_rating(&output))
    }
}

pub struct StaticAnalysisGrader {
    rater: Arc<dyn QualityRater>,
    fallback_score: f64,
}

impl StaticAnalysisGrader {
    pub const IDENTIFIER: &'static str = "staticthread";

    pub fn new(rater: Arc<dyn QualityRater>) -> Self {
        Self::from_config(rater, &LintConfig::default())
    }

    pub fn from_config(rater: Arc<dyn QualityRater>, config: &LintConfig) -> Self {
        Self {
            rater,
            fallback_score: config.fallback_score,
        }
    }
}

impl Grader for StaticAnalysisGrader {
    fn identifier(&self) -> &'static str {
        Self::IDENTIFIER
    }

    fn grade(&self, problems: &[ProblemDefinition], solutions: &[LLMSolution]) -> GradingOutput {
        let mut output = GradingOutput::new(Self::IDENTIFIER);
        for problem in problems {
            info!(problem = %problem.identifier, grader = Self::IDENTIFIER, "Grading problem");
            for solution in solutions_for(problem, solutions) {
                let grade = match self.rater.quality_rating(&solution.solution_code) {
                    Ok(rating) => SolutionGrade::for_solution(
                        solution,
                        rating.unwrap_or(self.fallback_score),
                    ),
                    Err(e) => {
                        warn!(error = %e, "Quality rating failed, using fallback score");
                        SolutionGrade::for_solution(solution, self.fallback_score).with_issues(
                            vec![Issue::new(IssueCategory::ToolUnavailable, e.to_string())],
                        )
                    }
                };
                log_solution_graded(
                    Self::IDENTIFIER,
                    &problem.identifier,
                    &solution.model_identifier,
                    grade.score,
                    grade.issues.len(),
                );
                output.add_grade(grade);
            }
        }
        output
    }
}
