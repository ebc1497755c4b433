//! Data-race report grading.
//!
//! A race detector (ThreadSanitizer-style) is run on the candidate and its
//! report is split into warning blocks. Each block is weighed with a severity
//! lexicon and the severities are summed into the score. A clean report gets
//! the configured clean score instead. The scale is unbounded.

use std::sync::Arc;
use tracing::{info, warn};

use codebench_core::logging::log_solution_graded;
use codebench_core::{BenchError, RaceDetectorConfig, Result, SeverityRule};

use super::{run_tool_on_source, solutions_for, Grader};
use crate::grading::{GradingOutput, Issue, IssueCategory, SolutionGrade};
use crate::problem::{LLMSolution, ProblemDefinition};

/// Line that opens a warning block in a race report.
pub const BLOCK_START: &str = "WARNING: ThreadSanitizer: data race";

/// One warning block of a race report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceWarning {
    pub text: String,
}

/// Produces the race warnings for a piece of code.
pub trait RaceDetector: Send + Sync {
    fn detect_races(&self, code: &str) -> Result<Vec<RaceWarning>>;
}

/// Split a report into blocks that start at [`BLOCK_START`] and end at a
/// blank line. A block still open at the end of the report is kept.
pub fn parse_race_warnings(report: &str) -> Vec<RaceWarning> {
    let mut warnings = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in report.lines() {
        if line.contains(BLOCK_START) {
            if let Some(lines) = current.take() {
                warnings.push(RaceWarning {
                    text: lines.join("\n"),
                });
            }
            current = Some(vec![line]);
        } else if line.trim().is_empty() {
            if let Some(lines) = current.take() {
                warnings.push(RaceWarning {
                    text: lines.join("\n"),
                });
            }
        } else if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some(lines) = current {
        warnings.push(RaceWarning {
            text: lines.join("\n"),
        });
    }
    warnings
}

/// Runs a configured detector command on the code written to a temporary file.
pub struct CommandRaceDetector {
    command: String,
    args: Vec<String>,
}

impl CommandRaceDetector {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn from_config(config: &RaceDetectorConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl RaceDetector for CommandRaceDetector {
    fn detect_races(&self, code: &str) -> Result<Vec<RaceWarning>> {
        if self.command.trim().is_empty() {
            return Err(BenchError::ToolFailed {
                tool: "race detector".into(),
                reason: "no command configured (set race_detector.command)".into(),
            });
        }
        let report = run_tool_on_source(&self.command, &self.args, code)?;
        Ok(parse_race_warnings(&report))
    }
}

pub struct DataRaceGrader {
    detector: Arc<dyn RaceDetector>,
    severities: Vec<SeverityRule>,
    clean_score: f64,
}

impl DataRaceGrader {
    pub const IDENTIFIER: &'static str = "dynamicthread";

    pub fn new(detector: Arc<dyn RaceDetector>) -> Self {
        Self::from_config(detector, &RaceDetectorConfig::default())
    }

    pub fn from_config(detector: Arc<dyn RaceDetector>, config: &RaceDetectorConfig) -> Self {
        Self {
            detector,
            severities: config.severities.clone(),
            clean_score: config.clean_score,
        }
    }

    /// Sum of the severities of every lexicon pattern found in `warning`.
    pub fn severity(&self, warning: &RaceWarning) -> f64 {
        self.severities
            .iter()
            .filter(|rule| warning.text.contains(&rule.pattern))
            .map(|rule| rule.severity)
            .sum()
    }

    fn grade_solution(&self, solution: &LLMSolution) -> SolutionGrade {
        let warnings = match self.detector.detect_races(&solution.solution_code) {
            Ok(warnings) => warnings,
            Err(e) => {
                warn!(error = %e, "Race detector failed, no race report available");
                return SolutionGrade::for_solution(solution, 0.0).with_issues(vec![Issue::new(
                    IssueCategory::ToolUnavailable,
                    e.to_string(),
                )]);
            }
        };

        if warnings.is_empty() {
            return SolutionGrade::for_solution(solution, self.clean_score);
        }

        let score: f64 = warnings.iter().map(|w| self.severity(w)).sum();
        let issues = warnings
            .into_iter()
            .map(|w| Issue::new(IssueCategory::DataRace, w.text))
            .collect();
        SolutionGrade::for_solution(solution, score).with_issues(issues)
    }
}

impl Grader for DataRaceGrader {
    fn identifier(&self) -> &'static str {
        Self::IDENTIFIER
    }

    fn grade(&self, problems: &[ProblemDefinition], solutions: &[LLMSolution]) -> GradingOutput {
        let mut output = GradingOutput::new(Self::IDENTIFIER);
        for problem in problems {
            info!(problem = %problem.identifier, grader = Self::IDENTIFIER, "Grading problem");
            for solution in solutions_for(problem, solutions) {
                let grade = self.grade_solution(solution);
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
