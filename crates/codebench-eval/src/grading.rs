//! Grades produced by graders: issues, per-solution grades and outputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::problem::LLMSolution;

/// What kind of problem an issue describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// The candidate raised, timed out or failed to load.
    ExecutionError,
    /// The candidate returned a value different from the expected one.
    Mismatch,
    /// A timing or memory measurement was missing; the test case was excluded.
    MeasurementUnavailable,
    /// An external analysis tool could not be run.
    ToolUnavailable,
    /// A data-race report block.
    DataRace,
    /// The test case could not be bound to the prototype.
    InvalidInput,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::ExecutionError => "execution_error",
            IssueCategory::Mismatch => "mismatch",
            IssueCategory::MeasurementUnavailable => "measurement_unavailable",
            IssueCategory::ToolUnavailable => "tool_unavailable",
            IssueCategory::DataRace => "data_race",
            IssueCategory::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explanation of a deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_category: IssueCategory,
    pub issue_description: String,
}

impl Issue {
    pub fn new(category: IssueCategory, description: impl Into<String>) -> Self {
        Self {
            issue_category: category,
            issue_description: description.into(),
        }
    }
}

/// Outcome of one grader for one (problem, prompt, model) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionGrade {
    pub problem_identifier: String,
    pub prompt_identifier: String,
    pub model_identifier: String,

    /// Normalized score; the scale is grader-specific.
    pub score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_criteria_scores: Option<BTreeMap<String, f64>>,

    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl SolutionGrade {
    /// Grade carrying the identifier triple of `solution`.
    pub fn for_solution(solution: &LLMSolution, score: f64) -> Self {
        Self {
            problem_identifier: solution.problem_identifier.clone(),
            prompt_identifier: solution.prompt_identifier.clone(),
            model_identifier: solution.model_identifier.clone(),
            score,
            sub_criteria_scores: None,
            issues: Vec::new(),
        }
    }

    pub fn with_issues(mut self, issues: Vec<Issue>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_sub_criteria(mut self, scores: BTreeMap<String, f64>) -> Self {
        self.sub_criteria_scores = Some(scores);
        self
    }

    pub fn add_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }
}

/// All grades produced by one grader in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingOutput {
    pub solution_grades: Vec<SolutionGrade>,
    pub grader_identifier: String,
}

impl GradingOutput {
    pub fn new(grader_identifier: impl Into<String>) -> Self {
        Self {
            solution_grades: Vec::new(),
            grader_identifier: grader_identifier.into(),
        }
    }

    pub fn add_grade(&mut self, grade: SolutionGrade) {
        self.solution_grades.push(grade);
    }

    /// Mean score over all grades, 0 when there are none.
    pub fn average_score(&self) -> f64 {
        mean(self.solution_grades.iter().map(|g| g.score))
    }

    pub fn grades_for_model<'a>(
        &'a self,
        model: &'a str,
    ) -> impl Iterator<Item = &'a SolutionGrade> + 'a {
        self.solution_grades
            .iter()
            .filter(move |g| g.model_identifier == model)
    }

    pub fn len(&self) -> usize {
        self.solution_grades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solution_grades.is_empty()
    }
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
