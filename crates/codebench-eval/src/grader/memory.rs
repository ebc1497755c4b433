//! Relative peak memory against the problem's optimal solution.
//!
//! Every test case runs a fixed number of iterations for both
//! implementations. Score = `min(1, reference_peak_total / candidate_peak_total)`.

use std::sync::Arc;
use tracing::{info, warn};

use codebench_core::logging::log_solution_graded;
use codebench_core::MemoryConfig;

use super::{run_test_case, solutions_for, Grader};
use crate::executor::ExecutionPrimitive;
use crate::grading::{GradingOutput, Issue, IssueCategory, SolutionGrade};
use crate::problem::{FunctionPrototype, LLMSolution, ProblemDefinition};

pub struct MemoryGrader {
    executor: Arc<dyn ExecutionPrimitive>,
    iterations: u64,
}

impl MemoryGrader {
    pub const IDENTIFIER: &'static str = "memory";

    pub fn new(executor: Arc<dyn ExecutionPrimitive>) -> Self {
        Self::from_config(executor, &MemoryConfig::default())
    }

    pub fn from_config(executor: Arc<dyn ExecutionPrimitive>, config: &MemoryConfig) -> Self {
        Self {
            executor,
            iterations: config.iterations.max(1),
        }
    }

    fn grade_solution(
        &self,
        problem: &ProblemDefinition,
        prototype: &FunctionPrototype,
        reference: &str,
        solution: &LLMSolution,
    ) -> Option<SolutionGrade> {
        let mut candidate_total: u64 = 0;
        let mut reference_total: u64 = 0;
        let mut issues = Vec::new();

        for (i, test_case) in problem.correctness_test_suite.iter().enumerate() {
            let sample = |code: &str| {
                run_test_case(self.executor.as_ref(), code, prototype, test_case, |req| {
                    req.with_iterations(self.iterations).with_memory_usage()
                })
            };
            let candidate = sample(&solution.solution_code);
            let baseline = sample(reference);

            match (candidate.peak_memory, baseline.peak_memory) {
                (Some(candidate_peak), Some(reference_peak)) => {
                    candidate_total = candidate_total.saturating_add(candidate_peak);
                    reference_total = reference_total.saturating_add(reference_peak);
                }
                _ => issues.push(Issue::new(
                    IssueCategory::MeasurementUnavailable,
                    format!(
                        "Peak memory unavailable for test case {}{}; test case excluded",
                        i,
                        candidate
                            .error
                            .as_deref()
                            .map(|e| format!(" ({})", e))
                            .unwrap_or_default()
                    ),
                )),
            }
        }

        if candidate_total == 0 {
            warn!(
                problem = %problem.identifier,
                model = %solution.model_identifier,
                "No candidate peak memory measured, no memory grade emitted"
            );
            return None;
        }

        let score = (reference_total as f64 / candidate_total as f64).min(1.0);
        Some(SolutionGrade::for_solution(solution, score).with_issues(issues))
    }
}

impl Grader for MemoryGrader {
    fn identifier(&self) -> &'static str {
        Self::IDENTIFIER
    }

    fn can_grade(&self, problems: &[ProblemDefinition]) -> bool {
        problems
            .iter()
            .all(|p| p.has_grading_essentials() && p.optimal_solution.is_some())
    }

    fn grade(&self, problems: &[ProblemDefinition], solutions: &[LLMSolution]) -> GradingOutput {
        let mut output = GradingOutput::new(Self::IDENTIFIER);
        for problem in problems {
            let (Some(prototype), Some(reference)) = (
                problem.function_prototype.as_ref(),
                problem.optimal_solution.as_deref(),
            ) else {
                warn!(problem = %problem.identifier, "Problem lacks prototype or optimal solution, skipping");
                continue;
            };

            info!(problem = %problem.identifier, grader = Self::IDENTIFIER, "Grading problem");
            for solution in solutions_for(problem, solutions) {
                if let Some(grade) = self.grade_solution(problem, prototype, reference, solution) {
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
        }
        output
    }
}
