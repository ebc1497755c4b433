//! Relative runtime against the problem's optimal solution.
//!
//! Timing a single call is too noisy, so each test case is measured with an
//! adaptive ramp: both implementations run with 1, 10, 100, ... back-to-back
//! iterations until the running CPU-time total of either one passes a
//! ceiling. Totals carry over across test cases, so once the ceiling has been
//! reached the remaining test cases are measured with a single round.
//!
//! Score = `min(1, reference_total / candidate_total)`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use codebench_core::logging::{log_ramp_round, log_solution_graded};
use codebench_core::PerformanceConfig;

use super::{run_test_case, solutions_for, Grader};
use crate::executor::{ExecutionPrimitive, ExecutionResult};
use crate::grading::{GradingOutput, Issue, IssueCategory, SolutionGrade};
use crate::problem::{FunctionPrototype, LLMSolution, ProblemDefinition, TestCase};

/// Result of ramping one test case.
#[derive(Debug, Clone, PartialEq)]
pub struct RampOutcome {
    /// Completed rounds (both timings available).
    pub rounds: u32,
    /// Iteration count of the last completed round.
    pub final_iterations: u64,
    /// Candidate CPU seconds accumulated by this test case.
    pub candidate_time: f64,
    /// Reference CPU seconds accumulated by this test case.
    pub reference_time: f64,
    /// A timing was missing; this test case must not count.
    pub aborted: bool,
}

/// The iteration ramp, separated from grading so it can be driven directly.
#[derive(Debug, Clone)]
pub struct AdaptiveRamp {
    config: PerformanceConfig,
}

impl AdaptiveRamp {
    pub fn new(config: PerformanceConfig) -> Self {
        Self { config }
    }

    /// Ramp one test case.
    ///
    /// `committed` holds the (candidate, reference) totals of earlier test
    /// cases; the ceiling is checked against those plus this test case's own
    /// running totals.
    pub fn measure(
        &self,
        mut run: impl FnMut(u64) -> (ExecutionResult, ExecutionResult),
        committed: (f64, f64),
    ) -> RampOutcome {
        let mut outcome = RampOutcome {
            rounds: 0,
            final_iterations: 0,
            candidate_time: 0.0,
            reference_time: 0.0,
            aborted: false,
        };

        let mut iterations = 1u64;
        loop {
            let (candidate, reference) = run(iterations);
            let (Some(candidate_time), Some(reference_time)) =
                (candidate.cpu_time, reference.cpu_time)
            else {
                outcome.aborted = true;
                break;
            };

            outcome.candidate_time += candidate_time;
            outcome.reference_time += reference_time;
            outcome.rounds += 1;
            outcome.final_iterations = iterations;

            let candidate_total = committed.0 + outcome.candidate_time;
            let reference_total = committed.1 + outcome.reference_time;
            let ceiling = self.config.time_ceiling_secs;
            if outcome.rounds >= self.config.min_rounds
                && (candidate_total > ceiling || reference_total > ceiling)
            {
                break;
            }

            match iterations.checked_mul(self.config.growth_factor) {
                Some(next) if next <= self.config.max_iterations => iterations = next,
                _ => {
                    debug!(
                        iterations = iterations,
                        max_iterations = self.config.max_iterations,
                        "Iteration cap reached before the time ceiling"
                    );
                    break;
                }
            }
        }
        outcome
    }
}

pub struct PerformanceGrader {
    executor: Arc<dyn ExecutionPrimitive>,
    ramp: AdaptiveRamp,
}

impl PerformanceGrader {
    pub const IDENTIFIER: &'static str = "performance";

    pub fn new(executor: Arc<dyn ExecutionPrimitive>) -> Self {
        Self::from_config(executor, &PerformanceConfig::default())
    }

    pub fn from_config(executor: Arc<dyn ExecutionPrimitive>, config: &PerformanceConfig) -> Self {
        Self {
            executor,
            ramp: AdaptiveRamp::new(config.clone()),
        }
    }

    fn timed(
        &self,
        code: &str,
        prototype: &FunctionPrototype,
        test_case: &TestCase,
        iterations: u64,
    ) -> ExecutionResult {
        run_test_case(self.executor.as_ref(), code, prototype, test_case, |req| {
            req.with_iterations(iterations).with_cpu_time()
        })
    }

    fn grade_solution(
        &self,
        problem: &ProblemDefinition,
        prototype: &FunctionPrototype,
        reference: &str,
        solution: &LLMSolution,
    ) -> Option<SolutionGrade> {
        let mut candidate_total = 0.0;
        let mut reference_total = 0.0;
        let mut issues = Vec::new();

        for (i, test_case) in problem.correctness_test_suite.iter().enumerate() {
            let outcome = self.ramp.measure(
                |iterations| {
                    let candidate =
                        self.timed(&solution.solution_code, prototype, test_case, iterations);
                    let baseline = self.timed(reference, prototype, test_case, iterations);
                    log_ramp_round(
                        &problem.identifier,
                        i,
                        iterations,
                        candidate.cpu_time.unwrap_or(f64::NAN),
                        baseline.cpu_time.unwrap_or(f64::NAN),
                    );
                    (candidate, baseline)
                },
                (candidate_total, reference_total),
            );

            if outcome.aborted {
                issues.push(Issue::new(
                    IssueCategory::MeasurementUnavailable,
                    format!(
                        "CPU time unavailable for test case {} after {} round(s); test case excluded",
                        i, outcome.rounds
                    ),
                ));
                continue;
            }
            candidate_total += outcome.candidate_time;
            reference_total += outcome.reference_time;
        }

        if candidate_total <= 0.0 {
            warn!(
                problem = %problem.identifier,
                model = %solution.model_identifier,
                "No candidate CPU time measured, no performance grade emitted"
            );
            return None;
        }

        let score = (reference_total / candidate_total).min(1.0);
        Some(SolutionGrade::for_solution(solution, score).with_issues(issues))
    }
}

impl Grader for PerformanceGrader {
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
