//! The grader contract and the graders shipped with codebench.
//!
//! Every grader receives the full problem set and the full solution set,
//! pairs solutions to problems by identifier, and emits one
//! [`GradingOutput`]. Solutions naming an unknown problem are never graded.

use serde_json::Value;
use std::io::Write;
use std::process::Command;

use codebench_core::{BenchError, Result};

use crate::executor::{ErrorKind, ExecutionPrimitive, ExecutionRequest, ExecutionResult};
use crate::grading::GradingOutput;
use crate::problem::{FunctionPrototype, LLMSolution, ProblemDefinition, TestCase};

pub mod correctness;
pub mod data_race;
pub mod halstead;
pub mod memory;
pub mod performance;
pub mod static_analysis;

pub use correctness::CorrectnessGrader;
pub use data_race::{CommandRaceDetector, DataRaceGrader, RaceDetector, RaceWarning};
pub use halstead::{HalsteadGrader, HalsteadMetrics};
pub use memory::MemoryGrader;
pub use performance::{AdaptiveRamp, PerformanceGrader, RampOutcome};
pub use static_analysis::{LintRater, QualityRater, StaticAnalysisGrader};

/// A grading criterion.
pub trait Grader: Send + Sync {
    /// Short identifier used for selection and reporting.
    fn identifier(&self) -> &'static str;

    /// Whether every problem carries what this grader needs.
    fn can_grade(&self, problems: &[ProblemDefinition]) -> bool {
        problems.iter().all(ProblemDefinition::has_grading_essentials)
    }

    /// Grade every solution that matches a problem.
    fn grade(&self, problems: &[ProblemDefinition], solutions: &[LLMSolution]) -> GradingOutput;
}

/// Solutions answering `problem`, in submission order.
pub(crate) fn solutions_for<'a>(
    problem: &'a ProblemDefinition,
    solutions: &'a [LLMSolution],
) -> impl Iterator<Item = &'a LLMSolution> + 'a {
    solutions
        .iter()
        .filter(move |s| s.problem_identifier == problem.identifier)
}

/// Invoke `code` on one test case.
///
/// A test case that cannot be bound to the prototype yields an
/// `InvalidInput` failure instead of reaching the primitive.
pub(crate) fn run_test_case(
    executor: &dyn ExecutionPrimitive,
    code: &str,
    prototype: &FunctionPrototype,
    test_case: &TestCase,
    configure: impl FnOnce(ExecutionRequest<'_>) -> ExecutionRequest<'_>,
) -> ExecutionResult {
    let arguments: Vec<Value> = match prototype.ordered_arguments(test_case) {
        Ok(arguments) => arguments,
        Err(e) => return ExecutionResult::failure(ErrorKind::InvalidInput, e.to_string()),
    };
    let request = configure(ExecutionRequest::call(
        code,
        &prototype.function_name,
        &arguments,
    ));
    executor.execute(&request)
}

/// Run an external analysis tool on `code` written to a temporary `.py`
/// file and return its combined stdout and stderr.
pub(crate) fn run_tool_on_source(command: &str, args: &[String], code: &str) -> Result<String> {
    let mut file = tempfile::Builder::new()
        .prefix("codebench_")
        .suffix(".py")
        .tempfile()?;
    file.write_all(code.as_bytes())?;
    file.flush()?;

    let output = Command::new(command)
        .args(args)
        .arg(file.path())
        .output()
        .map_err(|e| BenchError::ToolFailed {
            tool: command.to_string(),
            reason: e.to_string(),
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(text)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for grader tests.

    use super::*;
    use serde_json::json;

    pub fn add_problem() -> ProblemDefinition {
        serde_json::from_value(json!({
            "identifier": "add_two",
            "prompts": [{"prompt_id": "p1", "prompt": "Add a and b."}],
            "function_prototype": {
                "function_name": "add",
                "parameters": [{"name": "a", "type": "int"}, {"name": "b", "type": "int"}],
                "return_value": {"type": "int"}
            },
            "correctness_test_suite": [
                {"input": {"a": 2, "b": 3}, "expected_output": 5}
            ],
            "optimal_solution": "reference",
            "tags": ["math", "easy"]
        }))
        .unwrap()
    }

    pub fn solution(model: &str, code: &str) -> LLMSolution {
        LLMSolution::new("add_two", "p1", model, code)
    }
}
