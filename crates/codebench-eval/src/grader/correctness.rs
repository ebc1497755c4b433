//! Functional correctness: fraction of test cases whose output matches.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use codebench_core::logging::log_solution_graded;
use codebench_core::CorrectnessConfig;

use super::{run_test_case, solutions_for, Grader};
use crate::executor::{ErrorKind, ExecutionPrimitive};
use crate::grading::{GradingOutput, Issue, IssueCategory, SolutionGrade};
use crate::problem::{LLMSolution, ProblemDefinition, TestCase};

pub struct CorrectnessGrader {
    executor: Arc<dyn ExecutionPrimitive>,
    float_tolerance: Option<f64>,
}

impl CorrectnessGrader {
    pub const IDENTIFIER: &'static str = "correctness";

    pub fn new(executor: Arc<dyn ExecutionPrimitive>) -> Self {
        Self {
            executor,
            float_tolerance: None,
        }
    }

    pub fn from_config(executor: Arc<dyn ExecutionPrimitive>, config: &CorrectnessConfig) -> Self {
        Self {
            executor,
            float_tolerance: config.float_tolerance,
        }
    }

    pub fn with_float_tolerance(mut self, tolerance: f64) -> Self {
        self.float_tolerance = Some(tolerance);
        self
    }

    fn grade_solution(
        &self,
        problem: &ProblemDefinition,
        solution: &LLMSolution,
    ) -> Option<SolutionGrade> {
        let prototype = problem.function_prototype.as_ref()?;
        let suite = &problem.correctness_test_suite;

        let mut issues = Vec::new();
        let mut passed = 0usize;
        for (i, test_case) in suite.iter().enumerate() {
            let outcome = run_test_case(
                self.executor.as_ref(),
                &solution.solution_code,
                prototype,
                test_case,
                |req| req,
            );

            if let Some(error) = &outcome.error {
                let category = if outcome.error_kind == Some(ErrorKind::InvalidInput) {
                    IssueCategory::InvalidInput
                } else {
                    IssueCategory::ExecutionError
                };
                issues.push(Issue::new(
                    category,
                    format!(
                        "Error encountered during execution for test case {} ({}): {}\n{}",
                        i,
                        describe_input(test_case),
                        error,
                        outcome.traceback.as_deref().unwrap_or_default()
                    ),
                ));
                continue;
            }

            let actual = outcome.result.unwrap_or(Value::Null);
            if values_equal(&test_case.expected_output, &actual, self.float_tolerance) {
                passed += 1;
            } else {
                issues.push(Issue::new(
                    IssueCategory::Mismatch,
                    format!(
                        "Test case {} failed for input {}: expected {} ({}), got {} ({})",
                        i,
                        describe_input(test_case),
                        test_case.expected_output,
                        type_name(&test_case.expected_output),
                        actual,
                        type_name(&actual)
                    ),
                ));
            }
        }

        let score = if suite.is_empty() {
            0.0
        } else {
            passed as f64 / suite.len() as f64
        };
        Some(SolutionGrade::for_solution(solution, score).with_issues(issues))
    }
}

impl Grader for CorrectnessGrader {
    fn identifier(&self) -> &'static str {
        Self::IDENTIFIER
    }

    fn grade(&self, problems: &[ProblemDefinition], solutions: &[LLMSolution]) -> GradingOutput {
        let mut output = GradingOutput::new(Self::IDENTIFIER);
        for problem in problems {
            info!(problem = %problem.identifier, grader = Self::IDENTIFIER, "Grading problem");
            for solution in solutions_for(problem, solutions) {
                let Some(grade) = self.grade_solution(problem, solution) else {
                    warn!(problem = %problem.identifier, "Problem has no function prototype, skipping");
                    break;
                };
                for issue in &grade.issues {
                    warn!(
                        problem = %problem.identifier,
                        model = %solution.model_identifier,
                        category = %issue.issue_category,
                        "{}",
                        issue.issue_description
                    );
                }
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

fn describe_input(test_case: &TestCase) -> String {
    Value::Object(test_case.input.clone()).to_string()
}

/// Structural equality with numeric normalization.
///
/// Numbers compare by value (`5 == 5.0`); with a tolerance, any two numbers
/// within it are equal. A bool compared with a number counts as 0 or 1, so
/// `true == 1`. Arrays and objects compare element-wise.
pub fn values_equal(expected: &Value, actual: &Value, tolerance: Option<f64>) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => {
            if let (Some(e), Some(a)) = (e.as_i64(), a.as_i64()) {
                return e == a;
            }
            if let (Some(e), Some(a)) = (e.as_u64(), a.as_u64()) {
                return e == a;
            }
            match (e.as_f64(), a.as_f64()) {
                (Some(e), Some(a)) => match tolerance {
                    Some(tol) => (e - a).abs() <= tol,
                    None => e == a,
                },
                _ => false,
            }
        }
        (Value::Bool(b), Value::Number(_)) => {
            values_equal(&Value::from(u8::from(*b)), actual, tolerance)
        }
        (Value::Number(_), Value::Bool(b)) => {
            values_equal(expected, &Value::from(u8::from(*b)), tolerance)
        }
        (Value::Array(e), Value::Array(a)) => {
            e.len() == a.len()
                && e.iter()
                    .zip(a)
                    .all(|(e, a)| values_equal(e, a, tolerance))
        }
        (Value::Object(e), Value::Object(a)) => {
            e.len() == a.len()
                && e.iter().all(|(key, e)| {
                    a.get(key)
                        .is_some_and(|a| values_equal(e, a, tolerance))
                })
        }
        _ => expected == actual,
    }
}

/// Runtime type name of a returned value, in the candidate's vocabulary.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::executor::{ExecutionRequest, ExecutionResult};
    use serde_json::json;

    fn grader_returning(value: Value) -> CorrectnessGrader {
        let executor = move |_: &ExecutionRequest<'_>| ExecutionResult::returned(value.clone());
        CorrectnessGrader::new(Arc::new(executor))
    }

    #[test]
    fn test_correct_solution_scores_one() {
        let grader = grader_returning(json!(5));
        let output = grader.grade(&[add_problem()], &[solution("m", "def add(a, b): ...")]);
        assert_eq!(output.grader_identifier, "correctness");
        assert_eq!(output.len(), 1);
        assert_eq!(output.solution_grades[0].score, 1.0);
        assert!(output.solution_grades[0].issues.is_empty());
    }

    #[test]
    fn test_wrong_value_scores_zero_with_issue() {
        let grader = grader_returning(json!(6));
        let output = grader.grade(&[add_problem()], &[solution("m", "def add(a, b): ...")]);
        let grade = &output.solution_grades[0];
        assert_eq!(grade.score, 0.0);
        assert_eq!(grade.issues.len(), 1);
        assert_eq!(grade.issues[0].issue_category, IssueCategory::Mismatch);
        let text = &grade.issues[0].issue_description;
        assert!(text.contains("expected 5"), "{}", text);
        assert!(text.contains("got 6"), "{}", text);
        assert!(text.contains("(int)"), "{}", text);
        assert!(!text.contains("(float)"), "{}", text);
    }

    #[test]
    fn test_execution_error_is_recorded_and_grading_continues() {
        let mut problem = add_problem();
        problem.correctness_test_suite.push(TestCase {
            input: json!({"a": 1, "b": 1}).as_object().unwrap().clone(),
            expected_output: json!(2),
        });
        let executor = |req: &ExecutionRequest<'_>| {
            if req.arguments[0] == json!(2) {
                let mut failed = ExecutionResult::failure(
                    ErrorKind::RuntimeError,
                    "ZeroDivisionError: division by zero",
                );
                failed.traceback = Some("Traceback (most recent call last)".into());
                failed
            } else {
                ExecutionResult::returned(json!(2))
            }
        };
        let grader = CorrectnessGrader::new(Arc::new(executor));
        let output = grader.grade(&[problem], &[solution("m", "")]);
        let grade = &output.solution_grades[0];
        assert_eq!(grade.score, 0.5);
        assert_eq!(grade.issues.len(), 1);
        assert_eq!(grade.issues[0].issue_category, IssueCategory::ExecutionError);
        assert!(grade.issues[0]
            .issue_description
            .contains("Error encountered during execution for test case 0"));
        assert!(grade.issues[0].issue_description.contains("Traceback"));
    }

    #[test]
    fn test_empty_suite_scores_zero() {
        let mut problem = add_problem();
        problem.correctness_test_suite.clear();
        let output = grader_returning(json!(5)).grade(&[problem], &[solution("m", "")]);
        assert_eq!(output.solution_grades[0].score, 0.0);
    }

    #[test]
    fn test_unmatched_solution_is_ignored() {
        let orphan = LLMSolution::new("nope", "p1", "m", "");
        let output = grader_returning(json!(5)).grade(&[add_problem()], &[orphan]);
        assert!(output.is_empty());
    }

    #[test]
    fn test_numeric_normalization() {
        assert!(values_equal(&json!(5), &json!(5.0), None));
        assert!(values_equal(&json!([1, 2.0]), &json!([1.0, 2]), None));
        assert!(!values_equal(&json!(0.1), &json!(0.1000001), None));
        assert!(values_equal(&json!(0.1), &json!(0.1000001), Some(1e-6)));
        assert!(!values_equal(&json!("5"), &json!(5), None));
        assert!(values_equal(
            &json!({"a": [1, {"b": 2}]}),
            &json!({"a": [1.0, {"b": 2}]}),
            None
        ));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2}), None));
    }

    #[test]
    fn test_bool_compares_as_zero_or_one() {
        assert!(values_equal(&json!(1), &json!(true), None));
        assert!(values_equal(&json!(0.0), &json!(false), None));
        assert!(values_equal(&json!(true), &json!(1), None));
        assert!(!values_equal(&json!(1), &json!(false), None));
        assert!(!values_equal(&json!(2), &json!(true), None));
        assert!(!values_equal(&json!(true), &json!("1"), None));

        let grader = grader_returning(json!(true));
        let mut problem = add_problem();
        problem.correctness_test_suite[0].expected_output = json!(1);
        let output = grader.grade(&[problem], &[solution("m", "def add(a, b): ...")]);
        assert_eq!(output.solution_grades[0].score, 1.0);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(&json!(1)), "int");
        assert_eq!(type_name(&json!(1.5)), "float");
        assert_eq!(type_name(&json!(null)), "NoneType");
        assert_eq!(type_name(&json!([1])), "list");
    }

    #[test]
    fn test_default_capability_check() {
        let grader = grader_returning(json!(5));
        assert!(grader.can_grade(&[add_problem()]));
        let mut bare = add_problem();
        bare.prompts.clear();
        assert!(!grader.can_grade(&[add_problem(), bare]));
    }
}
