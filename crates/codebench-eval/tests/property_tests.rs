//! Property-based tests for the graders using proptest.
//!
//! Validates invariants that must hold for any deterministic executor:
//! - Correctness scores stay within [0, 1]
//! - Performance and memory scores never exceed 1
//! - Identical implementations score 1
//! - Halstead difficulty is finite and non-negative

use std::sync::Arc;

use codebench_core::PerformanceConfig;
use codebench_eval::grader::halstead::OperatorLexicon;
use codebench_eval::grader::{AdaptiveRamp, CorrectnessGrader, MemoryGrader, PerformanceGrader};
use codebench_eval::{
    ExecutionRequest, ExecutionResult, Grader, LLMSolution, ProblemDefinition, TestCase,
};
use proptest::prelude::*;
use serde_json::json;

fn problem_with_cases(cases: usize) -> ProblemDefinition {
    let suite: Vec<TestCase> = (0..cases)
        .map(|i| TestCase {
            input: json!({"x": i}).as_object().cloned().unwrap_or_default(),
            expected_output: json!(i * 2),
        })
        .collect();
    serde_json::from_value(json!({
        "identifier": "double",
        "prompts": [{"prompt_id": "p1", "prompt": "Double x."}],
        "function_prototype": {
            "function_name": "double",
            "parameters": [{"name": "x", "type": "int"}]
        },
        "correctness_test_suite": suite,
        "optimal_solution": "reference"
    }))
    .unwrap()
}

fn candidate() -> Vec<LLMSolution> {
    vec![LLMSolution::new("double", "p1", "model", "candidate")]
}

proptest! {
    #[test]
    fn correctness_score_is_fraction_of_matches(
        wrong in proptest::collection::vec(any::<bool>(), 0..12)
    ) {
        let cases = wrong.len();
        let flags = wrong.clone();
        let executor = move |req: &ExecutionRequest<'_>| {
            let x = req.arguments[0].as_u64().unwrap_or(0) as usize;
            let value = if flags[x] { x * 2 + 1 } else { x * 2 };
            ExecutionResult::returned(json!(value))
        };
        let output = CorrectnessGrader::new(Arc::new(executor))
            .grade(&[problem_with_cases(cases)], &candidate());
        let score = output.solution_grades[0].score;

        prop_assert!((0.0..=1.0).contains(&score));
        let failed = wrong.iter().filter(|w| **w).count();
        if cases == 0 {
            prop_assert_eq!(score, 0.0);
        } else {
            let expected = (cases - failed) as f64 / cases as f64;
            prop_assert!((score - expected).abs() < 1e-12);
            prop_assert_eq!(output.solution_grades[0].issues.len(), failed);
            prop_assert_eq!(score == 1.0, failed == 0);
        }
    }

    #[test]
    fn performance_score_is_capped_ratio(
        candidate_cost in 1e-6f64..0.05,
        reference_cost in 1e-6f64..0.05,
        cases in 1usize..4,
    ) {
        let executor = move |req: &ExecutionRequest<'_>| {
            let cost = if req.code == "reference" { reference_cost } else { candidate_cost };
            ExecutionResult::returned(json!(0)).with_cpu_time(cost * req.iterations as f64)
        };
        let output = PerformanceGrader::new(Arc::new(executor))
            .grade(&[problem_with_cases(cases)], &candidate());
        let score = output.solution_grades[0].score;

        prop_assert!(score > 0.0 && score <= 1.0);
        // Per-call costs are constant, so every round keeps the same ratio
        let expected = (reference_cost / candidate_cost).min(1.0);
        prop_assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn identical_implementations_score_one(
        cost in 1e-6f64..0.05,
        peak in 1u64..1_000_000,
    ) {
        let executor = move |req: &ExecutionRequest<'_>| {
            ExecutionResult::returned(json!(0))
                .with_cpu_time(cost * req.iterations as f64)
                .with_peak_memory(peak)
        };
        let executor = Arc::new(executor);
        let problems = [problem_with_cases(2)];

        let perf = PerformanceGrader::new(executor.clone()).grade(&problems, &candidate());
        prop_assert!((perf.solution_grades[0].score - 1.0).abs() < 1e-9);

        let mem = MemoryGrader::new(executor).grade(&problems, &candidate());
        prop_assert_eq!(mem.solution_grades[0].score, 1.0);
    }

    #[test]
    fn ramp_is_deterministic_and_geometric(
        cost in 1e-7f64..0.5,
        committed in 0.0f64..0.3,
    ) {
        let ramp = AdaptiveRamp::new(PerformanceConfig::default());
        let run = |n: u64| {
            (
                ExecutionResult::returned(json!(0)).with_cpu_time(cost * n as f64),
                ExecutionResult::returned(json!(0)).with_cpu_time(cost * n as f64),
            )
        };
        let first = ramp.measure(run, (committed, committed));
        let second = ramp.measure(run, (committed, committed));
        prop_assert_eq!(&first, &second);
        prop_assert!(!first.aborted);
        prop_assert_eq!(first.final_iterations, 10u64.pow(first.rounds - 1));
    }

    #[test]
    fn halstead_difficulty_is_finite(code in "[a-z0-9+*=(), \n]{0,200}") {
        let metrics = OperatorLexicon::default().measure(&code);
        let difficulty = metrics.difficulty();
        prop_assert!(difficulty.is_finite());
        prop_assert!(difficulty >= 0.0);
        prop_assert!(metrics.unique_operands <= metrics.operand_count);
    }
}
