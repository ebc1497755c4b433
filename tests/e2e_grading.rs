//! End-to-End Grading Test: problems on disk through every grader.
//!
//! Uses a deterministic in-process execution primitive and stub tool
//! collaborators so no interpreter or lint tool is needed.

use std::sync::Arc;

use codebench::core::Result;
use codebench::eval::grader::{QualityRater, RaceDetector, RaceWarning};
use codebench::eval::{ExecutionRequest, ExecutionResult, IssueCategory};
use codebench::{load_problems, load_solutions, AppConfig, GraderRegistry, GradingReport};
use serde_json::json;

struct FixedRating(Option<f64>);

impl QualityRater for FixedRating {
    fn quality_rating(&self, _code: &str) -> Result<Option<f64>> {
        Ok(self.0)
    }
}

/// Reports one race for any code mentioning `thread`.
struct ThreadRaces;

impl RaceDetector for ThreadRaces {
    fn detect_races(&self, code: &str) -> Result<Vec<RaceWarning>> {
        if code.contains("thread") {
            Ok(vec![RaceWarning {
                text: "WARNING: ThreadSanitizer: data race (pid=1)\n  Write of size 8".into(),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Adds the arguments; `slow` code costs twice as much and uses twice the memory.
fn fake_interpreter(req: &ExecutionRequest<'_>) -> ExecutionResult {
    let sum: i64 = req.arguments.iter().filter_map(|v| v.as_i64()).sum();
    let value = if req.code.contains("wrong") { sum + 1 } else { sum };
    let factor = if req.code.contains("slow") { 2.0 } else { 1.0 };
    let mut result = ExecutionResult::returned(json!(value));
    if req.collect_cpu_time {
        result = result.with_cpu_time(0.01 * factor * req.iterations as f64);
    }
    if req.collect_memory_usage {
        result = result.with_peak_memory((1_000.0 * factor) as u64);
    }
    result
}

fn write_fixtures(dir: &std::path::Path) -> std::io::Result<()> {
    let problems = dir.join("problems");
    std::fs::create_dir_all(&problems)?;
    for (id, tags) in [("add_two", vec!["math", "easy"]), ("sum_three", vec!["math"])] {
        let params: Vec<_> = if id == "add_two" {
            vec![json!({"name": "a", "type": "int"}), json!({"name": "b", "type": "int"})]
        } else {
            vec![json!({"name": "a"}), json!({"name": "b"}), json!({"name": "c"})]
        };
        let inputs = if id == "add_two" {
            vec![json!({"a": 2, "b": 3}), json!({"a": -1, "b": 1})]
        } else {
            vec![json!({"a": 1, "b": 2, "c": 3})]
        };
        let suite: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let expected: i64 = input
                    .as_object()
                    .map(|m| m.values().filter_map(|v| v.as_i64()).sum())
                    .unwrap_or(0);
                json!({"input": input, "expected_output": expected})
            })
            .collect();
        let problem = json!({
            "identifier": id,
            "prompts": [{"prompt_id": "p1", "prompt": "Sum the arguments."}],
            "function_prototype": {"function_name": "f", "parameters": params},
            "correctness_test_suite": suite,
            "optimal_solution": "def f(*a): return sum(a)",
            "tags": tags
        });
        std::fs::write(problems.join(format!("{id}.json")), problem.to_string())?;
    }

    let solutions = json!([
        {"problem_identifier": "add_two", "prompt_identifier": "p1",
         "model_identifier": "fast", "solution_code": "def f(a, b): return a + b"},
        {"problem_identifier": "add_two", "prompt_identifier": "p1",
         "model_identifier": "slow", "solution_code": "# slow wrong thread\ndef f(a, b): return a + b + 1"},
        {"problem_identifier": "sum_three", "prompt_identifier": "p1",
         "model_identifier": "fast", "solution_code": "def f(a, b, c): return a + b + c"},
        {"problem_identifier": "unknown", "prompt_identifier": "p1",
         "model_identifier": "fast", "solution_code": "pass"}
    ]);
    std::fs::write(dir.join("solutions.json"), solutions.to_string())
}

fn registry() -> GraderRegistry {
    GraderRegistry::new(Arc::new(fake_interpreter), AppConfig::default())
        .with_quality_rater(Arc::new(FixedRating(Some(0.8))))
        .with_race_detector(Arc::new(ThreadRaces))
}

#[test]
fn e2e_every_grader_over_loaded_fixtures() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_fixtures(dir.path())?;
    let problems = load_problems(dir.path().join("problems"))?;
    let solutions = load_solutions(dir.path().join("solutions.json"))?;
    assert_eq!(problems.len(), 2);
    assert_eq!(solutions.len(), 4);

    let names = [
        "correctness",
        "performance",
        "memory",
        "staticthread",
        "dynamicthread",
        "halstead",
    ];
    let report = registry().grade_all(&names, &problems, &solutions);
    assert!(report.skipped.is_empty());
    assert_eq!(report.outputs.len(), names.len());

    // The solution for an unknown problem is never graded
    for output in &report.outputs {
        assert_eq!(output.len(), 3, "{}", output.grader_identifier);
        assert!(output
            .solution_grades
            .iter()
            .all(|g| g.problem_identifier != "unknown"));
    }

    let correctness = report.output("correctness").ok_or("missing correctness")?;
    let by_model = GradingReport::average_by_model(correctness);
    assert_eq!(by_model["fast"], 1.0);
    assert_eq!(by_model["slow"], 0.0);
    let slow = correctness
        .grades_for_model("slow")
        .next()
        .ok_or("missing slow grade")?;
    assert_eq!(slow.issues.len(), 2);
    assert!(slow
        .issues
        .iter()
        .all(|i| i.issue_category == IssueCategory::Mismatch));

    let performance = report.output("performance").ok_or("missing performance")?;
    let by_model = GradingReport::average_by_model(performance);
    assert!((by_model["fast"] - 1.0).abs() < 1e-9);
    assert!((by_model["slow"] - 0.5).abs() < 1e-9);

    let memory = report.output("memory").ok_or("missing memory")?;
    let by_model = GradingReport::average_by_model(memory);
    assert_eq!(by_model["fast"], 1.0);
    assert_eq!(by_model["slow"], 0.5);

    let lint = report.output("staticthread").ok_or("missing lint")?;
    assert!(lint.solution_grades.iter().all(|g| g.score == 0.8));

    let races = report.output("dynamicthread").ok_or("missing races")?;
    let by_model = GradingReport::average_by_model(races);
    assert_eq!(by_model["fast"], 10.0);
    assert_eq!(by_model["slow"], 3.0);

    let halstead = report.output("halstead").ok_or("missing halstead")?;
    assert!(halstead
        .solution_grades
        .iter()
        .all(|g| g.sub_criteria_scores.is_some()));
    Ok(())
}

#[test]
fn e2e_summary_groups_by_tag() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_fixtures(dir.path())?;
    let problems = load_problems(dir.path().join("problems"))?;
    let solutions = load_solutions(dir.path().join("solutions.json"))?;

    let report = registry().grade_all(&["correctness"], &problems, &solutions);
    let summary = report.summarize(&problems);
    assert_eq!(summary.len(), 1);
    // add_two: fast 1.0, slow 0.0; sum_three: fast 1.0
    assert_eq!(summary[0].by_tag["easy"], 0.5);
    assert!((summary[0].by_tag["math"] - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(summary[0].by_problem["sum_three"], 1.0);

    let path = dir.path().join("report.json");
    report.save_json(&path)?;
    let loaded = GradingReport::load_json(&path)?;
    assert_eq!(loaded.outputs, report.outputs);
    Ok(())
}

#[test]
fn e2e_unknown_grader_falls_back_and_missing_reference_is_skipped(
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let problem: codebench::ProblemDefinition = serde_json::from_value(json!({
        "identifier": "add_two",
        "prompts": [{"prompt_id": "p1", "prompt": "Add."}],
        "function_prototype": {"function_name": "f", "parameters": [{"name": "a"}, {"name": "b"}]},
        "correctness_test_suite": [{"input": {"a": 2, "b": 3}, "expected_output": 5}]
    }))?;
    let solutions = vec![codebench::LLMSolution::new(
        "add_two",
        "p1",
        "fast",
        "def f(a, b): return a + b",
    )];

    let report = registry().grade_all(&["foobar", "performance", "memory"], &[problem], &solutions);
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.outputs[0].grader_identifier, "correctness");
    assert_eq!(report.outputs[0].solution_grades[0].score, 1.0);
    assert_eq!(report.skipped, vec!["performance", "memory"]);
    Ok(())
}
