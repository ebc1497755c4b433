//! Structured logging for grading runs with tracing.
//!
//! Provides JSON or pretty console output and a few structured event helpers
//! shared by the graders and the CLI.

use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging.
///
/// Reads log level from RUST_LOG environment variable (defaults to "info").
/// Outputs JSON-formatted logs for machine consumption.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Default: info for our crates, warn for dependencies
                "warn,codebench_eval=info,codebench_core=info,codebench=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Structured logging initialized");
}

/// Initialize console logging at the given default level.
pub fn init_console_logging(level: &str) {
    let fallback = format!("warn,codebench_eval={level},codebench_core={level},codebench={level}");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
        .init();
}

/// Log one finished solution grade.
pub fn log_solution_graded(grader: &str, problem: &str, model: &str, score: f64, issues: usize) {
    info!(
        grader = grader,
        problem = problem,
        model = model,
        score = score,
        issues = issues,
        event = "solution_graded",
        "Solution graded"
    );
}

/// Log one round of the performance ramp with that round's CPU seconds.
pub fn log_ramp_round(
    problem: &str,
    test_case: usize,
    iterations: u64,
    candidate_time: f64,
    reference_time: f64,
) {
    debug!(
        problem = problem,
        test_case = test_case,
        iterations = iterations,
        candidate_time = candidate_time,
        reference_time = reference_time,
        event = "ramp_round",
        "Performance ramp round completed"
    );
}

/// Log a grader refusing the problem set.
pub fn log_grader_skipped(grader: &str, problems: usize) {
    warn!(
        grader = grader,
        problems = problems,
        event = "grader_skipped",
        "Grader cannot grade this problem set, skipping"
    );
}
