//! codebench: grade generated code for correctness, speed, memory and quality.
//!
//! Facade over the workspace crates:
//! - [`core`]: errors, configuration and logging
//! - [`eval`]: problem model, execution primitive, graders and reports

pub use codebench_core as core;
pub use codebench_eval as eval;

pub use codebench_core::{AppConfig, BenchError, Result};
pub use codebench_eval::{
    load_problems, load_solutions, Grader, GraderKind, GraderRegistry, GradingOutput,
    GradingReport, LLMSolution, ProblemDefinition, PythonExecutor,
};
