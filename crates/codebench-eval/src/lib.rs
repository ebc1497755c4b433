//! Multi-criteria grading engine for generated code.
//!
//! Provides:
//! - Problem and solution data model with JSON loaders
//! - Execution primitive trait and a Python subprocess executor
//! - Correctness, performance, memory, lint, data-race and Halstead graders
//! - Grader registry and cross-grader reports

pub mod executor;
pub mod grader;
pub mod grading;
pub mod problem;
pub mod registry;
pub mod report;

pub use executor::{ErrorKind, ExecutionPrimitive, ExecutionRequest, ExecutionResult, PythonExecutor};
pub use grader::Grader;
pub use grading::{GradingOutput, Issue, IssueCategory, SolutionGrade};
pub use problem::{
    load_problems, load_solutions, FunctionPrototype, LLMSolution, Parameter, ProblemDefinition,
    Prompt, TestCase,
};
pub use registry::{GraderKind, GraderRegistry};
pub use report::{GradingReport, GraderSummary};
