//! Centralized error types for codebench.
//!
//! Uses thiserror for ergonomic error handling with context. Per-test-case
//! failures never surface here; graders fold those into issues.

use thiserror::Error;

/// Main error type for codebench operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BenchError {
    /// Invalid configuration detected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Problem definition is missing required fields or is inconsistent.
    #[error("Invalid problem {problem}: {reason}")]
    InvalidProblem { problem: String, reason: String },

    /// A test case does not bind a value for a function parameter.
    #[error("Missing argument for parameter `{parameter}` of `{function}`")]
    MissingArgument { function: String, parameter: String },

    /// External analysis tool could not be launched or failed outright.
    #[error("Tool `{tool}` failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// Execution primitive could not be set up.
    #[error("Executor error: {0}")]
    Executor(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// Check if error is recoverable (can retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BenchError::Io(_) | BenchError::ToolFailed { .. })
    }
}
