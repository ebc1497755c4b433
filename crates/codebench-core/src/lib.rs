//! Core types and utilities shared across codebench crates.
//!
//! Provides:
//! - Centralized error types via thiserror
//! - Configuration management with TOML support
//! - Structured logging setup via tracing

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{
    AppConfig, CorrectnessConfig, ExecutorConfig, HalsteadConfig, LintConfig, MemoryConfig,
    PerformanceConfig, RaceDetectorConfig, SeverityRule,
};
pub use error::{BenchError, Result};
