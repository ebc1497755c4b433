//! Centralized configuration management with TOML support.
//!
//! Provides structured configs for the execution primitive and for each
//! grader, with load/save capabilities.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BenchError, Result};

/// Python execution primitive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Python interpreter command.
    pub python_cmd: String,
    /// Wall-clock limit for one invocation, in seconds.
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            python_cmd: "python3".into(),
            timeout_secs: 30,
        }
    }
}

impl ExecutorConfig {
    /// Validate executor configuration.
    pub fn validate(&self) -> Result<()> {
        if self.python_cmd.trim().is_empty() {
            return Err(BenchError::InvalidConfig(
                "executor.python_cmd must not be empty".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(BenchError::InvalidConfig(
                "executor.timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Correctness grader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectnessConfig {
    /// Absolute tolerance for float comparison. Exact comparison when unset.
    #[serde(default)]
    pub float_tolerance: Option<f64>,
}

impl CorrectnessConfig {
    pub fn validate(&self) -> Result<()> {
        match self.float_tolerance {
            Some(tol) if !(tol >= 0.0 && tol.is_finite()) => Err(BenchError::InvalidConfig(
                "correctness.float_tolerance must be a finite value >= 0".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Adaptive measurement ramp used by the performance grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Running CPU-time total (seconds) that ends the ramp.
    pub time_ceiling_secs: f64,
    /// Iteration multiplier between rounds.
    pub growth_factor: u64,
    /// Largest iteration count a round may request.
    pub max_iterations: u64,
    /// Rounds a test case must complete before the ceiling may stop it.
    pub min_rounds: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            time_ceiling_secs: 0.4,
            growth_factor: 10,
            max_iterations: 10_000_000,
            min_rounds: 1,
        }
    }
}

impl PerformanceConfig {
    /// Validate ramp parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.time_ceiling_secs > 0.0 && self.time_ceiling_secs.is_finite()) {
            return Err(BenchError::InvalidConfig(
                "performance.time_ceiling_secs must be a finite value > 0".into(),
            ));
        }
        if self.growth_factor < 2 {
            return Err(BenchError::InvalidConfig(
                "performance.growth_factor must be >= 2".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(BenchError::InvalidConfig(
                "performance.max_iterations must be > 0".into(),
            ));
        }
        if self.min_rounds == 0 {
            return Err(BenchError::InvalidConfig(
                "performance.min_rounds must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Memory grader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Iterations per invocation when sampling peak memory.
    pub iterations: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { iterations: 10 }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(BenchError::InvalidConfig(
                "memory.iterations must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Lint-rating tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Program to run; the source file path is appended to `args`.
    /// Empty until a ThreadSanitizer-enabled interpreter is configured.
    pub command: String,
    /// Extra arguments placed before the source path.
    pub args: Vec<String>,
    /// Score used when the tool output carries no rating.
    pub fallback_score: f64,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            command: "pylint".into(),
            args: Vec::new(),
            fallback_score: 0.3,
        }
    }
}

impl LintConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(BenchError::InvalidConfig(
                "lint.command must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fallback_score) {
            return Err(BenchError::InvalidConfig(
                "lint.fallback_score must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// One entry of the race-report severity lexicon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityRule {
    /// Substring searched for in a warning block.
    pub pattern: String,
    /// Severity added when the pattern occurs.
    pub severity: f64,
}

/// Data-race detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceDetectorConfig {
    /// Program to run; the source file path is appended to `args`.
    /// Empty until a ThreadSanitizer-enabled interpreter is configured.
    pub command: String,
    /// Extra arguments placed before the source path.
    pub args: Vec<String>,
    /// Score reported when no warning block is found.
    pub clean_score: f64,
    /// Severity lexicon applied to each warning block.
    pub severities: Vec<SeverityRule>,
}

impl Default for RaceDetectorConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            clean_score: 10.0,
            severities: vec![
                SeverityRule {
                    pattern: "WARNING: ThreadSanitizer: data race".into(),
                    severity: 3.0,
                },
                SeverityRule {
                    pattern: "Race detected:".into(),
                    severity: 2.0,
                },
            ],
        }
    }
}

impl RaceDetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.severities.iter().any(|rule| rule.pattern.is_empty()) {
            return Err(BenchError::InvalidConfig(
                "race_detector.severities patterns must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Halstead difficulty configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HalsteadConfig {
    /// Operator lexicon used to classify tokens.
    pub operators: Vec<String>,
}

/// Python operator and delimiter lexicon.
pub const PYTHON_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "//", "**", "<<", ">>", "&", "|", "^", "~", "<", ">", "<=", ">=",
    "==", "!=", "and", "or", "not", "is", "in", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "<<=", ">>=", "//=", "**=", "(", ")", "[", "]", "{", "}", "@", ",", ":", ".", "=", "->", ";",
];

impl Default for HalsteadConfig {
    fn default() -> Self {
        Self {
            operators: PYTHON_OPERATORS.iter().map(|op| op.to_string()).collect(),
        }
    }
}

impl HalsteadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.operators.is_empty() || self.operators.iter().any(|op| op.is_empty()) {
            return Err(BenchError::InvalidConfig(
                "halstead.operators must be non-empty strings".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Execution primitive settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Correctness comparison settings.
    #[serde(default)]
    pub correctness: CorrectnessConfig,
    /// Performance ramp settings.
    #[serde(default)]
    pub performance: PerformanceConfig,
    /// Memory sampling settings.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Lint tool settings.
    #[serde(default)]
    pub lint: LintConfig,
    /// Data-race tool settings.
    #[serde(default)]
    pub race_detector: RaceDetectorConfig,
    /// Halstead lexicon.
    #[serde(default)]
    pub halstead: HalsteadConfig,
    /// Logging level (debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            correctness: CorrectnessConfig::default(),
            performance: PerformanceConfig::default(),
            memory: MemoryConfig::default(),
            lint: LintConfig::default(),
            race_detector: RaceDetectorConfig::default(),
            halstead: HalsteadConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BenchError::Other(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| BenchError::Other(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Validate all sub-configs.
    pub fn validate(&self) -> Result<()> {
        self.executor.validate()?;
        self.correctness.validate()?;
        self.performance.validate()?;
        self.memory.validate()?;
        self.lint.validate()?;
        self.race_detector.validate()?;
        self.halstead.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs_are_valid() {
        PerformanceConfig::default().validate().unwrap();
        MemoryConfig::default().validate().unwrap();
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_invalid_growth_factor() {
        let cfg = PerformanceConfig {
            growth_factor: 1, // would never ramp
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let cfg = CorrectnessConfig {
            float_tolerance: Some(-1e-9),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_fallback_score_range() {
        let cfg = LintConfig {
            fallback_score: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [performance]
            time_ceiling_secs = 0.1
            growth_factor = 4
            max_iterations = 1000
            min_rounds = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.performance.growth_factor, 4);
        assert_eq!(cfg.memory.iterations, 10);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.correctness.float_tolerance.is_none());
    }

    #[test]
    fn test_single_key_section_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [performance]
            time_ceiling_secs = 0.2

            [lint]
            command = "ruff"

            [race_detector]
            command = "python3-tsan"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.performance.time_ceiling_secs, 0.2);
        assert_eq!(cfg.performance.growth_factor, 10);
        assert_eq!(cfg.performance.max_iterations, 10_000_000);
        assert_eq!(cfg.lint.command, "ruff");
        assert!(cfg.lint.args.is_empty());
        assert_eq!(cfg.lint.fallback_score, 0.3);
        assert_eq!(cfg.race_detector.command, "python3-tsan");
        assert_eq!(cfg.race_detector.clean_score, 10.0);
        assert_eq!(cfg.race_detector.severities.len(), 2);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.correctness.float_tolerance.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut cfg = AppConfig::default();
        cfg.correctness.float_tolerance = Some(1e-6);
        let tmp = tempfile::NamedTempFile::new().unwrap();
        cfg.save(tmp.path()).unwrap();
        let loaded = AppConfig::from_file(tmp.path()).unwrap();
        assert_eq!(cfg.performance.max_iterations, loaded.performance.max_iterations);
        assert_eq!(loaded.correctness.float_tolerance, Some(1e-6));
        assert_eq!(loaded.race_detector.severities, cfg.race_detector.severities);
        assert_eq!(loaded.halstead.operators.len(), PYTHON_OPERATORS.len());
    }
}
