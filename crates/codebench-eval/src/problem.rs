//! Problem definitions, candidate solutions and their JSON loaders.

use codebench_core::{BenchError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// One input/expected-output pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Parameter name to argument value.
    pub input: Map<String, Value>,

    /// Value the function must return.
    pub expected_output: Value,
}

/// A named, typed function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
}

/// Declared return value of a prototype.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValue {
    #[serde(rename = "type", default)]
    pub type_name: String,
}

/// Signature of the function a solution must implement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionPrototype {
    pub function_name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_value: ReturnValue,
}

impl FunctionPrototype {
    /// Bind a test case's inputs to the parameter order of this prototype.
    pub fn ordered_arguments(&self, test_case: &TestCase) -> Result<Vec<Value>> {
        self.parameters
            .iter()
            .map(|param| {
                test_case
                    .input
                    .get(&param.name)
                    .cloned()
                    .ok_or_else(|| BenchError::MissingArgument {
                        function: self.function_name.clone(),
                        parameter: param.name.clone(),
                    })
            })
            .collect()
    }
}

/// A prompt variant under which a problem is posed to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub prompt_id: String,
    pub prompt: String,

    /// Whether the prompt should be rewritten to hide problem-specific names.
    #[serde(default)]
    pub genericize: bool,

    /// Worked examples shown to the model.
    #[serde(default)]
    pub sample_inputs_outputs: Vec<TestCase>,

    /// Starter code handed to the model.
    #[serde(default)]
    pub input_code: String,
}

/// A coding problem with prompts, prototype and test suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDefinition {
    /// Unique problem identifier.
    pub identifier: String,

    #[serde(default)]
    pub prompts: Vec<Prompt>,

    /// Signature candidates must implement.
    #[serde(default)]
    pub function_prototype: Option<FunctionPrototype>,

    #[serde(default)]
    pub correctness_test_suite: Vec<TestCase>,

    /// Trusted reference implementation used as a performance baseline.
    #[serde(default)]
    pub optimal_solution: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl ProblemDefinition {
    /// Whether the fields every grader needs are present.
    pub fn has_grading_essentials(&self) -> bool {
        !self.identifier.is_empty() && !self.prompts.is_empty() && self.function_prototype.is_some()
    }

    /// Check required fields and internal consistency.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| BenchError::InvalidProblem {
            problem: self.identifier.clone(),
            reason,
        };

        if self.identifier.trim().is_empty() {
            return Err(invalid("identifier must not be empty".into()));
        }
        if self.prompts.is_empty() {
            return Err(invalid("at least one prompt is required".into()));
        }
        if let Some(prompt) = self.prompts.iter().find(|p| p.prompt_id.trim().is_empty()) {
            return Err(invalid(format!(
                "prompt with empty prompt_id: {:?}",
                prompt.prompt
            )));
        }

        let prototype = self
            .function_prototype
            .as_ref()
            .ok_or_else(|| invalid("function_prototype is required".into()))?;
        if prototype.function_name.trim().is_empty() {
            return Err(invalid("function_prototype.function_name must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for param in &prototype.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(invalid(format!("duplicate parameter `{}`", param.name)));
            }
        }

        for (i, test_case) in self.correctness_test_suite.iter().enumerate() {
            prototype
                .ordered_arguments(test_case)
                .map_err(|e| invalid(format!("test case {}: {}", i, e)))?;
        }
        Ok(())
    }
}

/// Code produced by a model for one (problem, prompt) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMSolution {
    pub problem_identifier: String,
    pub prompt_identifier: String,
    pub model_identifier: String,
    pub solution_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Map<String, Value>>,
}

impl LLMSolution {
    pub fn new(
        problem_identifier: impl Into<String>,
        prompt_identifier: impl Into<String>,
        model_identifier: impl Into<String>,
        solution_code: impl Into<String>,
    ) -> Self {
        Self {
            problem_identifier: problem_identifier.into(),
            prompt_identifier: prompt_identifier.into(),
            model_identifier: model_identifier.into(),
            solution_code: solution_code.into(),
            feedback: None,
        }
    }

    /// Merge feedback entries, overwriting existing keys.
    pub fn apply_feedback(&mut self, feedback: Map<String, Value>) {
        self.feedback.get_or_insert_with(Map::new).extend(feedback);
    }
}

/// Load every `*.json` problem definition in a directory, sorted by file name.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_problems(dir: impl AsRef<Path>) -> Result<Vec<ProblemDefinition>> {
    let dir = dir.as_ref();
    let mut problems = Vec::new();

    for path in json_files(dir)? {
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<ProblemDefinition>(&content) {
            Ok(problem) => problems.push(problem),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to parse problem"),
        }
    }

    if problems.is_empty() {
        return Err(BenchError::Other(format!(
            "No problems loaded from {}",
            dir.display()
        )));
    }
    Ok(problems)
}

/// Load solutions from a JSON array file or from a directory of such files.
///
/// A file may hold a single solution object or an array of them.
pub fn load_solutions(path: impl AsRef<Path>) -> Result<Vec<LLMSolution>> {
    let path = path.as_ref();
    let files = if path.is_dir() {
        json_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut solutions = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(&file)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Array(items) => {
                for item in items {
                    solutions.push(serde_json::from_value(item)?);
                }
            }
            other => solutions.push(serde_json::from_value(other)?),
        }
    }
    Ok(solutions)
}

fn json_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
