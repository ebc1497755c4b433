//! Execution primitive: run one function of candidate code and measure it.
//!
//! **WARNING:** `PythonExecutor` runs code in a subprocess with minimal
//! isolation (cleared environment). It does NOT provide a true sandbox; there
//! is no seccomp, chroot, namespace, or cgroup isolation. Do not run
//! untrusted code in security-sensitive environments without additional
//! OS-level sandboxing.

use codebench_core::{BenchError, ExecutorConfig, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One invocation request handed to an execution primitive.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRequest<'a> {
    /// Source text defining the function.
    pub code: &'a str,

    /// Name of the function to call.
    pub function_name: &'a str,

    /// Positional arguments in prototype order.
    pub arguments: &'a [Value],

    /// How many times to call the function back to back (>= 1).
    pub iterations: u64,

    /// Report CPU time summed over all iterations.
    pub collect_cpu_time: bool,

    /// Report peak memory over all iterations.
    pub collect_memory_usage: bool,
}

impl<'a> ExecutionRequest<'a> {
    /// A single call with no measurement.
    pub fn call(code: &'a str, function_name: &'a str, arguments: &'a [Value]) -> Self {
        Self {
            code,
            function_name,
            arguments,
            iterations: 1,
            collect_cpu_time: false,
            collect_memory_usage: false,
        }
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn with_cpu_time(mut self) -> Self {
        self.collect_cpu_time = true;
        self
    }

    pub fn with_memory_usage(mut self) -> Self {
        self.collect_memory_usage = true;
        self
    }
}

/// Kind of failure an invocation ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    Timeout,
    RuntimeError,
    SyntaxError,
    AssertionError,
    ImportError,
    /// Test case could not be bound to the prototype.
    InvalidInput,
    /// The harness itself could not run or produced no result.
    Harness,
}

impl ErrorKind {
    /// Classify a Python exception class name.
    pub fn from_exception_name(name: &str) -> Self {
        match name {
            "SyntaxError" | "IndentationError" | "TabError" => ErrorKind::SyntaxError,
            "AssertionError" => ErrorKind::AssertionError,
            "ImportError" | "ModuleNotFoundError" => ErrorKind::ImportError,
            "TimeoutError" => ErrorKind::Timeout,
            _ => ErrorKind::RuntimeError,
        }
    }

    fn from_stderr(stderr: &str) -> Self {
        if stderr.contains("SyntaxError") {
            ErrorKind::SyntaxError
        } else if stderr.contains("ImportError") || stderr.contains("ModuleNotFoundError") {
            ErrorKind::ImportError
        } else {
            ErrorKind::Harness
        }
    }
}

/// Outcome of one invocation.
///
/// Measurements are `None` when they were not requested or could not be
/// taken; they are never defaulted to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Returned value (`None` on error).
    pub result: Option<Value>,

    /// Human-readable error message.
    pub error: Option<String>,

    pub error_kind: Option<ErrorKind>,

    pub traceback: Option<String>,

    /// CPU seconds summed over all iterations.
    pub cpu_time: Option<f64>,

    /// Peak traced memory in bytes.
    pub peak_memory: Option<u64>,
}

impl ExecutionResult {
    /// Successful call returning `value`.
    pub fn returned(value: Value) -> Self {
        Self {
            result: Some(value),
            ..Default::default()
        }
    }

    /// Failed call.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            error_kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_cpu_time(mut self, seconds: f64) -> Self {
        self.cpu_time = Some(seconds);
        self
    }

    pub fn with_peak_memory(mut self, bytes: u64) -> Self {
        self.peak_memory = Some(bytes);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs a named function of a piece of code.
///
/// Implementations block until the invocation finishes and must support any
/// iteration count >= 1. Any `Fn(&ExecutionRequest) -> ExecutionResult`
/// closure is an execution primitive.
pub trait ExecutionPrimitive: Send + Sync {
    fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionResult;
}

impl<F> ExecutionPrimitive for F
where
    F: Fn(&ExecutionRequest<'_>) -> ExecutionResult + Send + Sync,
{
    fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionResult {
        self(request)
    }
}

const RESULT_MARKER: &str = "__CODEBENCH_RESULT__";

/// Python side of the protocol: reads the request from stdin and prints one
/// marker-prefixed JSON line.
const HARNESS: &str = r#"
import json, sys, time, traceback, tracemalloc

MARKER = "__CODEBENCH_RESULT__"

def _encode(value):
    try:
        return json.loads(json.dumps(value, allow_nan=False, default=repr))
    except (TypeError, ValueError):
        return repr(value)

def _main():
    payload = json.loads(sys.stdin.read())
    out = {"result": None, "error": None, "error_type": None,
           "traceback": None, "cpu_time": None, "peak_memory": None}
    try:
        namespace = {"__name__": "__candidate__"}
        exec(compile(payload["code"], "<candidate>", "exec"), namespace)
        function = namespace[payload["function_name"]]
        arguments = payload["arguments"]
        iterations = max(1, int(payload["iterations"]))
        collect_memory = payload["collect_memory_usage"]
        if collect_memory:
            tracemalloc.start()
        started = time.process_time()
        for _ in range(iterations):
            result = function(*arguments)
        elapsed = time.process_time() - started
        if collect_memory:
            _, peak = tracemalloc.get_traced_memory()
            tracemalloc.stop()
            out["peak_memory"] = peak
        if payload["collect_cpu_time"]:
            out["cpu_time"] = elapsed
        out["result"] = _encode(result)
    except BaseException as exc:
        out["error"] = "%s: %s" % (type(exc).__name__, exc)
        out["error_type"] = type(exc).__name__
        out["traceback"] = traceback.format_exc()
    sys.stdout.write("\n" + MARKER + json.dumps(out) + "\n")
    sys.stdout.flush()

_main()
"#;

#[derive(Debug, Deserialize)]
struct HarnessOutput {
    result: Option<Value>,
    error: Option<String>,
    error_type: Option<String>,
    traceback: Option<String>,
    cpu_time: Option<f64>,
    peak_memory: Option<u64>,
}

impl From<HarnessOutput> for ExecutionResult {
    fn from(out: HarnessOutput) -> Self {
        match out.error {
            Some(error) => ExecutionResult {
                result: None,
                error: Some(error),
                error_kind: Some(
                    out.error_type
                        .as_deref()
                        .map(ErrorKind::from_exception_name)
                        .unwrap_or(ErrorKind::RuntimeError),
                ),
                traceback: out.traceback,
                cpu_time: None,
                peak_memory: None,
            },
            None => ExecutionResult {
                // Python `None` arrives as JSON null
                result: Some(out.result.unwrap_or(Value::Null)),
                error: None,
                error_kind: None,
                traceback: None,
                cpu_time: out.cpu_time,
                peak_memory: out.peak_memory,
            },
        }
    }
}

/// Python execution primitive (unsandboxed).
///
/// Each invocation starts a fresh interpreter, so module-level state never
/// leaks between calls. Environment variables are cleared apart from PATH.
pub struct PythonExecutor {
    /// Python interpreter path (default: "python3")
    python_cmd: String,

    /// Timeout for one invocation
    timeout: Duration,

    runtime: tokio::runtime::Runtime,
}

impl PythonExecutor {
    pub fn new() -> Result<Self> {
        Self::from_config(&ExecutorConfig::default())
    }

    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BenchError::Executor(format!("Failed to start runtime: {}", e)))?;
        Ok(Self {
            python_cmd: config.python_cmd.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            runtime,
        })
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    pub fn with_python_cmd(mut self, cmd: String) -> Self {
        self.python_cmd = cmd;
        self
    }

    /// Run the harness in a subprocess.
    ///
    /// Uses `kill_on_drop(true)` so the child process is reliably killed via
    /// SIGKILL if the timeout fires.
    async fn run(&self, request: &ExecutionRequest<'_>) -> ExecutionResult {
        let payload = match serde_json::to_vec(request) {
            Ok(payload) => payload,
            Err(e) => {
                return ExecutionResult::failure(
                    ErrorKind::InvalidInput,
                    format!("Failed to encode request: {}", e),
                )
            }
        };

        // Preserve PATH so we can find the Python interpreter
        let path_env = std::env::var("PATH")
            .unwrap_or_else(|_| "/usr/bin:/usr/local/bin:/bin".to_string());

        let mut child = match Command::new(&self.python_cmd)
            .arg("-c")
            .arg(HARNESS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .env("PATH", &path_env)
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return ExecutionResult::failure(
                    ErrorKind::Harness,
                    format!("Failed to start {}: {}", self.python_cmd, e),
                )
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                return ExecutionResult::failure(
                    ErrorKind::Harness,
                    format!("Failed to send request: {}", e),
                );
            }
            // Dropping stdin closes the pipe so the harness sees EOF
        }

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                parse_harness_output(&stdout, &stderr)
            }
            Ok(Err(e)) => {
                ExecutionResult::failure(ErrorKind::Harness, format!("Process error: {}", e))
            }
            // Child dropped here, kill_on_drop sends SIGKILL
            Err(_) => ExecutionResult::failure(
                ErrorKind::Timeout,
                format!("Execution timed out after {}s", self.timeout.as_secs()),
            ),
        }
    }
}

impl ExecutionPrimitive for PythonExecutor {
    fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionResult {
        self.runtime.block_on(self.run(request))
    }
}

/// Extract the last marker line from harness stdout.
fn parse_harness_output(stdout: &str, stderr: &str) -> ExecutionResult {
    let line = stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(RESULT_MARKER));

    match line.map(serde_json::from_str::<HarnessOutput>) {
        Some(Ok(out)) => out.into(),
        Some(Err(e)) => ExecutionResult::failure(
            ErrorKind::Harness,
            format!("Malformed harness output: {}", e),
        ),
        None => {
            let mut result = ExecutionResult::failure(
                ErrorKind::from_stderr(stderr),
                "Interpreter exited without reporting a result",
            );
            if !stderr.trim().is_empty() {
                result.traceback = Some(stderr.to_string());
            }
            result
        }
    }
}
