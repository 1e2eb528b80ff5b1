//! Running rendered units in a fresh interpreter process.
//!
//! Each run gets its own temporary directory holding the unit, which is also
//! the child's working directory. The child's environment is cleared except
//! for an allow-list, and stdin is closed. The unit writes the output file
//! itself; the executor only classifies how the process ended.
use crate::template::RenderedUnit;
use async_trait::async_trait;
use lynks_common::{LynksError, Result};
use lynks_config::ExtractionSettings;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit codes shared with the runner template.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// The engine raised while processing non-empty content.
    pub const EXTRACTION_FAILED: i32 = 3;
    /// The output file could not be written.
    pub const WRITE_FAILED: i32 = 4;
}

const UNIT_FILE_NAME: &str = "runner.py";
const STDERR_TAIL_CHARS: usize = 2000;

/// How a successful run went.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the unit to completion. Any abnormal end is an error.
    async fn execute(&self, unit: &RenderedUnit) -> Result<ExecutionReport>;
}

/// Executes units as `<program> <args...> <unit file>`.
#[derive(Debug, Clone)]
pub struct InterpreterExecutor {
    program: String,
    args: Vec<String>,
    inherit_env: Vec<String>,
    vars: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl InterpreterExecutor {
    /// Executor for `program` with the default flags and environment allow-list.
    pub fn new(program: impl Into<String>) -> Self {
        let defaults = ExtractionSettings::default();
        Self {
            program: program.into(),
            args: defaults.interpreter_args,
            inherit_env: defaults.inherit_env,
            vars: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self {
            program: settings.interpreter.clone(),
            args: settings.interpreter_args.clone(),
            inherit_env: settings.inherit_env.clone(),
            vars: Vec::new(),
            timeout: settings.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_inherited_env<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherit_env = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set `key` for the child regardless of the caller's environment.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        parts.push(UNIT_FILE_NAME);
        parts.join(" ")
    }

    fn failure(&self, code: Option<i32>, detail: impl Into<String>) -> LynksError {
        LynksError::Execution {
            command: self.command_line(),
            code,
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl TaskExecutor for InterpreterExecutor {
    async fn execute(&self, unit: &RenderedUnit) -> Result<ExecutionReport> {
        let workdir = tempfile::Builder::new()
            .prefix("lynks-unit-")
            .tempdir()
            .map_err(|e| self.failure(None, format!("failed to create unit directory: {e}")))?;
        let unit_path = workdir.path().join(UNIT_FILE_NAME);
        tokio::fs::write(&unit_path, unit.source())
            .await
            .map_err(|e| self.failure(None, format!("failed to write unit: {e}")))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&unit_path)
            .current_dir(workdir.path())
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for key in &self.inherit_env {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        cmd.envs(self.vars.iter().map(|(k, v)| (k, v)));

        info!(
            command = %self.command_line(),
            url = %unit.source_url(),
            output = %unit.output_path().display(),
            "extract.execute.start"
        );
        let started = Instant::now();
        let child = cmd
            .spawn()
            .map_err(|e| self.failure(None, format!("failed to start interpreter: {e}")))?;

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!(
                        command = %self.command_line(),
                        timeout_ms = limit.as_millis() as u64,
                        "extract.execute.timeout"
                    );
                    return Err(self.failure(None, format!("timed out after {limit:?}")));
                }
            },
            None => child.wait_with_output().await,
        };
        let output =
            waited.map_err(|e| self.failure(None, format!("failed waiting for interpreter: {e}")))?;
        let elapsed = started.elapsed();

        let report = ExecutionReport {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed,
        };
        debug!(
            exit_code = report.exit_code,
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_bytes = report.stdout.len(),
            stderr_bytes = report.stderr.len(),
            "extract.execute.finished"
        );

        self.classify(output.status, unit, report)
    }
}

impl InterpreterExecutor {
    fn classify(
        &self,
        status: ExitStatus,
        unit: &RenderedUnit,
        report: ExecutionReport,
    ) -> Result<ExecutionReport> {
        let stderr = tail(&report.stderr);
        match status.code() {
            Some(exit_codes::SUCCESS) => Ok(report),
            Some(exit_codes::EXTRACTION_FAILED) => {
                warn!(url = %unit.source_url(), stderr = %stderr, "extract.execute.engine_failed");
                Err(LynksError::Extraction {
                    url: unit.source_url().to_string(),
                    reason: stderr,
                })
            }
            Some(exit_codes::WRITE_FAILED) => {
                warn!(output = %unit.output_path().display(), stderr = %stderr, "extract.execute.write_failed");
                Err(LynksError::Persistence {
                    path: unit.output_path().to_path_buf(),
                    source: std::io::Error::other(stderr),
                })
            }
            code => {
                warn!(exit_code = ?code, stderr = %stderr, "extract.execute.failed");
                Err(self.failure(code, stderr))
            }
        }
    }
}

/// Last part of a stream, which is where interpreter tracebacks put the cause.
fn tail(text: &str) -> String {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
}
