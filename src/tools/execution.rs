//! Sandboxed Python execution in a throwaway working directory.

use super::{CodeRunner, ExecutionOutput};
use crate::error::{QuizError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Imports injected ahead of every snippet.
const PRELUDE: &str = "import pandas as pd\nimport numpy as np\nimport requests\nimport json\nimport re\n";

/// Runs model-written Python in a fresh temp directory per call.
pub struct PythonRunner {
    python_bin: String,
    timeout: Duration,
    prelude: String,
}

impl PythonRunner {
    pub fn new(python_bin: &str, timeout: Duration) -> Self {
        Self {
            python_bin: python_bin.to_string(),
            timeout,
            prelude: PRELUDE.to_string(),
        }
    }

    /// Replace the injected import block.
    pub fn with_prelude(mut self, prelude: &str) -> Self {
        self.prelude = prelude.to_string();
        self
    }
}

#[async_trait]
impl CodeRunner for PythonRunner {
    #[instrument(skip(self, code), fields(code_len = code.len()))]
    async fn run(&self, code: &str) -> Result<ExecutionOutput> {
        info!("Executing Python snippet");

        let work_dir = tempfile::tempdir()?;
        let script = work_dir.path().join("snippet.py");
        tokio::fs::write(&script, format!("{}{}", self.prelude, code)).await?;

        let child = Command::new(&self.python_bin)
            .arg(&script)
            .current_dir(work_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QuizError::ToolNotFound(self.python_bin.clone()));
            }
            Err(e) => return Err(QuizError::Execution(format!("Failed to start: {}", e))),
        };

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                QuizError::Execution(format!("Timed out after {} seconds", self.timeout.as_secs()))
            })??;

        debug!("Python exited with {:?}", output.status.code());

        if output.status.success() {
            Ok(ExecutionOutput::Stdout(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ))
        } else {
            Ok(ExecutionOutput::Stderr(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run a real interpreter when one is installed and are skipped otherwise.
    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn runner() -> PythonRunner {
        PythonRunner::new("python3", Duration::from_secs(10)).with_prelude("")
    }

    #[tokio::test]
    async fn test_stdout_on_success() {
        if !python_available() {
            return;
        }
        let output = runner().run("print(6 * 7)").await.unwrap();
        assert_eq!(output, ExecutionOutput::Stdout("42\n".to_string()));
    }

    #[tokio::test]
    async fn test_stderr_on_failure() {
        if !python_available() {
            return;
        }
        match runner().run("raise ValueError('nope')").await.unwrap() {
            ExecutionOutput::Stderr(err) => assert!(err.contains("ValueError")),
            other => panic!("Expected stderr, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        if !python_available() {
            return;
        }
        let runner = PythonRunner::new("python3", Duration::from_millis(300)).with_prelude("");
        let err = runner.run("import time\ntime.sleep(5)").await.unwrap_err();
        assert!(matches!(err, QuizError::Execution(_)));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let runner = PythonRunner::new("quizbot-no-such-python", Duration::from_secs(1));
        let err = runner.run("print(1)").await.unwrap_err();
        assert!(matches!(err, QuizError::ToolNotFound(_)));
    }
}
