//! Kedro command-line engine.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::{ExecutionEngine, RunRequest, RunResult};
use crate::error::{BuilderError, BuilderResult};

/// Runs `kedro run --pipeline <p> [--nodes <n>]` in the project directory.
///
/// The command may carry leading arguments, e.g. `python -m kedro`.
#[derive(Debug, Clone)]
pub struct KedroCli {
    command: String,
}

impl Default for KedroCli {
    fn default() -> Self {
        Self::new("kedro")
    }
}

impl KedroCli {
    /// Create an engine invoking `command` (normally `kedro`).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn args<'a>(&'a self, request: &'a RunRequest) -> Vec<&'a str> {
        let mut args: Vec<&str> = self.command.split_whitespace().skip(1).collect();
        args.extend(["run", "--pipeline", request.pipeline.as_str()]);
        if let Some(node) = &request.node {
            args.push("--nodes");
            args.push(node.as_str());
        }
        args
    }
}

#[async_trait]
impl ExecutionEngine for KedroCli {
    async fn run(&self, request: &RunRequest) -> BuilderResult<RunResult> {
        // The project is re-checked on every run; nothing is held open.
        if !request.project_path.is_dir() {
            return Err(BuilderError::ProjectNotInitialized(request.project_path.clone()));
        }

        let program = self.command.split_whitespace().next().ok_or_else(|| {
            BuilderError::Config("engine command must not be empty".to_string())
        })?;

        let start = Instant::now();
        let args = self.args(request);

        tracing::info!(
            command = %self.command,
            args = ?args,
            cwd = %request.project_path.display(),
            "Starting engine run"
        );

        let mut child = Command::new(program)
            .args(&args)
            .current_dir(&request.project_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuilderError::Execution {
                pipeline: request.pipeline.clone(),
                node: request.node.clone(),
                exit_code: None,
                message: format!("failed to start '{}': {}", self.command, e),
            })?;

        let stdout_handle = tokio::spawn(collect_output(child.stdout.take()));
        let stderr_handle = tokio::spawn(collect_output(child.stderr.take()));

        let status = child.wait().await?;
        let stdout = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();
        let duration_ms = start.elapsed().as_millis() as u64;

        if !status.success() {
            tracing::warn!(
                pipeline = %request.pipeline,
                node = ?request.node,
                exit_code = ?status.code(),
                duration_ms,
                "Engine run failed"
            );
            let message = if stderr.is_empty() {
                format!("engine exited with {}", status)
            } else {
                stderr
            };
            return Err(BuilderError::Execution {
                pipeline: request.pipeline.clone(),
                node: request.node.clone(),
                exit_code: status.code(),
                message,
            });
        }

        tracing::info!(
            pipeline = %request.pipeline,
            node = ?request.node,
            duration_ms,
            "Engine run completed"
        );

        Ok(RunResult {
            pipeline: request.pipeline.clone(),
            node: request.node.clone(),
            exit_code: status.code().unwrap_or(0),
            stdout,
            stderr,
            duration_ms,
        })
    }
}

async fn collect_output<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut bytes = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut bytes).await {
            tracing::warn!(error = %e, "Engine output read failed");
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    fn fake_engine(dir: &Path, script: &str) -> KedroCli {
        let path = dir.join("fake-kedro.sh");
        std::fs::write(&path, format!("{}\n", script)).unwrap();
        KedroCli::new(format!("sh {}", path.display()))
    }

    #[tokio::test]
    async fn test_scoped_run_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "echo \"$@\"; pwd");

        let request = RunRequest::pipeline(dir.path(), "etl").node("clean");
        let result = engine.run(&request).await.unwrap();

        let mut lines = result.stdout.lines();
        assert_eq!(lines.next(), Some("run --pipeline etl --nodes clean"));
        assert_eq!(
            lines.next().map(|l| std::fs::canonicalize(l).unwrap()),
            Some(std::fs::canonicalize(dir.path()).unwrap())
        );
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.node.as_deref(), Some("clean"));
    }

    #[tokio::test]
    async fn test_whole_pipeline_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "echo \"$@\"");

        let result = engine
            .run(&RunRequest::pipeline(dir.path(), "etl"))
            .await
            .unwrap();
        assert_eq!(result.stdout, "run --pipeline etl\n");
    }

    #[tokio::test]
    async fn test_failure_carries_stderr_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "echo 'ValueError: boom' >&2; exit 3");

        let err = engine
            .run(&RunRequest::pipeline(dir.path(), "etl").node("score"))
            .await
            .unwrap_err();

        match err {
            BuilderError::Execution { pipeline, node, exit_code, message } => {
                assert_eq!(pipeline, "etl");
                assert_eq!(node.as_deref(), Some("score"));
                assert_eq!(exit_code, Some(3));
                assert_eq!(message, "ValueError: boom\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_output_survives_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "printf 'bad \\377 byte\\nafter\\n'");

        let result = engine
            .run(&RunRequest::pipeline(dir.path(), "etl"))
            .await
            .unwrap();
        assert_eq!(result.stdout, "bad \u{FFFD} byte\nafter\n");
    }

    #[tokio::test]
    async fn test_missing_project() {
        let dir = tempfile::tempdir().unwrap();
        let engine = KedroCli::default();

        let err = engine
            .run(&RunRequest::pipeline(dir.path().join("gone"), "etl"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuilderError::ProjectNotInitialized(_)));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let dir = tempfile::tempdir().unwrap();
        let engine = KedroCli::new(dir.path().join("no-such-engine").to_string_lossy());

        let err = engine
            .run(&RunRequest::pipeline(dir.path(), "etl"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuilderError::Execution { exit_code: None, .. }));
    }
}
