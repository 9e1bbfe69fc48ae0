//! Isolated execution of generated scripts.
//!
//! Generated code is untrusted. [`ProcessSandbox`] runs it in a throwaway
//! working directory with a cleared environment and a hard wall-clock
//! ceiling. Output is read as it arrives and only the last
//! `max_output_bytes` of each stream are kept, so the verdict line a script
//! prints last always survives. On expiry the process is killed and the run
//! is reported as timed out.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::config::SandboxConfig;
use crate::prompts::DATASET_ENV;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to prepare sandbox: {0}")]
    Setup(#[source] std::io::Error),

    #[error("Failed to start {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to collect script output: {0}")]
    Wait(#[source] std::io::Error),
}

/// Source code produced by the generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub source: String,
}

impl GeneratedScript {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }
}

/// What a script run produced. Consumed only by the result parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,

    /// `None` when killed by a signal or on timeout
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(
        &self,
        script: &GeneratedScript,
        dataset_path: &Path,
    ) -> Result<ExecutionOutcome, SandboxError>;
}

pub struct ProcessSandbox {
    config: SandboxConfig,
}

impl ProcessSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }
}

/// Bytes read from one output stream, keeping only the newest `limit`.
struct TailCapture {
    kept: Vec<u8>,
    total: usize,
}

impl TailCapture {
    async fn read<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> std::io::Result<Self> {
        let mut kept = Vec::with_capacity(limit.min(8 * 1024));
        let mut total = 0;
        let mut chunk = [0u8; 4096];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            total += n;
            kept.extend_from_slice(&chunk[..n]);
            if kept.len() > limit {
                let excess = kept.len() - limit;
                kept.drain(..excess);
            }
        }
        Ok(Self { kept, total })
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.kept).into_owned()
    }
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn execute(
        &self,
        script: &GeneratedScript,
        dataset_path: &Path,
    ) -> Result<ExecutionOutcome, SandboxError> {
        let workdir = tempfile::Builder::new()
            .prefix("claimcheck-sandbox-")
            .tempdir()
            .map_err(SandboxError::Setup)?;

        let script_path = workdir.path().join("validate.py");
        tokio::fs::write(&script_path, &script.source)
            .await
            .map_err(SandboxError::Setup)?;

        // The working directory changes, so hand the script an absolute path.
        let dataset: PathBuf =
            std::path::absolute(dataset_path).unwrap_or_else(|_| dataset_path.to_path_buf());

        let mut command = Command::new(&self.config.interpreter);
        command
            .arg(&script_path)
            .current_dir(workdir.path())
            .env_clear()
            .env("HOME", workdir.path())
            .env(DATASET_ENV, &dataset)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
            interpreter: self.config.interpreter.clone(),
            source,
        })?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(SandboxError::Wait(std::io::Error::other("output pipes unavailable")));
        };

        let limit = self.config.max_output_bytes;
        let run = async {
            tokio::try_join!(
                TailCapture::read(stdout, limit),
                TailCapture::read(stderr, limit),
                child.wait(),
            )
        };

        match tokio::time::timeout(self.config.timeout, run).await {
            Ok(Ok((stdout, stderr, status))) => {
                tracing::debug!(
                    exit_code = ?status.code(),
                    stdout_bytes = stdout.total,
                    stderr_bytes = stderr.total,
                    "Script finished"
                );
                Ok(ExecutionOutcome {
                    success: status.success(),
                    stdout: stdout.into_string(),
                    stderr: stderr.into_string(),
                    exit_code: status.code(),
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(SandboxError::Wait(e)),
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "Script already exited");
                }
                tracing::warn!(timeout = ?self.config.timeout, "Script killed after timeout");
                Ok(ExecutionOutcome {
                    success: false,
                    stdout: String::new(),
                    stderr: format!(
                        "Script execution timed out ({} limit)",
                        humantime::format_duration(self.config.timeout)
                    ),
                    exit_code: None,
                    timed_out: true,
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use claimcheck_core::structured::{parse_output, ScriptVerdict};
    use std::time::{Duration, Instant};

    fn shell(timeout: Duration) -> ProcessSandbox {
        ProcessSandbox::new(SandboxConfig {
            timeout,
            interpreter: "sh".to_string(),
            max_output_bytes: 1024,
            script_archive_dir: None,
        })
    }

    #[tokio::test]
    async fn test_successful_run() {
        let sandbox = shell(Duration::from_secs(10));
        let outcome = sandbox
            .execute(
                &GeneratedScript::new(r#"echo '{"passed": true, "confidence": 0.9}'"#),
                Path::new("/data/d.csv"),
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout.trim(), r#"{"passed": true, "confidence": 0.9}"#);
    }

    #[tokio::test]
    async fn test_dataset_path_in_environment() {
        let sandbox = shell(Duration::from_secs(10));
        let outcome = sandbox
            .execute(
                &GeneratedScript::new("echo \"$CLAIMCHECK_DATASET\"; echo \"${ANTHROPIC_API_KEY:-unset}\""),
                Path::new("/data/d.csv"),
            )
            .await
            .unwrap();

        let lines: Vec<&str> = outcome.stdout.lines().collect();
        assert_eq!(lines, vec!["/data/d.csv", "unset"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_captures_stderr() {
        let sandbox = shell(Duration::from_secs(10));
        let outcome = sandbox
            .execute(
                &GeneratedScript::new("echo 'KeyError: year' >&2; exit 3"),
                Path::new("d.csv"),
            )
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(!outcome.timed_out);
        assert_eq!(outcome.exit_code, Some(3));
        assert!(outcome.stderr.contains("KeyError: year"));
    }

    #[tokio::test]
    async fn test_timeout_kills_script() {
        let sandbox = shell(Duration::from_millis(200));
        let started = Instant::now();
        let outcome = sandbox
            .execute(&GeneratedScript::new("sleep 10"), Path::new("d.csv"))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcome.timed_out);
        assert!(!outcome.success);
        assert_eq!(outcome.stderr, "Script execution timed out (200ms limit)");
    }

    #[tokio::test]
    async fn test_output_keeps_the_tail() {
        let sandbox = ProcessSandbox::new(SandboxConfig {
            max_output_bytes: 8,
            ..shell(Duration::from_secs(10)).config().clone()
        });
        let outcome = sandbox
            .execute(&GeneratedScript::new("echo 0123456789abcdef"), Path::new("d.csv"))
            .await
            .unwrap();
        assert_eq!(outcome.stdout, "9abcdef\n");
    }

    #[tokio::test]
    async fn test_verdict_survives_long_progress_output() {
        let sandbox = shell(Duration::from_secs(10));
        let script = r#"i=0
while [ $i -lt 64 ]; do
  echo "loading rows for step $i of 64"
  i=$((i + 1))
done
echo '{"passed": true, "confidence": 0.85, "explanation": "matches 2023 figure"}'"#;

        let outcome = sandbox
            .execute(&GeneratedScript::new(script), Path::new("d.csv"))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.stdout.len(), 1024);
        let verdict: ScriptVerdict = parse_output(&outcome.stdout).unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.confidence, 0.85);
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let sandbox = ProcessSandbox::new(SandboxConfig {
            interpreter: "/nonexistent/interpreter".to_string(),
            ..Default::default()
        });
        let err = sandbox
            .execute(&GeneratedScript::new("print(1)"), Path::new("d.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::Spawn { .. }));
    }
}
