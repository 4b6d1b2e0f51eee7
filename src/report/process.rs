//! Bounded execution of external tools (computation programs, HTML renderer).
//!
//! Children are spawned with `kill_on_drop`, so a timeout or a dropped request
//! future does not leave the process running.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, error};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::ReportError;

/// Captured result of a successful tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run `program` with `args`, optionally piping `stdin`, and wait at most `timeout`.
/// A non-zero exit status is an error carrying the captured stderr.
pub async fn run_tool<I, S>(
    program: &Path,
    args: I,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<ToolOutput, ReportError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = program.display().to_string();
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Launching {:?}", command.as_std());
    let mut child = command.spawn().map_err(|source| {
        error!("Failed to launch {}: {}", tool, source);
        ReportError::ToolLaunch {
            tool: tool.clone(),
            source,
        }
    })?;

    // Feed stdin concurrently so a child filling its stdout pipe cannot deadlock us.
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => Some(tokio::spawn(async move {
            let result = pipe.write_all(&input).await;
            drop(pipe);
            result
        })),
        _ => None,
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            error!("Failed waiting for {}: {}", tool, source);
            return Err(ReportError::ToolLaunch { tool, source });
        }
        Err(_) => {
            error!("{} timed out after {:?}", tool, timeout);
            return Err(ReportError::ToolTimeout {
                tool,
                secs: timeout.as_secs(),
            });
        }
    };

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("{} closed stdin early: {}", tool, e),
            Err(e) => debug!("stdin writer for {} failed: {}", tool, e),
        }
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!("{} exited with status {}: {}", tool, code, stderr);
        return Err(ReportError::ToolExit { tool, code, stderr });
    }

    Ok(ToolOutput {
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipes_stdin_to_stdout() {
        let out = run_tool(
            Path::new("cat"),
            ["-"],
            Some(b"hello".to_vec()),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out.stdout, b"hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let err = run_tool(
            Path::new("sh"),
            ["-c", "echo broken >&2; exit 3"],
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        match err {
            ReportError::ToolExit { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let err = run_tool(
            Path::new("/nonexistent/renderer"),
            Vec::<String>::new(),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReportError::ToolLaunch { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = run_tool(
            Path::new("sleep"),
            ["5"],
            None,
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReportError::ToolTimeout { .. }));
    }
}
