//! External process invocation
//!
//! Every script and runtime CLI call goes through [`run`]. Calls are awaited
//! to completion with no timeout, so a hung command stalls the caller.

use crate::error::{ReconcileError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout and stderr joined, trimmed for logging
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim().to_string();
        let err = self.stderr.trim();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// Render a command line for logs and error messages
pub fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `program args...` and wait for it to exit
///
/// A non-zero exit status becomes [`ReconcileError::ExternalCommand`] carrying
/// the exit code and whatever the command printed.
pub async fn run(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput> {
    let command_line = describe(program, args);
    debug!(command = %command_line, "Executing external command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| ReconcileError::external(&command_line, format!("failed to spawn: {}", e)))?;

    let captured = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        return Err(ReconcileError::external(
            command_line,
            format!("exit code {}: {}", exit_code, captured.combined()),
        ));
    }

    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe("docker", &["ps", "-q"]), "docker ps -q");
        assert_eq!(describe("true", &[]), "true");
    }

    #[test]
    fn test_combined_output() {
        let output = CommandOutput {
            stdout: "created 3\n".to_string(),
            stderr: "warning: slow\n".to_string(),
        };
        assert_eq!(output.combined(), "created 3\nwarning: slow");

        let quiet = CommandOutput::default();
        assert_eq!(quiet.combined(), "");
    }

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn test_run_successful_command() {
        let output = run("/bin/echo", &["hello"], None).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn test_run_failing_command() {
        let err = run("/bin/false", &[], None).await.unwrap_err();
        assert!(matches!(err, ReconcileError::ExternalCommand { .. }));
    }

    #[tokio::test]
    async fn test_run_missing_binary() {
        let err = run("/nonexistent/definitely-not-here", &[], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn test_run_uses_working_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = run("/bin/pwd", &[], Some(dir.path())).await.unwrap();
        let reported = std::path::PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }
}
