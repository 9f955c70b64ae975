//! Shared subprocess execution for the terraform, gh, and linter tools.

use crate::{PaveError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Captured result of a finished command.
///
/// Linters routinely exit nonzero to signal findings, so callers that need
/// the distinction use [`capture_command`] and branch on `code` themselves.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Executes a command in `dir`, treating a nonzero exit as data rather than
/// an error.
///
/// # Errors
///
/// Returns [`PaveError::ToolNotInstalled`] if the binary is missing, or
/// [`PaveError::Io`] for other spawn failures.
pub async fn capture_command(dir: &Path, program: &str, args: &[&str]) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.current_dir(dir);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PaveError::ToolNotInstalled(format!("{program} command not found"))
        } else {
            PaveError::Io(e)
        }
    })?;

    Ok(CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Executes a command in `dir` and returns stdout as a string.
///
/// # Errors
///
/// Returns [`PaveError::CommandFailed`] when the exit code is nonzero, with
/// stderr attached.
pub async fn run_command(dir: &Path, program: &str, args: &[&str]) -> Result<String> {
    let output = capture_command(dir, program, args).await?;

    if !output.success() {
        return Err(PaveError::CommandFailed(format!(
            "{} failed with exit code {}: {}",
            program, output.code, output.stderr
        )));
    }

    Ok(output.stdout)
}

/// Executes a command with stdin input, treating a nonzero exit as data.
///
/// Used for prompts the tool insists on reading interactively, such as
/// `terraform init -migrate-state` asking for a `yes`.
pub async fn run_command_with_stdin(
    dir: &Path,
    program: &str,
    args: &[&str],
    stdin_data: &str,
) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.current_dir(dir);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PaveError::ToolNotInstalled(format!("{program} command not found"))
        } else {
            PaveError::Io(e)
        }
    })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(stdin_data.as_bytes())
            .await
            .map_err(PaveError::Io)?;
        stdin.flush().await.map_err(PaveError::Io)?;
    }

    let output = child.wait_with_output().await.map_err(PaveError::Io)?;

    Ok(CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Checks whether a command-line tool is available in PATH.
pub async fn check_command_exists(program: &str) -> Result<bool> {
    let status = Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(PaveError::Io)?;

    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_success() {
        let output = run_command(Path::new("."), "echo", &["hello"]).await.unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_command_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_command(dir.path(), "pwd", &[]).await.unwrap();
        let reported = std::fs::canonicalize(output.trim()).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(reported, expected);
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let result = run_command(Path::new("."), "nonexistent-command-12345", &[]).await;
        assert!(matches!(result, Err(PaveError::ToolNotInstalled(_))));
    }

    #[tokio::test]
    async fn test_capture_command_nonzero_is_data() {
        let output = capture_command(Path::new("."), "sh", &["-c", "echo findings; exit 3"])
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.code, 3);
        assert_eq!(output.stdout.trim(), "findings");
    }

    #[tokio::test]
    async fn test_run_command_with_stdin() {
        let output = run_command_with_stdin(Path::new("."), "cat", &[], "hello from stdin")
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello from stdin");
    }

    #[tokio::test]
    async fn test_check_command_exists() {
        assert!(check_command_exists("echo").await.unwrap());
        assert!(!check_command_exists("nonexistent-command-12345")
            .await
            .unwrap());
    }
}
