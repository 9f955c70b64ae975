//! Terraform subprocess wrappers and local state inspection.
//!
//! Everything here shells out to the `terraform` binary in a given working
//! directory, or reads `terraform.tfstate` directly. Callers decide how to
//! present failures; these functions only classify them.

use std::path::Path;

use serde::Deserialize;

use crate::exec::{capture_command, run_command, run_command_with_stdin, CommandOutput};
use crate::{PaveError, Result};

/// Summary of a local `terraform.tfstate` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalState {
    pub resources: usize,
}

#[derive(Deserialize)]
struct StateFile {
    #[serde(default)]
    resources: Vec<serde_json::Value>,
}

/// Returns the first line of `terraform version` output.
pub async fn version(root: &Path) -> Result<String> {
    let stdout = run_command(root, "terraform", &["version"]).await?;
    Ok(stdout.lines().next().unwrap_or_default().to_string())
}

/// Runs `terraform init -input=false`, returning the output even on failure.
pub async fn init(root: &Path) -> Result<CommandOutput> {
    capture_command(root, "terraform", &["init", "-input=false"]).await
}

/// Runs `terraform init -migrate-state -input=false`.
///
/// With `auto_confirm` the migration prompt is answered "yes" on stdin,
/// matching a non-interactive workflow.
pub async fn init_migrate(root: &Path, auto_confirm: bool) -> Result<CommandOutput> {
    let args = &["init", "-migrate-state", "-input=false"];
    if auto_confirm {
        run_command_with_stdin(root, "terraform", args, "yes\n").await
    } else {
        capture_command(root, "terraform", args).await
    }
}

/// Lists resource addresses tracked in the active state.
pub async fn state_list(root: &Path) -> Result<Vec<String>> {
    let stdout = run_command(root, "terraform", &["state", "list"]).await?;
    Ok(parse_state_resources(&stdout))
}

/// Runs `terraform show -json` and returns raw stdout.
pub async fn show_json(root: &Path) -> Result<String> {
    run_command(root, "terraform", &["show", "-json"]).await
}

/// Runs `terraform output -json`, parsing stdout. A nonzero exit or
/// unparsable output returns `Ok(None)` since missing outputs are routine.
pub async fn output_json(root: &Path) -> Result<Option<serde_json::Value>> {
    let out = capture_command(root, "terraform", &["output", "-json"]).await?;
    if !out.success() {
        return Ok(None);
    }
    Ok(serde_json::from_str(&out.stdout).ok())
}

/// Whether `terraform init` has been run in this directory.
pub fn is_initialized(root: &Path) -> bool {
    root.join(".terraform").is_dir()
}

pub fn has_local_state(root: &Path) -> bool {
    root.join("terraform.tfstate").is_file()
}

/// Reads the local state file, if present.
///
/// Returns `Ok(None)` when no state file exists. A state file that is not
/// valid JSON surfaces as [`PaveError::Json`] so callers can report
/// corruption distinctly from absence.
pub fn inspect_local_state(root: &Path) -> Result<Option<LocalState>> {
    let path = root.join("terraform.tfstate");
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PaveError::Io(e)),
    };

    let state: StateFile = serde_json::from_str(&raw)?;
    Ok(Some(LocalState {
        resources: state.resources.len(),
    }))
}

fn parse_state_resources(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
