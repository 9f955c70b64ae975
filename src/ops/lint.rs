//! Lint wrappers around the repository's documentation and workflow files:
//! pymarkdown + mdformat for Markdown, yamllint plus built-in GitHub
//! Actions advisories for YAML.

use crate::cli::{MarkdownLintArgs, YamlLintArgs};
use crate::exec::capture_command;
use crate::{Config, Reporter, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

const LINT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".terraform",
    "venv",
    ".venv",
    "site-packages",
    "target",
];

const YAMLLINT_CONFIG: &str = "rules:
  line-length:
    max: 120
    allow-non-breakable-words: true
    allow-non-breakable-inline-mappings: true
  comments:
    min-spaces-from-content: 1
  indentation:
    spaces: 2
    indent-sequences: true
    check-multi-line-strings: false
  truthy:
    allowed-values: ['true', 'false', 'on', 'off']
    check-keys: false
  braces:
    min-spaces-inside: 0
    max-spaces-inside: 1
  brackets:
    min-spaces-inside: 0
    max-spaces-inside: 0
  colons:
    max-spaces-before: 0
    max-spaces-after: 1
  commas:
    max-spaces-before: 0
    max-spaces-after: 1
  document-start: disable
  document-end: disable
  empty-lines:
    max: 2
    max-start: 0
    max-end: 1
  hyphens:
    max-spaces-after: 1
  key-duplicates: enable
  new-line-at-end-of-file: enable
  trailing-spaces: enable
  octal-values: disable";

fn is_excluded_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| LINT_EXCLUDE_DIRS.contains(&name))
}

fn find_files(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

async fn check_markdown_file(root: &Path, file: &Path, fix: bool) -> (bool, String) {
    let display = file.display();
    let path_arg = file.to_string_lossy();

    if fix {
        let pymarkdown = match capture_command(
            root,
            "pymarkdown",
            &["--config", ".pymarkdown.json", "fix", path_arg.as_ref()],
        )
        .await
        {
            Ok(out) => out,
            Err(e) => return (false, format!("❌ Error processing {display}: {e}")),
        };
        let mdformat = match capture_command(root, "mdformat", &[path_arg.as_ref()]).await {
            Ok(out) => out,
            Err(e) => return (false, format!("❌ Error processing {display}: {e}")),
        };

        if pymarkdown.success() && mdformat.success() {
            (true, format!("✅ Fixed: {display}"))
        } else {
            let mut errors = Vec::new();
            if !pymarkdown.success() {
                errors.push(format!("PyMarkdown: {}", pymarkdown.stderr));
            }
            if !mdformat.success() {
                errors.push(format!("MDFormat: {}", mdformat.stderr));
            }
            (false, format!("❌ Could not fix: {display}\n{}", errors.join("\n")))
        }
    } else {
        match capture_command(
            root,
            "pymarkdown",
            &["--config", ".pymarkdown.json", "scan", path_arg.as_ref()],
        )
        .await
        {
            Ok(out) if out.success() => (true, format!("✅ Valid: {display}")),
            Ok(out) => (false, format!("❌ Invalid: {display}\n{}", out.stdout.trim())),
            Err(e) => (false, format!("❌ Error processing {display}: {e}")),
        }
    }
}

pub async fn run_markdown(
    config: &Config,
    reporter: &Reporter,
    args: &MarkdownLintArgs,
) -> Result<i32> {
    let files = if args.files.is_empty() {
        find_files(&config.root, &["md"])
    } else {
        args.files.clone()
    };

    if files.is_empty() {
        reporter.status("📝", "No markdown files found.");
        return Ok(0);
    }

    let verb = if args.fix { "Fixing" } else { "Checking" };
    reporter.status("🔍", &format!("{verb} {} markdown files...", files.len()));
    reporter.blank();

    let mut all_valid = true;
    let mut results = Vec::new();
    for file in &files {
        let (ok, message) = check_markdown_file(&config.root, file, args.fix).await;
        if !ok {
            all_valid = false;
        }
        results.push(message);
    }

    for message in &results {
        reporter.plain(message);
    }
    reporter.blank();

    if all_valid {
        reporter.plain(&format!(
            "✅ All {} markdown files are properly formatted!",
            files.len()
        ));
        Ok(0)
    } else {
        let failed = results.iter().filter(|m| m.starts_with("❌")).count();
        reporter.plain(&format!(
            "❌ {failed}/{} markdown files have formatting issues.",
            files.len()
        ));
        if !args.fix {
            reporter.plain("💡 Run with --fix to automatically fix formatting issues.");
        }
        Ok(1)
    }
}

fn workflow_advisories(content: &str) -> Vec<String> {
    let mut issues = Vec::new();
    for (idx, line) in content.split('\n').enumerate() {
        let line_no = idx + 1;

        if line.contains("actions/checkout@v2") {
            issues.push(format!(
                "Line {line_no}: Consider upgrading to actions/checkout@v4 (v2 is deprecated)"
            ));
        }

        if line.contains("${{ env.GITHUB_") && !line.trim_start().starts_with('#') {
            issues.push(format!(
                "Line {line_no}: Consider using '${{{{ github.* }}}}' instead of '${{{{ env.GITHUB_* }}}}'"
            ));
        }

        if line.to_lowercase().contains("node-version:")
            && !(line.contains('"') || line.contains('\''))
            && line.chars().any(|c| c.is_ascii_digit())
        {
            issues.push(format!(
                "Line {line_no}: Consider quoting Node.js version numbers to avoid YAML interpretation issues"
            ));
        }
    }
    issues
}

fn github_actions_advisories(file: &Path) -> Vec<String> {
    if !file.to_string_lossy().contains(".github/workflows") {
        return Vec::new();
    }
    match std::fs::read_to_string(file) {
        Ok(content) => workflow_advisories(&content),
        Err(e) => vec![format!("Error reading file: {e}")],
    }
}

async fn lint_yaml_files(
    config: &Config,
    reporter: &Reporter,
    files: &[PathBuf],
    quiet: bool,
    config_path: &Path,
) -> Result<bool> {
    let config_arg = config_path.to_string_lossy();
    let mut success = true;

    for file in files {
        let display = file.display();
        if !quiet {
            reporter.status("🔍", &format!("Linting {display}"));
        }

        let path_arg = file.to_string_lossy();
        let out = capture_command(
            &config.root,
            "yamllint",
            &["-c", config_arg.as_ref(), path_arg.as_ref()],
        )
        .await?;

        if out.success() {
            if !quiet {
                reporter.success(&format!("{display} passes linting"));
            }
        } else {
            success = false;
            reporter.error(&format!("Issues found in {display}:"));
            reporter.plain(&out.stdout);
        }

        let advisories = github_actions_advisories(file);
        if !advisories.is_empty() {
            reporter.warning(&format!("GitHub Actions suggestions for {display}:"));
            for advisory in &advisories {
                reporter.plain(&format!("  {advisory}"));
            }
        }
    }

    Ok(success)
}

pub async fn run_yaml(config: &Config, reporter: &Reporter, args: &YamlLintArgs) -> Result<i32> {
    if args.fix && !args.quiet {
        reporter.warning(
            "yamllint does not support automatic fixing. Use --fix for consistency with other linters.",
        );
    }

    let files: Vec<PathBuf> = if args.files.is_empty() {
        find_files(&config.root, &["yaml", "yml"])
    } else {
        let existing: Vec<PathBuf> = args.files.iter().filter(|f| f.exists()).cloned().collect();
        if existing.is_empty() {
            if !args.quiet {
                reporter.error("No valid files specified");
            }
            return Ok(1);
        }
        existing
    };

    if files.is_empty() {
        reporter.status("ℹ️", "No YAML files found to lint");
        return Ok(0);
    }

    // The config file only exists for the duration of the run.
    let config_path = config.root.join(".yamllint");
    fs::write(&config_path, YAMLLINT_CONFIG).await?;

    let outcome = lint_yaml_files(config, reporter, &files, args.quiet, &config_path).await;
    let _ = fs::remove_file(&config_path).await;
    let success = outcome?;

    if success && args.quiet {
        reporter.success(&format!("All {} YAML files pass linting", files.len()));
    }

    Ok(if success { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_deprecated_checkout() {
        let issues = workflow_advisories("      - uses: actions/checkout@v2\n");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("actions/checkout@v4"));
        assert!(issues[0].starts_with("Line 1:"));
    }

    #[test]
    fn test_flags_env_github_context() {
        let content = "run: echo ${{ env.GITHUB_REF }}\n# echo ${{ env.GITHUB_SHA }}\n";
        let issues = workflow_advisories(content);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("'${{ github.* }}'"));
    }

    #[test]
    fn test_flags_unquoted_node_version() {
        let issues = workflow_advisories("        node-version: 18\n");
        assert_eq!(issues.len(), 1);

        let quoted = workflow_advisories("        node-version: \"18\"\n");
        assert!(quoted.is_empty());
    }

    #[test]
    fn test_clean_workflow_has_no_advisories() {
        let content = "      - uses: actions/checkout@v4\n        node-version: \"20\"\n";
        assert!(workflow_advisories(content).is_empty());
    }

    #[test]
    fn test_find_files_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD.md"), "x").unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = find_files(dir.path(), &["md"]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("README.md"));
    }

    #[test]
    fn test_non_workflow_files_skipped() {
        let advisories = github_actions_advisories(Path::new("config/settings.yaml"));
        assert!(advisories.is_empty());
    }
}
