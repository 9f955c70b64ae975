//! Command-line interface definition.
//!
//! One subcommand per operational workflow. Global flags cover the AWS
//! region, project root, verbosity, and color handling; everything else
//! lives on the subcommand that needs it.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// pavectl - operational CLI for the pave AWS infrastructure.
#[derive(Parser, Debug, Clone)]
#[command(name = "pavectl")]
#[command(author = "Blackwell Systems")]
#[command(version)]
#[command(about = "Bootstrap, validate, and tear down the pave AWS infrastructure", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// AWS region
    #[arg(long, global = true, default_value = "us-east-1", env = "AWS_REGION")]
    pub region: String,

    /// Custom AWS endpoint URL (LocalStack testing)
    #[arg(long, global = true, env = "AWS_ENDPOINT_URL", hide = true)]
    pub endpoint_url: Option<String>,

    /// Project root containing the Terraform configuration
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage the bootstrap user, role, policy, and state bucket
    Bootstrap(BootstrapArgs),

    /// Delete deployment IAM users, roles, policies, and state buckets
    Cleanup(CleanupArgs),

    /// Compare deployed IAM resources against the expected configuration
    Drift,

    /// Rotate a compromised access key for an IAM user
    #[command(name = "rotate-keys")]
    RotateKeys(RotateKeysArgs),

    /// Generate local credential files for the deployment users
    Credentials,

    /// Show local and AWS deployment status
    Status,

    /// Validate AWS credentials and local tooling
    Validate,

    /// Switch the Terraform backend between local and S3
    Backend(BackendArgs),

    /// Migrate local Terraform state into the S3 backend
    #[command(name = "migrate-state")]
    MigrateState,

    /// Print GitHub Actions secret configuration steps
    #[command(name = "github-setup")]
    GithubSetup,

    /// Check that deployed infrastructure responds
    Health,

    /// Scan the working tree for security issues
    Scan(ScanArgs),

    /// Lint documentation and configuration files
    Lint(LintArgs),
}

/// Arguments for the bootstrap command group
#[derive(Args, Debug, Clone)]
pub struct BootstrapArgs {
    #[command(subcommand)]
    pub command: BootstrapCommands,
}

/// Bootstrap lifecycle subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum BootstrapCommands {
    /// Create the bootstrap user, policy, role, state bucket, and secret
    Create,

    /// Destroy every bootstrap resource
    Destroy(BootstrapDestroyArgs),

    /// Verify the bootstrap credentials work
    Check,

    /// Republish the Terraform policy with S3 state permissions
    #[command(name = "fix-s3")]
    FixS3,

    /// Print guidance for obtaining temporary root access keys
    #[command(name = "root-help")]
    RootHelp,
}

/// Arguments for bootstrap destroy
#[derive(Args, Debug, Clone)]
pub struct BootstrapDestroyArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub skip_confirm: bool,
}

/// Arguments for cleanup
#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub skip_confirm: bool,
}

/// Arguments for rotate-keys
#[derive(Args, Debug, Clone)]
pub struct RotateKeysArgs {
    /// IAM user whose key was compromised
    #[arg(long, default_value = "developer-user")]
    pub user: String,

    /// Access key id to deactivate
    #[arg(long = "compromised-key")]
    pub compromised_key: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub skip_confirm: bool,
}

/// Arguments for the backend manager
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct BackendArgs {
    /// Switch to the local backend
    #[arg(long)]
    pub local: bool,

    /// Switch to the S3 backend
    #[arg(long)]
    pub s3: bool,

    /// Run the full migration workflow (local bootstrap, then S3)
    #[arg(long)]
    pub migrate: bool,
}

/// Arguments for the security scan
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Suppress per-issue detail
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the lint command group
#[derive(Args, Debug, Clone)]
pub struct LintArgs {
    #[command(subcommand)]
    pub command: LintCommands,
}

/// Lint target subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum LintCommands {
    /// Lint Markdown files with pymarkdown and mdformat
    Markdown(MarkdownLintArgs),

    /// Lint YAML files with yamllint
    Yaml(YamlLintArgs),
}

/// Arguments for markdown linting
#[derive(Args, Debug, Clone)]
pub struct MarkdownLintArgs {
    /// Apply automatic fixes
    #[arg(long)]
    pub fix: bool,

    /// Specific files to lint (defaults to every tracked *.md)
    pub files: Vec<PathBuf>,
}

/// Arguments for YAML linting
#[derive(Args, Debug, Clone)]
pub struct YamlLintArgs {
    /// Apply automatic fixes (yamllint cannot fix; prints a notice)
    #[arg(long)]
    pub fix: bool,

    /// Only show errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Specific files to lint (defaults to every tracked *.yaml / *.yml)
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bootstrap_create() {
        let cli = Cli::try_parse_from(["pavectl", "bootstrap", "create"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Bootstrap(BootstrapArgs {
                command: BootstrapCommands::Create
            })
        ));
    }

    #[test]
    fn test_rotate_requires_compromised_key() {
        let err = Cli::try_parse_from(["pavectl", "rotate-keys"]);
        assert!(err.is_err());

        let cli = Cli::try_parse_from([
            "pavectl",
            "rotate-keys",
            "--compromised-key",
            "AKIAEXAMPLE12345678",
        ])
        .unwrap();
        match cli.command {
            Commands::RotateKeys(args) => {
                assert_eq!(args.user, "developer-user");
                assert_eq!(args.compromised_key, "AKIAEXAMPLE12345678");
                assert!(!args.skip_confirm);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_backend_flags_conflict() {
        let err = Cli::try_parse_from(["pavectl", "backend", "--local", "--s3"]);
        assert!(err.is_err());

        let none = Cli::try_parse_from(["pavectl", "backend"]);
        assert!(none.is_err());

        let cli = Cli::try_parse_from(["pavectl", "backend", "--migrate"]).unwrap();
        match cli.command {
            Commands::Backend(args) => assert!(args.migrate && !args.local && !args.s3),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_region_flag() {
        let cli = Cli::try_parse_from(["pavectl", "--region", "us-west-2", "status"]).unwrap();
        assert_eq!(cli.region, "us-west-2");
    }

    #[test]
    fn test_lint_subcommands() {
        let cli = Cli::try_parse_from(["pavectl", "lint", "yaml", "--quiet"]).unwrap();
        match cli.command {
            Commands::Lint(LintArgs {
                command: LintCommands::Yaml(args),
            }) => {
                assert!(args.quiet);
                assert!(!args.fix);
                assert!(args.files.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
