//! pavectl - operational CLI for the pave AWS infrastructure.
//!
//! Each subcommand wraps one operational workflow: bootstrap lifecycle,
//! cleanup, drift detection, credential management, backend switching,
//! health checks, and the supporting scan/lint tooling.

use clap::Parser;
use pavectl::cli::{BootstrapCommands, Cli, Commands, LintCommands};
use pavectl::{ops, Config, Reporter, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let reporter = Reporter::new(!cli.no_color);
    let config = build_config(&cli);

    let code = match dispatch(&cli, &config, &reporter).await {
        Ok(code) => code,
        Err(e) => {
            reporter.error(&format!("{e}"));
            1
        }
    };
    std::process::exit(code);
}

/// Routes the parsed command line to its operation.
///
/// Every operation returns the process exit code: 0 when the workflow
/// completed cleanly, 1 when it detected a failure it already reported.
async fn dispatch(cli: &Cli, config: &Config, reporter: &Reporter) -> Result<i32> {
    match &cli.command {
        Commands::Bootstrap(args) => match &args.command {
            BootstrapCommands::Create => ops::bootstrap::create(config, reporter).await,
            BootstrapCommands::Destroy(destroy) => {
                ops::bootstrap::destroy(config, reporter, destroy.skip_confirm).await
            }
            BootstrapCommands::Check => ops::bootstrap::check(config, reporter).await,
            BootstrapCommands::FixS3 => ops::bootstrap::fix_s3(config, reporter).await,
            BootstrapCommands::RootHelp => ops::bootstrap::root_help(reporter).await,
        },
        Commands::Cleanup(args) => ops::cleanup::run(config, reporter, args.skip_confirm).await,
        Commands::Drift => ops::drift::run(config, reporter).await,
        Commands::RotateKeys(args) => {
            ops::rotate::run(
                config,
                reporter,
                &args.user,
                &args.compromised_key,
                args.skip_confirm,
            )
            .await
        }
        Commands::Credentials => ops::credentials::run(config, reporter).await,
        Commands::Status => ops::status::run(config, reporter).await,
        Commands::Validate => ops::validate::run(config, reporter).await,
        Commands::Backend(args) => ops::backend::run(config, reporter, args).await,
        Commands::MigrateState => ops::migrate::run(config, reporter).await,
        Commands::GithubSetup => ops::github::run(config, reporter).await,
        Commands::Health => ops::health::run(config, reporter).await,
        Commands::Scan(args) => ops::scan::run(config, reporter, args.quiet).await,
        Commands::Lint(args) => match &args.command {
            LintCommands::Markdown(markdown) => {
                ops::lint::run_markdown(config, reporter, markdown).await
            }
            LintCommands::Yaml(yaml) => ops::lint::run_yaml(config, reporter, yaml).await,
        },
    }
}

fn build_config(cli: &Cli) -> Config {
    let mut config = Config::new().with_region(&cli.region).with_root(&cli.root);
    if let Some(endpoint) = &cli.endpoint_url {
        config = config.with_endpoint(endpoint);
    }
    config
}

/// Maps `-v` counts onto a tracing filter; `RUST_LOG` overrides when set.
///
/// Logs go to stderr so they never interleave with the human-facing
/// stdout reporting.
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(verbosity >= 3)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_config_from_flags() {
        let cli = Cli::try_parse_from([
            "pavectl",
            "--region",
            "eu-west-1",
            "--endpoint-url",
            "http://localhost:4566",
            "--root",
            "/tmp/pave",
            "status",
        ])
        .unwrap();

        let config = build_config(&cli);
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.root, PathBuf::from("/tmp/pave"));
    }

    #[test]
    fn test_build_config_defaults() {
        let cli = Cli::try_parse_from(["pavectl", "status"]).unwrap();
        let config = build_config(&cli);
        assert_eq!(config.prefix, "pave");
        assert_eq!(config.root, PathBuf::from("."));
    }
}
