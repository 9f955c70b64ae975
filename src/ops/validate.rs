//! Environment preflight: working AWS credentials, Terraform, and the AWS
//! CLI the console workflows lean on. Any failed check fails the run.

use crate::aws::AwsClients;
use crate::exec::capture_command;
use crate::{terraform, Config, Reporter, Result};

async fn check_aws_credentials(config: &Config, reporter: &Reporter) -> bool {
    let aws = AwsClients::new(config).await;
    match aws.caller_identity().await {
        Ok(identity) => {
            reporter.success(&format!(
                "AWS credentials valid - Account: {}",
                identity.account
            ));
            reporter.plain(&format!("    Identity: {}", identity.arn));
            true
        }
        Err(e) => {
            reporter.error(&format!("AWS credentials invalid: {e}"));
            reporter.status("💡", "Configure AWS credentials:");
            reporter.plain(
                "    - Set environment variables (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY)",
            );
            reporter.plain("    - Or configure AWS CLI: aws configure");
            reporter.plain("    - Or use .secrets file for local development");
            false
        }
    }
}

async fn check_terraform(config: &Config, reporter: &Reporter) -> bool {
    match terraform::version(&config.root).await {
        Ok(version_line) => {
            reporter.success(&format!("Terraform available: {version_line}"));
            true
        }
        Err(_) => {
            reporter.error("Terraform not found");
            reporter.status("💡", "Install Terraform: https://terraform.io/downloads");
            false
        }
    }
}

async fn check_aws_cli(config: &Config, reporter: &Reporter) -> bool {
    match capture_command(&config.root, "aws", &["--version"]).await {
        Ok(out) if out.success() => {
            let version_line = out
                .stdout
                .lines()
                .chain(out.stderr.lines())
                .next()
                .unwrap_or_default()
                .to_string();
            reporter.success(&format!("AWS CLI available: {version_line}"));
            true
        }
        _ => {
            reporter.error("AWS CLI not found");
            reporter.status("💡", "Install AWS CLI: https://aws.amazon.com/cli/");
            false
        }
    }
}

pub async fn run(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🔍", "Validating environment...");
    reporter.blank();

    reporter.plain("Checking AWS Credentials...");
    let creds_ok = check_aws_credentials(config, reporter).await;
    reporter.blank();

    reporter.plain("Checking Terraform...");
    let terraform_ok = check_terraform(config, reporter).await;
    reporter.blank();

    reporter.plain("Checking AWS CLI...");
    let cli_ok = check_aws_cli(config, reporter).await;
    reporter.blank();

    if creds_ok && terraform_ok && cli_ok {
        reporter.success("All validations passed!");
        Ok(0)
    } else {
        reporter.error("Some validations failed");
        Ok(1)
    }
}
