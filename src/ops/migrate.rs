//! One-shot migration of local Terraform state into the S3 backend.
//!
//! The bucket itself is Terraform-managed, so a missing bucket is not an
//! error here: the operator deploys first, then migrates.

use crate::aws::AwsClients;
use crate::{terraform, Config, PaveError, Reporter, Result};

pub async fn run(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🚀", "Starting Terraform state migration to S3 backend");
    reporter.blank();

    match terraform::inspect_local_state(&config.root) {
        Ok(Some(state)) => {
            reporter.success(&format!(
                "Local state found with {} resources",
                state.resources
            ));
        }
        Ok(None) => {
            reporter.status("ℹ️", "No local terraform.tfstate found");
            reporter.status(
                "ℹ️",
                "No local state to migrate - you can proceed with normal deployment",
            );
            return Ok(0);
        }
        Err(PaveError::Json(_)) => {
            reporter.error("Local state file is corrupted");
            return Ok(1);
        }
        Err(e) => return Err(e),
    }

    let aws = AwsClients::new(config).await;
    let bucket = config.state_bucket();
    match aws.bucket_exists(&bucket).await {
        Ok(true) => {
            reporter.success(&format!("S3 state bucket {bucket} already exists"));
        }
        Ok(false) => {
            reporter.status("ℹ️", &format!("S3 state bucket {bucket} does not exist"));
            reporter.status("💡", "S3 bucket doesn't exist yet");
            reporter.status("💡", "The bucket will be created during the first deployment");
            reporter.status(
                "💡",
                "After first deployment, run this command again to migrate state",
            );
            return Ok(0);
        }
        Err(PaveError::MissingCredentials) => {
            reporter.error("AWS credentials not configured");
            reporter.status("💡", "Ensure AWS credentials are configured");
            return Ok(1);
        }
        Err(e) => {
            reporter.error(&format!("Error checking S3 bucket: {e}"));
            return Ok(1);
        }
    }

    reporter.status("🔄", "Migrating Terraform state to S3 backend...");
    match terraform::init_migrate(&config.root, true).await {
        Ok(out) if out.success() => {
            reporter.success("State migration completed successfully");
        }
        Ok(out) => {
            reporter.error("State migration failed");
            reporter.plain(&format!("STDOUT: {}", out.stdout));
            reporter.plain(&format!("STDERR: {}", out.stderr));
            return Ok(1);
        }
        Err(PaveError::ToolNotInstalled(_)) => {
            reporter.error("Terraform not found in PATH");
            return Ok(1);
        }
        Err(e) => {
            reporter.error(&format!("Error during state migration: {e}"));
            return Ok(1);
        }
    }

    match terraform::state_list(&config.root).await {
        Ok(resources) => {
            reporter.success(&format!(
                "Remote state verified with {} resources",
                resources.len()
            ));
        }
        Err(_) => {
            reporter.error("Failed to verify remote state");
            return Ok(1);
        }
    }

    reporter.blank();
    reporter.status("🎉", "State migration completed successfully!");
    reporter.status("ℹ️", "All deployment methods now share the same state");
    reporter.status("ℹ️", "Local terraform.tfstate file can be safely removed");
    Ok(0)
}
