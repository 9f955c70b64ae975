//! Post-deployment health probe across STS, IAM, S3, and Secrets Manager.

use crate::aws::AwsClients;
use crate::{Config, PaveError, Reporter, Result};

async fn test_connectivity(aws: &AwsClients, reporter: &Reporter) -> bool {
    reporter.status("🔍", "Testing AWS connectivity...");
    match aws.caller_identity().await {
        Ok(identity) => {
            reporter.success(&format!("Connected as: {}", identity.arn));
            true
        }
        Err(PaveError::MissingCredentials) => {
            reporter.error("No AWS credentials found");
            false
        }
        Err(e) => {
            reporter.error(&format!("AWS connectivity failed: {e}"));
            false
        }
    }
}

async fn iam_probe(aws: &AwsClients, reporter: &Reporter) -> Result<bool> {
    let user_names: Vec<String> = aws
        .list_users()
        .await?
        .into_iter()
        .map(|u| u.name)
        .collect();
    for user in ["admin-user", "developer-user"] {
        if user_names.iter().any(|n| n == user) {
            reporter.success(&format!("User {user} exists"));
        } else {
            reporter.error(&format!("User {user} missing"));
            return Ok(false);
        }
    }

    let role_names: Vec<String> = aws
        .list_roles()
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();
    for role in ["CICDDeploymentRole", "DeveloperRole"] {
        if role_names.iter().any(|n| n == role) {
            reporter.success(&format!("Role {role} exists"));
        } else {
            reporter.error(&format!("Role {role} missing"));
            return Ok(false);
        }
    }

    Ok(true)
}

async fn test_iam_resources(aws: &AwsClients, reporter: &Reporter) -> bool {
    reporter.status("🔍", "Testing IAM resources...");
    match iam_probe(aws, reporter).await {
        Ok(ok) => ok,
        Err(e) => {
            reporter.error(&format!("IAM test failed: {e}"));
            false
        }
    }
}

async fn test_s3_backend(aws: &AwsClients, config: &Config, reporter: &Reporter) -> bool {
    reporter.status("🔍", "Testing S3 backend...");
    let bucket = config.state_bucket();

    match aws.bucket_exists(&bucket).await {
        Ok(true) => {
            reporter.success(&format!("S3 bucket {bucket} exists and accessible"));
        }
        Ok(false) => {
            reporter.error(&format!("S3 bucket test failed: {bucket} not found"));
            return false;
        }
        Err(e) => {
            reporter.error(&format!("S3 bucket test failed: {e}"));
            return false;
        }
    }

    match aws
        .list_objects_with_prefix(&bucket, &config.state_key())
        .await
    {
        Ok(objects) if !objects.is_empty() => {
            reporter.success("Terraform state file exists in S3");
        }
        Ok(_) => {
            reporter.warning("No Terraform state file found (this is OK for fresh deployments)");
        }
        Err(e) => {
            reporter.error(&format!("Error checking state file: {e}"));
        }
    }

    true
}

async fn test_secrets_manager(aws: &AwsClients, config: &Config, reporter: &Reporter) -> bool {
    reporter.status("🔍", "Testing AWS Secrets Manager...");
    match aws.list_secret_names().await {
        Ok(names) => {
            if names.iter().any(|n| n == &config.root_secret()) {
                reporter.success("Root credentials secret exists in Secrets Manager");
            } else {
                reporter.warning("Root credentials secret not found (may have been cleaned up)");
            }
            true
        }
        Err(PaveError::AccessDenied(_)) => {
            reporter.warning(
                "Secrets Manager access denied (bootstrap user has limited permissions)",
            );
            true
        }
        Err(e) => {
            reporter.error(&format!("Secrets Manager test failed: {e}"));
            false
        }
    }
}

pub async fn run(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🏗️", "Testing deployed AWS infrastructure...");
    reporter.blank();

    let aws = AwsClients::new(config).await;

    let mut success = true;
    success &= test_connectivity(&aws, reporter).await;
    reporter.blank();
    success &= test_iam_resources(&aws, reporter).await;
    reporter.blank();
    success &= test_s3_backend(&aws, config, reporter).await;
    reporter.blank();
    success &= test_secrets_manager(&aws, config, reporter).await;
    reporter.blank();

    if success {
        reporter.success("Infrastructure health check completed successfully!");
        Ok(0)
    } else {
        reporter.error("Infrastructure health check failed!");
        Ok(1)
    }
}
