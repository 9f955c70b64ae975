//! Terraform backend switching between local and S3.
//!
//! The state bucket is created by the same configuration that wants to store
//! its state there, so first deployments bootstrap on the local backend and
//! migrate once the bucket exists. Switching works by exact-string
//! replacement of the backend block inside `pave_infra.tf`.

use crate::aws::AwsClients;
use crate::cli::BackendArgs;
use crate::{terraform, Config, PaveError, Reporter, Result};
use tokio::fs;

pub(crate) const INFRA_FILE: &str = "pave_infra.tf";
pub(crate) const BACKUP_FILE: &str = "pave_infra.tf.backup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Local,
    S3,
}

impl Target {
    fn noun(self) -> &'static str {
        match self {
            Target::Local => "local",
            Target::S3 => "S3",
        }
    }
}

/// The three backend block renderings that can appear in `pave_infra.tf`.
///
/// The file ships with the annotated S3 block; switching to local swaps in
/// the commented-out block; switching back writes the shared-state S3 block.
#[derive(Debug)]
struct BackendBlocks {
    s3_initial: String,
    s3_shared: String,
    local: String,
}

impl BackendBlocks {
    fn new(bucket: &str, key: &str, region: &str) -> Self {
        let s3_initial = format!(
            "  backend \"s3\" {{\n\
             \x20   bucket = \"{bucket}\"\n\
             \x20   key    = \"{key}\"\n\
             \x20   region = \"{region}\"\n\
             \x20   # Note: This bucket is created by this same configuration on first run\n\
             \x20   # Use local backend initially, then migrate to S3 after bucket exists\n\
             \x20 }}"
        );
        let s3_shared = format!(
            "  backend \"s3\" {{\n\
             \x20   bucket = \"{bucket}\"\n\
             \x20   key    = \"{key}\"\n\
             \x20   region = \"{region}\"\n\
             \x20   # Shared state across local, Act, and GitHub Actions deployments\n\
             \x20 }}"
        );
        let local = format!(
            "  # Using local backend temporarily for bucket creation\n\
             \x20 # backend \"s3\" {{\n\
             \x20 #   bucket = \"{bucket}\"\n\
             \x20 #   key    = \"{key}\"\n\
             \x20 #   region = \"{region}\"\n\
             \x20 # }}"
        );
        Self {
            s3_initial,
            s3_shared,
            local,
        }
    }

    fn for_config(config: &Config) -> Self {
        Self::new(&config.state_bucket(), &config.state_key(), &config.region)
    }

    /// Either S3 rendering becomes the commented local block. Unmatched
    /// content passes through unchanged.
    fn to_local(&self, content: &str) -> String {
        if content.contains(&self.s3_initial) {
            content.replace(&self.s3_initial, &self.local)
        } else {
            content.replace(&self.s3_shared, &self.local)
        }
    }

    fn to_s3(&self, content: &str) -> String {
        content.replace(&self.local, &self.s3_shared)
    }
}

async fn backup_infra_file(config: &Config, reporter: &Reporter) -> Result<()> {
    let source = config.root.join(INFRA_FILE);
    if source.exists() {
        fs::copy(&source, config.root.join(BACKUP_FILE)).await?;
        reporter.status("💾", &format!("Created backup: {BACKUP_FILE}"));
    }
    Ok(())
}

async fn rewrite_backend(config: &Config, reporter: &Reporter, target: Target) -> bool {
    let path = config.root.join(INFRA_FILE);
    let blocks = BackendBlocks::for_config(config);

    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => {
            reporter.error(&format!(
                "Error switching to {} backend: {e}",
                target.noun()
            ));
            return false;
        }
    };

    let updated = match target {
        Target::Local => blocks.to_local(&content),
        Target::S3 => blocks.to_s3(&content),
    };

    if let Err(e) = fs::write(&path, updated).await {
        reporter.error(&format!(
            "Error switching to {} backend: {e}",
            target.noun()
        ));
        return false;
    }

    reporter.success(&format!(
        "Switched to {} backend configuration",
        target.noun()
    ));
    true
}

async fn check_state_bucket(aws: &AwsClients, reporter: &Reporter, bucket: &str) -> Result<bool> {
    match aws.bucket_exists(bucket).await {
        Ok(true) => {
            reporter.success(&format!("S3 state bucket {bucket} exists"));
            Ok(true)
        }
        Ok(false) => {
            reporter.status("ℹ️", &format!("S3 state bucket {bucket} does not exist"));
            Ok(false)
        }
        Err(PaveError::MissingCredentials) => Err(PaveError::MissingCredentials),
        Err(e) => {
            reporter.error(&format!("Error checking S3 bucket: {e}"));
            Ok(false)
        }
    }
}

async fn run_init(config: &Config, reporter: &Reporter) -> bool {
    match terraform::init(&config.root).await {
        Ok(out) if out.success() => {
            reporter.success("Terraform init completed");
            true
        }
        Ok(out) => {
            reporter.error("Terraform init failed");
            reporter.plain(&format!("STDOUT: {}", out.stdout));
            reporter.plain(&format!("STDERR: {}", out.stderr));
            false
        }
        Err(PaveError::ToolNotInstalled(_)) => {
            reporter.error("Terraform not found in PATH");
            false
        }
        Err(e) => {
            reporter.error(&format!("Error running terraform init: {e}"));
            false
        }
    }
}

async fn migrate_state_to_s3(config: &Config, reporter: &Reporter) -> bool {
    match terraform::init_migrate(&config.root, true).await {
        Ok(out) if out.success() => {
            reporter.success("State migration to S3 completed");
            true
        }
        Ok(out) => {
            reporter.error("State migration failed");
            reporter.plain(&format!("STDOUT: {}", out.stdout));
            reporter.plain(&format!("STDERR: {}", out.stderr));
            false
        }
        Err(e) => {
            reporter.error(&format!("Error during state migration: {e}"));
            false
        }
    }
}

async fn full_migration(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🚀", "Starting full migration workflow");
    reporter.blank();

    backup_infra_file(config, reporter).await?;

    let aws = AwsClients::new(config).await;
    let bucket = config.state_bucket();
    let exists = match check_state_bucket(&aws, reporter, &bucket).await {
        Ok(exists) => exists,
        Err(PaveError::MissingCredentials) => {
            reporter.error("AWS credentials not configured");
            reporter.status("💡", "Ensure AWS credentials are configured");
            return Ok(1);
        }
        Err(e) => return Err(e),
    };

    if exists {
        reporter.status("ℹ️", "S3 bucket already exists, proceeding with migration");
    } else {
        reporter.status("ℹ️", "S3 bucket doesn't exist, creating it first");

        if !rewrite_backend(config, reporter, Target::Local).await {
            return Ok(1);
        }
        if !run_init(config, reporter).await {
            return Ok(1);
        }

        reporter.status(
            "ℹ️",
            "Run 'terraform apply' to create the S3 bucket, then re-run this command",
        );
        return Ok(0);
    }

    if !rewrite_backend(config, reporter, Target::S3).await {
        return Ok(1);
    }
    if !migrate_state_to_s3(config, reporter).await {
        return Ok(1);
    }

    reporter.blank();
    reporter.status("🎉", "Migration completed successfully!");
    reporter.status("ℹ️", "All deployment methods now share the same S3 state");
    reporter.status(
        "ℹ️",
        "You can safely remove terraform.tfstate and terraform.tfstate.backup",
    );
    Ok(0)
}

async fn switch(config: &Config, reporter: &Reporter, target: Target) -> Result<i32> {
    backup_infra_file(config, reporter).await?;
    if rewrite_backend(config, reporter, target).await {
        reporter.status("ℹ️", "Run 'terraform init' to apply the backend change");
        Ok(0)
    } else {
        Ok(1)
    }
}

pub async fn run(config: &Config, reporter: &Reporter, args: &BackendArgs) -> Result<i32> {
    if args.migrate {
        full_migration(config, reporter).await
    } else if args.local {
        switch(config, reporter, Target::Local).await
    } else {
        switch(config, reporter, Target::S3).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "pave-tf-state-bucket-us-east-1";
    const KEY: &str = "pave/terraform.tfstate";
    const REGION: &str = "us-east-1";

    fn blocks() -> BackendBlocks {
        BackendBlocks::new(BUCKET, KEY, REGION)
    }

    fn infra_with(block: &str) -> String {
        format!("terraform {{\n  required_version = \">= 1.5\"\n\n{block}\n}}\n")
    }

    #[test]
    fn test_initial_s3_to_local() {
        let blocks = blocks();
        let content = infra_with(&blocks.s3_initial);
        let switched = blocks.to_local(&content);
        assert!(switched.contains("# Using local backend temporarily for bucket creation"));
        assert!(!switched.contains("  backend \"s3\" {"));
    }

    #[test]
    fn test_local_to_s3_and_back() {
        let blocks = blocks();
        let content = infra_with(&blocks.local);

        let s3 = blocks.to_s3(&content);
        assert!(s3.contains("Shared state across local, Act, and GitHub Actions deployments"));
        assert!(s3.contains(&format!("bucket = \"{BUCKET}\"")));

        let back = blocks.to_local(&s3);
        assert_eq!(back, content);
    }

    #[test]
    fn test_unmatched_content_passes_through() {
        let blocks = blocks();
        let content = "resource \"aws_iam_user\" \"admin\" {}\n";
        assert_eq!(blocks.to_local(content), content);
        assert_eq!(blocks.to_s3(content), content);
    }
}
