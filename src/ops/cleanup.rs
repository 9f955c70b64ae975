//! Comprehensive cleanup of deployment resources across all environments.
//!
//! Discovery first, then destruction in dependency order: users, roles,
//! policies, buckets, local files. Per-resource failures are reported and
//! the sweep continues; "not found" is success. The three bootstrap
//! resources are excluded before pattern matching ever runs.

use crate::aws::iam::PolicySummary;
use crate::aws::AwsClients;
use crate::config::{
    is_cleanup_bucket, is_cleanup_policy, is_cleanup_role, is_cleanup_user, PROTECTED_POLICY,
    PROTECTED_ROLE, PROTECTED_USER,
};
use crate::credfile;
use crate::{Config, PaveError, Reporter, Result};

pub async fn run(config: &Config, reporter: &Reporter, skip_confirm: bool) -> Result<i32> {
    reporter.status("🧹", "Starting comprehensive cleanup of pave infrastructure...");
    reporter.blank();

    if !skip_confirm {
        reporter.warning("This will remove ALL pave infrastructure resources (destructive!)");
        let confirmed = reporter
            .confirm("Are you sure you want to continue? (y/N): ")
            .await?;
        if !confirmed {
            reporter.error("Cleanup cancelled");
            return Ok(0);
        }
        reporter.blank();
    }

    let aws = AwsClients::new(config).await;

    reporter.status("🔍", "Discovering pave resources...");
    let users = match find_users(&aws).await {
        Ok(users) => users,
        Err(PaveError::MissingCredentials) => {
            reporter.error("AWS credentials not configured");
            reporter.status("💡", "Run 'aws configure' or set environment variables");
            return Ok(1);
        }
        Err(e) => {
            reporter.warning(&format!("Error listing users: {e}"));
            Vec::new()
        }
    };
    let roles = match find_roles(&aws).await {
        Ok(roles) => roles,
        Err(e) => {
            reporter.warning(&format!("Error listing roles: {e}"));
            Vec::new()
        }
    };
    let policies = match find_policies(&aws).await {
        Ok(policies) => policies,
        Err(e) => {
            reporter.warning(&format!("Error listing policies: {e}"));
            Vec::new()
        }
    };
    let buckets = match find_buckets(&aws).await {
        Ok(buckets) => buckets,
        Err(e) => {
            reporter.warning(&format!("Error listing buckets: {e}"));
            Vec::new()
        }
    };

    reporter.blank();
    reporter.status("📊", "Resources found:");
    reporter.plain(&format!("  - Users: {}", users.len()));
    reporter.plain(&format!("  - Roles: {}", roles.len()));
    reporter.plain(&format!("  - Custom Policies: {}", policies.len()));
    reporter.plain(&format!("  - S3 Buckets: {}", buckets.len()));
    reporter.blank();
    reporter.status("🔒", "Bootstrap resources are protected and will NEVER be deleted:");
    reporter.plain(&format!("  - User: {PROTECTED_USER}"));
    reporter.plain(&format!("  - Role: {PROTECTED_ROLE}"));
    reporter.plain(&format!("  - Policy: {PROTECTED_POLICY}"));
    reporter.blank();

    if users.is_empty() && roles.is_empty() && policies.is_empty() && buckets.is_empty() {
        reporter.success("No pave resources found to clean up");
        return Ok(0);
    }

    cleanup_users(&aws, reporter, &users).await;
    reporter.blank();
    cleanup_roles(&aws, reporter, &roles).await;
    reporter.blank();
    cleanup_policies(&aws, reporter, &policies).await;
    reporter.blank();
    cleanup_buckets(&aws, reporter, &buckets).await;
    reporter.blank();

    cleanup_local_files(config, reporter).await;
    reporter.blank();

    reporter.success("Comprehensive cleanup completed!");
    reporter.status("💡", "Run 'terraform init' to reinitialize for fresh deployment");
    Ok(0)
}

async fn find_users(aws: &AwsClients) -> Result<Vec<String>> {
    Ok(aws
        .list_users()
        .await?
        .into_iter()
        .map(|u| u.name)
        .filter(|name| is_cleanup_user(name))
        .collect())
}

async fn find_roles(aws: &AwsClients) -> Result<Vec<String>> {
    Ok(aws
        .list_roles()
        .await?
        .into_iter()
        .map(|r| r.name)
        .filter(|name| is_cleanup_role(name))
        .collect())
}

async fn find_policies(aws: &AwsClients) -> Result<Vec<PolicySummary>> {
    Ok(aws
        .list_local_policies()
        .await?
        .into_iter()
        .filter(|p| is_cleanup_policy(&p.name))
        .collect())
}

async fn find_buckets(aws: &AwsClients) -> Result<Vec<String>> {
    Ok(aws
        .list_buckets()
        .await?
        .into_iter()
        .filter(|name| is_cleanup_bucket(name))
        .collect())
}

async fn cleanup_users(aws: &AwsClients, reporter: &Reporter, users: &[String]) {
    if users.is_empty() {
        reporter.info("No pave users found to clean up");
        return;
    }

    reporter.status("👥", &format!("Cleaning up {} users...", users.len()));
    for user in users {
        reporter.status("  🗑️", &format!("Cleaning up user: {user}"));

        match aws.list_access_keys(user).await {
            Ok(keys) => {
                for key in keys {
                    reporter.status("    🔑", &format!("Deleting access key: {}", key.id));
                    if let Err(e) = aws.delete_access_key(user, &key.id).await {
                        reporter.warning(&format!("Error cleaning up access keys for {user}: {e}"));
                    }
                }
            }
            Err(e) => reporter.warning(&format!("Error cleaning up access keys for {user}: {e}")),
        }

        if let Err(e) = detach_user_policies(aws, reporter, user).await {
            reporter.warning(&format!("Error cleaning up policies for {user}: {e}"));
        }

        match aws.delete_user(user).await {
            Ok(()) => reporter.status("  ✅", &format!("Deleted user: {user}")),
            Err(e) => reporter.status("  ⚠️", &format!("Error deleting user {user}: {e}")),
        }
    }
}

async fn detach_user_policies(aws: &AwsClients, reporter: &Reporter, user: &str) -> Result<()> {
    for policy in aws.list_attached_user_policies(user).await? {
        reporter.status("    📋", &format!("Detaching policy: {}", policy.arn));
        aws.detach_user_policy(user, &policy.arn).await?;
    }
    for name in aws.list_user_policies(user).await? {
        reporter.status("    📋", &format!("Deleting inline policy: {name}"));
        aws.delete_user_policy(user, &name).await?;
    }
    Ok(())
}

async fn cleanup_roles(aws: &AwsClients, reporter: &Reporter, roles: &[String]) {
    if roles.is_empty() {
        reporter.info("No pave roles found to clean up");
        return;
    }

    reporter.status("🏭", &format!("Cleaning up {} roles...", roles.len()));
    for role in roles {
        reporter.status("  🗑️", &format!("Cleaning up role: {role}"));

        if let Err(e) = detach_role_policies(aws, reporter, role).await {
            reporter.warning(&format!("Error cleaning up policies for {role}: {e}"));
        }

        match aws.delete_role(role).await {
            Ok(()) => reporter.status("  ✅", &format!("Deleted role: {role}")),
            Err(e) => reporter.status("  ⚠️", &format!("Error deleting role {role}: {e}")),
        }
    }
}

async fn detach_role_policies(aws: &AwsClients, reporter: &Reporter, role: &str) -> Result<()> {
    for policy in aws.list_attached_role_policies(role).await? {
        reporter.status("    📋", &format!("Detaching policy: {}", policy.arn));
        aws.detach_role_policy(role, &policy.arn).await?;
    }
    for name in aws.list_role_policies(role).await? {
        reporter.status("    📋", &format!("Deleting inline policy: {name}"));
        aws.delete_role_policy(role, &name).await?;
    }
    Ok(())
}

async fn cleanup_policies(aws: &AwsClients, reporter: &Reporter, policies: &[PolicySummary]) {
    if policies.is_empty() {
        reporter.info("No pave custom policies found to clean up");
        return;
    }

    reporter.status("📋", &format!("Cleaning up {} custom policies...", policies.len()));
    for policy in policies {
        reporter.status("  🗑️", &format!("Deleting policy: {}", policy.name));
        match aws.delete_policy(&policy.arn).await {
            Ok(()) => reporter.status("  ✅", &format!("Deleted policy: {}", policy.name)),
            Err(e) => {
                reporter.status("  ⚠️", &format!("Error deleting policy {}: {e}", policy.name));
            }
        }
    }
}

async fn cleanup_buckets(aws: &AwsClients, reporter: &Reporter, buckets: &[String]) {
    if buckets.is_empty() {
        reporter.info("No pave buckets found to clean up");
        return;
    }

    reporter.status("🪣", &format!("Cleaning up {} S3 buckets...", buckets.len()));
    for bucket in buckets {
        reporter.status("  🗑️", &format!("Cleaning up bucket: {bucket}"));

        reporter.status("    📦", "Emptying bucket contents...");
        if let Err(e) = aws.empty_bucket(bucket).await {
            reporter.warning(&format!("Error emptying bucket {bucket}: {e}"));
        }

        match aws.delete_bucket(bucket).await {
            Ok(()) => reporter.status("  ✅", &format!("Deleted bucket: {bucket}")),
            Err(e) => reporter.status("  ⚠️", &format!("Error deleting bucket {bucket}: {e}")),
        }
    }
}

async fn cleanup_local_files(config: &Config, reporter: &Reporter) {
    reporter.status("🧹", "Cleaning up local files...");

    let files = [
        "terraform.tfstate",
        "terraform.tfstate.backup",
        ".terraform.lock.hcl",
    ];
    for name in files {
        let path = config.root.join(name);
        match credfile::remove_file_if_exists(&path).await {
            Ok(_) => reporter.status("  🗑️", &format!("Removed: {name}")),
            Err(e) => reporter.status("  ⚠️", &format!("Error removing {name}: {e}")),
        }
    }

    for name in [".terraform", "credentials"] {
        let path = config.root.join(name);
        match credfile::remove_dir_if_exists(&path).await {
            Ok(true) => reporter.status("  🗑️", &format!("Removed directory: {name}")),
            Ok(false) => {}
            Err(e) => reporter.status("  ⚠️", &format!("Error removing {name}: {e}")),
        }
    }
}
