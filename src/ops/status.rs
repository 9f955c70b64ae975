//! Infrastructure status dashboard. Read-only: reports local and deployed
//! state but never fails the process over what it sees.

use crate::aws::AwsClients;
use crate::{terraform, Config, Reporter, Result};
use std::path::Path;

fn is_pave_user(name: &str) -> bool {
    name == "admin-user"
        || name == "developer-user"
        || name.contains("admin-user-")
        || name.contains("developer-user-")
}

fn is_pave_role(name: &str) -> bool {
    name == "CICDDeploymentRole"
        || name == "DeveloperRole"
        || name.contains("CICDDeploymentRole-")
        || name.contains("DeveloperRole-")
}

fn is_pave_bucket(name: &str) -> bool {
    name.contains("pave-tf-state-bucket-")
}

async fn terraform_status(root: &Path) -> (&'static str, &'static str) {
    if !terraform::is_initialized(root) {
        return ("Not initialized", "Run 'terraform init'");
    }
    if !terraform::has_local_state(root) {
        return ("Initialized, no state", "Run 'terraform apply' to deploy");
    }
    match terraform::show_json(root).await {
        Ok(out) if out.trim() == "{}" => ("No resources deployed", "Run 'terraform apply' to deploy"),
        Ok(_) => ("Resources deployed", "Ready for operations"),
        Err(_) => ("State file exists", "Unknown status"),
    }
}

fn count_env_files(dir: &Path) -> Option<usize> {
    let entries = std::fs::read_dir(dir).ok()?;
    let count = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "env"))
        .count();
    Some(count)
}

#[derive(Debug, Default)]
struct PaveResources {
    users: Vec<String>,
    roles: Vec<String>,
    buckets: Vec<String>,
}

impl PaveResources {
    fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty() && self.buckets.is_empty()
    }
}

async fn gather_resources(aws: &AwsClients) -> Result<PaveResources> {
    let users = aws
        .list_users()
        .await?
        .into_iter()
        .map(|u| u.name)
        .filter(|n| is_pave_user(n))
        .collect();
    let roles = aws
        .list_roles()
        .await?
        .into_iter()
        .map(|r| r.name)
        .filter(|n| is_pave_role(n))
        .collect();
    let buckets = aws
        .list_buckets()
        .await?
        .into_iter()
        .filter(|n| is_pave_bucket(n))
        .collect();
    Ok(PaveResources {
        users,
        roles,
        buckets,
    })
}

fn report_group(reporter: &Reporter, label: &str, names: &[String]) {
    reporter.plain(&format!("  {label}: {}", names.len()));
    for name in names.iter().take(3) {
        reporter.plain(&format!("    - {name}"));
    }
}

pub async fn run(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("📊", "Pave - Infrastructure Status");
    reporter.blank();

    reporter.status("🏠", "Local Environment:");
    let (tf_status, tf_advice) = terraform_status(&config.root).await;
    reporter.plain(&format!("  Terraform: {tf_status}"));
    reporter.plain(&format!("  💡 {tf_advice}"));

    match count_env_files(&config.credentials_dir()) {
        Some(count) => reporter.plain(&format!("  Credentials: {count} files")),
        None => {
            reporter.plain("  Credentials: None generated");
            reporter.plain("  💡 Run 'pavectl credentials' after deployment");
        }
    }
    reporter.blank();

    reporter.status("☁️", "AWS Resources:");
    let aws = AwsClients::new(config).await;
    match gather_resources(&aws).await {
        Ok(resources) => {
            report_group(reporter, "Users", &resources.users);
            report_group(reporter, "Roles", &resources.roles);
            report_group(reporter, "S3 Buckets", &resources.buckets);
            if resources.is_empty() {
                reporter.plain("  💡 No resources found - run 'terraform apply' to deploy");
            }
        }
        Err(e) => {
            reporter.plain(&format!("  ❌ Error: {e}"));
            reporter.plain("  💡 Check AWS credentials with 'pavectl validate'");
        }
    }

    reporter.blank();
    reporter.status("🚀", "Quick Commands:");
    reporter.plain("  pavectl --help          - Show all available commands");
    reporter.plain("  terraform init          - Initialize environment");
    reporter.plain("  terraform apply         - Deploy infrastructure");
    reporter.plain("  pavectl credentials     - Generate credential files");
    reporter.plain("  pavectl cleanup         - Clean up all resources");

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pave_user_matching() {
        assert!(is_pave_user("admin-user"));
        assert!(is_pave_user("developer-user"));
        assert!(is_pave_user("admin-user-x1"));
        assert!(!is_pave_user("pave-bootstrap-user"));
        assert!(!is_pave_user("someone-else"));
    }

    #[test]
    fn test_pave_role_matching() {
        assert!(is_pave_role("CICDDeploymentRole"));
        assert!(is_pave_role("DeveloperRole-legacy"));
        assert!(!is_pave_role("OrganizationAccountAccessRole"));
    }

    #[test]
    fn test_pave_bucket_matching() {
        assert!(is_pave_bucket("pave-tf-state-bucket-256140316797"));
        assert!(!is_pave_bucket("some-other-bucket"));
    }

    #[test]
    fn test_count_env_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("admin.env"), "x").unwrap();
        std::fs::write(dir.path().join("developer.env"), "x").unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();
        assert_eq!(count_env_files(dir.path()), Some(2));
        assert_eq!(count_env_files(&dir.path().join("missing")), None);
    }
}
