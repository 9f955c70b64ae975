//! Credential file generation for the deployed users.
//!
//! Prefers real key material from Terraform outputs; otherwise discovers the
//! users through IAM and emits templates with console instructions, since a
//! secret access key cannot be read back after creation.

use crate::aws::AwsClients;
use crate::{credfile, terraform, Config, PaveError, Reporter, Result};
use serde_json::Value;

#[derive(Debug, Default)]
struct TerraformCreds {
    admin_access_key: Option<String>,
    admin_secret_key: Option<String>,
    developer_access_key: Option<String>,
    developer_secret_key: Option<String>,
}

impl TerraformCreds {
    fn from_outputs(outputs: &Value) -> Self {
        Self {
            admin_access_key: output_value(outputs, "admin_user_access_key"),
            admin_secret_key: output_value(outputs, "admin_user_secret_key"),
            developer_access_key: output_value(outputs, "developer_user_access_key"),
            developer_secret_key: output_value(outputs, "developer_user_secret_key"),
        }
    }

    fn is_complete(&self) -> bool {
        self.admin_access_key.is_some()
            && self.admin_secret_key.is_some()
            && self.developer_access_key.is_some()
            && self.developer_secret_key.is_some()
    }
}

fn output_value(outputs: &Value, name: &str) -> Option<String> {
    outputs
        .get(name)
        .and_then(|o| o.get("value"))
        .and_then(Value::as_str)
        .map(String::from)
}

fn is_admin_user(name: &str) -> bool {
    name == "admin-user" || name.contains("admin-user-")
}

fn is_developer_user(name: &str) -> bool {
    name == "developer-user" || name.contains("developer-user-")
}

async fn terraform_outputs(config: &Config, reporter: &Reporter) -> Option<TerraformCreds> {
    reporter.status("📋", "Checking for Terraform outputs...");

    let outputs = terraform::output_json(&config.root).await.ok().flatten();
    if let Some(outputs) = outputs {
        if outputs.as_object().is_some_and(|o| !o.is_empty()) {
            reporter.success("Found Terraform outputs");
            return Some(TerraformCreds::from_outputs(&outputs));
        }
    }

    reporter.warning("No Terraform outputs found, using AWS API discovery...");
    None
}

async fn find_deployed_users(
    aws: &AwsClients,
    reporter: &Reporter,
) -> Result<Option<(String, String)>> {
    reporter.status("🔍", "Looking for deployed users...");

    let users = match aws.list_users().await {
        Ok(users) => users,
        Err(PaveError::MissingCredentials) => {
            reporter.error("Error connecting to AWS iam: credentials not found");
            reporter.status("💡", "Ensure AWS credentials are configured (aws configure)");
            return Ok(None);
        }
        Err(e) => {
            reporter.error(&format!("Error finding users: {e}"));
            return Ok(None);
        }
    };

    let mut admin_user = None;
    let mut developer_user = None;
    for user in &users {
        if is_admin_user(&user.name) {
            admin_user = Some(user.name.clone());
        } else if is_developer_user(&user.name) {
            developer_user = Some(user.name.clone());
        }
    }

    match (admin_user, developer_user) {
        (Some(admin), Some(developer)) => {
            reporter.success("Found users:");
            reporter.plain(&format!("  - Admin: {admin}"));
            reporter.plain(&format!("  - Developer: {developer}"));
            Ok(Some((admin, developer)))
        }
        _ => {
            reporter.error("Could not find admin or developer users");
            reporter.status("💡", "Make sure infrastructure has been deployed:");
            reporter.plain("  terraform apply");
            reporter.plain("  # OR #");
            reporter.plain("  act -W .github/workflows/terraform.yaml");
            Ok(None)
        }
    }
}

async fn first_access_key(aws: &AwsClients, user: &str) -> Option<String> {
    match aws.list_access_keys(user).await {
        Ok(keys) => keys.into_iter().next().map(|k| k.id),
        Err(_) => None,
    }
}

async fn write_actual_files(
    config: &Config,
    reporter: &Reporter,
    creds: &TerraformCreds,
) -> Result<()> {
    let dir = config.credentials_dir();
    let admin_key = creds.admin_access_key.as_deref().unwrap_or_default();
    let admin_secret = creds.admin_secret_key.as_deref().unwrap_or_default();
    let developer_key = creds.developer_access_key.as_deref().unwrap_or_default();
    let developer_secret = creds.developer_secret_key.as_deref().unwrap_or_default();

    credfile::write_env_file(
        &dir.join("admin.env"),
        &credfile::admin_env(admin_key, admin_secret, &config.region),
    )
    .await?;
    credfile::write_env_file(
        &dir.join("developer.env"),
        &credfile::developer_env(developer_key, developer_secret, &config.region),
    )
    .await?;

    reporter.success("Credentials extracted and saved with secure permissions (600)");
    reporter.status("📋", &format!("Admin Access Key: {admin_key}"));
    reporter.status("📋", &format!("Developer Access Key: {developer_key}"));
    Ok(())
}

async fn write_template_files(
    config: &Config,
    reporter: &Reporter,
    admin_user: &str,
    developer_user: &str,
    admin_key: Option<&str>,
    developer_key: Option<&str>,
) -> Result<()> {
    reporter.status("🔑", "Existing Access Keys:");
    reporter.plain(&format!("  - Admin: {}", admin_key.unwrap_or("None")));
    reporter.plain(&format!(
        "  - Developer: {}",
        developer_key.unwrap_or("None")
    ));
    reporter.blank();

    if admin_key.is_some() && developer_key.is_some() {
        reporter.warning("Access keys exist but secret keys cannot be retrieved after creation.");
    }

    reporter.status(
        "📝",
        "Creating credential template files with AWS Console instructions...",
    );

    let dir = config.credentials_dir();
    credfile::write_env_file(
        &dir.join("admin.env"),
        &credfile::admin_env_template(admin_user, admin_key, &config.region),
    )
    .await?;
    credfile::write_env_file(
        &dir.join("developer.env"),
        &credfile::developer_env_template(developer_user, developer_key, &config.region),
    )
    .await?;

    reporter.success("Template files created with secure permissions (600)");

    reporter.blank();
    reporter.status("🚀", "Next Steps:");
    reporter.plain("1. Go to AWS Console > IAM > Users");
    reporter.plain("2. For each user, go to Security credentials > Access keys");
    reporter.plain("3. Create new access key if none exists or get secret for existing key");
    reporter.plain("4. Replace the placeholder values in the credential files");
    Ok(())
}

pub async fn run(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🔐", "Setting up credential extraction...");

    let aws = AwsClients::new(config).await;
    let terraform_creds = terraform_outputs(config, reporter).await;

    let Some((admin_user, developer_user)) = find_deployed_users(&aws, reporter).await? else {
        return Ok(1);
    };

    let admin_key = first_access_key(&aws, &admin_user).await;
    let developer_key = first_access_key(&aws, &developer_user).await;

    reporter.status("📝", "Creating credential template files...");

    let from_terraform = terraform_creds.as_ref().is_some_and(TerraformCreds::is_complete);
    if let Some(creds) = terraform_creds.filter(|c| c.is_complete()) {
        write_actual_files(config, reporter, &creds).await?;
    } else {
        write_template_files(
            config,
            reporter,
            &admin_user,
            &developer_user,
            admin_key.as_deref(),
            developer_key.as_deref(),
        )
        .await?;
    }

    reporter.blank();
    reporter.status("📁", "Credentials saved to:");
    reporter.plain("  - credentials/admin.env     (Administrator access)");
    reporter.plain("  - credentials/developer.env (Development access)");
    reporter.blank();
    reporter.status("🔒", "Security Notes:");
    reporter.plain("  - These files are in .gitignore to prevent accidental commits");
    reporter.plain("  - Copy credentials/developer.env to your next code repository");
    reporter.plain("  - Never commit these credentials to version control");
    reporter.plain("  - Consider rotating keys periodically");

    if !from_terraform {
        reporter.blank();
        reporter.status("🔒", "Security Reminders:");
        reporter.plain("- These files are already in .gitignore");
        reporter.plain("- Never commit credential files to version control");
        reporter.plain("- Use admin credentials only for infrastructure management");
        reporter.plain("- Use developer credentials for your application code");
        reporter.plain("- Consider rotating keys periodically");
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_name_matching() {
        assert!(is_admin_user("admin-user"));
        assert!(is_admin_user("admin-user-x7k2"));
        assert!(!is_admin_user("developer-user"));
        assert!(is_developer_user("developer-user"));
        assert!(is_developer_user("developer-user-a1b2"));
        assert!(!is_developer_user("pave-bootstrap-user"));
    }

    #[test]
    fn test_creds_from_complete_outputs() {
        let outputs = json!({
            "admin_user_access_key": {"value": "AKIAADMIN"},
            "admin_user_secret_key": {"value": "admin-secret"},
            "developer_user_access_key": {"value": "AKIADEV"},
            "developer_user_secret_key": {"value": "dev-secret"},
        });
        let creds = TerraformCreds::from_outputs(&outputs);
        assert!(creds.is_complete());
        assert_eq!(creds.admin_access_key.as_deref(), Some("AKIAADMIN"));
        assert_eq!(creds.developer_secret_key.as_deref(), Some("dev-secret"));
    }

    #[test]
    fn test_creds_from_partial_outputs() {
        let outputs = json!({
            "admin_user_access_key": {"value": "AKIAADMIN"},
            "unrelated_output": {"value": "x"},
        });
        let creds = TerraformCreds::from_outputs(&outputs);
        assert!(!creds.is_complete());
        assert!(creds.developer_access_key.is_none());
    }

    #[test]
    fn test_creds_ignore_non_string_values() {
        let outputs = json!({
            "admin_user_access_key": {"value": 42},
        });
        let creds = TerraformCreds::from_outputs(&outputs);
        assert!(creds.admin_access_key.is_none());
    }
}
