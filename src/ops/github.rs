//! Prints the GitHub CLI commands for wiring repository secrets to the
//! deployed admin user. The secret access key is never retrievable after
//! creation, so the command block leaves a placeholder for it.

use crate::aws::AwsClients;
use crate::exec::capture_command;
use crate::{Config, Reporter, Result};

struct AdminCreds {
    username: String,
    access_key: String,
}

async fn check_gh_cli(config: &Config, reporter: &Reporter) -> bool {
    match capture_command(&config.root, "gh", &["--version"]).await {
        Ok(out) if out.success() => {
            reporter.success("GitHub CLI available");
            true
        }
        _ => {
            reporter.error("GitHub CLI not found");
            reporter.status("💡", "Install GitHub CLI: https://cli.github.com/");
            false
        }
    }
}

async fn admin_credentials(aws: &AwsClients, reporter: &Reporter) -> Option<AdminCreds> {
    let users = match aws.list_users().await {
        Ok(users) => users,
        Err(e) => {
            reporter.error(&format!("Error getting admin credentials: {e}"));
            return None;
        }
    };

    let Some(admin) = users.into_iter().find(|u| u.name == "admin-user") else {
        reporter.error("No admin user found");
        reporter.status("💡", "Deploy infrastructure first: terraform apply");
        return None;
    };

    let keys = match aws.list_access_keys(&admin.name).await {
        Ok(keys) => keys,
        Err(e) => {
            reporter.error(&format!("Error getting admin credentials: {e}"));
            return None;
        }
    };

    let Some(first) = keys.into_iter().next() else {
        reporter.error(&format!("No access keys found for {}", admin.name));
        reporter.status(
            "💡",
            "Create access key in AWS Console or run 'pavectl credentials'",
        );
        return None;
    };

    Some(AdminCreds {
        username: admin.name,
        access_key: first.id,
    })
}

pub async fn run(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🔧", "Setting up GitHub repository secrets...");
    reporter.blank();

    if !check_gh_cli(config, reporter).await {
        return Ok(1);
    }

    let aws = AwsClients::new(config).await;
    let Some(creds) = admin_credentials(&aws, reporter).await else {
        return Ok(1);
    };

    reporter.success(&format!("Found admin user: {}", creds.username));
    reporter.status("🔑", &format!("Access Key: {}", creds.access_key));
    reporter.blank();

    reporter.warning("Secret key cannot be retrieved programmatically.");
    reporter.status("📝", "You'll need to get the secret key manually:");
    reporter.plain(&format!(
        "1. Go to AWS Console > IAM > Users > {}",
        creds.username
    ));
    reporter.plain("2. Go to Security credentials > Access keys");
    reporter.plain(&format!("3. Find access key {}", creds.access_key));
    reporter.plain("4. If secret is not available, create a new access key");
    reporter.blank();

    reporter.status("🚀", "GitHub CLI commands to run:");
    reporter.blank();
    reporter.plain("# Set the three required secrets:");
    reporter.plain(&format!(
        "gh secret set AWS_ACCESS_KEY_ID --body '{}'",
        creds.access_key
    ));
    reporter.plain("gh secret set AWS_SECRET_ACCESS_KEY --body 'YOUR_SECRET_KEY_HERE'");
    reporter.plain(&format!(
        "gh secret set AWS_REGION --body '{}'",
        config.region
    ));
    reporter.blank();
    reporter.plain("# Verify secrets are set:");
    reporter.plain("gh secret list");
    reporter.blank();
    reporter.plain("# Trigger workflow:");
    reporter.plain("gh workflow run terraform.yaml");
    reporter.blank();

    reporter.status(
        "💡",
        "After setting secrets, the GitHub Actions workflow will work automatically!",
    );
    Ok(0)
}
