//! Access key rotation for security incident response.
//!
//! Creates a replacement key for the target user, rewrites the local
//! credential file, then deactivates the compromised key. Deactivation
//! instead of deletion keeps a rollback path until the new key is verified.

use crate::aws::AwsClients;
use crate::{credfile, Config, PaveError, Reporter, Result};

fn running_as_bootstrap(user: &str) -> bool {
    user.to_lowercase().contains("bootstrap")
}

pub async fn run(
    config: &Config,
    reporter: &Reporter,
    user: &str,
    compromised_key: &str,
    skip_confirm: bool,
) -> Result<i32> {
    reporter.status("🚨", "AWS ACCESS KEY ROTATION - Security Incident Response");
    reporter.status("🔍", &format!("Target user: {user}"));
    reporter.status("🚨", &format!("Compromised key: {compromised_key}"));

    let aws = AwsClients::new(config).await;
    let identity = match aws.caller_identity().await {
        Ok(id) => id,
        Err(PaveError::MissingCredentials) => {
            reporter.error("No AWS credentials found. Ensure bootstrap credentials are loaded.");
            return Ok(1);
        }
        Err(e) => {
            reporter.error(&format!("Failed to get caller identity: {e}"));
            return Ok(1);
        }
    };

    let Some(current_user) = identity.user_name() else {
        reporter.error(&format!(
            "Not running as IAM user. Current identity: {}",
            identity.arn
        ));
        return Ok(1);
    };

    if !running_as_bootstrap(current_user) {
        reporter.warning(&format!(
            "Warning: Not running as bootstrap user. Current user: {current_user}"
        ));
        if !skip_confirm && !reporter.confirm("Continue anyway? (y/N): ").await? {
            return Ok(1);
        }
    }

    if !skip_confirm {
        reporter.warning(&format!(
            "This will create a new access key for {user} and deactivate {compromised_key}"
        ));
        if !reporter.confirm("Continue? (y/N): ").await? {
            return Ok(1);
        }
    }

    reporter.status("🔍", &format!("Checking current access keys for {user}..."));
    let current_keys = match aws.list_access_keys(user).await {
        Ok(keys) => keys,
        Err(e) => {
            reporter.error(&format!("Failed to list access keys: {e}"));
            return Ok(1);
        }
    };

    reporter.status("📋", &format!("Current access keys for {user}:"));
    for key in &current_keys {
        let icon = if key.is_active() { "🟢" } else { "🔴" };
        reporter.plain(&format!(
            "  {icon} {} ({}) - Created: {}",
            key.id,
            key.status,
            key.created.as_deref().unwrap_or("unknown")
        ));
    }

    reporter.status("🔑", &format!("Creating new access key for user: {user}"));
    let pair = match aws.create_access_key(user).await {
        Ok(pair) => pair,
        Err(PaveError::LimitExceeded(_)) => {
            reporter.error(&format!(
                "User {user} already has the maximum number of access keys (2)"
            ));
            reporter.status("💡", "You may need to delete an existing key first");
            return Ok(1);
        }
        Err(e) => {
            reporter.error(&format!("Failed to create access key: {e}"));
            return Ok(1);
        }
    };
    reporter.success(&format!("New access key created: {}", pair.id));

    let cred_dir = config.credentials_dir();
    if cred_dir.is_dir() {
        let developer_env = cred_dir.join("developer.env");
        match credfile::rotate_credential_file(&developer_env, &pair.id, &pair.secret).await {
            Ok(true) => reporter.success(&format!(
                "Updated credential file: {}",
                developer_env.display()
            )),
            Ok(false) => reporter.warning(&format!(
                "Credential file not found: {}",
                developer_env.display()
            )),
            Err(e) => reporter.error(&format!(
                "Failed to update credential file {}: {e}",
                developer_env.display()
            )),
        }
    }

    reporter.status(
        "🔒",
        &format!("Deactivating compromised access key: {compromised_key}"),
    );
    match aws.set_access_key_active(user, compromised_key, false).await {
        Ok(()) => reporter.success(&format!(
            "Access key {compromised_key} has been deactivated"
        )),
        Err(e) => {
            reporter.error(&format!("Failed to deactivate access key: {e}"));
            return Ok(1);
        }
    }

    reporter.status("🎉", "Key rotation completed successfully!");
    reporter.status("📋", "Next steps:");
    reporter.plain("1. Test new credentials with: pavectl validate");
    reporter.plain("2. Verify infrastructure access works correctly");
    reporter.plain("3. Check CloudTrail for unauthorized activity");
    reporter.plain("4. Remove quarantine policy from developer user");
    reporter.plain(&format!(
        "5. After verification, delete the compromised key: {compromised_key}"
    ));
    reporter.plain("6. Create AWS support case to confirm security measures");

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_as_bootstrap() {
        assert!(running_as_bootstrap("bootstrap-user"));
        assert!(running_as_bootstrap("Bootstrap-User"));
        assert!(!running_as_bootstrap("developer-user"));
        assert!(!running_as_bootstrap("admin-user"));
    }
}
