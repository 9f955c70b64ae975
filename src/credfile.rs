//! Credential file handling: the `.secrets` env file and the per-user
//! files under `credentials/`.
//!
//! Every file written here carries live or soon-to-be-live AWS keys, so
//! writes always finish with mode 600 and the credentials directory is
//! created with mode 700.

use crate::Result;
use chrono::Local;
use std::path::Path;
use tokio::fs;

/// Placeholder values used in template files when the secret half of a key
/// cannot be recovered from AWS.
pub const PLACEHOLDER_ACCESS_KEY: &str = "REPLACE_WITH_ACTUAL_ACCESS_KEY";
pub const PLACEHOLDER_SECRET_KEY: &str = "REPLACE_WITH_ACTUAL_SECRET_KEY";

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Restricts a file to owner read/write.
pub async fn secure_file(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).await?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms).await?;
    }
    Ok(())
}

/// Creates `dir` (mode 700) if missing.
pub async fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(dir).await?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(dir, perms).await?;
        }
    }
    Ok(())
}

/// Unix permission bits of `path` (lower 9 bits), or `None` off Unix.
pub fn mode_bits(path: &Path) -> Result<Option<u32>> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let meta = std::fs::metadata(path)?;
        Ok(Some(meta.permissions().mode() & 0o777))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(None)
    }
}

/// Writes the `.secrets` file consumed by the Makefile targets, backing up
/// any existing file to `.secrets.backup`. Returns whether a backup was
/// taken.
pub async fn write_secrets_file(
    path: &Path,
    access_key_id: &str,
    secret_access_key: &str,
    region: &str,
) -> Result<bool> {
    let content = format!(
        "AWS_ACCESS_KEY_ID={access_key_id}\n\
         AWS_SECRET_ACCESS_KEY={secret_access_key}\n\
         AWS_DEFAULT_REGION={region}\n\
         AWS_REGION={region}\n"
    );

    let backed_up = path.exists();
    if backed_up {
        let backup = path.with_extension("backup");
        fs::copy(path, &backup).await?;
    }

    fs::write(path, content).await?;
    secure_file(path).await?;
    Ok(backed_up)
}

/// `credentials/admin.env` content with real keys.
pub fn admin_env(access_key_id: &str, secret_access_key: &str, region: &str) -> String {
    format!(
        "# Admin user credentials - Full AWS access\n\
         # Created: {}\n\
         # Use these for administrative tasks only\n\
         AWS_ACCESS_KEY_ID={access_key_id}\n\
         AWS_SECRET_ACCESS_KEY={secret_access_key}\n\
         AWS_DEFAULT_REGION={region}\n",
        timestamp()
    )
}

/// `credentials/developer.env` content with real keys.
pub fn developer_env(access_key_id: &str, secret_access_key: &str, region: &str) -> String {
    format!(
        "# Developer user credentials - Limited AWS access for application development\n\
         # Created: {}\n\
         # Use these in your next code repository for application development\n\
         AWS_ACCESS_KEY_ID={access_key_id}\n\
         AWS_SECRET_ACCESS_KEY={secret_access_key}\n\
         AWS_DEFAULT_REGION={region}\n\
         \n\
         # Permissions include:\n\
         # - Amazon S3 Full Access (for file storage, static websites)\n\
         # - AWS Lambda Full Access (for serverless functions)\n\
         # - Amazon EC2 Read Only Access (for viewing instances)\n",
        timestamp()
    )
}

/// `credentials/admin.env` template for manual console entry. `key_id` is
/// an existing access key id when one is known.
pub fn admin_env_template(user: &str, key_id: Option<&str>, region: &str) -> String {
    let hint = match key_id {
        Some(id) => format!("Use existing access key: {id}"),
        None => "Create a new access key".to_string(),
    };
    format!(
        "# Admin user credentials - Full AWS access\n\
         # User: {user}\n\
         # Created: {}\n\
         #\n\
         # ⚠️  MANUAL ENTRY REQUIRED:\n\
         # Go to AWS Console > IAM > Users > {user} > Security credentials > Access keys\n\
         # {hint} and enter the values below:\n\
         #\n\
         AWS_ACCESS_KEY_ID={}\n\
         AWS_SECRET_ACCESS_KEY={PLACEHOLDER_SECRET_KEY}\n\
         AWS_DEFAULT_REGION={region}\n",
        timestamp(),
        key_id.unwrap_or(PLACEHOLDER_ACCESS_KEY),
    )
}

/// `credentials/developer.env` template for manual console entry.
pub fn developer_env_template(user: &str, key_id: Option<&str>, region: &str) -> String {
    let hint = match key_id {
        Some(id) => format!("Use existing access key: {id}"),
        None => "Create a new access key".to_string(),
    };
    format!(
        "# Developer user credentials - Limited AWS access for application development\n\
         # User: {user}\n\
         # Created: {}\n\
         #\n\
         # ⚠️  MANUAL ENTRY REQUIRED:\n\
         # Go to AWS Console > IAM > Users > {user} > Security credentials > Access keys\n\
         # {hint} and enter the values below:\n\
         #\n\
         # Permissions include:\n\
         # - Amazon S3 Full Access (for file storage, static websites)\n\
         # - AWS Lambda Full Access (for serverless functions)\n\
         # - Amazon EC2 Read Only Access (for viewing instances)\n\
         #\n\
         AWS_ACCESS_KEY_ID={}\n\
         AWS_SECRET_ACCESS_KEY={PLACEHOLDER_SECRET_KEY}\n\
         AWS_DEFAULT_REGION={region}\n",
        timestamp(),
        key_id.unwrap_or(PLACEHOLDER_ACCESS_KEY),
    )
}

/// Writes an env file under the credentials directory with mode 600.
pub async fn write_env_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent).await?;
    }
    fs::write(path, content).await?;
    secure_file(path).await
}

/// Swaps the credential lines of an existing env file, stamping the
/// `# Created:` header as a rotation. Unknown lines pass through untouched.
pub fn rotate_credential_lines(content: &str, access_key_id: &str, secret_access_key: &str) -> String {
    let rotated: Vec<String> = content
        .split('\n')
        .map(|line| {
            if line.starts_with("AWS_ACCESS_KEY_ID=") {
                format!("AWS_ACCESS_KEY_ID={access_key_id}")
            } else if line.starts_with("AWS_SECRET_ACCESS_KEY=") {
                format!("AWS_SECRET_ACCESS_KEY={secret_access_key}")
            } else if line.starts_with("# Created:") {
                format!(
                    "# Created: {} (ROTATED - Security Incident Response)",
                    timestamp()
                )
            } else {
                line.to_string()
            }
        })
        .collect();
    rotated.join("\n")
}

/// Rewrites an existing credential file in place with a rotated key pair.
///
/// Missing files are tolerated: rotation must not fail just because the
/// operator never generated local env files.
pub async fn rotate_credential_file(
    path: &Path,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<bool> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let rotated = rotate_credential_lines(&content, access_key_id, secret_access_key);
    fs::write(path, rotated).await?;
    secure_file(path).await?;
    Ok(true)
}

/// Removes a file, treating "already gone" as success.
pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Removes a directory tree, treating "already gone" as success.
pub async fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_secrets_file_written_with_mode_600() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".secrets");

        let backed_up = write_secrets_file(&path, "AKIAEXAMPLE", "secret", "us-east-1")
            .await
            .unwrap();
        assert!(!backed_up);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("AWS_ACCESS_KEY_ID=AKIAEXAMPLE"));
        assert!(content.contains("AWS_SECRET_ACCESS_KEY=secret"));
        assert!(content.contains("AWS_DEFAULT_REGION=us-east-1"));
        assert!(content.contains("AWS_REGION=us-east-1"));

        assert_eq!(mode_bits(&path).unwrap(), Some(0o600));
    }

    #[tokio::test]
    async fn test_secrets_file_backup_on_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".secrets");

        write_secrets_file(&path, "OLD", "old-secret", "us-east-1")
            .await
            .unwrap();
        let backed_up = write_secrets_file(&path, "NEW", "new-secret", "us-east-1")
            .await
            .unwrap();
        assert!(backed_up);

        let backup = std::fs::read_to_string(path.with_extension("backup")).unwrap();
        assert!(backup.contains("AWS_ACCESS_KEY_ID=OLD"));
        let current = std::fs::read_to_string(&path).unwrap();
        assert!(current.contains("AWS_ACCESS_KEY_ID=NEW"));
    }

    #[test]
    fn test_rotate_credential_lines() {
        let original = "# Developer user credentials\n\
                        # Created: 2024-01-01 00:00:00\n\
                        AWS_ACCESS_KEY_ID=AKIAOLD\n\
                        AWS_SECRET_ACCESS_KEY=oldsecret\n\
                        AWS_DEFAULT_REGION=us-east-1\n";

        let rotated = rotate_credential_lines(original, "AKIANEW", "newsecret");

        assert!(rotated.contains("AWS_ACCESS_KEY_ID=AKIANEW"));
        assert!(rotated.contains("AWS_SECRET_ACCESS_KEY=newsecret"));
        assert!(rotated.contains("(ROTATED - Security Incident Response)"));
        assert!(!rotated.contains("AKIAOLD"));
        assert!(rotated.contains("AWS_DEFAULT_REGION=us-east-1"));
    }

    #[tokio::test]
    async fn test_rotate_missing_file_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("developer.env");

        let updated = rotate_credential_file(&path, "AKIANEW", "newsecret")
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_env_file_templates() {
        let with_key = admin_env_template("admin-user", Some("AKIAEXISTING"), "us-east-1");
        assert!(with_key.contains("AWS_ACCESS_KEY_ID=AKIAEXISTING"));
        assert!(with_key.contains(PLACEHOLDER_SECRET_KEY));

        let without_key = developer_env_template("developer-user", None, "us-east-1");
        assert!(without_key.contains(PLACEHOLDER_ACCESS_KEY));
        assert!(without_key.contains("developer-user"));
    }

    #[tokio::test]
    async fn test_write_env_file_creates_private_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials").join("admin.env");

        write_env_file(&path, &admin_env("AKIA", "s", "us-east-1"))
            .await
            .unwrap();

        assert_eq!(mode_bits(&path).unwrap(), Some(0o600));
        assert_eq!(
            mode_bits(&dir.path().join("credentials")).unwrap(),
            Some(0o700)
        );
    }

    #[tokio::test]
    async fn test_remove_if_exists_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("terraform.tfstate");

        assert!(!remove_file_if_exists(&path).await.unwrap());
        std::fs::write(&path, "{}").unwrap();
        assert!(remove_file_if_exists(&path).await.unwrap());
        assert!(!remove_file_if_exists(&path).await.unwrap());
    }
}
