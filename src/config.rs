//! Project configuration: resource names, patterns, and AWS settings.

use std::path::PathBuf;

/// Default AWS region for the pave project.
pub const DEFAULT_REGION: &str = "us-east-1";

/// IAM user created by the bootstrap workflow.
pub const BOOTSTRAP_USER: &str = "bootstrap-user";

/// Resources that must never appear in a deletion candidate list, checked
/// before any pattern matching.
pub const PROTECTED_USER: &str = "pave-bootstrap-user";
pub const PROTECTED_ROLE: &str = "PaveBootstrapRole";
pub const PROTECTED_POLICY: &str = "PaveBootstrapPolicy";

/// Managed policy whose versions the fix-s3 workflow republishes.
pub const TERRAFORM_POLICY: &str = "BootstrapTerraformPolicy";

/// Configuration shared by all commands.
///
/// Resource names derive from a project prefix so every command agrees on
/// them; the defaults reproduce the pave project's conventions:
///
/// ```
/// use pavectl::Config;
///
/// let config = Config::new();
/// assert_eq!(config.state_bucket(), "pave-tf-state-bucket-us-east-1");
/// assert_eq!(config.bootstrap_secret(), "pave/bootstrap-credentials");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS region (default: us-east-1)
    pub region: String,

    /// Project prefix used to derive resource names (default: "pave")
    pub prefix: String,

    /// AWS account id override; discovered via STS when unset
    pub account_id: Option<String>,

    /// Custom endpoint URL (for LocalStack testing)
    pub endpoint: Option<String>,

    /// Project root for local file operations (default: current directory)
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            prefix: "pave".to_string(),
            account_id: None,
            endpoint: None,
            root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Creates a configuration with project defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Pins the AWS account id instead of discovering it via STS.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Sets a custom endpoint URL (for LocalStack testing).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the project root for local file operations.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Terraform state bucket name for this region.
    pub fn state_bucket(&self) -> String {
        format!("{}-tf-state-bucket-{}", self.prefix, self.region)
    }

    /// Object key under which Terraform stores its state in the bucket.
    pub fn state_key(&self) -> String {
        format!("{}/terraform.tfstate", self.prefix)
    }

    /// Secrets Manager entry holding the bootstrap access key.
    pub fn bootstrap_secret(&self) -> String {
        format!("{}/bootstrap-credentials", self.prefix)
    }

    /// Secrets Manager entry holding the root account credentials.
    pub fn root_secret(&self) -> String {
        format!("{}/root-credentials", self.prefix)
    }

    /// Local env file written by the bootstrap workflow.
    pub fn secrets_file(&self) -> PathBuf {
        self.root.join(".secrets")
    }

    /// Directory for per-user credential env files.
    pub fn credentials_dir(&self) -> PathBuf {
        self.root.join("credentials")
    }
}

/// Whether a user name is a cleanup deletion candidate.
///
/// The protected-name guard runs before pattern matching, so the bootstrap
/// user can never match even if a generic pattern would.
pub fn is_cleanup_user(name: &str) -> bool {
    if name == PROTECTED_USER {
        return false;
    }
    name == "admin-user"
        || name == "developer-user"
        || name.contains("admin-user-")
        || name.contains("developer-user-")
}

/// Whether a role name is a cleanup deletion candidate.
pub fn is_cleanup_role(name: &str) -> bool {
    if name == PROTECTED_ROLE {
        return false;
    }
    name == "CICDDeploymentRole"
        || name == "DeveloperRole"
        || name.contains("CICDDeploymentRole-")
        || name.contains("DeveloperRole-")
}

/// Whether a customer-managed policy name is a cleanup deletion candidate.
pub fn is_cleanup_policy(name: &str) -> bool {
    if name == PROTECTED_POLICY {
        return false;
    }
    name == "CICDS3SpecificAccess"
        || name == "PaveAdminPolicy"
        || name.contains("CICDS3SpecificAccess-")
}

/// Whether a bucket name is a cleanup deletion candidate.
pub fn is_cleanup_bucket(name: &str) -> bool {
    name == "pave-tf-state-bucket-us-east-1" || name.contains("pave-tf-state-bucket-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .with_region("us-west-2")
            .with_account_id("256140316797")
            .with_endpoint("http://localhost:4566");

        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.account_id.as_deref(), Some("256140316797"));
        assert_eq!(config.state_bucket(), "pave-tf-state-bucket-us-west-2");
    }

    #[test]
    fn test_default_names() {
        let config = Config::default();
        assert_eq!(config.state_bucket(), "pave-tf-state-bucket-us-east-1");
        assert_eq!(config.state_key(), "pave/terraform.tfstate");
        assert_eq!(config.bootstrap_secret(), "pave/bootstrap-credentials");
        assert_eq!(config.root_secret(), "pave/root-credentials");
    }

    #[test]
    fn test_cleanup_user_patterns() {
        assert!(is_cleanup_user("admin-user"));
        assert!(is_cleanup_user("developer-user"));
        assert!(is_cleanup_user("admin-user-a1b2"));
        assert!(is_cleanup_user("test-developer-user-x"));
        assert!(!is_cleanup_user("other-user"));
        assert!(!is_cleanup_user("bootstrap-user"));
    }

    #[test]
    fn test_protected_names_never_match() {
        assert!(!is_cleanup_user(PROTECTED_USER));
        assert!(!is_cleanup_role(PROTECTED_ROLE));
        assert!(!is_cleanup_policy(PROTECTED_POLICY));
    }

    #[test]
    fn test_cleanup_role_patterns() {
        assert!(is_cleanup_role("CICDDeploymentRole"));
        assert!(is_cleanup_role("DeveloperRole"));
        assert!(is_cleanup_role("DeveloperRole-staging"));
        assert!(!is_cleanup_role("SomeOtherRole"));
    }

    #[test]
    fn test_cleanup_policy_patterns() {
        assert!(is_cleanup_policy("CICDS3SpecificAccess"));
        assert!(is_cleanup_policy("PaveAdminPolicy"));
        assert!(is_cleanup_policy("CICDS3SpecificAccess-old"));
        assert!(!is_cleanup_policy("UnrelatedPolicy"));
    }

    #[test]
    fn test_cleanup_bucket_patterns() {
        assert!(is_cleanup_bucket("pave-tf-state-bucket-us-east-1"));
        assert!(is_cleanup_bucket("pave-tf-state-bucket-eu-west-1"));
        assert!(!is_cleanup_bucket("some-other-bucket"));
    }
}
