//! Bootstrap lifecycle: create, destroy, check, fix-s3, and root-help.
//!
//! The bootstrap user is the identity every other workflow runs as. Creating
//! it requires root or admin credentials; once the access key is stored in
//! `.secrets` the root credentials can be discarded. Every AWS-side create
//! step is idempotent: an existing resource is reused and reported, never
//! treated as a failure.

use crate::aws::iam::AccessKeyPair;
use crate::aws::secrets::SecretStoreOutcome;
use crate::aws::AwsClients;
use crate::config::{BOOTSTRAP_USER, PROTECTED_POLICY, PROTECTED_ROLE, TERRAFORM_POLICY};
use crate::credfile;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::{Config, PaveError, Reporter, Result};
use serde_json::json;

/// Tags carried by every bootstrap resource. The `ProtectedResource` tag is
/// what the bootstrap policy's IAM condition keys off.
const RESOURCE_TAGS: &[(&str, &str)] = &[
    ("ProtectedResource", "true"),
    ("Purpose", "PaveBootstrap"),
];

const SECRET_TAGS: &[(&str, &str)] = &[
    ("Project", "pave"),
    ("Purpose", "Bootstrap"),
    ("AccessLevel", "RootOnly"),
];

/// Permissions for the bootstrap user: full IAM except resources tagged
/// protected, self-read on its own user, an explicit Deny guarding the three
/// bootstrap resources, and the service surface Terraform manages.
fn bootstrap_policy_document() -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "FullIAMAccess",
                "Effect": "Allow",
                "Action": ["iam:*"],
                "Resource": "*",
                "Condition": {
                    "StringNotEquals": {"iam:ResourceTag/ProtectedResource": "true"}
                }
            },
            {
                "Sid": "SelfAccess",
                "Effect": "Allow",
                "Action": [
                    "iam:GetUser",
                    "iam:ListAccessKeys",
                    "iam:GetUserPolicy",
                    "iam:ListUserPolicies",
                    "iam:ListAttachedUserPolicies"
                ],
                "Resource": format!("arn:aws:iam::*:user/{BOOTSTRAP_USER}")
            },
            {
                "Sid": "ProtectBootstrapResources",
                "Effect": "Deny",
                "Action": [
                    "iam:DeleteUser",
                    "iam:DeleteRole",
                    "iam:DeletePolicy",
                    "iam:DetachUserPolicy",
                    "iam:DetachRolePolicy"
                ],
                "Resource": [
                    format!("arn:aws:iam::*:user/{BOOTSTRAP_USER}"),
                    format!("arn:aws:iam::*:role/{PROTECTED_ROLE}"),
                    format!("arn:aws:iam::*:policy/{PROTECTED_POLICY}")
                ]
            },
            {
                "Sid": "FullS3Access",
                "Effect": "Allow",
                "Action": ["s3:*"],
                "Resource": "*"
            },
            {
                "Sid": "FullLambdaAccess",
                "Effect": "Allow",
                "Action": ["lambda:*"],
                "Resource": "*"
            },
            {
                "Sid": "FullEC2Access",
                "Effect": "Allow",
                "Action": ["ec2:*"],
                "Resource": "*"
            },
            {
                "Sid": "CodeServices",
                "Effect": "Allow",
                "Action": ["codebuild:*", "codepipeline:*", "codedeploy:*"],
                "Resource": "*"
            },
            {
                "Sid": "SupportingServices",
                "Effect": "Allow",
                "Action": ["sts:*", "logs:*", "cloudwatch:*", "apigateway:*"],
                "Resource": "*"
            }
        ]
    })
}

/// Trust policy letting the bootstrap user assume the bootstrap role.
fn trust_policy_for(user_arn: &str) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": {"AWS": [user_arn]},
                "Action": "sts:AssumeRole"
            }
        ]
    })
}

/// Corrected Terraform policy: IAM management (including OIDC provider
/// ops), S3 scoped to the state bucket, the global bucket-listing calls the
/// validator probes, and the compute/code services.
fn terraform_policy_document(state_bucket: &str) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "IAMPermissions",
                "Effect": "Allow",
                "Action": [
                    "iam:CreateUser",
                    "iam:DeleteUser",
                    "iam:CreateRole",
                    "iam:DeleteRole",
                    "iam:AttachUserPolicy",
                    "iam:DetachUserPolicy",
                    "iam:AttachRolePolicy",
                    "iam:DetachRolePolicy",
                    "iam:CreatePolicy",
                    "iam:DeletePolicy",
                    "iam:CreateAccessKey",
                    "iam:DeleteAccessKey",
                    "iam:UpdateUser",
                    "iam:UpdateRole",
                    "iam:Get*",
                    "iam:List*",
                    "iam:CreateOpenIDConnectProvider",
                    "iam:DeleteOpenIDConnectProvider"
                ],
                "Resource": "*"
            },
            {
                "Sid": "S3StatePermissions",
                "Effect": "Allow",
                "Action": [
                    "s3:CreateBucket",
                    "s3:DeleteBucket",
                    "s3:PutObject",
                    "s3:GetObject",
                    "s3:ListBucket",
                    "s3:DeleteObject",
                    "s3:GetBucketVersioning",
                    "s3:PutBucketVersioning"
                ],
                "Resource": [
                    format!("arn:aws:s3:::{state_bucket}"),
                    format!("arn:aws:s3:::{state_bucket}/*")
                ]
            },
            {
                "Sid": "S3GlobalPermissions",
                "Effect": "Allow",
                "Action": ["s3:ListAllMyBuckets", "s3:GetBucketLocation"],
                "Resource": "*"
            },
            {
                "Sid": "ComputePermissions",
                "Effect": "Allow",
                "Action": [
                    "ec2:*",
                    "lambda:*",
                    "codebuild:*",
                    "codepipeline:*",
                    "codedeploy:*"
                ],
                "Resource": "*"
            }
        ]
    })
}

/// Resource policy that locks the credential secret to the account root:
/// one Allow for root, one Deny for every other principal.
fn root_only_resource_policy(account_id: &str) -> serde_json::Value {
    let root_arn = format!("arn:aws:iam::{account_id}:root");
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": {"AWS": root_arn},
                "Action": "secretsmanager:*",
                "Resource": "*"
            },
            {
                "Effect": "Deny",
                "Principal": "*",
                "Action": "secretsmanager:*",
                "Resource": "*",
                "Condition": {
                    "StringNotEquals": {"aws:PrincipalArn": root_arn}
                }
            }
        ]
    })
}

/// Creates the full bootstrap setup: user, policy, role, access key, state
/// bucket, Secrets Manager entry, and the local `.secrets` file.
pub async fn create(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🚀", "Creating Bootstrap User Setup for Pave Infrastructure");
    reporter.warning("This must be run with AWS root account or admin credentials");
    reporter.blank();

    let aws = AwsClients::new(config).await;
    let identity = match aws.caller_identity().await {
        Ok(id) => id,
        Err(PaveError::MissingCredentials) => {
            reporter.error("Cannot verify identity: AWS credentials not found");
            reporter.status("💡", "Export root or admin credentials before running this command");
            return Ok(1);
        }
        Err(e) => {
            reporter.error(&format!("Cannot verify identity: {e}"));
            return Ok(1);
        }
    };
    reporter.status("👤", &format!("Running as: {}", identity.arn));
    reporter.blank();

    // Reset step: a leftover pair of keys would hit the two-key limit later.
    reporter.status("0️⃣", "Checking for existing access keys...");
    reset_access_keys(&aws, reporter).await?;

    reporter.status("1️⃣", "Creating bootstrap user...");
    let user_arn = ensure_user(&aws, reporter).await?;

    reporter.status("2️⃣", "Creating bootstrap policy...");
    let policy_arn = ensure_policy(&aws, reporter, &identity.account).await?;

    reporter.status("3️⃣", "Creating bootstrap role...");
    ensure_role(&aws, reporter, &user_arn).await?;

    reporter.status("4️⃣", "Attaching policy to user...");
    aws.attach_user_policy(BOOTSTRAP_USER, &policy_arn).await?;
    reporter.success(&format!("Attached policy to {BOOTSTRAP_USER}"));

    reporter.status("5️⃣", "Creating access key...");
    let key = aws.create_access_key(BOOTSTRAP_USER).await?;
    reporter.success("Created access key for bootstrap user");
    reporter.status("🔑", &format!("Access Key ID: {}", key.id));
    reporter.status("🔒", &format!("Secret Access Key: {}", key.secret));
    reporter.warning("SAVE THESE CREDENTIALS SECURELY - They won't be shown again!");

    reporter.status("6️⃣", "Creating S3 backend bucket...");
    ensure_state_bucket(&aws, config, reporter).await?;

    reporter.status("7️⃣", "Storing credentials in AWS Secrets Manager...");
    store_bootstrap_secret(&aws, config, reporter, &identity.account, &key).await?;

    reporter.status("8️⃣", "Updating .secrets file...");
    let backed_up =
        credfile::write_secrets_file(&config.secrets_file(), &key.id, &key.secret, &config.region)
            .await?;
    if backed_up {
        reporter.status("💾", "Backed up existing .secrets to .secrets.backup");
    }
    reporter.success("Updated .secrets file with new bootstrap credentials");

    reporter.blank();
    reporter.status("🎉", "Bootstrap setup completed successfully!");
    reporter.blank();
    reporter.status("📋", "Next Steps:");
    reporter.status(
        "🔧",
        "1. Clear root credentials: unset AWS_ACCESS_KEY_ID AWS_SECRET_ACCESS_KEY",
    );
    reporter.status("🔧", "2. Run 'pavectl bootstrap check' to verify setup");
    reporter.status("🔧", "3. Run 'terraform init' to initialize the project");

    Ok(0)
}

async fn reset_access_keys(aws: &AwsClients, reporter: &Reporter) -> Result<()> {
    match aws.list_access_keys(BOOTSTRAP_USER).await {
        Ok(keys) if keys.is_empty() => {
            reporter.info(&format!("No existing access keys found for {BOOTSTRAP_USER}"));
        }
        Ok(keys) => {
            reporter.status(
                "🔍",
                &format!("Found {} existing access key(s) for {BOOTSTRAP_USER}", keys.len()),
            );
            for key in keys {
                aws.delete_access_key(BOOTSTRAP_USER, &key.id).await?;
                reporter.status("🗑️", &format!("Deleted existing access key: {}", key.id));
            }
        }
        Err(PaveError::NotFound(_)) => {
            reporter.info(&format!("User {BOOTSTRAP_USER} does not exist yet"));
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn ensure_user(aws: &AwsClients, reporter: &Reporter) -> Result<String> {
    match aws.create_user(BOOTSTRAP_USER, RESOURCE_TAGS).await {
        Ok(user) => {
            reporter.success(&format!("Created user: {BOOTSTRAP_USER}"));
            Ok(user.arn)
        }
        Err(PaveError::AlreadyExists(_)) => {
            let user = aws.get_user(BOOTSTRAP_USER).await?;
            reporter.info(&format!("User already exists: {BOOTSTRAP_USER}"));
            Ok(user.arn)
        }
        Err(e) => Err(e),
    }
}

async fn ensure_policy(
    aws: &AwsClients,
    reporter: &Reporter,
    account_id: &str,
) -> Result<String> {
    let document = serde_json::to_string(&bootstrap_policy_document())?;
    match aws
        .create_policy(
            PROTECTED_POLICY,
            &document,
            "Bootstrap policy for pave infrastructure management",
            RESOURCE_TAGS,
        )
        .await
    {
        Ok(arn) => {
            reporter.success(&format!("Created policy: {PROTECTED_POLICY}"));
            Ok(arn)
        }
        Err(PaveError::AlreadyExists(_)) => {
            // CreatePolicy has no get-by-name; rebuild the ARN instead.
            let arn = format!("arn:aws:iam::{account_id}:policy/{PROTECTED_POLICY}");
            reporter.info(&format!("Policy already exists: {PROTECTED_POLICY}"));
            Ok(arn)
        }
        Err(e) => Err(e),
    }
}

async fn ensure_role(aws: &AwsClients, reporter: &Reporter, user_arn: &str) -> Result<String> {
    let trust = serde_json::to_string(&trust_policy_for(user_arn))?;
    match aws
        .create_role(
            PROTECTED_ROLE,
            &trust,
            "Bootstrap role for pave infrastructure operations",
            RESOURCE_TAGS,
        )
        .await
    {
        Ok(role) => {
            reporter.success(&format!("Created role: {PROTECTED_ROLE}"));
            Ok(role.arn)
        }
        Err(PaveError::AlreadyExists(_)) => {
            let role = aws.get_role(PROTECTED_ROLE).await?;
            reporter.info(&format!("Role already exists: {PROTECTED_ROLE}"));
            Ok(role.arn)
        }
        Err(e) => Err(e),
    }
}

async fn ensure_state_bucket(
    aws: &AwsClients,
    config: &Config,
    reporter: &Reporter,
) -> Result<()> {
    let bucket = config.state_bucket();
    if aws.bucket_exists(&bucket).await? {
        reporter.info(&format!("S3 backend bucket already exists: {bucket}"));
        return Ok(());
    }

    aws.create_bucket(&bucket, &config.region).await?;
    reporter.success(&format!("Created S3 backend bucket: {bucket}"));

    aws.enable_bucket_versioning(&bucket).await?;
    reporter.success("Enabled versioning on S3 backend bucket");

    aws.enable_bucket_encryption(&bucket).await?;
    reporter.success("Enabled encryption on S3 backend bucket");

    aws.block_public_access(&bucket).await?;
    reporter.success("Configured public access block on S3 backend bucket");

    Ok(())
}

async fn store_bootstrap_secret(
    aws: &AwsClients,
    config: &Config,
    reporter: &Reporter,
    account_id: &str,
    key: &AccessKeyPair,
) -> Result<()> {
    let name = config.bootstrap_secret();
    let payload = json!({
        "AWS_ACCESS_KEY_ID": key.id,
        "AWS_SECRET_ACCESS_KEY": key.secret,
        "AWS_DEFAULT_REGION": config.region,
        "AWS_REGION": config.region,
        "created_by": "pavectl-bootstrap",
        "description": "Bootstrap user credentials for pave infrastructure",
    });
    let resource_policy = root_only_resource_policy(account_id);

    let outcome = aws
        .store_secret_json(
            &name,
            "Bootstrap user credentials for pave infrastructure (root access only)",
            &payload,
            &resource_policy,
            SECRET_TAGS,
        )
        .await?;

    match outcome {
        SecretStoreOutcome::Updated => {
            reporter.success(&format!("Updated bootstrap credentials in Secrets Manager: {name}"));
        }
        SecretStoreOutcome::Created => {
            reporter.success(&format!("Created bootstrap credentials in Secrets Manager: {name}"));
        }
        SecretStoreOutcome::Restored => {
            reporter.success(&format!("Restored secret from pending deletion: {name}"));
            reporter.success(&format!(
                "Updated restored bootstrap credentials in Secrets Manager: {name}"
            ));
        }
    }
    Ok(())
}

/// Destroys every bootstrap resource. Each step tolerates "not found" and
/// reports individual failures without stopping the teardown.
pub async fn destroy(config: &Config, reporter: &Reporter, skip_confirm: bool) -> Result<i32> {
    reporter.status("💥", "DESTROYING Bootstrap User Setup");
    reporter.warning("This will completely remove all bootstrap resources!");
    reporter.warning("Make sure you're running with root/admin credentials");
    reporter.blank();

    if !skip_confirm {
        let confirmed = reporter
            .confirm_destruction(
                "Are you sure you want to destroy the bootstrap setup? (type 'yes'): ",
            )
            .await?;
        if !confirmed {
            reporter.error("Destruction cancelled");
            return Ok(0);
        }
    }

    let aws = AwsClients::new(config).await;
    let identity = match aws.caller_identity().await {
        Ok(id) => id,
        Err(e) => {
            reporter.error(&format!("Cannot verify identity: {e}"));
            return Ok(1);
        }
    };
    reporter.status("👤", &format!("Running as: {}", identity.arn));
    reporter.blank();

    reporter.status("1️⃣", "Deleting credentials from AWS Secrets Manager...");
    delete_bootstrap_secret(&aws, config, reporter).await;

    reporter.status("2️⃣", "Deleting bootstrap user...");
    delete_bootstrap_user(&aws, reporter).await;

    reporter.status("3️⃣", "Deleting bootstrap role...");
    delete_bootstrap_role(&aws, reporter).await;

    reporter.status("4️⃣", "Deleting bootstrap policies...");
    delete_bootstrap_policies(&aws, reporter, &identity.account).await;

    reporter.blank();
    reporter.status("💥", "Bootstrap setup destroyed successfully!");
    reporter.blank();
    reporter.status("📋", "Next Steps:");
    reporter.status(
        "🔧",
        "1. Run 'pavectl bootstrap create' to recreate with proper permissions",
    );
    reporter.status("🔧", "2. Update .secrets file with new credentials");
    reporter.status("🔧", "3. Run 'pavectl bootstrap check' to verify");

    Ok(0)
}

async fn delete_bootstrap_secret(aws: &AwsClients, config: &Config, reporter: &Reporter) {
    let name = config.bootstrap_secret();
    match aws.delete_secret_force(&name).await {
        Ok(true) => {
            reporter.success(&format!("Deleted bootstrap credentials from Secrets Manager: {name}"));
        }
        Ok(false) => {
            reporter.info(&format!("No bootstrap credentials found in Secrets Manager: {name}"));
        }
        Err(e) => {
            reporter.error(&format!("Error deleting secret from Secrets Manager: {e}"));
        }
    }
}

async fn delete_bootstrap_user(aws: &AwsClients, reporter: &Reporter) {
    reporter.status("🔗", &format!("Cleaning up {BOOTSTRAP_USER}..."));
    match remove_user(aws, reporter, BOOTSTRAP_USER).await {
        Ok(()) => {}
        Err(PaveError::NotFound(_)) => {
            reporter.info(&format!("User {BOOTSTRAP_USER} does not exist"));
        }
        Err(e) => reporter.error(&format!("Error deleting user: {e}")),
    }
}

async fn remove_user(aws: &AwsClients, reporter: &Reporter, user: &str) -> Result<()> {
    for key in aws.list_access_keys(user).await? {
        aws.delete_access_key(user, &key.id).await?;
        reporter.status("🗑️", &format!("Deleted access key: {}", key.id));
    }
    for policy in aws.list_attached_user_policies(user).await? {
        aws.detach_user_policy(user, &policy.arn).await?;
        reporter.status("🔗", &format!("Detached policy: {}", policy.name));
    }
    for name in aws.list_user_policies(user).await? {
        aws.delete_user_policy(user, &name).await?;
        reporter.status("🗑️", &format!("Deleted inline policy: {name}"));
    }
    aws.delete_user(user).await?;
    reporter.success(&format!("Deleted user: {user}"));
    Ok(())
}

async fn delete_bootstrap_role(aws: &AwsClients, reporter: &Reporter) {
    match remove_role(aws, reporter, PROTECTED_ROLE).await {
        Ok(()) => {}
        Err(PaveError::NotFound(_)) => {
            reporter.info(&format!("Role {PROTECTED_ROLE} does not exist"));
        }
        Err(e) => reporter.error(&format!("Error deleting role: {e}")),
    }
}

async fn remove_role(aws: &AwsClients, reporter: &Reporter, role: &str) -> Result<()> {
    for policy in aws.list_attached_role_policies(role).await? {
        aws.detach_role_policy(role, &policy.arn).await?;
        reporter.status("🔗", &format!("Detached policy from role: {}", policy.name));
    }
    for name in aws.list_role_policies(role).await? {
        aws.delete_role_policy(role, &name).await?;
        reporter.status("🗑️", &format!("Deleted inline role policy: {name}"));
    }
    aws.delete_role(role).await?;
    reporter.success(&format!("Deleted role: {role}"));
    Ok(())
}

async fn delete_bootstrap_policies(aws: &AwsClients, reporter: &Reporter, account_id: &str) {
    for policy_name in [PROTECTED_POLICY, TERRAFORM_POLICY] {
        let arn = format!("arn:aws:iam::{account_id}:policy/{policy_name}");
        match remove_policy(aws, reporter, policy_name, &arn).await {
            Ok(()) => {}
            Err(PaveError::NotFound(_)) => {
                reporter.info(&format!("Policy {policy_name} does not exist"));
            }
            Err(e) => reporter.error(&format!("Error deleting policy {policy_name}: {e}")),
        }
    }
}

async fn remove_policy(
    aws: &AwsClients,
    reporter: &Reporter,
    name: &str,
    arn: &str,
) -> Result<()> {
    reporter.status("🔗", &format!("Detaching policy {name} from all entities..."));
    match aws.list_entities_for_policy(arn).await {
        Ok(entities) => {
            for user in &entities.users {
                aws.detach_user_policy(user, arn).await?;
                reporter.status("🔗", &format!("Detached policy from user: {user}"));
            }
            for role in &entities.roles {
                aws.detach_role_policy(role, arn).await?;
                reporter.status("🔗", &format!("Detached policy from role: {role}"));
            }
            for group in &entities.groups {
                aws.detach_group_policy(group, arn).await?;
                reporter.status("🔗", &format!("Detached policy from group: {group}"));
            }
        }
        Err(PaveError::NotFound(_)) => return Err(PaveError::NotFound(name.to_string())),
        Err(e) => reporter.warning(&format!("Warning detaching policy {name}: {e}")),
    }

    for version in aws.list_policy_versions(arn).await? {
        if !version.is_default {
            aws.delete_policy_version(arn, &version.id).await?;
            reporter.status("🗑️", &format!("Deleted policy version: {}", version.id));
        }
    }

    aws.delete_policy(arn).await?;
    reporter.success(&format!("Deleted policy: {name}"));
    Ok(())
}

/// Read-only validation that the bootstrap credentials work. Probes are
/// wrapped in bounded backoff because a freshly created key can be rejected
/// until it propagates.
pub async fn check(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🔍", "Validating bootstrap user setup...");
    reporter.blank();

    let aws = AwsClients::new(config).await;
    let retry = RetryPolicy::default();
    let mut passed = true;

    reporter.plain("Checking current user is bootstrap user...");
    let identity =
        match retry_with_backoff(retry, PaveError::is_transient_auth, || aws.caller_identity())
            .await
        {
            Ok(id) => id,
            Err(PaveError::MissingCredentials) => {
                reporter.error("Error connecting to AWS sts: credentials not found");
                reporter.status("💡", "Ensure bootstrap user AWS credentials are configured");
                return Ok(1);
            }
            Err(e) => {
                reporter.error(&format!("Error checking current user identity: {e}"));
                return Ok(1);
            }
        };

    if identity.arn.contains(BOOTSTRAP_USER) {
        reporter.success(&format!("Running as bootstrap user: {}", identity.arn));
    } else {
        reporter.error(&format!("Not running as bootstrap user: {}", identity.arn));
        reporter.status(
            "💡",
            "Configure bootstrap user credentials in .secrets or environment",
        );
        passed = false;
    }
    reporter.blank();

    reporter.plain("Checking bootstrap user exists...");
    match retry_with_backoff(retry, PaveError::is_transient_auth, || {
        aws.get_user(BOOTSTRAP_USER)
    })
    .await
    {
        Ok(user) => reporter.success(&format!("Bootstrap user found: {}", user.arn)),
        Err(PaveError::NotFound(_)) => {
            reporter.error(&format!("Bootstrap user '{BOOTSTRAP_USER}' not found"));
            reporter.status("💡", "Root account must create bootstrap user first");
            reporter.status("📚", "See README.md for bootstrap setup instructions");
            passed = false;
        }
        Err(PaveError::AccessDenied(msg)) if msg.contains("iam:GetUser") => {
            // STS already proved the identity exists; a self-read denial is
            // a policy gap, not a broken bootstrap.
            reporter.warning(
                "Bootstrap user exists but lacks iam:GetUser self-permission (non-critical)",
            );
            reporter.info("User identity already confirmed via STS call");
        }
        Err(e) => {
            reporter.error(&format!("Error checking bootstrap user: {e}"));
            passed = false;
        }
    }
    reporter.blank();

    reporter.plain("Checking bootstrap role exists...");
    match retry_with_backoff(retry, PaveError::is_transient_auth, || {
        aws.get_role(PROTECTED_ROLE)
    })
    .await
    {
        Ok(role) => reporter.success(&format!("Bootstrap role found: {}", role.arn)),
        Err(PaveError::NotFound(_)) => {
            reporter.error(&format!("Bootstrap role '{PROTECTED_ROLE}' not found"));
            reporter.status("💡", "Root account must create bootstrap role first");
            reporter.status("📚", "See README.md for bootstrap setup instructions");
            passed = false;
        }
        Err(e) => {
            reporter.error(&format!("Error checking bootstrap role: {e}"));
            passed = false;
        }
    }
    reporter.blank();

    reporter.plain("Checking bootstrap permissions...");
    let probes: [(&str, _); 3] = [
        ("List IAM users", ProbeKind::ListUsers),
        ("List IAM roles", ProbeKind::ListRoles),
        ("List S3 buckets", ProbeKind::ListBuckets),
    ];
    for (label, probe) in probes {
        let outcome = retry_with_backoff(retry, PaveError::is_transient_auth, || {
            run_probe(&aws, probe)
        })
        .await;
        match outcome {
            Ok(()) => reporter.success(&format!("Permission check passed: {label}")),
            Err(e) => {
                reporter.error(&format!("Permission check failed: {label} - {e}"));
                passed = false;
            }
        }
    }
    reporter.blank();

    if passed {
        reporter.success("All bootstrap validations passed!");
        reporter.status("🚀", "Ready for infrastructure operations");
        Ok(0)
    } else {
        reporter.error("Bootstrap validation failed");
        reporter.status("📚", "Please complete bootstrap setup per README.md");
        reporter.status(
            "🔒",
            "Infrastructure operations are blocked until bootstrap is configured",
        );
        Ok(1)
    }
}

#[derive(Debug, Clone, Copy)]
enum ProbeKind {
    ListUsers,
    ListRoles,
    ListBuckets,
}

async fn run_probe(aws: &AwsClients, probe: ProbeKind) -> Result<()> {
    match probe {
        ProbeKind::ListUsers => aws.probe_list_users().await,
        ProbeKind::ListRoles => aws.probe_list_roles().await,
        ProbeKind::ListBuckets => aws.list_buckets().await.map(|_| ()),
    }
}

/// Publishes a corrected default version of the Terraform policy so the
/// bootstrap user can reach the S3 state bucket, then probes ListBuckets.
pub async fn fix_s3(config: &Config, reporter: &Reporter) -> Result<i32> {
    reporter.status("🚀", "Fixing Bootstrap User S3 Permissions");
    reporter.blank();

    let aws = AwsClients::new(config).await;
    let identity = match aws.caller_identity().await {
        Ok(id) => id,
        Err(e) => {
            reporter.error(&format!("Cannot verify identity: {e}"));
            return Ok(1);
        }
    };
    reporter.status("👤", &format!("Running as: {}", identity.arn));
    if !identity.arn.contains(BOOTSTRAP_USER) {
        reporter.warning("Not running as bootstrap-user, but continuing...");
    }
    reporter.blank();

    reporter.status("🔧", "Fixing bootstrap user S3 permissions...");
    match publish_fixed_policy(&aws, config, reporter, &identity.account).await {
        Ok(()) => {
            reporter.blank();
            reporter.status("🎉", "Bootstrap user S3 permissions fixed successfully!");
            reporter.status("🔍", "Run 'pavectl bootstrap check' to verify the fix");
            Ok(0)
        }
        Err(e) => {
            reporter.error(&format!("Error fixing policy: {e}"));
            reporter.blank();
            reporter.error("Failed to fix bootstrap user permissions");
            Ok(1)
        }
    }
}

async fn publish_fixed_policy(
    aws: &AwsClients,
    config: &Config,
    reporter: &Reporter,
    account_id: &str,
) -> Result<()> {
    let arn = format!("arn:aws:iam::{account_id}:policy/{TERRAFORM_POLICY}");
    let document = serde_json::to_string(&terraform_policy_document(&config.state_bucket()))?;

    let version = aws.create_policy_version(&arn, &document).await?;
    reporter.success(&format!("Updated policy version: {version}"));

    reporter.status("🔍", "Testing S3 permissions...");
    let buckets = aws.list_buckets().await?;
    reporter.success(&format!("S3 permission test passed! Found {} buckets", buckets.len()));
    Ok(())
}

/// Prints the walkthrough for obtaining temporary root access keys and
/// resetting the bootstrap with them.
pub async fn root_help(reporter: &Reporter) -> Result<i32> {
    reporter.status("🔑", "AWS Root Account Credentials Setup Guide");
    reporter.plain(&"=".repeat(50));
    reporter.blank();

    reporter.plain("You need AWS root account credentials to fix the bootstrap user setup.");
    reporter.plain("This is a one-time process. Here's how to get them:");
    reporter.blank();

    reporter.plain("1️⃣  LOG INTO AWS CONSOLE AS ROOT USER");
    reporter.plain("   • Go to: https://console.aws.amazon.com/");
    reporter.plain("   • Use your AWS account EMAIL (not IAM username)");
    reporter.plain("   • Use your AWS account PASSWORD");
    reporter.blank();

    reporter.plain("2️⃣  NAVIGATE TO SECURITY CREDENTIALS");
    reporter.plain("   • Click your account name (top right corner)");
    reporter.plain("   • Select 'Security credentials' from the dropdown menu");
    reporter.blank();

    reporter.plain("3️⃣  CREATE ACCESS KEYS");
    reporter.plain("   • Scroll down to the 'Access keys' section");
    reporter.plain("   • Click 'Create access key' button");
    reporter.plain("   • Select 'Command Line Interface (CLI)' as the use case");
    reporter.plain("   • Check the confirmation checkbox");
    reporter.plain("   • Click 'Create access key'");
    reporter.blank();

    reporter.plain("4️⃣  COPY YOUR ACCESS KEYS");
    reporter.plain("   ⚠️  IMPORTANT: These keys are only shown ONCE!");
    reporter.plain("   • Copy the 'Access key ID'");
    reporter.plain("   • Copy the 'Secret access key'");
    reporter.plain("   • Or download the .csv file");
    reporter.blank();

    reporter.plain("5️⃣  SET ENVIRONMENT VARIABLES");
    reporter.plain("   Now paste your keys into these commands:");
    reporter.blank();
    reporter.plain("   export AWS_ACCESS_KEY_ID=\"YOUR_ACCESS_KEY_ID_HERE\"");
    reporter.plain("   export AWS_SECRET_ACCESS_KEY=\"YOUR_SECRET_ACCESS_KEY_HERE\"");
    reporter.plain("   export AWS_DEFAULT_REGION=\"us-east-1\"");
    reporter.blank();
    reporter.plain("   Then verify you're running as root:");
    reporter.plain("   aws sts get-caller-identity");
    reporter.plain("   # Should show: \"arn:aws:iam::ACCOUNT_ID:root\"");
    reporter.blank();

    reporter.plain("6️⃣  RUN THE BOOTSTRAP RESET");
    reporter.plain("   Once you have root credentials set up:");
    reporter.plain("   pavectl bootstrap destroy   # Remove broken setup");
    reporter.plain("   pavectl bootstrap create    # Create proper setup");
    reporter.blank();
    reporter.plain("   Then update your .secrets file with the NEW bootstrap credentials");
    reporter.plain("   and unset the root environment variables:");
    reporter.plain("   unset AWS_ACCESS_KEY_ID AWS_SECRET_ACCESS_KEY");
    reporter.blank();

    reporter.plain("🔒 SECURITY NOTE:");
    reporter.plain("   After completing the bootstrap setup, DELETE the root access keys");
    reporter.plain("   from the AWS Console. You only need them for this one-time fix.");
    reporter.blank();

    reporter.plain("✅ You're ready to fix your bootstrap setup!");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_policy_denies_protected_resources() {
        let doc = bootstrap_policy_document();
        let statements = doc["Statement"].as_array().unwrap();

        let deny = statements
            .iter()
            .find(|s| s["Sid"] == "ProtectBootstrapResources")
            .unwrap();
        assert_eq!(deny["Effect"], "Deny");

        let resources: Vec<&str> = deny["Resource"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_str().unwrap())
            .collect();
        assert!(resources.contains(&"arn:aws:iam::*:user/bootstrap-user"));
        assert!(resources.contains(&"arn:aws:iam::*:role/PaveBootstrapRole"));
        assert!(resources.contains(&"arn:aws:iam::*:policy/PaveBootstrapPolicy"));
    }

    #[test]
    fn test_bootstrap_policy_iam_condition() {
        let doc = bootstrap_policy_document();
        let full_iam = doc["Statement"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["Sid"] == "FullIAMAccess")
            .cloned()
            .unwrap();
        assert_eq!(
            full_iam["Condition"]["StringNotEquals"]["iam:ResourceTag/ProtectedResource"],
            "true"
        );
    }

    #[test]
    fn test_trust_policy_embeds_user_arn() {
        let arn = "arn:aws:iam::256140316797:user/bootstrap-user";
        let doc = trust_policy_for(arn);
        let principal = &doc["Statement"][0]["Principal"]["AWS"];
        assert_eq!(principal[0], arn);
        assert_eq!(doc["Statement"][0]["Action"], "sts:AssumeRole");
    }

    #[test]
    fn test_terraform_policy_scopes_state_bucket() {
        let doc = terraform_policy_document("pave-tf-state-bucket-us-east-1");
        let s3_state = doc["Statement"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["Sid"] == "S3StatePermissions")
            .cloned()
            .unwrap();
        let resources = s3_state["Resource"].as_array().unwrap();
        assert_eq!(resources[0], "arn:aws:s3:::pave-tf-state-bucket-us-east-1");
        assert_eq!(resources[1], "arn:aws:s3:::pave-tf-state-bucket-us-east-1/*");
    }

    #[test]
    fn test_root_only_policy_denies_everyone_else() {
        let doc = root_only_resource_policy("256140316797");
        let statements = doc["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 2);

        assert_eq!(statements[0]["Effect"], "Allow");
        assert_eq!(
            statements[0]["Principal"]["AWS"],
            "arn:aws:iam::256140316797:root"
        );

        assert_eq!(statements[1]["Effect"], "Deny");
        assert_eq!(statements[1]["Principal"], "*");
        assert_eq!(
            statements[1]["Condition"]["StringNotEquals"]["aws:PrincipalArn"],
            "arn:aws:iam::256140316797:root"
        );
    }
}
