//! AWS integration tests using LocalStack.
//!
//! These tests require LocalStack to be running on localhost:4566.
//!
//! Run with:
//!   docker run -d -p 4566:4566 localstack/localstack
//!   cargo test --test integration_aws -- --ignored --test-threads=1
//!
//! Resource names are fixed project names (bootstrap-user, the state
//! bucket, the bootstrap secret), so the tests must not run in parallel.

use pavectl::aws::secrets::SecretStoreOutcome;
use pavectl::aws::AwsClients;
use pavectl::config::{BOOTSTRAP_USER, PROTECTED_ROLE, PROTECTED_USER};
use pavectl::{ops, Config, Reporter};
use serde_json::json;

fn localstack_config(root: &std::path::Path) -> Config {
    let endpoint = std::env::var("LOCALSTACK_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4566".to_string());

    std::env::set_var("AWS_ACCESS_KEY_ID", "test");
    std::env::set_var("AWS_SECRET_ACCESS_KEY", "test");
    std::env::set_var("AWS_REGION", "us-east-1");

    Config::new()
        .with_region("us-east-1")
        .with_endpoint(endpoint)
        .with_root(root)
}

fn quiet_reporter() -> Reporter {
    Reporter::new(false)
}

#[tokio::test]
#[ignore] // Run only when LocalStack is available
async fn test_bootstrap_create_is_idempotent() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let config = localstack_config(root.path());
    let reporter = quiet_reporter();

    // Two runs must both succeed and converge on the same end state.
    let first = ops::bootstrap::create(&config, &reporter)
        .await
        .expect("First bootstrap create failed");
    assert_eq!(first, 0);

    let second = ops::bootstrap::create(&config, &reporter)
        .await
        .expect("Second bootstrap create failed");
    assert_eq!(second, 0);

    let aws = AwsClients::new(&config).await;

    assert!(aws
        .user_exists(BOOTSTRAP_USER)
        .await
        .expect("Failed to check user"));

    // The reset step deletes leftover keys, so exactly one remains.
    let keys = aws
        .list_access_keys(BOOTSTRAP_USER)
        .await
        .expect("Failed to list access keys");
    assert_eq!(keys.len(), 1);
    assert!(keys[0].is_active());

    assert!(aws
        .role_exists(PROTECTED_ROLE)
        .await
        .expect("Failed to check role"));

    assert!(aws
        .bucket_exists(&config.state_bucket())
        .await
        .expect("Failed to check bucket"));

    let secrets = aws
        .list_secret_names()
        .await
        .expect("Failed to list secrets");
    assert!(secrets.contains(&config.bootstrap_secret()));

    // The .secrets file lands under the configured root.
    assert!(config.secrets_file().exists());

    let code = ops::bootstrap::destroy(&config, &reporter, true)
        .await
        .expect("Teardown failed");
    assert_eq!(code, 0);
}

#[tokio::test]
#[ignore]
async fn test_bootstrap_destroy_removes_iam_resources() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let config = localstack_config(root.path());
    let reporter = quiet_reporter();

    let created = ops::bootstrap::create(&config, &reporter)
        .await
        .expect("Bootstrap create failed");
    assert_eq!(created, 0);

    let destroyed = ops::bootstrap::destroy(&config, &reporter, true)
        .await
        .expect("Bootstrap destroy failed");
    assert_eq!(destroyed, 0);

    let aws = AwsClients::new(&config).await;
    assert!(!aws
        .user_exists(BOOTSTRAP_USER)
        .await
        .expect("Failed to check user"));
    assert!(!aws
        .role_exists(PROTECTED_ROLE)
        .await
        .expect("Failed to check role"));
    let secrets = aws
        .list_secret_names()
        .await
        .expect("Failed to list secrets");
    assert!(!secrets.contains(&config.bootstrap_secret()));

    // The state bucket is cleanup's job, not destroy's.
    assert!(aws
        .bucket_exists(&config.state_bucket())
        .await
        .expect("Failed to check bucket"));

    // A second destroy finds nothing and still succeeds.
    let again = ops::bootstrap::destroy(&config, &reporter, true)
        .await
        .expect("Repeated destroy failed");
    assert_eq!(again, 0);

    // Sweep the bucket so later tests start clean.
    let swept = ops::cleanup::run(&config, &reporter, true)
        .await
        .expect("Cleanup failed");
    assert_eq!(swept, 0);
}

#[tokio::test]
#[ignore]
async fn test_cleanup_spares_protected_resources() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let config = localstack_config(root.path());
    let reporter = quiet_reporter();
    let aws = AwsClients::new(&config).await;

    // One deletion candidate and the protected bootstrap user.
    aws.create_user("developer-user", &[])
        .await
        .expect("Failed to create developer-user");
    aws.create_user(PROTECTED_USER, &[])
        .await
        .expect("Failed to create protected user");

    let code = ops::cleanup::run(&config, &reporter, true)
        .await
        .expect("Cleanup failed");
    assert_eq!(code, 0);

    assert!(!aws
        .user_exists("developer-user")
        .await
        .expect("Failed to check developer-user"));
    assert!(aws
        .user_exists(PROTECTED_USER)
        .await
        .expect("Failed to check protected user"));

    aws.delete_user(PROTECTED_USER).await.ok();
}

#[tokio::test]
#[ignore]
async fn test_cleanup_deletes_candidate_roles_and_policies() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let config = localstack_config(root.path());
    let reporter = quiet_reporter();
    let aws = AwsClients::new(&config).await;

    let trust = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": "ec2.amazonaws.com"},
            "Action": "sts:AssumeRole"
        }]
    })
    .to_string();

    aws.create_role("DeveloperRole", &trust, "integration test role", &[])
        .await
        .expect("Failed to create DeveloperRole");

    let policy_doc = json!({
        "Version": "2012-10-17",
        "Statement": [{"Effect": "Allow", "Action": "s3:ListBucket", "Resource": "*"}]
    })
    .to_string();
    let policy_arn = aws
        .create_policy("CICDS3SpecificAccess", &policy_doc, "integration test policy", &[])
        .await
        .expect("Failed to create policy");
    aws.attach_role_policy("DeveloperRole", &policy_arn)
        .await
        .expect("Failed to attach policy");

    let code = ops::cleanup::run(&config, &reporter, true)
        .await
        .expect("Cleanup failed");
    assert_eq!(code, 0);

    assert!(!aws
        .role_exists("DeveloperRole")
        .await
        .expect("Failed to check role"));
    let remaining = aws
        .list_local_policies()
        .await
        .expect("Failed to list policies");
    assert!(!remaining.iter().any(|p| p.name == "CICDS3SpecificAccess"));
}

#[tokio::test]
#[ignore]
async fn test_secret_store_update_and_delete() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let config = localstack_config(root.path());
    let aws = AwsClients::new(&config).await;

    let name = "pave/integration-test-secret";
    let payload = json!({"AWS_ACCESS_KEY_ID": "AKIAINTEGRATIONTEST1"});
    let policy = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"AWS": "arn:aws:iam::000000000000:root"},
            "Action": "secretsmanager:GetSecretValue",
            "Resource": "*"
        }]
    });

    let first = aws
        .store_secret_json(name, "integration test secret", &payload, &policy, &[])
        .await
        .expect("Failed to store secret");
    assert!(matches!(first, SecretStoreOutcome::Created));

    let second = aws
        .store_secret_json(name, "integration test secret", &payload, &policy, &[])
        .await
        .expect("Failed to update secret");
    assert!(matches!(second, SecretStoreOutcome::Updated));

    let deleted = aws
        .delete_secret_force(name)
        .await
        .expect("Failed to delete secret");
    assert!(deleted);

    let already_gone = aws
        .delete_secret_force(name)
        .await
        .expect("Failed to delete missing secret");
    assert!(!already_gone);
}

#[tokio::test]
#[ignore]
async fn test_access_key_deactivation() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let config = localstack_config(root.path());
    let aws = AwsClients::new(&config).await;

    let user = "pavectl-test-key-user";
    aws.create_user(user, &[]).await.expect("Failed to create user");

    let key = aws
        .create_access_key(user)
        .await
        .expect("Failed to create access key");

    let keys = aws
        .list_access_keys(user)
        .await
        .expect("Failed to list keys");
    assert_eq!(keys.len(), 1);
    assert!(keys[0].is_active());

    aws.set_access_key_active(user, &key.id, false)
        .await
        .expect("Failed to deactivate key");

    let keys = aws
        .list_access_keys(user)
        .await
        .expect("Failed to list keys");
    assert!(!keys[0].is_active());

    aws.delete_access_key(user, &key.id).await.ok();
    aws.delete_user(user).await.ok();
}

#[tokio::test]
#[ignore]
async fn test_state_bucket_hardening() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let config = localstack_config(root.path());
    let aws = AwsClients::new(&config).await;

    let bucket = "pave-tf-state-bucket-integration";
    aws.create_bucket(bucket, &config.region)
        .await
        .expect("Failed to create bucket");
    aws.enable_bucket_versioning(bucket)
        .await
        .expect("Failed to enable versioning");
    aws.enable_bucket_encryption(bucket)
        .await
        .expect("Failed to enable encryption");
    aws.block_public_access(bucket)
        .await
        .expect("Failed to block public access");

    assert!(aws
        .bucket_exists(bucket)
        .await
        .expect("Failed to check bucket"));

    aws.empty_bucket(bucket).await.expect("Failed to empty bucket");
    aws.delete_bucket(bucket).await.expect("Failed to delete bucket");
    assert!(!aws
        .bucket_exists(bucket)
        .await
        .expect("Failed to check bucket"));
}

#[tokio::test]
#[ignore]
async fn test_bootstrap_check_passes_with_bootstrap_credentials() {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let config = localstack_config(root.path());
    let reporter = quiet_reporter();

    let created = ops::bootstrap::create(&config, &reporter)
        .await
        .expect("Bootstrap create failed");
    assert_eq!(created, 0);

    // check requires the caller to be the bootstrap user; the shared test
    // credentials resolve to the account root, so it must report failure.
    let as_root = ops::bootstrap::check(&config, &reporter)
        .await
        .expect("Bootstrap check errored");
    assert_eq!(as_root, 1);

    // Load the key that create wrote to .secrets. LocalStack maps access
    // keys created through IAM back to their user.
    let secrets =
        std::fs::read_to_string(config.secrets_file()).expect("Failed to read .secrets");
    for line in secrets.lines() {
        if let Some((name, value)) = line.split_once('=') {
            if name == "AWS_ACCESS_KEY_ID" || name == "AWS_SECRET_ACCESS_KEY" {
                std::env::set_var(name, value);
            }
        }
    }

    let as_bootstrap = ops::bootstrap::check(&config, &reporter)
        .await
        .expect("Bootstrap check errored");
    assert_eq!(as_bootstrap, 0);

    // Restore the shared credentials before tearing the user down.
    std::env::set_var("AWS_ACCESS_KEY_ID", "test");
    std::env::set_var("AWS_SECRET_ACCESS_KEY", "test");

    ops::bootstrap::destroy(&config, &reporter, true)
        .await
        .expect("Teardown failed");
}
