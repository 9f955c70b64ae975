//! Drift detection: compares deployed IAM state against the configuration
//! Terraform is supposed to have applied.
//!
//! The expected model mirrors the Terraform definitions for the two
//! deployment users and two roles. Comparison is set-based and order
//! independent; every deviation becomes one numbered issue in the summary.

use crate::aws::AwsClients;
use crate::policy::{decode_trust_policy, TrustPolicy};
use crate::{Config, PaveError, Reporter, Result};
use std::collections::BTreeSet;

const DEVELOPER_USER_ATTACHED: &[&str] = &["DeveloperExtendedPolicy", "AmazonEC2ReadOnlyAccess"];
const DEVELOPER_USER_INLINE: &[&str] = &["DeveloperComprehensivePolicy"];

const ADMIN_USER_ATTACHED: &[&str] = &["PaveAdminPolicy"];
const ADMIN_USER_INLINE: &[&str] = &[];

const DEVELOPER_ROLE_ATTACHED: &[&str] = &[
    "AmazonAPIGatewayAdministrator",
    "AmazonEC2FullAccess",
    "CloudWatchLogsFullAccess",
    "AmazonSQSFullAccess",
    "AmazonDynamoDBFullAccess",
    "AmazonS3FullAccess",
    "AWSCloudFormationFullAccess",
    "AWSLambda_FullAccess",
];

const CICD_ROLE_ATTACHED: &[&str] = &[
    "CICDS3SpecificAccess",
    "AmazonS3FullAccess",
    "AWSLambda_FullAccess",
];

const NO_INLINE: &[&str] = &[];

/// Principal ARNs the trust policies must reference, derived from the
/// caller's account id.
#[derive(Debug, Clone)]
struct ExpectedModel {
    admin_user_arn: String,
    oidc_provider_arn: String,
}

impl ExpectedModel {
    fn for_account(account_id: &str) -> Self {
        Self {
            admin_user_arn: format!("arn:aws:iam::{account_id}:user/admin-user"),
            oidc_provider_arn: format!(
                "arn:aws:iam::{account_id}:oidc-provider/token.actions.githubusercontent.com"
            ),
        }
    }
}

/// Unordered comparison of observed vs expected names. Duplicates collapse;
/// output ordering is alphabetical so messages are deterministic.
fn set_difference_issues(
    observed: &[String],
    expected: &[&str],
    kind: &str,
    label: &str,
) -> Vec<String> {
    let observed: BTreeSet<&str> = observed.iter().map(String::as_str).collect();
    let expected: BTreeSet<&str> = expected.iter().copied().collect();

    let missing: Vec<&str> = expected.difference(&observed).copied().collect();
    let extra: Vec<&str> = observed.difference(&expected).copied().collect();

    let mut issues = Vec::new();
    if !missing.is_empty() {
        issues.push(format!("Missing {kind} in {label}: {}", missing.join(", ")));
    }
    if !extra.is_empty() {
        issues.push(format!("Extra {kind} in {label}: {}", extra.join(", ")));
    }
    issues
}

#[derive(Debug)]
struct UserState {
    attached: Vec<String>,
    inline: Vec<String>,
    groups: Vec<String>,
}

#[derive(Debug)]
struct RoleState {
    attached: Vec<String>,
    inline: Vec<String>,
    trust: Option<TrustPolicy>,
}

async fn gather_user(aws: &AwsClients, user: &str) -> Result<Option<UserState>> {
    let attached = match aws.list_attached_user_policies(user).await {
        Ok(policies) => policies.into_iter().map(|p| p.name).collect(),
        Err(PaveError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let inline = aws.list_user_policies(user).await?;
    let groups = aws.list_groups_for_user(user).await?;
    Ok(Some(UserState {
        attached,
        inline,
        groups,
    }))
}

async fn gather_role(aws: &AwsClients, role: &str) -> Result<Option<RoleState>> {
    let summary = match aws.get_role(role).await {
        Ok(summary) => summary,
        Err(PaveError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let trust = summary
        .assume_role_policy
        .as_deref()
        .map(decode_trust_policy)
        .transpose()?;
    let attached = aws
        .list_attached_role_policies(role)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    let inline = aws.list_role_policies(role).await?;
    Ok(Some(RoleState {
        attached,
        inline,
        trust,
    }))
}

fn report_check(reporter: &Reporter, pass_message: &str, issues: &[String]) {
    if issues.is_empty() {
        reporter.success(pass_message);
    } else {
        for issue in issues {
            reporter.warning(issue);
        }
    }
}

fn user_issues(user: &UserState, name: &str, attached: &[&str], inline: &[&str]) -> Vec<String> {
    let mut issues = set_difference_issues(
        &user.attached,
        attached,
        "policies",
        &format!("{name} attached policies"),
    );
    issues.extend(set_difference_issues(
        &user.inline,
        inline,
        "inline policies",
        &format!("{name} inline policies"),
    ));
    if !user.groups.is_empty() {
        issues.push(format!(
            "{name} has unexpected groups: {}",
            user.groups.join(", ")
        ));
    }
    issues
}

async fn check_user(
    aws: &AwsClients,
    reporter: &Reporter,
    name: &str,
    attached: &[&str],
    inline: &[&str],
) -> Result<Vec<String>> {
    reporter.section(&format!("Checking {name}"));

    let Some(user) = gather_user(aws, name).await? else {
        return Ok(vec![format!("{name} does not exist in AWS")]);
    };

    let issues = user_issues(&user, name, attached, inline);
    report_check(
        reporter,
        &format!("{name} configuration matches Terraform"),
        &issues,
    );
    Ok(issues)
}

async fn check_developer_role(
    aws: &AwsClients,
    reporter: &Reporter,
    expected: &ExpectedModel,
) -> Result<Vec<String>> {
    reporter.section("Checking DeveloperRole");

    let Some(role) = gather_role(aws, "DeveloperRole").await? else {
        return Ok(vec!["DeveloperRole does not exist in AWS".to_string()]);
    };

    let mut issues = set_difference_issues(
        &role.attached,
        DEVELOPER_ROLE_ATTACHED,
        "policies",
        "DeveloperRole attached policies",
    );
    issues.extend(set_difference_issues(
        &role.inline,
        NO_INLINE,
        "inline policies",
        "DeveloperRole inline policies",
    ));

    let can_assume = role
        .trust
        .as_ref()
        .is_some_and(|t| t.trusts_aws_principal(&expected.admin_user_arn));
    if !can_assume {
        issues.push("DeveloperRole cannot be assumed by admin-user".to_string());
    }

    report_check(reporter, "DeveloperRole configuration matches Terraform", &issues);
    Ok(issues)
}

async fn check_cicd_role(
    aws: &AwsClients,
    reporter: &Reporter,
    expected: &ExpectedModel,
) -> Result<Vec<String>> {
    reporter.section("Checking CICDDeploymentRole");

    let Some(role) = gather_role(aws, "CICDDeploymentRole").await? else {
        return Ok(vec!["CICDDeploymentRole does not exist in AWS".to_string()]);
    };

    let mut issues = set_difference_issues(
        &role.attached,
        CICD_ROLE_ATTACHED,
        "policies",
        "CICDDeploymentRole attached policies",
    );
    issues.extend(set_difference_issues(
        &role.inline,
        NO_INLINE,
        "inline policies",
        "CICDDeploymentRole inline policies",
    ));

    let can_assume = role
        .trust
        .as_ref()
        .is_some_and(|t| t.trusts_federated(&expected.oidc_provider_arn));
    if !can_assume {
        issues.push("CICDDeploymentRole cannot be assumed by GitHub Actions OIDC".to_string());
    }

    report_check(
        reporter,
        "CICDDeploymentRole configuration matches Terraform",
        &issues,
    );
    Ok(issues)
}

pub async fn run(config: &Config, reporter: &Reporter) -> Result<i32> {
    let aws = AwsClients::new(config).await;
    let identity = match aws.caller_identity().await {
        Ok(id) => id,
        Err(PaveError::MissingCredentials) => {
            reporter.error("No AWS credentials found. Please configure credentials.");
            return Ok(1);
        }
        Err(e) => {
            reporter.error(&format!("Failed to connect to AWS: {e}"));
            return Ok(1);
        }
    };
    reporter.info(&format!("Connected as: {}", identity.arn));

    let account_id = config
        .account_id
        .clone()
        .unwrap_or_else(|| identity.account.clone());
    let expected = ExpectedModel::for_account(&account_id);

    reporter.header("AWS-to-Terraform Drift Detection");

    let mut all_issues: Vec<String> = Vec::new();
    let outcomes = [
        (
            "developer-user",
            check_user(
                &aws,
                reporter,
                "developer-user",
                DEVELOPER_USER_ATTACHED,
                DEVELOPER_USER_INLINE,
            )
            .await,
        ),
        (
            "admin-user",
            check_user(
                &aws,
                reporter,
                "admin-user",
                ADMIN_USER_ATTACHED,
                ADMIN_USER_INLINE,
            )
            .await,
        ),
        (
            "DeveloperRole",
            check_developer_role(&aws, reporter, &expected).await,
        ),
        (
            "CICDDeploymentRole",
            check_cicd_role(&aws, reporter, &expected).await,
        ),
    ];

    for (name, outcome) in outcomes {
        match outcome {
            Ok(issues) => all_issues.extend(issues),
            Err(e) => {
                reporter.error(&format!("Error checking {name}: {e}"));
                all_issues.push(format!("Failed to check {name}: {e}"));
            }
        }
    }

    reporter.section("Drift Detection Summary");
    if all_issues.is_empty() {
        reporter.success("✅ NO DRIFT DETECTED - All AWS resources match Terraform configuration");
        reporter.info("Your infrastructure is perfectly synchronized!");
        Ok(0)
    } else {
        reporter.warning(&format!(
            "⚠️  DRIFT DETECTED - {} issue(s) found:",
            all_issues.len()
        ));
        for (i, issue) in all_issues.iter().enumerate() {
            reporter.plain(&format!("   {}. {issue}", i + 1));
        }
        reporter.blank();
        reporter.info("Consider running 'terraform plan' and 'terraform apply' to resolve drift.");
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_and_extra_reported() {
        let issues = set_difference_issues(
            &observed(&["A", "B"]),
            &["B", "C"],
            "policies",
            "developer-user attached policies",
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(
            issues[0],
            "Missing policies in developer-user attached policies: C"
        );
        assert_eq!(
            issues[1],
            "Extra policies in developer-user attached policies: A"
        );
    }

    #[test]
    fn test_permutation_passes() {
        let issues = set_difference_issues(
            &observed(&["AmazonS3FullAccess", "AWSLambda_FullAccess", "CICDS3SpecificAccess"]),
            CICD_ROLE_ATTACHED,
            "policies",
            "CICDDeploymentRole attached policies",
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let issues = set_difference_issues(
            &observed(&["PaveAdminPolicy", "PaveAdminPolicy"]),
            ADMIN_USER_ATTACHED,
            "policies",
            "admin-user attached policies",
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_empty_expected_flags_everything_extra() {
        let issues = set_difference_issues(
            &observed(&["UnexpectedPolicy"]),
            NO_INLINE,
            "inline policies",
            "admin-user inline policies",
        );
        assert_eq!(issues, vec![
            "Extra inline policies in admin-user inline policies: UnexpectedPolicy".to_string()
        ]);
    }

    #[test]
    fn test_expected_model_derives_arns() {
        let model = ExpectedModel::for_account("256140316797");
        assert_eq!(
            model.admin_user_arn,
            "arn:aws:iam::256140316797:user/admin-user"
        );
        assert_eq!(
            model.oidc_provider_arn,
            "arn:aws:iam::256140316797:oidc-provider/token.actions.githubusercontent.com"
        );
    }

    #[test]
    fn test_user_issues_flags_groups() {
        let user = UserState {
            attached: observed(&["PaveAdminPolicy"]),
            inline: vec![],
            groups: observed(&["Admins", "Ops"]),
        };
        let issues = user_issues(&user, "admin-user", ADMIN_USER_ATTACHED, ADMIN_USER_INLINE);
        assert_eq!(issues, vec![
            "admin-user has unexpected groups: Admins, Ops".to_string()
        ]);
    }

    #[test]
    fn test_user_issues_clean_pass() {
        let user = UserState {
            attached: observed(&["AmazonEC2ReadOnlyAccess", "DeveloperExtendedPolicy"]),
            inline: observed(&["DeveloperComprehensivePolicy"]),
            groups: vec![],
        };
        let issues = user_issues(
            &user,
            "developer-user",
            DEVELOPER_USER_ATTACHED,
            DEVELOPER_USER_INLINE,
        );
        assert!(issues.is_empty());
    }
}
