//! IAM trust policy model and principal matching.
//!
//! IAM returns `AssumeRolePolicyDocument` URL-encoded; [`decode_trust_policy`]
//! handles the decode before parsing. Fields that IAM serializes as either a
//! bare string or a list are modeled with [`OneOrMany`].

use crate::{PaveError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON field IAM writes as either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Exact-equality membership test, treating a bare string as a
    /// one-element list.
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(s) => s == value,
            Self::Many(items) => items.iter().any(|s| s == value),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::One(s) => Box::new(std::iter::once(s.as_str())),
            Self::Many(items) => Box::new(items.iter().map(String::as_str)),
        }
    }
}

/// Principal block of a trust policy statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "AWS", default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<OneOrMany>,
    #[serde(rename = "Federated", default, skip_serializing_if = "Option::is_none")]
    pub federated: Option<OneOrMany>,
    #[serde(rename = "Service", default, skip_serializing_if = "Option::is_none")]
    pub service: Option<OneOrMany>,
}

/// Principal field: either the `"*"` wildcard or a principal block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrincipalSpec {
    Wildcard(String),
    Block(Principal),
}

/// A single trust policy statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustStatement {
    #[serde(rename = "Sid", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(rename = "Effect", default)]
    pub effect: String,
    #[serde(rename = "Principal", default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalSpec>,
    #[serde(rename = "Action", default, skip_serializing_if = "Option::is_none")]
    pub action: Option<OneOrMany>,
    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

/// A role's assume-role policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustPolicy {
    #[serde(rename = "Version", default)]
    pub version: String,
    #[serde(rename = "Statement", default)]
    pub statement: Vec<TrustStatement>,
}

impl TrustPolicy {
    /// Whether any statement names `arn` in `Principal.AWS`, as a single
    /// string or a list element. Unrelated statements are ignored.
    pub fn trusts_aws_principal(&self, arn: &str) -> bool {
        self.statement.iter().any(|stmt| {
            matches!(
                &stmt.principal,
                Some(PrincipalSpec::Block(p))
                    if p.aws.as_ref().is_some_and(|aws| aws.contains(arn))
            )
        })
    }

    /// Whether any statement names `provider_arn` in `Principal.Federated`.
    pub fn trusts_federated(&self, provider_arn: &str) -> bool {
        self.statement.iter().any(|stmt| {
            matches!(
                &stmt.principal,
                Some(PrincipalSpec::Block(p))
                    if p.federated.as_ref().is_some_and(|fed| fed.contains(provider_arn))
            )
        })
    }
}

/// Decodes the URL-encoded `AssumeRolePolicyDocument` field of a GetRole
/// response and parses it.
///
/// Some IAM-compatible endpoints return the document unencoded; a document
/// without percent escapes passes through the decoder unchanged.
pub fn decode_trust_policy(encoded: &str) -> Result<TrustPolicy> {
    let decoded = urlencoding::decode(encoded)
        .map_err(|e| PaveError::Other(anyhow::anyhow!("trust policy is not valid UTF-8: {e}")))?;
    Ok(serde_json::from_str(&decoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_ARN: &str = "arn:aws:iam::256140316797:user/admin-user";
    const OIDC_ARN: &str =
        "arn:aws:iam::256140316797:oidc-provider/token.actions.githubusercontent.com";

    fn parse(doc: &str) -> TrustPolicy {
        serde_json::from_str(doc).unwrap()
    }

    #[test]
    fn test_string_principal_matches() {
        let policy = parse(
            r#"{"Version":"2012-10-17","Statement":[
                {"Effect":"Allow","Principal":{"AWS":"arn:aws:iam::256140316797:user/admin-user"},"Action":"sts:AssumeRole"}
            ]}"#,
        );
        assert!(policy.trusts_aws_principal(ADMIN_ARN));
    }

    #[test]
    fn test_list_principal_matches() {
        let policy = parse(
            r#"{"Version":"2012-10-17","Statement":[
                {"Effect":"Allow","Principal":{"AWS":["arn:aws:iam::256140316797:user/other","arn:aws:iam::256140316797:user/admin-user"]},"Action":"sts:AssumeRole"}
            ]}"#,
        );
        assert!(policy.trusts_aws_principal(ADMIN_ARN));
    }

    #[test]
    fn test_absent_principal_fails_despite_other_statements() {
        let policy = parse(
            r#"{"Version":"2012-10-17","Statement":[
                {"Effect":"Allow","Principal":{"Service":"lambda.amazonaws.com"},"Action":"sts:AssumeRole"},
                {"Effect":"Allow","Principal":"*","Action":"sts:AssumeRole"},
                {"Effect":"Allow","Principal":{"AWS":"arn:aws:iam::256140316797:user/someone-else"},"Action":"sts:AssumeRole"}
            ]}"#,
        );
        assert!(!policy.trusts_aws_principal(ADMIN_ARN));
    }

    #[test]
    fn test_federated_principal() {
        let policy = parse(
            r#"{"Version":"2012-10-17","Statement":[
                {"Effect":"Allow","Principal":{"Federated":"arn:aws:iam::256140316797:oidc-provider/token.actions.githubusercontent.com"},"Action":"sts:AssumeRoleWithWebIdentity"}
            ]}"#,
        );
        assert!(policy.trusts_federated(OIDC_ARN));
        assert!(!policy.trusts_aws_principal(ADMIN_ARN));
    }

    #[test]
    fn test_decode_url_encoded_document() {
        let encoded = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%7B%22Effect%22%3A%22Allow%22%2C%22Principal%22%3A%7B%22AWS%22%3A%22arn%3Aaws%3Aiam%3A%3A256140316797%3Auser%2Fadmin-user%22%7D%2C%22Action%22%3A%22sts%3AAssumeRole%22%7D%5D%7D";
        let policy = decode_trust_policy(encoded).unwrap();
        assert!(policy.trusts_aws_principal(ADMIN_ARN));
    }

    #[test]
    fn test_decode_plain_document_passes_through() {
        let plain = r#"{"Version":"2012-10-17","Statement":[]}"#;
        let policy = decode_trust_policy(plain).unwrap();
        assert!(policy.statement.is_empty());
    }

    #[test]
    fn test_one_or_many_iter() {
        let one = OneOrMany::One("a".to_string());
        assert_eq!(one.iter().collect::<Vec<_>>(), vec!["a"]);

        let many = OneOrMany::Many(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(many.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
