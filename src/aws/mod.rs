//! AWS SDK clients and shared error classification.
//!
//! One [`AwsClients`] bundle is built per command invocation from the
//! standard credential chain. Credentials are resolved lazily by the SDK;
//! a missing chain surfaces on the first call as
//! [`PaveError::MissingCredentials`].

pub mod iam;
pub mod s3;
pub mod secrets;

use crate::{Config, PaveError, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Clients for the four services this tool touches.
#[derive(Debug, Clone)]
pub struct AwsClients {
    pub iam: aws_sdk_iam::Client,
    pub sts: aws_sdk_sts::Client,
    pub s3: aws_sdk_s3::Client,
    pub secrets: aws_sdk_secretsmanager::Client,
}

impl AwsClients {
    /// Builds clients from the standard credential chain, preferring the
    /// configured region and honoring a custom endpoint (LocalStack).
    pub async fn new(config: &Config) -> Self {
        let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()))
            .or_default_provider();

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            iam: aws_sdk_iam::Client::new(&sdk_config),
            sts: aws_sdk_sts::Client::new(&sdk_config),
            s3: aws_sdk_s3::Client::new(&sdk_config),
            secrets: aws_sdk_secretsmanager::Client::new(&sdk_config),
        }
    }

    /// Resolves who we are running as.
    pub async fn caller_identity(&self) -> Result<CallerIdentity> {
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| aws_err("sts", "get-caller-identity", "-", &e))?;

        let account = out
            .account()
            .map(str::to_string)
            .ok_or_else(|| PaveError::Other(anyhow::anyhow!("caller identity has no account id")))?;
        let arn = out
            .arn()
            .map(str::to_string)
            .ok_or_else(|| PaveError::Other(anyhow::anyhow!("caller identity has no ARN")))?;

        Ok(CallerIdentity { account, arn })
    }
}

/// STS caller identity, reduced to the two fields the workflows use.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

impl CallerIdentity {
    /// User name segment of the ARN, when the caller is an IAM user.
    pub fn user_name(&self) -> Option<&str> {
        self.arn.split(":user/").nth(1)
    }
}

/// Classifies an SDK error into the domain taxonomy and attaches
/// service/operation/resource context to residual errors.
///
/// NotFound, AlreadyExists, AccessDenied, LimitExceeded, and missing
/// credentials come back as their direct variants so callers can branch on
/// them for idempotency decisions.
pub(crate) fn aws_err<E, R>(
    service: &str,
    operation: &str,
    resource: &str,
    err: &SdkError<E, R>,
) -> PaveError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = err.message().unwrap_or("").to_string();
    match err.code() {
        Some("NoSuchEntity" | "NoSuchEntityException" | "ResourceNotFoundException" | "NoSuchBucket" | "NotFound") => {
            PaveError::NotFound(resource.to_string())
        }
        Some(
            "EntityAlreadyExists"
            | "ResourceExistsException"
            | "BucketAlreadyOwnedByYou"
            | "BucketAlreadyExists",
        ) => PaveError::AlreadyExists(resource.to_string()),
        Some("AccessDenied" | "AccessDeniedException" | "UnauthorizedOperation") => {
            PaveError::AccessDenied(message)
        }
        Some("LimitExceeded" | "LimitExceededException") => PaveError::LimitExceeded(message),
        Some(code) => PaveError::aws_op(
            service,
            operation,
            resource,
            PaveError::Aws {
                code: code.to_string(),
                message,
            },
        ),
        None => {
            let rendered = format!("{}", DisplayErrorContext(err));
            if rendered.contains("credential") || rendered.contains("Credential") {
                PaveError::MissingCredentials
            } else {
                PaveError::aws_op(
                    service,
                    operation,
                    resource,
                    PaveError::Aws {
                        code: "Unknown".to_string(),
                        message: rendered,
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_identity_user_name() {
        let id = CallerIdentity {
            account: "256140316797".to_string(),
            arn: "arn:aws:iam::256140316797:user/bootstrap-user".to_string(),
        };
        assert_eq!(id.user_name(), Some("bootstrap-user"));

        let role = CallerIdentity {
            account: "256140316797".to_string(),
            arn: "arn:aws:sts::256140316797:assumed-role/SomeRole/session".to_string(),
        };
        assert_eq!(role.user_name(), None);
    }
}
