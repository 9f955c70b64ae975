//! Error types for pavectl operations.

use thiserror::Error;

/// Result type alias using [`PaveError`].
pub type Result<T> = std::result::Result<T, PaveError>;

/// Errors that can occur while operating on AWS resources, local files,
/// or external tools.
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
#[derive(Debug, Error)]
pub enum PaveError {
    /// AWS resource was not found.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// AWS resource already exists (cannot create duplicate).
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// No usable AWS credentials in the standard credential chain.
    #[error("AWS credentials not found")]
    MissingCredentials,

    /// The caller is not authorized for the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// An AWS service quota was hit (e.g. two access keys per user).
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Required external CLI tool is not installed.
    #[error("required tool not installed: {0}")]
    ToolNotInstalled(String),

    /// External command exited nonzero.
    #[error("command execution failed: {0}")]
    CommandFailed(String),

    /// Any other AWS API error, carrying the service error code.
    #[error("AWS error {code}: {message}")]
    Aws {
        /// AWS error code (e.g. `InvalidRequestException`)
        code: String,
        /// Human-readable message from the service
        message: String,
    },

    /// AWS operation failed with context.
    #[error("{service}: {operation} {resource}: {source}")]
    AwsOp {
        /// Service name (iam, s3, sts, secretsmanager)
        service: String,
        /// Operation name (create-user, delete-role, etc.)
        operation: String,
        /// Resource name
        resource: String,
        /// Underlying error
        #[source]
        source: Box<PaveError>,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PaveError {
    /// Creates an AWS operation error with context.
    ///
    /// This wraps an underlying error with information about which service,
    /// operation, and resource caused the failure.
    ///
    /// # Example
    ///
    /// ```
    /// use pavectl::PaveError;
    ///
    /// let err = PaveError::NotFound("developer-user".to_string());
    /// let wrapped = PaveError::aws_op("iam", "get-user", "developer-user", err);
    ///
    /// assert_eq!(
    ///     wrapped.to_string(),
    ///     "iam: get-user developer-user: resource not found: developer-user"
    /// );
    /// ```
    pub fn aws_op(
        service: impl Into<String>,
        operation: impl Into<String>,
        resource: impl Into<String>,
        err: PaveError,
    ) -> Self {
        Self::AwsOp {
            service: service.into(),
            operation: operation.into(),
            resource: resource.into(),
            source: Box::new(err),
        }
    }

    /// Returns the AWS service error code when one is attached.
    pub fn aws_code(&self) -> Option<&str> {
        match self {
            Self::Aws { code, .. } => Some(code.as_str()),
            Self::AwsOp { source, .. } => source.aws_code(),
            _ => None,
        }
    }

    /// Whether this error is a transient auth/propagation failure worth
    /// retrying. Freshly created access keys take a few seconds to become
    /// valid everywhere, which surfaces as `InvalidClientTokenId`.
    pub fn is_transient_auth(&self) -> bool {
        matches!(
            self.aws_code(),
            Some(
                "InvalidClientTokenId"
                    | "AuthFailure"
                    | "ExpiredToken"
                    | "ExpiredTokenException"
                    | "RequestTimeout"
                    | "Throttling"
                    | "ThrottlingException"
                    | "ServiceUnavailable"
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = PaveError::NotFound("developer-user".to_string());
        assert_eq!(err.to_string(), "resource not found: developer-user");
    }

    #[test]
    fn test_aws_operation_error() {
        let inner = PaveError::AccessDenied("not authorized".to_string());
        let err = PaveError::aws_op("iam", "delete-user", "admin-user", inner);

        let error_string = err.to_string();
        assert!(error_string.contains("iam"));
        assert!(error_string.contains("delete-user"));
        assert!(error_string.contains("admin-user"));
    }

    #[test]
    fn test_error_source_chain() {
        let inner = PaveError::NotFound("test".to_string());
        let outer = PaveError::aws_op("s3", "head-bucket", "test", inner);

        assert!(outer.source().is_some());
    }

    #[test]
    fn test_aws_code_through_context() {
        let inner = PaveError::Aws {
            code: "InvalidClientTokenId".to_string(),
            message: "token not yet valid".to_string(),
        };
        let outer = PaveError::aws_op("sts", "get-caller-identity", "-", inner);

        assert_eq!(outer.aws_code(), Some("InvalidClientTokenId"));
        assert!(outer.is_transient_auth());
    }

    #[test]
    fn test_access_denied_is_not_transient() {
        let err = PaveError::Aws {
            code: "AccessDenied".to_string(),
            message: "nope".to_string(),
        };
        assert!(!err.is_transient_auth());
    }
}
