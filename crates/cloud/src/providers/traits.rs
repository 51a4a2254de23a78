//! Cloud provider trait and common types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resources::{AddonChart, ResourceNode, ResourceStatus};

/// Errors that can occur during cloud provider operations.
#[derive(Error, Debug)]
pub enum CloudProviderError {
    /// A required command line tool could not be executed.
    #[error("Failed to run {program}: {message}")]
    CommandFailed { program: String, message: String },

    /// The provider rejected the request.
    #[error("API error: {code} - {message}")]
    Api { code: String, message: String },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// The provider endpoint could not be reached.
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl CloudProviderError {
    /// Whether the error means the resource is already gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the provider could not be talked to at all.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::Auth(_) | Self::CommandFailed { .. }
        )
    }
}

/// Identity the provider credentials resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    /// Account the credentials belong to.
    pub account: String,
    /// Principal ARN.
    pub arn: String,
}

/// The external collaborator the lifecycle orchestrator drives.
///
/// Each resource is created, described and deleted individually. `describe`
/// reports [`ResourceStatus::Absent`] for a missing resource; `delete` may
/// return [`CloudProviderError::NotFound`], which callers treat as already
/// absent.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    // ========================================================================
    // Prerequisites and bootstrap
    // ========================================================================

    /// Check that credentials are present and valid.
    async fn verify_credentials(&self) -> Result<CallerIdentity, CloudProviderError>;

    /// Register a chart repository locally.
    async fn add_chart_repository(&self, chart: &AddonChart) -> Result<(), CloudProviderError>;

    /// Refresh all registered chart repositories.
    async fn update_chart_repositories(&self) -> Result<(), CloudProviderError>;

    /// Whether the one-time bootstrap resources already exist.
    async fn is_bootstrapped(&self) -> Result<bool, CloudProviderError>;

    /// Create the one-time bootstrap resources.
    async fn bootstrap(&self) -> Result<(), CloudProviderError>;

    // ========================================================================
    // Per-resource operations
    // ========================================================================

    /// Submit a resource for creation, returning its provider identifier.
    async fn create(&self, node: &ResourceNode) -> Result<String, CloudProviderError>;

    /// Query the live status of a resource.
    async fn describe(&self, node: &ResourceNode) -> Result<ResourceStatus, CloudProviderError>;

    /// Submit a resource for deletion.
    async fn delete(&self, node: &ResourceNode) -> Result<(), CloudProviderError>;

    // ========================================================================
    // Teardown cleanup
    // ========================================================================

    /// Delete application workloads (ingresses, application namespace).
    async fn delete_workloads(&self) -> Result<(), CloudProviderError>;

    /// Delete the cluster's log groups.
    async fn delete_log_groups(&self) -> Result<(), CloudProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification_helpers() {
        assert!(CloudProviderError::NotFound("vpc".into()).is_not_found());
        assert!(CloudProviderError::Auth("expired".into()).is_connectivity());
        assert!(!CloudProviderError::Timeout(300).is_connectivity());
        assert!(!CloudProviderError::Api {
            code: "LimitExceeded".into(),
            message: "too many".into()
        }
        .is_not_found());
    }

    #[test]
    fn test_caller_identity_parses_sts_output() {
        let json = r#"{"UserId":"AIDA","Account":"123456789012","Arn":"arn:aws:iam::123456789012:user/ops"}"#;
        let identity: CallerIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.account, "123456789012");
        assert!(identity.arn.ends_with("user/ops"));
    }
}
