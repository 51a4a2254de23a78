//! Lifecycle error taxonomy.

use envstack_cloud::CloudProviderError;
use thiserror::Error;

use crate::plan::ValidationError;
use crate::state::Phase;

/// Errors surfaced by the lifecycle orchestrator.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The config was rejected before any cloud call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A required tool or credential is missing.
    #[error("Prerequisite not met: {0}")]
    Prerequisite(String),

    /// A resource could not be created or did not become active.
    #[error("Failed to create {resource}: {reason}")]
    ResourceCreation { resource: String, reason: String },

    /// A resource could not be deleted or did not disappear.
    #[error("Failed to delete {resource}: {reason}")]
    ResourceDeletion { resource: String, reason: String },

    /// The operator did not type the confirmation token.
    #[error("Teardown cancelled: confirmation not given")]
    ConfirmationDeclined,

    /// A phase gate found abort-policy resources in the wrong state.
    #[error("Phase '{phase}' blocked by: {}", resources.join(", "))]
    PhaseBlocked { phase: Phase, resources: Vec<String> },

    /// The cloud collaborator failed outside any single resource.
    #[error(transparent)]
    Cloud(#[from] CloudProviderError),
}

impl LifecycleError {
    /// Whether the run was stopped on purpose rather than by a failure.
    #[must_use]
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::ConfirmationDeclined)
    }

    /// Whether the collaborator could not be reached or authenticated.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Cloud(e) => e.is_connectivity(),
            Self::Prerequisite(_) => true,
            _ => false,
        }
    }
}
