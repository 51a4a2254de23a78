//! Status report types.

use chrono::{DateTime, Utc};
use envstack_cloud::{ResourceKind, ResourceStatus};
use serde::Serialize;

/// Live status of one plan node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReport {
    /// Node name.
    pub name: String,
    /// Node kind.
    pub kind: ResourceKind,
    /// Status reported by the provider.
    pub status: ResourceStatus,
    /// Names this node depends on.
    pub depends_on: Vec<String>,
    /// Describe error, if the status could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only snapshot of an environment, rebuilt on every `status` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Cluster the plan was built for.
    pub cluster_name: String,
    /// AWS region.
    pub region: String,
    /// Account the credentials resolved to.
    pub account: String,
    /// When the provider was queried.
    pub checked_at: DateTime<Utc>,
    /// One entry per plan node, in plan order.
    pub resources: Vec<ResourceReport>,
}

impl StatusReport {
    /// Count of nodes with the given status.
    #[must_use]
    pub fn count(&self, status: ResourceStatus) -> usize {
        self.resources.iter().filter(|r| r.status == status).count()
    }

    /// Whether every node is active.
    #[must_use]
    pub fn is_fully_deployed(&self) -> bool {
        self.count(ResourceStatus::Active) == self.resources.len()
    }

    /// Whether every node is absent.
    #[must_use]
    pub fn is_fully_absent(&self) -> bool {
        self.count(ResourceStatus::Absent) == self.resources.len()
    }
}
