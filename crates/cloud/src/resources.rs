//! Resource model shared by the plan assembler and the cloud providers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Kind of infrastructure resource a plan node describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    /// VPC with subnets, internet gateway and route table.
    Network,
    /// ECR repository.
    Registry,
    /// EKS control plane.
    Cluster,
    /// EKS managed node group.
    NodeGroup,
    /// Helm-installed cluster add-on.
    Addon,
    /// Route53 hosted zone.
    DnsZone,
    /// ACM certificate.
    Certificate,
    /// CloudWatch dashboard.
    Dashboard,
    /// SNS topic receiving CloudWatch alarms.
    AlarmTopic,
}

impl ResourceKind {
    /// How a failure of this kind of resource affects the rest of the run.
    ///
    /// Foundational resources abort; auxiliary ones are reported and skipped.
    #[must_use]
    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            Self::Network | Self::Registry | Self::Cluster | Self::NodeGroup => {
                FailurePolicy::Abort
            }
            Self::Addon
            | Self::DnsZone
            | Self::Certificate
            | Self::Dashboard
            | Self::AlarmTopic => FailurePolicy::WarnAndContinue,
        }
    }

    /// Short label used in console output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Registry => "registry",
            Self::Cluster => "cluster",
            Self::NodeGroup => "nodeGroup",
            Self::Addon => "addon",
            Self::DnsZone => "dnsZone",
            Self::Certificate => "certificate",
            Self::Dashboard => "dashboard",
            Self::AlarmTopic => "alarmTopic",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Failure handling for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and surface the error.
    Abort,
    /// Record a warning and continue with independent resources.
    WarnAndContinue,
}

/// Observed status of a resource, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceStatus {
    /// Not yet submitted in this run.
    Pending,
    /// Creation or deletion is underway.
    InProgress,
    /// Exists and is usable.
    Active,
    /// Terminal failure reported by the provider, or timed out.
    Failed,
    /// Does not exist.
    Absent,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "inProgress"),
            Self::Active => write!(f, "active"),
            Self::Failed => write!(f, "failed"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Capacity type for node group instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityType {
    /// Regular on-demand instances.
    #[default]
    OnDemand,
    /// Spot instances.
    Spot,
}

impl CapacityType {
    /// Value accepted by `eks create-nodegroup --capacity-type`.
    #[must_use]
    pub fn as_eks_str(self) -> &'static str {
        match self {
            Self::OnDemand => "ON_DEMAND",
            Self::Spot => "SPOT",
        }
    }
}

/// Helm chart coordinates for a cluster add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonChart {
    /// Helm release name.
    pub release: String,
    /// Local name of the chart repository (e.g., "eks").
    pub repo_name: String,
    /// Chart repository URL.
    pub repo_url: String,
    /// Chart reference, `<repo_name>/<chart>`.
    pub chart: String,
    /// Namespace the release is installed into.
    pub namespace: String,
    /// `--set` values, ordered by key.
    pub values: BTreeMap<String, String>,
}

/// Per-kind parameters needed to create a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ResourceSpec {
    /// VPC and its public subnets.
    Network {
        /// VPC CIDR block.
        cidr_block: String,
        /// One subnet CIDR per availability zone.
        subnet_cidrs: Vec<String>,
    },
    /// Container image repository.
    Registry {
        /// Repository name.
        repository: String,
        /// Scan images on push.
        scan_on_push: bool,
    },
    /// Managed Kubernetes control plane.
    Cluster {
        /// Kubernetes version.
        version: String,
        /// Name of the network node hosting the cluster.
        network: String,
    },
    /// Managed node group.
    NodeGroup {
        /// Owning cluster.
        cluster: String,
        /// Network node whose subnets the nodes join.
        network: String,
        /// Instance type (e.g., "t3.medium").
        instance_type: String,
        /// Minimum node count.
        min_size: u32,
        /// Maximum node count.
        max_size: u32,
        /// Desired node count.
        desired_size: u32,
        /// On-demand or spot.
        capacity: CapacityType,
    },
    /// Helm-installed add-on.
    Addon(AddonChart),
    /// Public hosted zone.
    DnsZone {
        /// Apex domain.
        domain: String,
    },
    /// Wildcard certificate validated through the hosted zone.
    Certificate {
        /// Apex domain.
        domain: String,
    },
    /// Cluster dashboard.
    Dashboard {
        /// Cluster the dashboard watches.
        cluster: String,
    },
    /// Alarm notification topic.
    AlarmTopic {
        /// Topic name.
        topic: String,
        /// Cluster the alarms watch.
        cluster: String,
        /// Email subscribed to the topic.
        email: Option<String>,
    },
}

impl ResourceSpec {
    /// Resource kind this spec creates.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Network { .. } => ResourceKind::Network,
            Self::Registry { .. } => ResourceKind::Registry,
            Self::Cluster { .. } => ResourceKind::Cluster,
            Self::NodeGroup { .. } => ResourceKind::NodeGroup,
            Self::Addon(_) => ResourceKind::Addon,
            Self::DnsZone { .. } => ResourceKind::DnsZone,
            Self::Certificate { .. } => ResourceKind::Certificate,
            Self::Dashboard { .. } => ResourceKind::Dashboard,
            Self::AlarmTopic { .. } => ResourceKind::AlarmTopic,
        }
    }
}

/// A single named resource in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    /// Unique name within the plan.
    pub name: String,
    /// Names of nodes that must be active before this one is created.
    pub depends_on: BTreeSet<String>,
    /// Creation parameters.
    pub spec: ResourceSpec,
}

impl ResourceNode {
    /// Create a node with no dependencies.
    pub fn new(name: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            name: name.into(),
            depends_on: BTreeSet::new(),
            spec,
        }
    }

    /// Add dependencies on the named nodes.
    #[must_use]
    pub fn depending_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    /// Kind of this node.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    /// Failure policy of this node.
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.kind().failure_policy()
    }
}
