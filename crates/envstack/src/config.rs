//! Environment configuration types.
//!
//! An [`EnvironmentConfig`] is the single input of the plan assembler. It is
//! built from flags and environment variables, or loaded from a YAML file, and
//! is never mutated once a plan has been built from it.

use std::path::Path;

use anyhow::{Context, Result};
use envstack_cloud::CapacityType;
use serde::{Deserialize, Serialize};

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default cluster name.
pub const DEFAULT_CLUSTER_NAME: &str = "eks-demo";

/// Default node instance type.
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.medium";

/// Default EKS control plane version.
pub const DEFAULT_KUBERNETES_VERSION: &str = "1.29";

/// Default VPC CIDR block.
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";

/// Default application namespace.
pub const DEFAULT_APP_NAMESPACE: &str = "demo-app";

/// Default image repositories.
pub const DEFAULT_REPOSITORIES: &[&str] = &["frontend", "backend"];

/// Output format for `status` and `plan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human readable table.
    #[default]
    Table,
    /// Machine readable JSON.
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(anyhow::anyhow!(
                "Unknown output format: {s}. Supported: table, json"
            )),
        }
    }
}

/// Full environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    // Identity
    /// AWS region (e.g., "us-east-1").
    pub region: String,
    /// Name of the EKS cluster; prefixes most resource names.
    pub cluster_name: String,

    // Node group
    /// EC2 instance type for worker nodes.
    pub node_instance_type: String,
    /// Minimum node count.
    pub node_min_size: u32,
    /// Maximum node count.
    pub node_max_size: u32,
    /// Desired node count. Must satisfy `min <= desired <= max`.
    pub node_desired_size: u32,
    /// Use spot instead of on-demand capacity.
    pub use_spot_capacity: bool,

    // Monitoring
    /// Create the CloudWatch dashboard.
    pub enable_monitoring: bool,
    /// Create the alarm topic. Ignored unless monitoring is enabled.
    pub enable_alarms: bool,
    /// Email subscribed to the alarm topic.
    pub alert_email: Option<String>,

    // DNS
    /// Apex domain. When set, a hosted zone and wildcard certificate are added.
    pub domain_name: Option<String>,

    // Cluster details
    /// One ECR repository is created per entry, named `<cluster>-<repo>`.
    pub repositories: Vec<String>,
    /// EKS control plane version.
    pub kubernetes_version: String,
    /// VPC CIDR block.
    pub vpc_cidr: String,
    /// Namespace holding application workloads.
    pub app_namespace: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_CLUSTER_NAME.to_string())
    }
}

impl EnvironmentConfig {
    /// Create config with sensible defaults for a given cluster name.
    #[must_use]
    pub fn with_defaults(cluster_name: String) -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            cluster_name,
            node_instance_type: DEFAULT_INSTANCE_TYPE.into(),
            node_min_size: 1,
            node_max_size: 3,
            node_desired_size: 2,
            use_spot_capacity: false,
            enable_monitoring: true,
            enable_alarms: false,
            alert_email: None,
            domain_name: None,
            repositories: DEFAULT_REPOSITORIES.iter().map(ToString::to_string).collect(),
            kubernetes_version: DEFAULT_KUBERNETES_VERSION.into(),
            vpc_cidr: DEFAULT_VPC_CIDR.into(),
            app_namespace: DEFAULT_APP_NAMESPACE.into(),
        }
    }

    /// Load a configuration from a YAML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config.normalized())
    }

    /// Trim string fields and treat empty optional values as absent.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        fn non_empty(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        self.region = self.region.trim().to_string();
        self.cluster_name = self.cluster_name.trim().to_string();
        self.node_instance_type = self.node_instance_type.trim().to_string();
        self.domain_name = non_empty(self.domain_name);
        self.alert_email = non_empty(self.alert_email);
        self.repositories = self
            .repositories
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        self
    }

    /// Capacity type for the node group.
    #[must_use]
    pub fn capacity_type(&self) -> CapacityType {
        if self.use_spot_capacity {
            CapacityType::Spot
        } else {
            CapacityType::OnDemand
        }
    }

    /// Whether the alarm topic will be created.
    #[must_use]
    pub fn alarms_effective(&self) -> bool {
        self.enable_monitoring && self.enable_alarms
    }
}
