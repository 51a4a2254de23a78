//! Environment assembler.
//!
//! Turns an [`EnvironmentConfig`] into a validated, ordered [`ResourcePlan`].
//! Assembly is pure: no clock, no randomness, no cloud calls. Every node's
//! dependencies appear earlier in the plan, so plan order is a valid creation
//! order and its reverse a valid deletion order.

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::LazyLock;

use envstack_cloud::{AddonChart, ResourceKind, ResourceNode, ResourceSpec};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::EnvironmentConfig;

/// AWS region identifiers: `us-east-1`, `ap-southeast-2`, `us-gov-west-1`.
static REGION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]?)?-[a-z]+-\d{1,2}$").expect("region pattern is valid")
});

/// EKS cluster name rules, capped so `{cluster}-cluster-role` stays within
/// IAM's 64-character role name limit.
static CLUSTER_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,50}$").expect("cluster name pattern is valid")
});

/// ECR repository name rules.
static REPOSITORY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[._/-][a-z0-9]+)*$").expect("repository pattern is valid")
});

/// Route 53 apex domain: dot-separated labels of up to 63 characters.
static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
        .expect("domain pattern is valid")
});

/// Route 53 limit on a full domain name.
const MAX_DOMAIN_LEN: usize = 253;

/// Number of public subnets carved out of the VPC.
const SUBNET_COUNT: u32 = 2;

/// Errors raised while validating a config or assembling a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is empty.
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// Region is not a valid AWS region identifier.
    #[error("Invalid region '{0}': expected an AWS region such as us-east-1")]
    InvalidRegion(String),

    /// Node group sizing violates `min <= desired <= max`.
    #[error("Invalid sizing: min={min}, desired={desired}, max={max} (requires min <= desired <= max)")]
    InvalidSizing { min: u32, desired: u32, max: u32 },

    /// Cluster name does not follow EKS naming rules.
    #[error("Invalid cluster name '{0}': must start with a letter or digit and contain only letters, digits, '-' and '_' (max 51 characters)")]
    InvalidClusterName(String),

    /// A derived image repository name breaks ECR naming rules.
    #[error("Invalid repository name '{0}': ECR names must be lowercase letters, digits and single '.', '_', '/' or '-' separators")]
    InvalidRepositoryName(String),

    /// Domain name is not a valid apex domain.
    #[error("Invalid domain name '{0}': expected a lowercase domain such as example.com")]
    InvalidDomain(String),

    /// VPC CIDR cannot be parsed or is too small.
    #[error("Invalid network CIDR '{cidr}': {reason}")]
    InvalidNetwork { cidr: String, reason: String },

    /// Two nodes share a name.
    #[error("Duplicate resource name: {0}")]
    DuplicateResource(String),

    /// A node depends on a node that is missing or appears later.
    #[error("Resource '{node}' depends on '{dependency}', which does not appear earlier in the plan")]
    UnorderedDependency { node: String, dependency: String },
}

/// An ordered, validated list of resources.
///
/// Construction checks that names are unique and that every dependency
/// appears earlier, which also rules out cycles. Plans are immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePlan {
    nodes: Vec<ResourceNode>,
}

impl ResourcePlan {
    /// Build a plan from nodes in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateResource`] or
    /// [`ValidationError::UnorderedDependency`] if the ordering invariants do
    /// not hold.
    pub fn new(nodes: Vec<ResourceNode>) -> Result<Self, ValidationError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if let Some(dependency) = node.depends_on.iter().find(|d| !seen.contains(d.as_str())) {
                return Err(ValidationError::UnorderedDependency {
                    node: node.name.clone(),
                    dependency: dependency.clone(),
                });
            }
            if !seen.insert(node.name.as_str()) {
                return Err(ValidationError::DuplicateResource(node.name.clone()));
            }
        }
        Ok(Self { nodes })
    }

    /// Nodes in creation order.
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Look up a node by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Nodes of one kind, in plan order.
    pub fn of_kind(&self, kind: ResourceKind) -> impl DoubleEndedIterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// Chart coordinates of every add-on, in install order.
    pub fn addon_charts(&self) -> impl Iterator<Item = &AddonChart> {
        self.nodes.iter().filter_map(|n| match &n.spec {
            ResourceSpec::Addon(chart) => Some(chart),
            _ => None,
        })
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the plan has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pretty JSON rendering of the plan.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.nodes)
    }
}

/// Validate a config and assemble its resource plan.
///
/// Template order: network, registries, cluster, node group, add-ons, then
/// the optional DNS zone and certificate, dashboard and alarm topic.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the config is invalid. No external call is
/// made either way.
pub fn build_plan(config: &EnvironmentConfig) -> Result<ResourcePlan, ValidationError> {
    validate(config)?;

    let cluster = config.cluster_name.as_str();
    let network = format!("{cluster}-vpc");
    let mut nodes = Vec::new();

    nodes.push(ResourceNode::new(
        &network,
        ResourceSpec::Network {
            cidr_block: config.vpc_cidr.clone(),
            subnet_cidrs: subnet_cidrs(&config.vpc_cidr)?,
        },
    ));

    for repo in &config.repositories {
        let repository = format!("{cluster}-{repo}");
        nodes.push(ResourceNode::new(
            &repository,
            ResourceSpec::Registry {
                repository: repository.clone(),
                scan_on_push: true,
            },
        ));
    }

    nodes.push(
        ResourceNode::new(
            cluster,
            ResourceSpec::Cluster {
                version: config.kubernetes_version.clone(),
                network: network.clone(),
            },
        )
        .depending_on([network.as_str()]),
    );

    nodes.push(
        ResourceNode::new(
            format!("{cluster}-nodes"),
            ResourceSpec::NodeGroup {
                cluster: cluster.to_string(),
                network: network.clone(),
                instance_type: config.node_instance_type.clone(),
                min_size: config.node_min_size,
                max_size: config.node_max_size,
                desired_size: config.node_desired_size,
                capacity: config.capacity_type(),
            },
        )
        .depending_on([cluster]),
    );

    // Fixed order: ingress-nginx needs the load balancer controller running.
    for chart in addon_charts(config) {
        nodes.push(
            ResourceNode::new(format!("{cluster}-{}", chart.release), ResourceSpec::Addon(chart))
                .depending_on([network.as_str(), cluster]),
        );
    }

    if let Some(domain) = &config.domain_name {
        nodes.push(
            ResourceNode::new(
                domain,
                ResourceSpec::DnsZone {
                    domain: domain.clone(),
                },
            )
            .depending_on([network.as_str()]),
        );
        // DNS validation records are written into the zone.
        nodes.push(
            ResourceNode::new(
                format!("{domain}-cert"),
                ResourceSpec::Certificate {
                    domain: domain.clone(),
                },
            )
            .depending_on([network.as_str(), domain.as_str()]),
        );
    }

    if config.enable_monitoring {
        let dashboard = format!("{cluster}-dashboard");
        nodes.push(
            ResourceNode::new(
                &dashboard,
                ResourceSpec::Dashboard {
                    cluster: cluster.to_string(),
                },
            )
            .depending_on([cluster]),
        );

        if config.enable_alarms {
            let topic = format!("{cluster}-alarms");
            nodes.push(
                ResourceNode::new(
                    &topic,
                    ResourceSpec::AlarmTopic {
                        topic: topic.clone(),
                        cluster: cluster.to_string(),
                        email: config.alert_email.clone(),
                    },
                )
                .depending_on([dashboard]),
            );
        }
    } else if config.enable_alarms {
        warn!("Alarms are enabled but monitoring is not; no alarm topic will be created");
    }

    let plan = ResourcePlan::new(nodes)?;
    debug!(cluster = %cluster, nodes = plan.len(), "Assembled resource plan");
    Ok(plan)
}

/// Check every config invariant.
fn validate(config: &EnvironmentConfig) -> Result<(), ValidationError> {
    let required = [
        ("region", &config.region),
        ("cluster_name", &config.cluster_name),
        ("node_instance_type", &config.node_instance_type),
        ("kubernetes_version", &config.kubernetes_version),
        ("vpc_cidr", &config.vpc_cidr),
        ("app_namespace", &config.app_namespace),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField(field));
        }
    }
    if config.repositories.iter().all(|r| r.trim().is_empty()) {
        return Err(ValidationError::MissingRequiredField("repositories"));
    }

    if !REGION_PATTERN.is_match(&config.region) {
        return Err(ValidationError::InvalidRegion(config.region.clone()));
    }

    if !CLUSTER_NAME_PATTERN.is_match(&config.cluster_name) {
        return Err(ValidationError::InvalidClusterName(
            config.cluster_name.clone(),
        ));
    }

    for repo in &config.repositories {
        let repository = format!("{}-{repo}", config.cluster_name);
        if !REPOSITORY_PATTERN.is_match(&repository) {
            return Err(ValidationError::InvalidRepositoryName(repository));
        }
    }

    if let Some(domain) = &config.domain_name {
        if domain.len() > MAX_DOMAIN_LEN || !DOMAIN_PATTERN.is_match(domain) {
            return Err(ValidationError::InvalidDomain(domain.clone()));
        }
    }

    let (min, desired, max) = (
        config.node_min_size,
        config.node_desired_size,
        config.node_max_size,
    );
    if min > desired || desired > max {
        return Err(ValidationError::InvalidSizing { min, desired, max });
    }

    Ok(())
}

/// Split a VPC CIDR into equally sized public subnets, four bits smaller.
fn subnet_cidrs(cidr: &str) -> Result<Vec<String>, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidNetwork {
        cidr: cidr.to_string(),
        reason: reason.to_string(),
    };

    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| invalid("expected <address>/<prefix>"))?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid("not an IPv4 address"))?;
    let prefix: u32 = prefix.parse().map_err(|_| invalid("prefix is not a number"))?;
    if prefix > 24 {
        return Err(invalid("prefix must be /24 or larger"));
    }

    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    let base = u32::from(addr);
    if base & mask != base {
        return Err(invalid("address has host bits set"));
    }

    let subnet_prefix = prefix + 4;
    let step = 1u32 << (32 - subnet_prefix);
    Ok((0..SUBNET_COUNT)
        .map(|i| format!("{}/{subnet_prefix}", Ipv4Addr::from(base + i * step)))
        .collect())
}

/// Helm charts for the cluster add-ons, in install order.
fn addon_charts(config: &EnvironmentConfig) -> Vec<AddonChart> {
    let cluster = config.cluster_name.as_str();
    let region = config.region.as_str();

    let chart = |release: &str,
                 repo_name: &str,
                 repo_url: &str,
                 namespace: &str,
                 values: &[(&str, &str)]| AddonChart {
        release: release.to_string(),
        repo_name: repo_name.to_string(),
        repo_url: repo_url.to_string(),
        chart: format!("{repo_name}/{release}"),
        namespace: namespace.to_string(),
        values: values
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
    };

    let mut external_dns_values = vec![("provider.name", "aws"), ("txtOwnerId", cluster)];
    if let Some(domain) = &config.domain_name {
        external_dns_values.push(("domainFilters[0]", domain.as_str()));
    }

    vec![
        chart(
            "cluster-autoscaler",
            "autoscaler",
            "https://kubernetes.github.io/autoscaler",
            "kube-system",
            &[("autoDiscovery.clusterName", cluster), ("awsRegion", region)],
        ),
        chart(
            "aws-load-balancer-controller",
            "eks",
            "https://aws.github.io/eks-charts",
            "kube-system",
            &[("clusterName", cluster), ("region", region)],
        ),
        chart(
            "external-dns",
            "external-dns",
            "https://kubernetes-sigs.github.io/external-dns/",
            "kube-system",
            &external_dns_values,
        ),
        chart(
            "metrics-server",
            "metrics-server",
            "https://kubernetes-sigs.github.io/metrics-server/",
            "kube-system",
            &[],
        ),
        chart(
            "ingress-nginx",
            "ingress-nginx",
            "https://kubernetes.github.io/ingress-nginx",
            "ingress-nginx",
            &[("controller.service.type", "LoadBalancer")],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EnvironmentConfig {
        EnvironmentConfig::with_defaults("demo".into())
    }

    fn names(plan: &ResourcePlan) -> Vec<&str> {
        plan.nodes().iter().map(|n| n.name.as_str()).collect()
    }

    fn assert_topologically_ordered(plan: &ResourcePlan) {
        for (i, node) in plan.nodes().iter().enumerate() {
            for dependency in &node.depends_on {
                let position = plan
                    .nodes()
                    .iter()
                    .position(|n| &n.name == dependency)
                    .unwrap_or_else(|| panic!("{} depends on unknown {dependency}", node.name));
                assert!(position < i, "{} depends on later node {dependency}", node.name);
            }
        }
    }

    #[test]
    fn test_default_plan_template_order() {
        let plan = build_plan(&config()).unwrap();
        assert_eq!(
            names(&plan),
            vec![
                "demo-vpc",
                "demo-frontend",
                "demo-backend",
                "demo",
                "demo-nodes",
                "demo-cluster-autoscaler",
                "demo-aws-load-balancer-controller",
                "demo-external-dns",
                "demo-metrics-server",
                "demo-ingress-nginx",
                "demo-dashboard",
            ]
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let mut config = config();
        config.domain_name = Some("example.com".into());
        config.enable_alarms = true;

        let first = build_plan(&config).unwrap();
        let second = build_plan(&config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn test_every_flag_combination_is_acyclic() {
        for bits in 0..16u8 {
            let mut config = config();
            config.use_spot_capacity = bits & 1 != 0;
            config.enable_monitoring = bits & 2 != 0;
            config.enable_alarms = bits & 4 != 0;
            config.domain_name = (bits & 8 != 0).then(|| "example.com".to_string());

            let plan = build_plan(&config).unwrap();
            assert_topologically_ordered(&plan);
        }
    }

    #[test]
    fn test_sizing_invariant_grid() {
        for min in 0..=4 {
            for desired in 0..=4 {
                for max in 0..=4 {
                    let mut config = config();
                    config.node_min_size = min;
                    config.node_desired_size = desired;
                    config.node_max_size = max;

                    let result = build_plan(&config);
                    if min <= desired && desired <= max {
                        assert!(result.is_ok(), "{min}/{desired}/{max} should be accepted");
                    } else {
                        assert_eq!(
                            result.unwrap_err(),
                            ValidationError::InvalidSizing { min, desired, max }
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_monitoring_with_alarms_adds_dashboard_and_topic() {
        let mut config = config();
        config.node_min_size = 0;
        config.node_max_size = 3;
        config.node_desired_size = 1;
        config.enable_monitoring = true;
        config.enable_alarms = true;

        let plan = build_plan(&config).unwrap();
        let dashboard = plan.get("demo-dashboard").unwrap();
        let topic = plan.get("demo-alarms").unwrap();

        assert_eq!(dashboard.kind(), ResourceKind::Dashboard);
        assert_eq!(topic.kind(), ResourceKind::AlarmTopic);
        assert!(topic.depends_on.contains("demo-dashboard"));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let mut config = config();
        config.node_min_size = 2;
        config.node_max_size = 1;
        config.node_desired_size = 1;

        assert_eq!(
            build_plan(&config).unwrap_err(),
            ValidationError::InvalidSizing {
                min: 2,
                desired: 1,
                max: 1
            }
        );
    }

    #[test]
    fn test_alarms_without_monitoring_are_ignored() {
        let mut config = config();
        config.enable_monitoring = false;
        config.enable_alarms = true;

        let plan = build_plan(&config).unwrap();
        assert_eq!(plan.of_kind(ResourceKind::Dashboard).count(), 0);
        assert_eq!(plan.of_kind(ResourceKind::AlarmTopic).count(), 0);
    }

    #[test]
    fn test_domain_adds_zone_and_certificate() {
        let mut config = config();
        config.domain_name = Some("example.com".into());

        let plan = build_plan(&config).unwrap();
        let zone = plan.get("example.com").unwrap();
        let cert = plan.get("example.com-cert").unwrap();

        assert_eq!(zone.kind(), ResourceKind::DnsZone);
        assert!(zone.depends_on.contains("demo-vpc"));
        assert!(cert.depends_on.contains("demo-vpc"));
        assert!(cert.depends_on.contains("example.com"));

        let external_dns = plan.get("demo-external-dns").unwrap();
        match &external_dns.spec {
            ResourceSpec::Addon(chart) => {
                assert_eq!(
                    chart.values.get("domainFilters[0]").map(String::as_str),
                    Some("example.com")
                );
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_addons_depend_on_network_and_cluster() {
        let plan = build_plan(&config()).unwrap();
        let releases: Vec<&str> = plan.addon_charts().map(|c| c.release.as_str()).collect();
        assert_eq!(
            releases,
            vec![
                "cluster-autoscaler",
                "aws-load-balancer-controller",
                "external-dns",
                "metrics-server",
                "ingress-nginx"
            ]
        );
        for addon in plan.of_kind(ResourceKind::Addon) {
            assert!(addon.name.starts_with("demo-"));
            assert!(addon.depends_on.contains("demo-vpc"));
            assert!(addon.depends_on.contains("demo"));
        }
    }

    #[test]
    fn test_spot_capacity_flows_into_node_group() {
        let mut config = config();
        config.use_spot_capacity = true;

        let plan = build_plan(&config).unwrap();
        match &plan.get("demo-nodes").unwrap().spec {
            ResourceSpec::NodeGroup { capacity, .. } => {
                assert_eq!(*capacity, envstack_cloud::CapacityType::Spot);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_region_validation() {
        for region in ["us-east-1", "ap-southeast-2", "us-gov-west-1", "eu-central-1"] {
            let mut config = config();
            config.region = region.into();
            assert!(build_plan(&config).is_ok(), "{region} should be valid");
        }
        for region in ["useast1", "US-EAST-1", "us-east", "mars-north-1"] {
            let mut config = config();
            config.region = region.into();
            assert_eq!(
                build_plan(&config).unwrap_err(),
                ValidationError::InvalidRegion(region.into())
            );
        }
    }

    #[test]
    fn test_missing_required_fields() {
        let mut config = config();
        config.region = String::new();
        assert_eq!(
            build_plan(&config).unwrap_err(),
            ValidationError::MissingRequiredField("region")
        );

        let mut config = self::config();
        config.cluster_name = "  ".into();
        assert_eq!(
            build_plan(&config).unwrap_err(),
            ValidationError::MissingRequiredField("cluster_name")
        );

        let mut config = self::config();
        config.repositories.clear();
        assert_eq!(
            build_plan(&config).unwrap_err(),
            ValidationError::MissingRequiredField("repositories")
        );
    }

    #[test]
    fn test_invalid_cluster_name() {
        let mut config = config();
        config.cluster_name = "-demo".into();
        assert!(matches!(
            build_plan(&config),
            Err(ValidationError::InvalidClusterName(_))
        ));
    }

    #[test]
    fn test_cluster_named_after_a_release() {
        for name in ["metrics-server", "external-dns", "ingress-nginx"] {
            let mut config = config();
            config.cluster_name = name.into();

            let plan = build_plan(&config).unwrap();
            assert_eq!(plan.get(name).unwrap().kind(), ResourceKind::Cluster);
            assert_eq!(
                plan.get(&format!("{name}-{name}")).unwrap().kind(),
                ResourceKind::Addon
            );
        }
    }

    #[test]
    fn test_cluster_name_length_fits_derived_names() {
        let mut config = config();
        config.cluster_name = "a".repeat(51);
        let plan = build_plan(&config).unwrap();
        assert!(format!("{}-cluster-role", config.cluster_name).len() <= 64);
        for node in plan.of_kind(ResourceKind::NodeGroup) {
            assert!(node.name.len() <= 63);
        }

        config.cluster_name = "a".repeat(52);
        assert!(matches!(
            build_plan(&config),
            Err(ValidationError::InvalidClusterName(_))
        ));

        config.cluster_name = "a".repeat(100);
        assert!(matches!(
            build_plan(&config),
            Err(ValidationError::InvalidClusterName(_))
        ));
    }

    #[test]
    fn test_uppercase_cluster_breaks_repository_names() {
        let mut config = config();
        config.cluster_name = "Demo".into();
        assert_eq!(
            build_plan(&config).unwrap_err(),
            ValidationError::InvalidRepositoryName("Demo-frontend".into())
        );

        let mut config = self::config();
        config.repositories = vec!["Api".into()];
        assert_eq!(
            build_plan(&config).unwrap_err(),
            ValidationError::InvalidRepositoryName("demo-Api".into())
        );

        let mut config = self::config();
        config.repositories = vec!["team/api".into()];
        assert!(build_plan(&config).is_ok());
    }

    #[test]
    fn test_domain_validation() {
        for domain in ["example.com", "demo.example.co.uk", "a-b.io"] {
            let mut config = config();
            config.domain_name = Some(domain.into());
            assert!(build_plan(&config).is_ok(), "{domain} should be valid");
        }
        for domain in [
            "localhost",
            "Example.com",
            "-bad.com",
            "bad-.com",
            "exa mple.com",
            "example..com",
            "http://example.com",
        ] {
            let mut config = config();
            config.domain_name = Some(domain.into());
            assert_eq!(
                build_plan(&config).unwrap_err(),
                ValidationError::InvalidDomain(domain.into()),
                "{domain} should be rejected"
            );
        }
    }

    #[test]
    fn test_duplicate_repositories_rejected() {
        let mut config = config();
        config.repositories = vec!["api".into(), "api".into()];
        assert_eq!(
            build_plan(&config).unwrap_err(),
            ValidationError::DuplicateResource("demo-api".into())
        );
    }

    #[test]
    fn test_subnet_cidrs() {
        assert_eq!(
            subnet_cidrs("10.0.0.0/16").unwrap(),
            vec!["10.0.0.0/20", "10.0.16.0/20"]
        );
        assert_eq!(
            subnet_cidrs("192.168.4.0/24").unwrap(),
            vec!["192.168.4.0/28", "192.168.4.16/28"]
        );
        assert!(subnet_cidrs("10.0.0.0/25").is_err());
        assert!(subnet_cidrs("10.0.0.1/16").is_err());
        assert!(subnet_cidrs("not-a-cidr").is_err());
    }

    #[test]
    fn test_plan_rejects_forward_dependency() {
        let dashboard = ResourceNode::new(
            "demo-dashboard",
            ResourceSpec::Dashboard {
                cluster: "demo".into(),
            },
        )
        .depending_on(["demo"]);

        assert_eq!(
            ResourcePlan::new(vec![dashboard]).unwrap_err(),
            ValidationError::UnorderedDependency {
                node: "demo-dashboard".into(),
                dependency: "demo".into()
            }
        );
    }
}
