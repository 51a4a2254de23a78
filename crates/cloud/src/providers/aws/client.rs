//! AWS provider backed by the `aws`, `kubectl` and `helm` command line tools.
//!
//! Every call shells out with `--output json`, parses the document with
//! `serde_json`, and maps stderr onto [`CloudProviderError`].

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::models::{
    ClusterResponse, CreateHostedZoneResponse, CreateInternetGatewayResponse,
    CreateRepositoryResponse, CreateRouteTableResponse, CreateSubnetResponse,
    CreateTopicResponse, CreateVpcResponse, DescribeAvailabilityZonesResponse,
    DescribeCertificateResponse, DescribeInternetGatewaysResponse, DescribeRepositoriesResponse,
    DescribeRouteTablesResponse, DescribeSecurityGroupsResponse, DescribeSubnetsResponse,
    DescribeVpcsResponse, HelmRelease, HostedZone, ListCertificatesResponse,
    ListHostedZonesResponse, ListRecordSetsResponse, ListTopicsResponse, NodegroupResponse,
    RequestCertificateResponse, RoleResponse, ValidationRecord,
};
use crate::providers::traits::{CallerIdentity, CloudProvider, CloudProviderError};
use crate::resources::{AddonChart, CapacityType, ResourceNode, ResourceSpec, ResourceStatus};

/// Tag applied to every resource this provider creates.
const CLUSTER_TAG: &str = "envstack:cluster";

/// Tag linking subnets to their network node.
const NETWORK_TAG: &str = "envstack:network";

/// Helm `--timeout` for add-on installs and uninstalls.
const HELM_TIMEOUT: &str = "300s";

/// Attempts made while waiting for ACM to publish validation records.
const VALIDATION_RECORD_ATTEMPTS: u32 = 6;

/// Delay between validation record lookups.
const VALIDATION_RECORD_DELAY_SECS: u64 = 5;

/// Extracts the error code from `An error occurred (Code) when calling ...`.
static AWS_ERROR_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"An error occurred \(([A-Za-z0-9_.]+)\)").expect("error code pattern is valid")
});

/// Managed policies attached to the cluster role.
const CLUSTER_ROLE_POLICIES: &[&str] = &["arn:aws:iam::aws:policy/AmazonEKSClusterPolicy"];

/// Managed policies attached to the node role.
const NODE_ROLE_POLICIES: &[&str] = &[
    "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
    "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
];

/// AWS cloud provider.
#[derive(Debug, Clone)]
pub struct AwsCli {
    /// AWS region.
    region: String,
    /// Name of the EKS cluster this environment is built around.
    cluster_name: String,
    /// Named CLI profile, if not using the default credential chain.
    profile: Option<String>,
    /// Kubeconfig written by `aws eks update-kubeconfig`.
    kubeconfig: PathBuf,
    /// Namespace holding application workloads.
    app_namespace: String,
}

impl AwsCli {
    /// Create a new AWS provider for one cluster.
    ///
    /// # Arguments
    /// * `region` - AWS region (e.g., "us-east-1")
    /// * `cluster_name` - EKS cluster name
    pub fn new(region: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        let cluster_name = cluster_name.into();
        let kubeconfig = std::env::temp_dir().join(format!("envstack-{cluster_name}.kubeconfig"));
        Self {
            region: region.into(),
            cluster_name,
            profile: None,
            kubeconfig,
            app_namespace: "demo-app".to_string(),
        }
    }

    /// Use a named AWS CLI profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the namespace deleted first on teardown.
    #[must_use]
    pub fn with_app_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.app_namespace = namespace.into();
        self
    }

    fn cluster_role_name(&self) -> String {
        format!("{}-cluster-role", self.cluster_name)
    }

    fn node_role_name(&self) -> String {
        format!("{}-node-role", self.cluster_name)
    }

    fn log_group_name(&self) -> String {
        format!("/aws/eks/{}/cluster", self.cluster_name)
    }

    // ========================================================================
    // Command execution
    // ========================================================================

    /// Run a program and return its stdout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, CloudProviderError> {
        debug!(program, args = ?args, "Running command");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| CloudProviderError::CommandFailed {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(classify_error(&stderr))
        }
    }

    /// Run an `aws` subcommand in this provider's region.
    async fn aws(&self, args: &[&str]) -> Result<String, CloudProviderError> {
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--region", self.region.as_str(), "--output", "json"]);
        if let Some(profile) = &self.profile {
            full.extend(["--profile", profile.as_str()]);
        }
        self.run("aws", &full).await
    }

    /// Run an `aws` subcommand and parse its JSON output.
    async fn aws_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, CloudProviderError> {
        let stdout = self.aws(args).await?;
        serde_json::from_str(&stdout).map_err(|e| {
            warn!(error = %e, body = %stdout, "Failed to parse AWS CLI output");
            CloudProviderError::Serialization(e)
        })
    }

    /// Run `helm` against the cluster kubeconfig.
    async fn helm(&self, args: &[&str]) -> Result<String, CloudProviderError> {
        let kubeconfig = self.kubeconfig.to_string_lossy().into_owned();
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--kubeconfig", kubeconfig.as_str()]);
        self.run("helm", &full).await
    }

    /// Run `kubectl` against the cluster kubeconfig.
    async fn kubectl(&self, args: &[&str]) -> Result<String, CloudProviderError> {
        let kubeconfig = self.kubeconfig.to_string_lossy().into_owned();
        let mut full: Vec<&str> = vec!["--kubeconfig", kubeconfig.as_str()];
        full.extend(args);
        self.run("kubectl", &full).await
    }

    /// Write a kubeconfig for the cluster. Fails with `NotFound` once the
    /// cluster is gone.
    async fn update_kubeconfig(&self) -> Result<(), CloudProviderError> {
        let kubeconfig = self.kubeconfig.to_string_lossy().into_owned();
        self.aws(&[
            "eks",
            "update-kubeconfig",
            "--name",
            &self.cluster_name,
            "--kubeconfig",
            &kubeconfig,
        ])
        .await?;
        Ok(())
    }

    // ========================================================================
    // Network
    // ========================================================================

    async fn find_vpc(&self, name: &str) -> Result<Option<String>, CloudProviderError> {
        let filter = format!("Name=tag:Name,Values={name}");
        let response: DescribeVpcsResponse = self
            .aws_json(&["ec2", "describe-vpcs", "--filters", &filter])
            .await?;
        Ok(response.vpcs.into_iter().next().map(|v| v.vpc_id))
    }

    async fn network_subnets(&self, network: &str) -> Result<Vec<String>, CloudProviderError> {
        let filter = format!("Name=tag:{NETWORK_TAG},Values={network}");
        let response: DescribeSubnetsResponse = self
            .aws_json(&["ec2", "describe-subnets", "--filters", &filter])
            .await?;
        let subnets: Vec<String> = response.subnets.into_iter().map(|s| s.subnet_id).collect();
        if subnets.is_empty() {
            return Err(CloudProviderError::Config(format!(
                "No subnets tagged for network {network}"
            )));
        }
        Ok(subnets)
    }

    async fn create_network(
        &self,
        name: &str,
        cidr_block: &str,
        subnet_cidrs: &[String],
    ) -> Result<String, CloudProviderError> {
        info!(network = %name, cidr = %cidr_block, "Creating VPC");

        let vpc_tags = tag_specification("vpc", &[("Name", name), (CLUSTER_TAG, &self.cluster_name)]);
        let vpc: CreateVpcResponse = self
            .aws_json(&[
                "ec2",
                "create-vpc",
                "--cidr-block",
                cidr_block,
                "--tag-specifications",
                &vpc_tags,
            ])
            .await?;
        let vpc_id = vpc.vpc.vpc_id;

        self.aws(&[
            "ec2",
            "modify-vpc-attribute",
            "--vpc-id",
            &vpc_id,
            "--enable-dns-hostnames",
            "Value=true",
        ])
        .await?;

        let igw_tags = tag_specification(
            "internet-gateway",
            &[("Name", name), (CLUSTER_TAG, &self.cluster_name)],
        );
        let igw: CreateInternetGatewayResponse = self
            .aws_json(&[
                "ec2",
                "create-internet-gateway",
                "--tag-specifications",
                &igw_tags,
            ])
            .await?;
        let igw_id = igw.internet_gateway.internet_gateway_id;
        self.aws(&[
            "ec2",
            "attach-internet-gateway",
            "--internet-gateway-id",
            &igw_id,
            "--vpc-id",
            &vpc_id,
        ])
        .await?;

        let rt_tags = tag_specification(
            "route-table",
            &[("Name", name), (CLUSTER_TAG, &self.cluster_name)],
        );
        let route_table: CreateRouteTableResponse = self
            .aws_json(&[
                "ec2",
                "create-route-table",
                "--vpc-id",
                &vpc_id,
                "--tag-specifications",
                &rt_tags,
            ])
            .await?;
        let route_table_id = route_table.route_table.route_table_id;
        self.aws(&[
            "ec2",
            "create-route",
            "--route-table-id",
            &route_table_id,
            "--destination-cidr-block",
            "0.0.0.0/0",
            "--gateway-id",
            &igw_id,
        ])
        .await?;

        let zones: DescribeAvailabilityZonesResponse = self
            .aws_json(&[
                "ec2",
                "describe-availability-zones",
                "--filters",
                "Name=state,Values=available",
            ])
            .await?;
        if zones.availability_zones.is_empty() {
            return Err(CloudProviderError::Config(format!(
                "No availability zones available in {}",
                self.region
            )));
        }

        for (i, cidr) in subnet_cidrs.iter().enumerate() {
            let zone = &zones.availability_zones[i % zones.availability_zones.len()].zone_name;
            let subnet_name = format!("{name}-public-{}", i + 1);
            let subnet_tags = tag_specification(
                "subnet",
                &[
                    ("Name", &subnet_name),
                    (NETWORK_TAG, name),
                    (CLUSTER_TAG, &self.cluster_name),
                    ("kubernetes.io/role/elb", "1"),
                ],
            );
            let subnet: CreateSubnetResponse = self
                .aws_json(&[
                    "ec2",
                    "create-subnet",
                    "--vpc-id",
                    &vpc_id,
                    "--cidr-block",
                    cidr,
                    "--availability-zone",
                    zone,
                    "--tag-specifications",
                    &subnet_tags,
                ])
                .await?;
            let subnet_id = subnet.subnet.subnet_id;
            debug!(subnet = %subnet_id, zone = %zone, cidr = %cidr, "Created subnet");

            self.aws(&[
                "ec2",
                "modify-subnet-attribute",
                "--subnet-id",
                &subnet_id,
                "--map-public-ip-on-launch",
            ])
            .await?;
            self.aws(&[
                "ec2",
                "associate-route-table",
                "--route-table-id",
                &route_table_id,
                "--subnet-id",
                &subnet_id,
            ])
            .await?;
        }

        info!(network = %name, vpc_id = %vpc_id, "VPC created");
        Ok(vpc_id)
    }

    async fn describe_network(&self, name: &str) -> Result<ResourceStatus, CloudProviderError> {
        let filter = format!("Name=tag:Name,Values={name}");
        let response: DescribeVpcsResponse = self
            .aws_json(&["ec2", "describe-vpcs", "--filters", &filter])
            .await?;
        Ok(response
            .vpcs
            .first()
            .map_or(ResourceStatus::Absent, |vpc| vpc_status(&vpc.state)))
    }

    async fn delete_network(&self, name: &str) -> Result<(), CloudProviderError> {
        let vpc_id = self
            .find_vpc(name)
            .await?
            .ok_or_else(|| CloudProviderError::NotFound(format!("VPC {name}")))?;
        let vpc_filter = format!("Name=vpc-id,Values={vpc_id}");

        info!(network = %name, vpc_id = %vpc_id, "Deleting VPC");

        let subnets: DescribeSubnetsResponse = self
            .aws_json(&["ec2", "describe-subnets", "--filters", &vpc_filter])
            .await?;
        for subnet in subnets.subnets {
            self.aws(&["ec2", "delete-subnet", "--subnet-id", &subnet.subnet_id])
                .await?;
        }

        let igw_filter = format!("Name=attachment.vpc-id,Values={vpc_id}");
        let gateways: DescribeInternetGatewaysResponse = self
            .aws_json(&["ec2", "describe-internet-gateways", "--filters", &igw_filter])
            .await?;
        for igw in gateways.internet_gateways {
            self.aws(&[
                "ec2",
                "detach-internet-gateway",
                "--internet-gateway-id",
                &igw.internet_gateway_id,
                "--vpc-id",
                &vpc_id,
            ])
            .await?;
            self.aws(&[
                "ec2",
                "delete-internet-gateway",
                "--internet-gateway-id",
                &igw.internet_gateway_id,
            ])
            .await?;
        }

        let tables: DescribeRouteTablesResponse = self
            .aws_json(&["ec2", "describe-route-tables", "--filters", &vpc_filter])
            .await?;
        for table in tables.route_tables.iter().filter(|t| !t.is_main()) {
            for association in &table.associations {
                if let Some(id) = &association.route_table_association_id {
                    self.aws(&["ec2", "disassociate-route-table", "--association-id", id])
                        .await?;
                }
            }
            self.aws(&[
                "ec2",
                "delete-route-table",
                "--route-table-id",
                &table.route_table_id,
            ])
            .await?;
        }

        // Load balancer controllers can leave security groups behind.
        let groups: DescribeSecurityGroupsResponse = self
            .aws_json(&["ec2", "describe-security-groups", "--filters", &vpc_filter])
            .await?;
        for group in groups.security_groups.iter().filter(|g| g.group_name != "default") {
            if let Err(e) = self
                .aws(&["ec2", "delete-security-group", "--group-id", &group.group_id])
                .await
            {
                warn!(group = %group.group_id, error = %e, "Failed to delete security group");
            }
        }

        self.aws(&["ec2", "delete-vpc", "--vpc-id", &vpc_id]).await?;
        Ok(())
    }

    // ========================================================================
    // EKS
    // ========================================================================

    async fn role_arn(&self, role_name: &str) -> Result<String, CloudProviderError> {
        let response: RoleResponse = self
            .aws_json(&["iam", "get-role", "--role-name", role_name])
            .await?;
        Ok(response.role.arn)
    }

    async fn create_cluster(
        &self,
        name: &str,
        version: &str,
        network: &str,
    ) -> Result<String, CloudProviderError> {
        info!(cluster = %name, version = %version, "Creating EKS cluster");

        let role_arn = self.role_arn(&self.cluster_role_name()).await?;
        let subnets = self.network_subnets(network).await?;
        let vpc_config = format!(
            "subnetIds={},endpointPublicAccess=true,endpointPrivateAccess=true",
            subnets.join(",")
        );
        let logging = r#"{"clusterLogging":[{"types":["api","audit","authenticator"],"enabled":true}]}"#;
        let tags = format!("{CLUSTER_TAG}={}", self.cluster_name);

        let response: ClusterResponse = self
            .aws_json(&[
                "eks",
                "create-cluster",
                "--name",
                name,
                "--kubernetes-version",
                version,
                "--role-arn",
                &role_arn,
                "--resources-vpc-config",
                &vpc_config,
                "--logging",
                logging,
                "--tags",
                &tags,
            ])
            .await?;

        info!(cluster = %response.cluster.name, arn = %response.cluster.arn, "EKS cluster submitted");
        Ok(response.cluster.arn)
    }

    async fn describe_cluster(&self, name: &str) -> Result<ResourceStatus, CloudProviderError> {
        let response: ClusterResponse = self
            .aws_json(&["eks", "describe-cluster", "--name", name])
            .await?;
        Ok(eks_status(&response.cluster.status))
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_node_group(
        &self,
        name: &str,
        cluster: &str,
        network: &str,
        instance_type: &str,
        (min_size, max_size, desired_size): (u32, u32, u32),
        capacity: CapacityType,
    ) -> Result<String, CloudProviderError> {
        info!(
            node_group = %name,
            cluster = %cluster,
            instance_type = %instance_type,
            capacity = capacity.as_eks_str(),
            "Creating node group"
        );

        let node_role = self.role_arn(&self.node_role_name()).await?;
        let subnets = self.network_subnets(network).await?;
        let scaling =
            format!("minSize={min_size},maxSize={max_size},desiredSize={desired_size}");
        let tags = format!(
            "{CLUSTER_TAG}={cluster},k8s.io/cluster-autoscaler/enabled=true,k8s.io/cluster-autoscaler/{cluster}=owned"
        );

        let mut args: Vec<&str> = vec![
            "eks",
            "create-nodegroup",
            "--cluster-name",
            cluster,
            "--nodegroup-name",
            name,
            "--scaling-config",
            &scaling,
            "--instance-types",
            instance_type,
            "--capacity-type",
            capacity.as_eks_str(),
            "--node-role",
            &node_role,
            "--tags",
            &tags,
            "--subnets",
        ];
        args.extend(subnets.iter().map(String::as_str));

        let response: NodegroupResponse = self.aws_json(&args).await?;
        Ok(response.nodegroup.nodegroup_arn)
    }

    async fn describe_node_group(
        &self,
        name: &str,
        cluster: &str,
    ) -> Result<ResourceStatus, CloudProviderError> {
        let response: NodegroupResponse = self
            .aws_json(&[
                "eks",
                "describe-nodegroup",
                "--cluster-name",
                cluster,
                "--nodegroup-name",
                name,
            ])
            .await?;
        Ok(eks_status(&response.nodegroup.status))
    }

    // ========================================================================
    // Add-ons (Helm)
    // ========================================================================

    async fn install_addon(&self, chart: &AddonChart) -> Result<String, CloudProviderError> {
        info!(release = %chart.release, chart = %chart.chart, namespace = %chart.namespace, "Installing add-on");

        self.update_kubeconfig().await?;

        let values: Vec<String> = chart.values.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut args: Vec<&str> = vec![
            "upgrade",
            "--install",
            &chart.release,
            &chart.chart,
            "--namespace",
            &chart.namespace,
            "--create-namespace",
            "--wait",
            "--timeout",
            HELM_TIMEOUT,
        ];
        for value in &values {
            args.extend(["--set", value.as_str()]);
        }
        self.helm(&args).await?;

        Ok(format!("{}/{}", chart.namespace, chart.release))
    }

    async fn describe_addon(&self, chart: &AddonChart) -> Result<ResourceStatus, CloudProviderError> {
        // A release cannot outlive its cluster.
        match self.update_kubeconfig().await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(ResourceStatus::Absent),
            Err(e) => return Err(e),
        }

        let stdout = self
            .helm(&["status", &chart.release, "--namespace", &chart.namespace, "-o", "json"])
            .await?;
        let release: HelmRelease = serde_json::from_str(&stdout)?;
        debug!(release = %release.name, status = %release.info.status, "Helm release status");
        Ok(helm_status(&release.info.status))
    }

    async fn uninstall_addon(&self, chart: &AddonChart) -> Result<(), CloudProviderError> {
        self.update_kubeconfig().await?;
        self.helm(&[
            "uninstall",
            &chart.release,
            "--namespace",
            &chart.namespace,
            "--wait",
            "--timeout",
            HELM_TIMEOUT,
        ])
        .await?;
        Ok(())
    }

    // ========================================================================
    // DNS and certificates
    // ========================================================================

    async fn find_hosted_zone(&self, domain: &str) -> Result<Option<HostedZone>, CloudProviderError> {
        let response: ListHostedZonesResponse = self
            .aws_json(&[
                "route53",
                "list-hosted-zones-by-name",
                "--dns-name",
                domain,
                "--max-items",
                "1",
            ])
            .await?;
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        Ok(response.hosted_zones.into_iter().find(|z| z.name == fqdn))
    }

    async fn create_hosted_zone(&self, domain: &str) -> Result<String, CloudProviderError> {
        info!(domain = %domain, "Creating hosted zone");
        let caller_reference = format!(
            "envstack-{}-{}",
            self.cluster_name,
            chrono::Utc::now().timestamp()
        );
        let response: CreateHostedZoneResponse = self
            .aws_json(&[
                "route53",
                "create-hosted-zone",
                "--name",
                domain,
                "--caller-reference",
                &caller_reference,
            ])
            .await?;
        Ok(response.hosted_zone.id)
    }

    async fn delete_hosted_zone(&self, domain: &str) -> Result<(), CloudProviderError> {
        let zone = self
            .find_hosted_zone(domain)
            .await?
            .ok_or_else(|| CloudProviderError::NotFound(format!("hosted zone {domain}")))?;

        let records: ListRecordSetsResponse = self
            .aws_json(&[
                "route53",
                "list-resource-record-sets",
                "--hosted-zone-id",
                &zone.id,
            ])
            .await?;
        if let Some(batch) = deletion_change_batch(&records.resource_record_sets) {
            self.aws(&[
                "route53",
                "change-resource-record-sets",
                "--hosted-zone-id",
                &zone.id,
                "--change-batch",
                &batch,
            ])
            .await?;
        }

        info!(domain = %domain, zone = %zone.id, "Deleting hosted zone");
        self.aws(&["route53", "delete-hosted-zone", "--id", &zone.id])
            .await?;
        Ok(())
    }

    async fn find_certificate(&self, domain: &str) -> Result<Option<String>, CloudProviderError> {
        let response: ListCertificatesResponse = self
            .aws_json(&[
                "acm",
                "list-certificates",
                "--certificate-statuses",
                "PENDING_VALIDATION",
                "ISSUED",
                "INACTIVE",
                "EXPIRED",
                "VALIDATION_TIMED_OUT",
                "REVOKED",
                "FAILED",
            ])
            .await?;
        Ok(response
            .certificate_summary_list
            .into_iter()
            .find(|c| c.domain_name == domain)
            .map(|c| c.certificate_arn))
    }

    async fn request_certificate(&self, domain: &str) -> Result<String, CloudProviderError> {
        info!(domain = %domain, "Requesting certificate");

        let wildcard = format!("*.{domain}");
        let tags = format!("Key={CLUSTER_TAG},Value={}", self.cluster_name);
        let response: RequestCertificateResponse = self
            .aws_json(&[
                "acm",
                "request-certificate",
                "--domain-name",
                domain,
                "--subject-alternative-names",
                &wildcard,
                "--validation-method",
                "DNS",
                "--tags",
                &tags,
            ])
            .await?;
        let arn = response.certificate_arn;

        match self.validation_records(&arn).await? {
            Some(records) => self.publish_validation_records(domain, &records).await?,
            None => warn!(
                certificate = %arn,
                "Validation records not published yet; certificate will stay pending"
            ),
        }

        Ok(arn)
    }

    /// ACM publishes validation records a few seconds after the request.
    async fn validation_records(
        &self,
        arn: &str,
    ) -> Result<Option<Vec<ValidationRecord>>, CloudProviderError> {
        for attempt in 1..=VALIDATION_RECORD_ATTEMPTS {
            let response: DescribeCertificateResponse = self
                .aws_json(&["acm", "describe-certificate", "--certificate-arn", arn])
                .await?;
            let mut records: Vec<ValidationRecord> = response
                .certificate
                .domain_validation_options
                .into_iter()
                .filter_map(|o| o.resource_record)
                .collect();
            records.dedup();
            if !records.is_empty() {
                return Ok(Some(records));
            }
            debug!(certificate = %arn, attempt, "Waiting for validation records");
            tokio::time::sleep(Duration::from_secs(VALIDATION_RECORD_DELAY_SECS)).await;
        }
        Ok(None)
    }

    async fn publish_validation_records(
        &self,
        domain: &str,
        records: &[ValidationRecord],
    ) -> Result<(), CloudProviderError> {
        let zone = self
            .find_hosted_zone(domain)
            .await?
            .ok_or_else(|| CloudProviderError::NotFound(format!("hosted zone {domain}")))?;
        let batch = validation_change_batch(records);
        self.aws(&[
            "route53",
            "change-resource-record-sets",
            "--hosted-zone-id",
            &zone.id,
            "--change-batch",
            &batch,
        ])
        .await?;
        info!(domain = %domain, records = records.len(), "Published certificate validation records");
        Ok(())
    }

    async fn describe_certificate(&self, domain: &str) -> Result<ResourceStatus, CloudProviderError> {
        let Some(arn) = self.find_certificate(domain).await? else {
            return Ok(ResourceStatus::Absent);
        };
        let response: DescribeCertificateResponse = self
            .aws_json(&["acm", "describe-certificate", "--certificate-arn", &arn])
            .await?;
        Ok(acm_status(&response.certificate.status))
    }

    // ========================================================================
    // Monitoring
    // ========================================================================

    async fn find_topic(&self, topic: &str) -> Result<Option<String>, CloudProviderError> {
        let response: ListTopicsResponse = self.aws_json(&["sns", "list-topics"]).await?;
        let suffix = format!(":{topic}");
        Ok(response
            .topics
            .into_iter()
            .map(|t| t.topic_arn)
            .find(|arn| arn.ends_with(&suffix)))
    }

    async fn create_alarm_topic(
        &self,
        topic: &str,
        cluster: &str,
        email: Option<&str>,
    ) -> Result<String, CloudProviderError> {
        info!(topic = %topic, "Creating alarm topic");

        let tags = format!("Key={CLUSTER_TAG},Value={cluster}");
        let response: CreateTopicResponse = self
            .aws_json(&["sns", "create-topic", "--name", topic, "--tags", &tags])
            .await?;
        let arn = response.topic_arn;

        if let Some(email) = email {
            self.aws(&[
                "sns",
                "subscribe",
                "--topic-arn",
                &arn,
                "--protocol",
                "email",
                "--notification-endpoint",
                email,
            ])
            .await?;
            info!(topic = %topic, email = %email, "Subscribed alert email (confirmation required)");
        }

        let alarm_name = cpu_alarm_name(cluster);
        let dimensions = format!("Name=ClusterName,Value={cluster}");
        self.aws(&[
            "cloudwatch",
            "put-metric-alarm",
            "--alarm-name",
            &alarm_name,
            "--namespace",
            "ContainerInsights",
            "--metric-name",
            "node_cpu_utilization",
            "--dimensions",
            &dimensions,
            "--statistic",
            "Average",
            "--period",
            "300",
            "--evaluation-periods",
            "2",
            "--threshold",
            "80",
            "--comparison-operator",
            "GreaterThanThreshold",
            "--treat-missing-data",
            "notBreaching",
            "--alarm-actions",
            &arn,
        ])
        .await?;

        Ok(arn)
    }

    async fn delete_alarm_topic(&self, topic: &str, cluster: &str) -> Result<(), CloudProviderError> {
        let alarm_name = cpu_alarm_name(cluster);
        self.aws(&["cloudwatch", "delete-alarms", "--alarm-names", &alarm_name])
            .await?;

        let arn = self
            .find_topic(topic)
            .await?
            .ok_or_else(|| CloudProviderError::NotFound(format!("topic {topic}")))?;
        self.aws(&["sns", "delete-topic", "--topic-arn", &arn]).await?;
        Ok(())
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    async fn role_exists(&self, role_name: &str) -> Result<bool, CloudProviderError> {
        match self.role_arn(role_name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn ensure_role(
        &self,
        role_name: &str,
        service: &str,
        policies: &[&str],
    ) -> Result<(), CloudProviderError> {
        if self.role_exists(role_name).await? {
            info!(role = %role_name, "IAM role already exists, skipping");
            return Ok(());
        }

        info!(role = %role_name, service = %service, "Creating IAM role");
        let trust_policy = assume_role_policy(service);
        let tags = format!("Key={CLUSTER_TAG},Value={}", self.cluster_name);
        self.aws(&[
            "iam",
            "create-role",
            "--role-name",
            role_name,
            "--assume-role-policy-document",
            &trust_policy,
            "--tags",
            &tags,
        ])
        .await?;

        for policy in policies {
            self.aws(&[
                "iam",
                "attach-role-policy",
                "--role-name",
                role_name,
                "--policy-arn",
                policy,
            ])
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for AwsCli {
    async fn verify_credentials(&self) -> Result<CallerIdentity, CloudProviderError> {
        let identity: CallerIdentity = self.aws_json(&["sts", "get-caller-identity"]).await?;
        info!(account = %identity.account, arn = %identity.arn, "Resolved AWS identity");
        Ok(identity)
    }

    async fn add_chart_repository(&self, chart: &AddonChart) -> Result<(), CloudProviderError> {
        self.run("helm", &["repo", "add", &chart.repo_name, &chart.repo_url])
            .await?;
        Ok(())
    }

    async fn update_chart_repositories(&self) -> Result<(), CloudProviderError> {
        self.run("helm", &["repo", "update"]).await?;
        Ok(())
    }

    async fn is_bootstrapped(&self) -> Result<bool, CloudProviderError> {
        Ok(self.role_exists(&self.cluster_role_name()).await?
            && self.role_exists(&self.node_role_name()).await?)
    }

    async fn bootstrap(&self) -> Result<(), CloudProviderError> {
        self.ensure_role(
            &self.cluster_role_name(),
            "eks.amazonaws.com",
            CLUSTER_ROLE_POLICIES,
        )
        .await?;
        self.ensure_role(&self.node_role_name(), "ec2.amazonaws.com", NODE_ROLE_POLICIES)
            .await
    }

    async fn create(&self, node: &ResourceNode) -> Result<String, CloudProviderError> {
        match &node.spec {
            ResourceSpec::Network {
                cidr_block,
                subnet_cidrs,
            } => self.create_network(&node.name, cidr_block, subnet_cidrs).await,
            ResourceSpec::Registry {
                repository,
                scan_on_push,
            } => {
                info!(repository = %repository, "Creating ECR repository");
                let scanning = format!("scanOnPush={scan_on_push}");
                let tags = format!("Key={CLUSTER_TAG},Value={}", self.cluster_name);
                let response: CreateRepositoryResponse = self
                    .aws_json(&[
                        "ecr",
                        "create-repository",
                        "--repository-name",
                        repository,
                        "--image-scanning-configuration",
                        &scanning,
                        "--tags",
                        &tags,
                    ])
                    .await?;
                Ok(response.repository.repository_uri)
            }
            ResourceSpec::Cluster { version, network } => {
                self.create_cluster(&node.name, version, network).await
            }
            ResourceSpec::NodeGroup {
                cluster,
                network,
                instance_type,
                min_size,
                max_size,
                desired_size,
                capacity,
            } => {
                self.create_node_group(
                    &node.name,
                    cluster,
                    network,
                    instance_type,
                    (*min_size, *max_size, *desired_size),
                    *capacity,
                )
                .await
            }
            ResourceSpec::Addon(chart) => self.install_addon(chart).await,
            ResourceSpec::DnsZone { domain } => self.create_hosted_zone(domain).await,
            ResourceSpec::Certificate { domain } => self.request_certificate(domain).await,
            ResourceSpec::Dashboard { cluster } => {
                info!(dashboard = %node.name, "Creating CloudWatch dashboard");
                let body = dashboard_body(cluster, &self.region);
                self.aws(&[
                    "cloudwatch",
                    "put-dashboard",
                    "--dashboard-name",
                    &node.name,
                    "--dashboard-body",
                    &body,
                ])
                .await?;
                Ok(node.name.clone())
            }
            ResourceSpec::AlarmTopic {
                topic,
                cluster,
                email,
            } => {
                self.create_alarm_topic(topic, cluster, email.as_deref())
                    .await
            }
        }
    }

    async fn describe(&self, node: &ResourceNode) -> Result<ResourceStatus, CloudProviderError> {
        let result = match &node.spec {
            ResourceSpec::Network { .. } => self.describe_network(&node.name).await,
            ResourceSpec::Registry { repository, .. } => self
                .aws_json::<DescribeRepositoriesResponse>(&[
                    "ecr",
                    "describe-repositories",
                    "--repository-names",
                    repository,
                ])
                .await
                .map(|r| {
                    if r.repositories.iter().any(|repo| &repo.repository_name == repository) {
                        ResourceStatus::Active
                    } else {
                        ResourceStatus::Absent
                    }
                }),
            ResourceSpec::Cluster { .. } => self.describe_cluster(&node.name).await,
            ResourceSpec::NodeGroup { cluster, .. } => {
                self.describe_node_group(&node.name, cluster).await
            }
            ResourceSpec::Addon(chart) => self.describe_addon(chart).await,
            ResourceSpec::DnsZone { domain } => self
                .find_hosted_zone(domain)
                .await
                .map(|zone| zone.map_or(ResourceStatus::Absent, |_| ResourceStatus::Active)),
            ResourceSpec::Certificate { domain } => self.describe_certificate(domain).await,
            ResourceSpec::Dashboard { .. } => self
                .aws(&["cloudwatch", "get-dashboard", "--dashboard-name", &node.name])
                .await
                .map(|_| ResourceStatus::Active),
            ResourceSpec::AlarmTopic { topic, .. } => self
                .find_topic(topic)
                .await
                .map(|arn| arn.map_or(ResourceStatus::Absent, |_| ResourceStatus::Active)),
        };

        match result {
            Err(e) if e.is_not_found() => Ok(ResourceStatus::Absent),
            other => other,
        }
    }

    async fn delete(&self, node: &ResourceNode) -> Result<(), CloudProviderError> {
        info!(resource = %node.name, kind = %node.kind(), "Deleting resource");
        match &node.spec {
            ResourceSpec::Network { .. } => self.delete_network(&node.name).await,
            ResourceSpec::Registry { repository, .. } => {
                // --force removes the images too.
                self.aws(&[
                    "ecr",
                    "delete-repository",
                    "--repository-name",
                    repository,
                    "--force",
                ])
                .await
                .map(|_| ())
            }
            ResourceSpec::Cluster { .. } => self
                .aws(&["eks", "delete-cluster", "--name", &node.name])
                .await
                .map(|_| ()),
            ResourceSpec::NodeGroup { cluster, .. } => self
                .aws(&[
                    "eks",
                    "delete-nodegroup",
                    "--cluster-name",
                    cluster,
                    "--nodegroup-name",
                    &node.name,
                ])
                .await
                .map(|_| ()),
            ResourceSpec::Addon(chart) => self.uninstall_addon(chart).await,
            ResourceSpec::DnsZone { domain } => self.delete_hosted_zone(domain).await,
            ResourceSpec::Certificate { domain } => {
                let arn = self
                    .find_certificate(domain)
                    .await?
                    .ok_or_else(|| CloudProviderError::NotFound(format!("certificate {domain}")))?;
                self.aws(&["acm", "delete-certificate", "--certificate-arn", &arn])
                    .await
                    .map(|_| ())
            }
            ResourceSpec::Dashboard { .. } => self
                .aws(&["cloudwatch", "delete-dashboards", "--dashboard-names", &node.name])
                .await
                .map(|_| ()),
            ResourceSpec::AlarmTopic { topic, cluster, .. } => {
                self.delete_alarm_topic(topic, cluster).await
            }
        }
    }

    async fn delete_workloads(&self) -> Result<(), CloudProviderError> {
        self.update_kubeconfig().await?;

        info!(namespace = %self.app_namespace, "Deleting application workloads");
        let timeout = format!("--timeout={HELM_TIMEOUT}");
        self.kubectl(&[
            "delete",
            "ingress",
            "--all",
            "--all-namespaces",
            "--ignore-not-found",
            "--wait=true",
            &timeout,
        ])
        .await?;
        self.kubectl(&[
            "delete",
            "namespace",
            &self.app_namespace,
            "--ignore-not-found",
            "--wait=true",
            &timeout,
        ])
        .await?;
        Ok(())
    }

    async fn delete_log_groups(&self) -> Result<(), CloudProviderError> {
        let log_group = self.log_group_name();
        info!(log_group = %log_group, "Deleting log group");
        self.aws(&["logs", "delete-log-group", "--log-group-name", &log_group])
            .await?;
        Ok(())
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

/// Map CLI stderr onto a provider error.
#[must_use]
pub fn classify_error(stderr: &str) -> CloudProviderError {
    let message = stderr.trim().to_string();
    let lower = message.to_lowercase();

    let code = AWS_ERROR_CODE
        .captures(&message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let not_found = code.as_deref().is_some_and(|c| {
        c.contains("NotFound") || c.starts_with("NoSuch") || c == "ResourceNotFound"
    }) || lower.contains("not found")
        || lower.contains("does not exist");
    if not_found {
        return CloudProviderError::NotFound(message);
    }

    let auth = code.as_deref().is_some_and(|c| {
        matches!(
            c,
            "ExpiredToken"
                | "ExpiredTokenException"
                | "InvalidClientTokenId"
                | "UnrecognizedClientException"
                | "SignatureDoesNotMatch"
                | "AccessDenied"
                | "AccessDeniedException"
        )
    }) || lower.contains("unable to locate credentials");
    if auth {
        return CloudProviderError::Auth(message);
    }

    if lower.contains("could not connect to the endpoint url")
        || lower.contains("connect timeout")
        || lower.contains("name resolution")
    {
        return CloudProviderError::Unreachable(message);
    }

    CloudProviderError::Api {
        code: code.unwrap_or_else(|| "Unknown".to_string()),
        message,
    }
}

/// Map an EC2 VPC state.
#[must_use]
pub fn vpc_status(state: &str) -> ResourceStatus {
    match state {
        "available" => ResourceStatus::Active,
        _ => ResourceStatus::InProgress,
    }
}

/// Map an EKS cluster or node group status.
#[must_use]
pub fn eks_status(status: &str) -> ResourceStatus {
    match status {
        "ACTIVE" | "UPDATING" => ResourceStatus::Active,
        "CREATING" | "DELETING" | "PENDING" => ResourceStatus::InProgress,
        "FAILED" | "CREATE_FAILED" | "DELETE_FAILED" | "DEGRADED" => ResourceStatus::Failed,
        _ => ResourceStatus::Pending,
    }
}

/// Map a Helm release status.
#[must_use]
pub fn helm_status(status: &str) -> ResourceStatus {
    match status {
        "deployed" | "superseded" => ResourceStatus::Active,
        "failed" => ResourceStatus::Failed,
        "uninstalled" => ResourceStatus::Absent,
        _ => ResourceStatus::InProgress,
    }
}

/// Map an ACM certificate status.
#[must_use]
pub fn acm_status(status: &str) -> ResourceStatus {
    match status {
        "ISSUED" => ResourceStatus::Active,
        "PENDING_VALIDATION" => ResourceStatus::InProgress,
        _ => ResourceStatus::Failed,
    }
}

/// Build an EC2 `--tag-specifications` shorthand value.
#[must_use]
pub fn tag_specification(resource_type: &str, tags: &[(&str, &str)]) -> String {
    let tags: Vec<String> = tags
        .iter()
        .map(|(k, v)| format!("{{Key={k},Value={v}}}"))
        .collect();
    format!("ResourceType={resource_type},Tags=[{}]", tags.join(","))
}

/// Name of the node CPU alarm for a cluster.
#[must_use]
pub fn cpu_alarm_name(cluster: &str) -> String {
    format!("{cluster}-node-cpu-high")
}

/// Trust policy letting an AWS service assume a role.
#[must_use]
pub fn assume_role_policy(service: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole"
        }]
    })
    .to_string()
}

/// CloudWatch dashboard body for a cluster.
#[must_use]
pub fn dashboard_body(cluster: &str, region: &str) -> String {
    let widget = |title: &str, metric: &str, x: u32| {
        serde_json::json!({
            "type": "metric",
            "x": x,
            "y": 0,
            "width": 12,
            "height": 6,
            "properties": {
                "title": title,
                "region": region,
                "stat": "Average",
                "period": 300,
                "metrics": [["ContainerInsights", metric, "ClusterName", cluster]]
            }
        })
    };
    serde_json::json!({
        "widgets": [
            widget("Node CPU utilization", "node_cpu_utilization", 0),
            widget("Node memory utilization", "node_memory_utilization", 12),
        ]
    })
    .to_string()
}

/// `UPSERT` change batch for ACM validation records.
#[must_use]
pub fn validation_change_batch(records: &[ValidationRecord]) -> String {
    let changes: Vec<serde_json::Value> = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "Action": "UPSERT",
                "ResourceRecordSet": {
                    "Name": r.name,
                    "Type": r.record_type,
                    "TTL": 300,
                    "ResourceRecords": [{ "Value": r.value }]
                }
            })
        })
        .collect();
    serde_json::json!({ "Changes": changes }).to_string()
}

/// `DELETE` change batch for every record set except the zone's own NS and
/// SOA. Returns `None` when there is nothing to delete.
#[must_use]
pub fn deletion_change_batch(record_sets: &[serde_json::Value]) -> Option<String> {
    let changes: Vec<serde_json::Value> = record_sets
        .iter()
        .filter(|r| {
            !matches!(
                r.get("Type").and_then(serde_json::Value::as_str),
                Some("NS" | "SOA")
            )
        })
        .map(|r| serde_json::json!({ "Action": "DELETE", "ResourceRecordSet": r }))
        .collect();
    if changes.is_empty() {
        None
    } else {
        Some(serde_json::json!({ "Changes": changes }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_error(
            "An error occurred (ResourceNotFoundException) when calling the DescribeCluster operation: No cluster found for name: demo.",
        );
        assert!(err.is_not_found());

        let err = classify_error(
            "An error occurred (RepositoryNotFoundException) when calling the DescribeRepositories operation",
        );
        assert!(err.is_not_found());

        let err = classify_error("Error: release: not found");
        assert!(err.is_not_found());

        let err = classify_error(
            "An error occurred (NoSuchEntity) when calling the GetRole operation: The role with name demo-cluster-role cannot be found.",
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_classify_auth_and_connectivity() {
        assert!(matches!(
            classify_error("Unable to locate credentials. You can configure credentials by running \"aws configure\"."),
            CloudProviderError::Auth(_)
        ));
        assert!(matches!(
            classify_error("An error occurred (ExpiredToken) when calling the GetCallerIdentity operation: The security token included in the request is expired"),
            CloudProviderError::Auth(_)
        ));
        assert!(matches!(
            classify_error("Could not connect to the endpoint URL: \"https://sts.us-east-1.amazonaws.com/\""),
            CloudProviderError::Unreachable(_)
        ));
    }

    #[test]
    fn test_classify_api_error_keeps_code() {
        let err = classify_error(
            "An error occurred (ResourceInUseException) when calling the CreateCluster operation: Cluster already exists with name: demo",
        );
        match err {
            CloudProviderError::Api { code, message } => {
                assert_eq!(code, "ResourceInUseException");
                assert!(message.contains("already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_mappings() {
        assert_eq!(vpc_status("available"), ResourceStatus::Active);
        assert_eq!(vpc_status("pending"), ResourceStatus::InProgress);

        assert_eq!(eks_status("ACTIVE"), ResourceStatus::Active);
        assert_eq!(eks_status("CREATING"), ResourceStatus::InProgress);
        assert_eq!(eks_status("CREATE_FAILED"), ResourceStatus::Failed);

        assert_eq!(helm_status("deployed"), ResourceStatus::Active);
        assert_eq!(helm_status("pending-install"), ResourceStatus::InProgress);
        assert_eq!(helm_status("failed"), ResourceStatus::Failed);

        assert_eq!(acm_status("ISSUED"), ResourceStatus::Active);
        assert_eq!(acm_status("PENDING_VALIDATION"), ResourceStatus::InProgress);
        assert_eq!(acm_status("VALIDATION_TIMED_OUT"), ResourceStatus::Failed);
    }

    #[test]
    fn test_tag_specification_shorthand() {
        let spec = tag_specification("vpc", &[("Name", "demo-vpc"), (CLUSTER_TAG, "demo")]);
        assert_eq!(
            spec,
            "ResourceType=vpc,Tags=[{Key=Name,Value=demo-vpc},{Key=envstack:cluster,Value=demo}]"
        );
    }

    #[test]
    fn test_deletion_change_batch_skips_ns_and_soa() {
        let records = vec![
            serde_json::json!({"Name": "example.com.", "Type": "NS", "TTL": 172_800}),
            serde_json::json!({"Name": "example.com.", "Type": "SOA", "TTL": 900}),
            serde_json::json!({"Name": "_abc.example.com.", "Type": "CNAME", "TTL": 300}),
        ];
        let batch = deletion_change_batch(&records).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&batch).unwrap();
        let changes = parsed["Changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["ResourceRecordSet"]["Type"], "CNAME");

        assert!(deletion_change_batch(&records[..2]).is_none());
    }

    #[test]
    fn test_validation_change_batch() {
        let records = vec![ValidationRecord {
            name: "_x1.example.com.".into(),
            record_type: "CNAME".into(),
            value: "_y1.acm-validations.aws.".into(),
        }];
        let parsed: serde_json::Value =
            serde_json::from_str(&validation_change_batch(&records)).unwrap();
        assert_eq!(parsed["Changes"][0]["Action"], "UPSERT");
        assert_eq!(
            parsed["Changes"][0]["ResourceRecordSet"]["ResourceRecords"][0]["Value"],
            "_y1.acm-validations.aws."
        );
    }

    #[test]
    fn test_dashboard_body_targets_cluster() {
        let parsed: serde_json::Value =
            serde_json::from_str(&dashboard_body("demo", "eu-west-1")).unwrap();
        let widgets = parsed["widgets"].as_array().unwrap();
        assert_eq!(widgets.len(), 2);
        assert_eq!(widgets[0]["properties"]["region"], "eu-west-1");
        assert_eq!(widgets[0]["properties"]["metrics"][0][3], "demo");
    }

    #[test]
    fn test_role_names_derive_from_cluster() {
        let aws = AwsCli::new("us-east-1", "demo");
        assert_eq!(aws.cluster_role_name(), "demo-cluster-role");
        assert_eq!(aws.node_role_name(), "demo-node-role");
        assert_eq!(aws.log_group_name(), "/aws/eks/demo/cluster");
        assert!(aws.kubeconfig.ends_with("envstack-demo.kubeconfig"));
    }

    #[test]
    fn test_assume_role_policy_names_service() {
        let parsed: serde_json::Value =
            serde_json::from_str(&assume_role_policy("eks.amazonaws.com")).unwrap();
        assert_eq!(
            parsed["Statement"][0]["Principal"]["Service"],
            "eks.amazonaws.com"
        );
    }
}
