//! AWS CLI response models.
//!
//! Only the fields the provider reads are modelled; everything else in the
//! `--output json` documents is ignored.

use serde::Deserialize;

// ============================================================================
// EC2 (networking) types
// ============================================================================

/// VPC information.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vpc {
    /// VPC ID.
    pub vpc_id: String,
    /// VPC state (`pending` or `available`).
    pub state: String,
}

/// `ec2 create-vpc` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVpcResponse {
    pub vpc: Vpc,
}

/// `ec2 describe-vpcs` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeVpcsResponse {
    #[serde(default)]
    pub vpcs: Vec<Vpc>,
}

/// Internet gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InternetGateway {
    pub internet_gateway_id: String,
}

/// `ec2 create-internet-gateway` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateInternetGatewayResponse {
    pub internet_gateway: InternetGateway,
}

/// `ec2 describe-internet-gateways` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInternetGatewaysResponse {
    #[serde(default)]
    pub internet_gateways: Vec<InternetGateway>,
}

/// Route table association.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteTableAssociation {
    pub route_table_association_id: Option<String>,
    /// Whether this is the VPC's main route table association.
    #[serde(default)]
    pub main: bool,
}

/// Route table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteTable {
    pub route_table_id: String,
    #[serde(default)]
    pub associations: Vec<RouteTableAssociation>,
}

impl RouteTable {
    /// Whether this is the VPC's main route table (deleted with the VPC).
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.associations.iter().any(|a| a.main)
    }
}

/// `ec2 create-route-table` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRouteTableResponse {
    pub route_table: RouteTable,
}

/// `ec2 describe-route-tables` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeRouteTablesResponse {
    #[serde(default)]
    pub route_tables: Vec<RouteTable>,
}

/// Availability zone.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AvailabilityZone {
    pub zone_name: String,
}

/// `ec2 describe-availability-zones` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeAvailabilityZonesResponse {
    #[serde(default)]
    pub availability_zones: Vec<AvailabilityZone>,
}

/// Subnet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subnet {
    pub subnet_id: String,
    pub availability_zone: Option<String>,
}

/// `ec2 create-subnet` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSubnetResponse {
    pub subnet: Subnet,
}

/// `ec2 describe-subnets` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSubnetsResponse {
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

/// Security group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
}

/// `ec2 describe-security-groups` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupsResponse {
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
}

// ============================================================================
// ECR types
// ============================================================================

/// ECR repository.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub repository_name: String,
    pub repository_uri: String,
}

/// `ecr create-repository` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRepositoryResponse {
    pub repository: Repository,
}

/// `ecr describe-repositories` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DescribeRepositoriesResponse {
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

// ============================================================================
// EKS types
// ============================================================================

/// EKS cluster information.
#[derive(Debug, Clone, Deserialize)]
pub struct EksCluster {
    /// Cluster name.
    pub name: String,
    /// Cluster ARN.
    pub arn: String,
    /// Cluster status (`CREATING`, `ACTIVE`, ...).
    pub status: String,
}

/// `eks create-cluster` / `eks describe-cluster` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterResponse {
    pub cluster: EksCluster,
}

/// EKS node group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EksNodegroup {
    pub nodegroup_name: String,
    pub nodegroup_arn: String,
    pub status: String,
}

/// `eks create-nodegroup` / `eks describe-nodegroup` response.
#[derive(Debug, Clone, Deserialize)]
pub struct NodegroupResponse {
    pub nodegroup: EksNodegroup,
}

// ============================================================================
// IAM / STS types
// ============================================================================

/// IAM role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamRole {
    pub role_name: String,
    pub arn: String,
}

/// `iam get-role` / `iam create-role` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleResponse {
    pub role: IamRole,
}

// ============================================================================
// Route53 / ACM types
// ============================================================================

/// Route53 hosted zone.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedZone {
    /// Zone ID, e.g. `/hostedzone/Z0123`.
    pub id: String,
    /// Fully qualified zone name with trailing dot.
    pub name: String,
}

/// `route53 create-hosted-zone` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateHostedZoneResponse {
    pub hosted_zone: HostedZone,
}

/// `route53 list-hosted-zones-by-name` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListHostedZonesResponse {
    #[serde(default)]
    pub hosted_zones: Vec<HostedZone>,
}

/// `route53 list-resource-record-sets` response.
///
/// Record sets are kept as raw JSON so they can be echoed back verbatim in a
/// `DELETE` change batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListRecordSetsResponse {
    #[serde(default)]
    pub resource_record_sets: Vec<serde_json::Value>,
}

/// `acm request-certificate` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestCertificateResponse {
    pub certificate_arn: String,
}

/// Certificate list entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateSummary {
    pub certificate_arn: String,
    pub domain_name: String,
}

/// `acm list-certificates` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListCertificatesResponse {
    #[serde(default)]
    pub certificate_summary_list: Vec<CertificateSummary>,
}

/// DNS record ACM expects for validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidationRecord {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub value: String,
}

/// Validation state for one domain on a certificate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidation {
    pub resource_record: Option<ValidationRecord>,
}

/// Certificate details.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateDetail {
    pub status: String,
    #[serde(default)]
    pub domain_validation_options: Vec<DomainValidation>,
}

/// `acm describe-certificate` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeCertificateResponse {
    pub certificate: CertificateDetail,
}

// ============================================================================
// SNS types
// ============================================================================

/// `sns create-topic` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTopicResponse {
    pub topic_arn: String,
}

/// SNS topic.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Topic {
    pub topic_arn: String,
}

/// `sns list-topics` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTopicsResponse {
    #[serde(default)]
    pub topics: Vec<Topic>,
}

// ============================================================================
// Helm types
// ============================================================================

/// Release info block of `helm status -o json`.
#[derive(Debug, Clone, Deserialize)]
pub struct HelmReleaseInfo {
    /// Release status (`deployed`, `failed`, `pending-install`, ...).
    pub status: String,
}

/// `helm status -o json` output.
#[derive(Debug, Clone, Deserialize)]
pub struct HelmRelease {
    pub name: String,
    pub info: HelmReleaseInfo,
}
