//! AWS (Amazon Web Services) cloud provider.
//!
//! Implements the [`CloudProvider`](crate::CloudProvider) trait on top of the
//! `aws`, `kubectl` and `helm` command line tools.
//!
//! ## Services
//!
//! - **EC2** - VPC, subnets, internet gateway, route table
//! - **ECR** - Container image repositories
//! - **EKS** - Managed Kubernetes control plane and node groups
//! - **IAM** - Cluster and node roles (bootstrap)
//! - **Route53 / ACM** - Hosted zone and wildcard certificate
//! - **CloudWatch / SNS** - Dashboard, CPU alarm and notification topic

mod client;
pub mod models;

pub use client::{
    acm_status, classify_error, eks_status, helm_status, vpc_status, AwsCli,
};
