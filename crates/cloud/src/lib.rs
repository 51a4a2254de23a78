//! Cloud collaborator for envstack environments.
//!
//! This crate provides the pieces the lifecycle orchestrator talks to:
//!
//! - **Resource model** - the typed nodes of a resource plan (network,
//!   registry, cluster, node group, add-on, DNS zone, certificate, dashboard,
//!   alarm topic) and the status each one reports
//! - **Provider trait** - create / describe / delete per resource, plus the
//!   one-time bootstrap and teardown cleanup hooks
//! - **AWS** - the production provider, driving the `aws`, `kubectl` and
//!   `helm` command line tools
//!
//! ## Status contract
//!
//! Every provider maps its native states onto [`ResourceStatus`]:
//! `pending`, `inProgress`, `active`, `failed` and `absent`. A describe of a
//! resource that does not exist returns `absent`, never an error.

pub mod providers;
pub mod resources;

pub use providers::{aws, AwsCli, CallerIdentity, CloudProvider, CloudProviderError};
pub use resources::{
    AddonChart, CapacityType, FailurePolicy, ResourceKind, ResourceNode, ResourceSpec,
    ResourceStatus,
};
